use std::time::{Duration, Instant};
use winit::window::Window;

const TITLE_REFRESH: Duration = Duration::from_millis(500);

/// Frame cadence and title-bar reporting.
pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_title_time: Instant,
    frames_since_title: u32,
    frame_ms: f32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String) -> Self {
        Self {
            last_frame_time: None,
            last_title_time: Instant::now(),
            frames_since_title: 0,
            frame_ms: 0.0,
            render_ms: 0.0,
            base_title,
        }
    }

    pub fn set_render_time(&mut self, render: Duration) {
        self.render_ms = render.as_secs_f32() * 1000.0;
    }

    /// Record a frame and refresh the title with fps and the UI summary twice a second.
    pub fn update(&mut self, window: Option<&Window>, now: Instant, summary: &str) {
        if let Some(last) = self.last_frame_time {
            self.frame_ms = now.saturating_duration_since(last).as_secs_f32() * 1000.0;
        }
        self.last_frame_time = Some(now);
        self.frames_since_title = self.frames_since_title.saturating_add(1);

        let elapsed = now.saturating_duration_since(self.last_title_time);
        if elapsed < TITLE_REFRESH {
            return;
        }
        let fps = self.frames_since_title as f32 / elapsed.as_secs_f32();
        if let Some(window) = window {
            window.set_title(&format!(
                "{} - {:.1} fps ({:.2} ms, render {:.2} ms) - {}",
                self.base_title, fps, self.frame_ms, self.render_ms, summary
            ));
        }
        self.frames_since_title = 0;
        self.last_title_time = now;
    }
}
