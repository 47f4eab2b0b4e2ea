mod input;
mod timing;

use crate::assets::{is_environment_path, is_gltf_path, ModelSelection};
use crate::config::WindowConfig;
use crate::render::PreviewRenderer;
use crate::ui::{UiAction, UiModel};
use crate::viewer::{Viewer, ViewerError, Viewport};
use input::{key_command, wheel_gesture, KeyCommand, PointerState};
use timing::FrameTiming;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error(transparent)]
    Viewer(#[from] ViewerError),
}

pub struct App {
    window: Option<Arc<Window>>,
    window_config: WindowConfig,
    viewer: Viewer<PreviewRenderer>,
    ui: UiModel,
    pointer: PointerState,
    dropped_files: Vec<PathBuf>,
    timing: FrameTiming,
    target_frame_duration: Duration,
    next_frame_time: Instant,
}

impl App {
    pub fn new(viewer: Viewer<PreviewRenderer>, ui: UiModel, window_config: WindowConfig) -> Self {
        Self {
            window: None,
            timing: FrameTiming::new(window_config.title.clone()),
            window_config,
            viewer,
            ui,
            pointer: PointerState::default(),
            dropped_files: Vec::new(),
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
        }
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn render(&mut self) {
        let Some(window) = self.window.clone() else {
            return;
        };
        let size = window.inner_size();
        let viewport = Viewport {
            window_width: size.width,
            element_height: size.height,
        };
        self.viewer.observe_viewport(viewport);
        self.viewer.tick();
        self.ui.update();

        let frame_start = Instant::now();
        if let Err(err) = self.viewer.frame(viewport) {
            log::error!("frame failed: {err}");
        }
        let now = Instant::now();
        self.timing.set_render_time(now.saturating_duration_since(frame_start));
        let timer = &self.viewer.state().animation_timer;
        let summary = format!(
            "{} | t {:.1}s{}",
            self.ui.summary(),
            timer.elapsed(now).as_secs_f32(),
            if timer.is_paused() { " (paused)" } else { "" }
        );
        self.timing.update(Some(&window), now, &summary);
    }

    fn handle_key_command(&mut self, command: KeyCommand, event_loop: &ActiveEventLoop) {
        match command {
            KeyCommand::Quit => event_loop.exit(),
            KeyCommand::OpenModelDialog => self.handle_open_model_action(),
            KeyCommand::OpenEnvironmentDialog => self.handle_open_environment_action(),
            KeyCommand::Ui(action) => {
                self.ui.handle(action);
            }
        }
    }

    fn handle_open_model_action(&mut self) {
        let Some(files) = rfd::FileDialog::new()
            .add_filter("glTF", &["gltf", "glb"])
            .add_filter("All files", &["*"])
            .pick_files()
        else {
            return;
        };
        match ModelSelection::from_files(files) {
            Some(selection) => {
                self.ui.handle(UiAction::OpenModel(selection));
            }
            None => log::warn!("no .gltf or .glb file among the picked files"),
        }
    }

    fn handle_open_environment_action(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("HDR", &["hdr"])
            .pick_file()
        else {
            return;
        };
        self.ui.handle(UiAction::OpenEnvironment(path));
    }

    /// Files dropped together arrive one event each; treat them as one selection.
    fn flush_dropped_files(&mut self) {
        if self.dropped_files.is_empty() {
            return;
        }
        let files = std::mem::take(&mut self.dropped_files);
        if files.iter().any(|file| is_gltf_path(file)) {
            if let Some(selection) = ModelSelection::from_files(files) {
                self.ui.handle(UiAction::OpenModel(selection));
            }
        } else if let Some(hdr) = files.into_iter().find(|file| is_environment_path(file)) {
            self.ui.handle(UiAction::OpenEnvironment(hdr));
        } else {
            log::warn!("dropped files contain no model or environment");
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(self.window_config.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.window_config.width,
                self.window_config.height,
            ))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        self.update_target_frame_duration(&window);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Focused(false) => self.pointer.reset(),
            WindowEvent::KeyboardInput { event, .. } => {
                if let Some(command) = key_command(event.physical_key, event.state) {
                    self.handle_key_command(command, event_loop);
                }
            }
            WindowEvent::Resized(_) | WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(gesture) = self
                    .pointer
                    .handle_move(position.x as f32, position.y as f32)
                {
                    self.viewer.gesture(gesture);
                }
            }
            WindowEvent::CursorLeft { .. } => self.pointer.reset(),
            WindowEvent::MouseInput { state, button, .. } => {
                self.pointer.handle_button(button, state);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.viewer.gesture(wheel_gesture(delta));
            }
            WindowEvent::DroppedFile(path) => self.dropped_files.push(path),
            WindowEvent::RedrawRequested => self.render(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        self.flush_dropped_files();
        if self.viewer.scheduler().is_halted() {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run(mut app: App) -> Result<(), AppError> {
    log::info!("Press ESC or close window to exit");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);
    event_loop.run_app(&mut app)?;

    let scheduler = app.viewer.scheduler();
    match scheduler.surface() {
        Some(surface) => log::info!(
            "rendered {} frame(s), last surface {}x{}, goodbye",
            scheduler.frames_rendered(),
            surface.width,
            surface.height
        ),
        None => log::info!("no frames rendered, goodbye"),
    }
    Ok(())
}
