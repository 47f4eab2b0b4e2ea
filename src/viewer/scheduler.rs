use super::state::RenderState;
use crate::render::{RenderError, Renderer};

/// Pixel size of the render surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(self) -> Option<f32> {
        (!self.is_empty()).then(|| self.width as f32 / self.height as f32)
    }
}

/// Layout the host window reports each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub window_width: u32,
    pub element_height: u32,
}

/// Sizes the surface and renders exactly one frame per call.
#[derive(Debug)]
pub struct FrameScheduler {
    panel_width: u32,
    surface: Option<SurfaceSize>,
    frames_rendered: u64,
    halted: bool,
}

impl FrameScheduler {
    pub fn new(panel_width: u32) -> Self {
        Self {
            panel_width,
            surface: None,
            frames_rendered: 0,
            halted: false,
        }
    }

    pub fn surface_for(&self, viewport: Viewport) -> SurfaceSize {
        SurfaceSize::new(
            viewport.window_width.saturating_sub(self.panel_width),
            viewport.element_height,
        )
    }

    /// Render one frame at the current viewport.
    ///
    /// Returns the surface used, or `None` when nothing was drawn because the
    /// surface is empty or the loop has halted. A render error halts the loop.
    pub fn frame<R: Renderer + ?Sized>(
        &mut self,
        viewport: Viewport,
        state: &RenderState,
        renderer: &mut R,
    ) -> Result<Option<SurfaceSize>, RenderError> {
        if self.halted {
            return Ok(None);
        }
        let size = self.surface_for(viewport);
        if self.surface != Some(size) {
            log::debug!("surface resized to {}x{}", size.width, size.height);
        }
        self.surface = Some(size);
        if size.is_empty() {
            return Ok(None);
        }
        match renderer.render(state, size.width, size.height) {
            Ok(()) => {
                self.frames_rendered += 1;
                Ok(Some(size))
            }
            Err(err) => {
                log::error!("render loop halted: {err}");
                self.halted = true;
                Err(err)
            }
        }
    }

    pub fn surface(&self) -> Option<SurfaceSize> {
        self.surface
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{PreviewRenderer, Statistics};
    use crate::scene::fixtures::two_scene_asset;

    /// Records the size of every render call.
    #[derive(Default)]
    struct RecordingRenderer {
        sizes: Vec<(u32, u32)>,
        fail: bool,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, _: &RenderState, width: u32, height: u32) -> Result<(), RenderError> {
            if self.fail {
                return Err(RenderError::SurfaceTooLarge { width, height });
            }
            self.sizes.push((width, height));
            Ok(())
        }

        fn gather_statistics(&self, _: &RenderState) -> Statistics {
            Statistics::default()
        }

        fn capture_png(&self) -> Result<Vec<u8>, RenderError> {
            Err(RenderError::NoFrame)
        }
    }

    fn viewport(window_width: u32, element_height: u32) -> Viewport {
        Viewport {
            window_width,
            element_height,
        }
    }

    #[test]
    fn surface_tracks_latest_viewport_minus_panel() {
        let mut scheduler = FrameScheduler::new(300);
        let mut renderer = RecordingRenderer::default();
        let state = RenderState::default();

        for (width, height) in [(1280, 720), (1920, 1080), (800, 600), (1280, 720)] {
            let size = scheduler
                .frame(viewport(width, height), &state, &mut renderer)
                .unwrap();
            assert_eq!(size, Some(SurfaceSize::new(width - 300, height)));
        }
        assert_eq!(
            renderer.sizes,
            vec![(980, 720), (1620, 1080), (500, 600), (980, 720)]
        );
        assert_eq!(scheduler.frames_rendered(), 4);
    }

    #[test]
    fn resizing_leaves_render_state_untouched() {
        let mut scheduler = FrameScheduler::new(0);
        let mut renderer = PreviewRenderer::new();
        let mut state = RenderState::default();
        state.asset = Some(two_scene_asset("a"));
        state.camera_index = Some(0);
        let camera = state.user_camera;
        let params = state.rendering_parameters.clone();

        scheduler.frame(viewport(640, 480), &state, &mut renderer).unwrap();
        scheduler.frame(viewport(320, 900), &state, &mut renderer).unwrap();

        assert_eq!(state.user_camera, camera);
        assert_eq!(state.rendering_parameters, params);
        assert_eq!(state.scene_index, 0);
        assert_eq!(state.camera_index, Some(0));
    }

    #[test]
    fn panel_wider_than_window_skips_frame() {
        let mut scheduler = FrameScheduler::new(500);
        let mut renderer = RecordingRenderer::default();
        let size = scheduler
            .frame(viewport(400, 300), &RenderState::default(), &mut renderer)
            .unwrap();
        assert_eq!(size, None);
        assert_eq!(scheduler.surface(), Some(SurfaceSize::new(0, 300)));
        assert!(renderer.sizes.is_empty());
    }

    #[test]
    fn render_error_halts_for_good() {
        let mut scheduler = FrameScheduler::new(0);
        let mut renderer = RecordingRenderer {
            fail: true,
            ..RecordingRenderer::default()
        };
        let state = RenderState::default();
        assert!(scheduler.frame(viewport(10, 10), &state, &mut renderer).is_err());
        assert!(scheduler.is_halted());

        renderer.fail = false;
        assert_eq!(
            scheduler.frame(viewport(10, 10), &state, &mut renderer).unwrap(),
            None
        );
        assert!(renderer.sizes.is_empty());
    }
}
