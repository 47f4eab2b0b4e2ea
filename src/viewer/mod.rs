//! Orchestration between UI events, background loads, derived state and the
//! per-frame renderer.
//!
//! All state mutation happens on the thread that owns the [`Viewer`]. Loads run
//! on a one-worker `tokio` runtime and come back over channels that are drained
//! by [`Viewer::tick`].

mod derived;
mod input;
mod loads;
mod multicast;
mod options;
mod pipeline;
mod scheduler;
mod state;

pub use derived::CameraChange;
pub use input::Gesture;
pub use options::{environment_rotation_degrees, OptionChange};
pub use pipeline::{AssetSummary, EnvironmentOutcome, LoadOutcome};
pub use scheduler::{SurfaceSize, Viewport};
pub use state::{DebugChannel, RenderState, RenderingParameters, ToneMap};

use derived::{disabled_animations, effective_camera, SceneChangeReaction};
use input::InputRouter;
use multicast::{Broadcast, Multicast};
use pipeline::{AssetLoadPipeline, EnvironmentLoads};
use scheduler::FrameScheduler;

use crate::assets::{ModelSelection, ResourceLoader};
use crate::config::ViewerConfig;
use crate::render::{RenderError, Renderer, Statistics};
use crate::scene::SelectionError;
use crate::ui::{ClipboardError, ClipboardSink};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything the UI can ask of the viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    ModelSelected(ModelSelection),
    SceneChanged(usize),
    Option(OptionChange),
    AnimationsSelected(Vec<usize>),
    EnvironmentSelected(PathBuf),
    /// Preset key from the configured environment table.
    EnvironmentPreset(String),
    CaptureRequested,
    CameraExportRequested,
}

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("failed to start load runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to serialize camera: {0}")]
    Export(#[from] serde_json::Error),
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("failed to write capture {path}: {source}")]
    Capture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct Viewer<R: Renderer> {
    state: RenderState,
    renderer: R,
    config: ViewerConfig,
    events_tx: Sender<UiEvent>,
    events: Receiver<UiEvent>,
    loads: Multicast<AssetLoadPipeline>,
    environments: Multicast<EnvironmentLoads>,
    scenes: Multicast<SceneChangeReaction>,
    loads_for_reactions: Receiver<LoadOutcome>,
    scenes_for_reactions: Receiver<CameraChange>,
    statistics: Broadcast<Statistics>,
    disabled: Broadcast<Vec<usize>>,
    scheduler: FrameScheduler,
    input: InputRouter,
    clipboard: Box<dyn ClipboardSink>,
    capture_requested: bool,
    // Dropped last so spawned loads outlive the pipelines holding their handles.
    runtime: tokio::runtime::Runtime,
}

impl<R: Renderer> Viewer<R> {
    pub fn new(
        renderer: R,
        loader: Arc<dyn ResourceLoader>,
        clipboard: Box<dyn ClipboardSink>,
        config: ViewerConfig,
    ) -> Result<Self, ViewerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("viewer-loads")
            .enable_all()
            .build()
            .map_err(ViewerError::Runtime)?;
        let handle = runtime.handle().clone();

        // Loads installed before the first frame still fit the configured window.
        let scheduler = FrameScheduler::new(config.ui_panel_width);
        let initial_surface = scheduler.surface_for(Viewport {
            window_width: config.window.width,
            element_height: config.window.height,
        });
        let mut loads = Multicast::new(AssetLoadPipeline::new(loader.clone(), handle.clone()));
        let mut scenes = Multicast::new(SceneChangeReaction::new());
        loads.producer_mut().observe_viewport(initial_surface);
        scenes.producer_mut().observe_viewport(initial_surface);
        let loads_for_reactions = loads.subscribe();
        let scenes_for_reactions = scenes.subscribe();
        let (events_tx, events) = mpsc::channel();

        Ok(Self {
            state: RenderState::new(config.user_camera()),
            renderer,
            scheduler,
            config,
            events_tx,
            events,
            loads,
            environments: Multicast::new(EnvironmentLoads::new(loader, handle)),
            scenes,
            loads_for_reactions,
            scenes_for_reactions,
            statistics: Broadcast::default(),
            disabled: Broadcast::default(),
            input: InputRouter::new(),
            clipboard,
            capture_requested: false,
            runtime,
        })
    }

    /// Sender the UI model publishes its events on.
    pub fn ui_events(&self) -> Sender<UiEvent> {
        self.events_tx.clone()
    }

    pub fn subscribe_loads(&mut self) -> Receiver<LoadOutcome> {
        self.loads.subscribe()
    }

    pub fn subscribe_environments(&mut self) -> Receiver<EnvironmentOutcome> {
        self.environments.subscribe()
    }

    pub fn subscribe_camera_changes(&mut self) -> Receiver<CameraChange> {
        self.scenes.subscribe()
    }

    pub fn subscribe_statistics(&mut self) -> Receiver<Statistics> {
        self.statistics.subscribe()
    }

    pub fn subscribe_disabled_animations(&mut self) -> Receiver<Vec<usize>> {
        self.disabled.subscribe()
    }

    /// Start producing. Call once every initial subscriber is wired.
    pub fn connect(&mut self) {
        if self.loads.is_connected() {
            return;
        }
        self.loads.connect();
        self.environments.connect();
        self.scenes.connect();
        log::info!("viewer connected");
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn in_flight(&self) -> usize {
        self.loads.producer().in_flight() + self.environments.producer().in_flight()
    }

    pub fn gesture(&mut self, gesture: Gesture) -> bool {
        self.input.route(&mut self.state, gesture)
    }

    /// Apply queued UI events in arrival order, then collect finished loads.
    pub fn tick(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let Err(err) = self.handle_event(event) {
                log::warn!("{err}");
            }
        }
        self.loads.pump(&mut self.state);
        self.environments.pump(&mut self.state);
        self.react();
    }

    fn handle_event(&mut self, event: UiEvent) -> Result<(), ViewerError> {
        match event {
            UiEvent::ModelSelected(selection) => self.loads.producer().select(selection),
            UiEvent::SceneChanged(scene_index) => {
                self.scenes.producer_mut().request(scene_index);
                self.scenes.pump(&mut self.state);
                self.react();
            }
            UiEvent::Option(change) => change.apply(&mut self.state, Instant::now())?,
            UiEvent::AnimationsSelected(selection) => {
                self.state.asset()?.check_animations(&selection)?;
                self.disabled
                    .send(disabled_animations(&self.state, &selection));
                self.state.animation_indices = selection;
            }
            UiEvent::EnvironmentSelected(path) => self.environments.producer().select(path),
            UiEvent::EnvironmentPreset(key) => {
                let path = self.config.resolve_environment(&key);
                self.environments.producer().select(path);
            }
            UiEvent::CaptureRequested => self.capture_requested = true,
            UiEvent::CameraExportRequested => self.export_camera()?,
        }
        Ok(())
    }

    /// Statistics and disabled-animation updates for whatever the pipelines applied.
    fn react(&mut self) {
        let mut refresh_statistics = false;
        for outcome in self.loads_for_reactions.try_iter() {
            if let LoadOutcome::Loaded(summary) = outcome {
                self.disabled
                    .send(disabled_animations(&self.state, &summary.animation_indices));
                refresh_statistics = true;
            }
        }
        if self.scenes_for_reactions.try_iter().count() > 0 {
            refresh_statistics = true;
        }
        if refresh_statistics {
            let stats = self.renderer.gather_statistics(&self.state);
            log::debug!("statistics {stats:?}");
            self.statistics.send(stats);
        }
    }

    /// Copy the effective camera as JSON to the clipboard.
    pub fn export_camera(&mut self) -> Result<(), ViewerError> {
        let description = effective_camera(&self.state)?;
        let json = serde_json::to_string_pretty(&description)?;
        self.clipboard.set_text(json)?;
        log::info!("camera copied to clipboard");
        Ok(())
    }

    /// Record the viewport that later camera refits use.
    pub fn observe_viewport(&mut self, viewport: Viewport) {
        let size = self.scheduler.surface_for(viewport);
        self.loads.producer_mut().observe_viewport(size);
        self.scenes.producer_mut().observe_viewport(size);
    }

    /// Size the surface for the viewport and render one frame.
    pub fn frame(&mut self, viewport: Viewport) -> Result<Option<SurfaceSize>, ViewerError> {
        self.observe_viewport(viewport);

        let rendered = self
            .scheduler
            .frame(viewport, &self.state, &mut self.renderer)?;
        if rendered.is_some() && self.capture_requested {
            self.capture_requested = false;
            let path = self.config.capture_path.clone();
            match self.capture_to(&path) {
                Ok(()) => log::info!("captured frame to {}", path.display()),
                Err(err) => log::warn!("{err}"),
            }
        }
        Ok(rendered)
    }

    /// Write the last rendered frame as PNG.
    pub fn capture_to(&self, path: &Path) -> Result<(), ViewerError> {
        let png = self.renderer.capture_png()?;
        std::fs::write(path, png).map_err(|source| ViewerError::Capture {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Tick until no events or loads are pending. Returns false on timeout.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if self.in_flight() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                log::warn!("{} load(s) still pending after {:?}", self.in_flight(), timeout);
                return false;
            }
            self.runtime.block_on(tokio::time::sleep(Duration::from_millis(2)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::pipeline::testing::GatedLoader;
    use super::*;
    use crate::render::PreviewRenderer;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryClipboard {
        text: Rc<RefCell<Option<String>>>,
    }

    impl ClipboardSink for MemoryClipboard {
        fn set_text(&mut self, text: String) -> Result<(), ClipboardError> {
            *self.text.borrow_mut() = Some(text);
            Ok(())
        }
    }

    fn viewer(loader: Arc<GatedLoader>) -> (Viewer<PreviewRenderer>, MemoryClipboard) {
        let clipboard = MemoryClipboard::default();
        let viewer = Viewer::new(
            PreviewRenderer::new(),
            loader,
            Box::new(clipboard.clone()),
            ViewerConfig::default(),
        )
        .unwrap();
        (viewer, clipboard)
    }

    #[test]
    fn events_before_connect_wait_for_connect() {
        let loader = Arc::new(GatedLoader::default());
        let (mut viewer, _) = viewer(loader.clone());
        let loads = viewer.subscribe_loads();
        let events = viewer.ui_events();

        events
            .send(UiEvent::ModelSelected(ModelSelection::new("m.gltf")))
            .unwrap();
        viewer.tick();
        assert_eq!(loader.calls(), 0);

        viewer.connect();
        assert!(viewer.settle(Duration::from_secs(5)));
        assert_eq!(loader.calls(), 1);
        assert!(matches!(loads.try_recv(), Ok(LoadOutcome::Loaded(_))));
        assert!(viewer.state().asset.is_some());
    }

    #[test]
    fn load_and_scene_change_publish_statistics_and_cameras() {
        let (mut viewer, _) = viewer(Arc::new(GatedLoader::default()));
        let statistics = viewer.subscribe_statistics();
        let cameras = viewer.subscribe_camera_changes();
        let disabled = viewer.subscribe_disabled_animations();
        viewer.connect();
        let events = viewer.ui_events();

        events
            .send(UiEvent::ModelSelected(ModelSelection::new("m.gltf")))
            .unwrap();
        viewer.settle(Duration::from_secs(5));
        assert_eq!(statistics.try_iter().count(), 1);
        assert_eq!(disabled.try_recv(), Ok(vec![1]));

        events.send(UiEvent::SceneChanged(1)).unwrap();
        events
            .send(UiEvent::Option(OptionChange::Camera(Some(0))))
            .unwrap();
        viewer.tick();
        assert_eq!(
            cameras.try_recv(),
            Ok(CameraChange {
                scene_index: 1,
                camera_index: None,
                cameras: Vec::new(),
            })
        );
        assert_eq!(viewer.state().scene_index, 1);
        assert_eq!(viewer.state().camera_index, Some(0));
        assert_eq!(statistics.try_iter().count(), 1);
    }

    #[test]
    fn invalid_selections_leave_state_untouched() {
        let (mut viewer, _) = viewer(Arc::new(GatedLoader::default()));
        viewer.connect();
        let events = viewer.ui_events();

        events.send(UiEvent::AnimationsSelected(vec![0])).unwrap();
        events.send(UiEvent::SceneChanged(1)).unwrap();
        viewer.tick();
        assert!(viewer.state().animation_indices.is_empty());
        assert_eq!(viewer.state().scene_index, 0);

        events
            .send(UiEvent::ModelSelected(ModelSelection::new("m.gltf")))
            .unwrap();
        viewer.settle(Duration::from_secs(5));
        events.send(UiEvent::AnimationsSelected(vec![0, 7])).unwrap();
        viewer.tick();
        assert_eq!(viewer.state().animation_indices, vec![0, 2, 3]);

        events.send(UiEvent::AnimationsSelected(vec![0, 1])).unwrap();
        viewer.tick();
        assert_eq!(viewer.state().animation_indices, vec![0, 1]);
    }

    #[test]
    fn camera_export_reaches_clipboard() {
        let (mut viewer, clipboard) = viewer(Arc::new(GatedLoader::default()));
        viewer.connect();
        viewer
            .ui_events()
            .send(UiEvent::CameraExportRequested)
            .unwrap();
        viewer.tick();
        let text = clipboard.text.borrow().clone().unwrap();
        let description: crate::render::CameraDescription = serde_json::from_str(&text).unwrap();
        assert_eq!(description.name, None);
    }

    #[test]
    fn load_before_first_frame_fits_configured_surface() {
        let mut config = ViewerConfig::default();
        config.window.width = 1280;
        config.window.height = 720;
        config.ui_panel_width = 640;
        let mut viewer = Viewer::new(
            PreviewRenderer::new(),
            Arc::new(GatedLoader::default()),
            Box::new(MemoryClipboard::default()),
            config,
        )
        .unwrap();
        viewer.connect();
        viewer
            .ui_events()
            .send(UiEvent::ModelSelected(ModelSelection::new("m.gltf")))
            .unwrap();
        assert!(viewer.settle(Duration::from_secs(5)));
        assert!((viewer.state().user_camera.aspect_ratio - 640.0 / 720.0).abs() < 1e-5);

        viewer.observe_viewport(Viewport {
            window_width: 840,
            element_height: 100,
        });
        viewer
            .ui_events()
            .send(UiEvent::ModelSelected(ModelSelection::new("n.gltf")))
            .unwrap();
        assert!(viewer.settle(Duration::from_secs(5)));
        assert!((viewer.state().user_camera.aspect_ratio - 2.0).abs() < 1e-5);
    }

    #[test]
    fn capture_request_writes_after_next_frame() {
        let path = std::env::temp_dir().join(format!(
            "gltf_viewer_capture_{}.png",
            std::process::id()
        ));
        let mut config = ViewerConfig::default();
        config.capture_path = path.clone();
        config.ui_panel_width = 100;
        let mut viewer = Viewer::new(
            PreviewRenderer::new(),
            Arc::new(GatedLoader::default()),
            Box::new(MemoryClipboard::default()),
            config,
        )
        .unwrap();
        viewer.connect();
        viewer.ui_events().send(UiEvent::CaptureRequested).unwrap();
        viewer.tick();

        let size = viewer
            .frame(Viewport {
                window_width: 164,
                element_height: 48,
            })
            .unwrap();
        assert_eq!(size, Some(SurfaceSize::new(64, 48)));
        let image = image::open(&path).unwrap();
        assert_eq!((image.width(), image.height()), (64, 48));
        let _ = std::fs::remove_file(path);
    }
}
