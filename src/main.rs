//! glTF viewer
//!
//! A winit window driving a reactive render-state layer:
//! - UI intents arrive as events and mutate one `RenderState`
//! - asset and environment loads run in the background, latest selection wins
//! - a frame scheduler renders the current state once per display refresh
//!
//! `--capture out.png` renders a single frame headless and exits.

mod app;
mod assets;
mod config;
mod render;
mod scene;
mod ui;
mod viewer;

use app::{App, AppError};
use assets::{GltfResourceLoader, ModelSelection};
use clap::Parser;
use config::ViewerConfig;
use render::PreviewRenderer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use ui::{SystemClipboard, UiAction, UiModel};
use viewer::{UiEvent, Viewer, Viewport};

const CAPTURE_SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "gltf-viewer", version, about = "View glTF 2.0 assets")]
struct Args {
    /// Main .gltf or .glb file to open.
    model: Option<PathBuf>,

    /// Extra files the model references (buffers, textures).
    #[arg(long = "aux", value_name = "FILE")]
    aux: Vec<PathBuf>,

    /// JSON viewer configuration.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Environment preset name or .hdr path.
    #[arg(long, value_name = "NAME|PATH")]
    environment: Option<String>,

    /// Render one frame without a window and write it as PNG.
    #[arg(long, value_name = "OUT.png")]
    capture: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), AppError> {
    let mut config = match args.config.as_deref() {
        Some(path) => match ViewerConfig::load_from_file(path) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("ignoring config {}: {}", path.display(), err);
                ViewerConfig::default()
            }
        },
        None => ViewerConfig::default(),
    };
    if let Some(capture) = args.capture.clone() {
        config.capture_path = capture;
    }
    let environment = args
        .environment
        .clone()
        .or_else(|| config.default_environment.clone())
        .map(|name| config.resolve_environment(&name));
    let model = args
        .model
        .map(|model| ModelSelection::new(model).with_additional_files(args.aux));

    log::info!("glTF viewer starting");
    let mut viewer = Viewer::new(
        PreviewRenderer::new(),
        Arc::new(GltfResourceLoader),
        Box::new(SystemClipboard::default()),
        config.clone(),
    )?;

    if args.capture.is_some() {
        return capture_headless(viewer, &config, model, environment);
    }

    let mut ui = UiModel::new(viewer.ui_events(), config.environments.clone());
    ui.attach_loads(viewer.subscribe_loads());
    ui.attach_environments(viewer.subscribe_environments());
    ui.attach_camera_changes(viewer.subscribe_camera_changes());
    ui.attach_statistics(viewer.subscribe_statistics());
    ui.attach_disabled_animations(viewer.subscribe_disabled_animations());
    viewer.connect();

    if let Some(selection) = model {
        ui.handle(UiAction::OpenModel(selection));
    }
    if let Some(path) = environment {
        ui.handle(UiAction::OpenEnvironment(path));
    }

    app::run(App::new(viewer, ui, config.window))
}

fn capture_headless(
    mut viewer: Viewer<PreviewRenderer>,
    config: &ViewerConfig,
    model: Option<ModelSelection>,
    environment: Option<PathBuf>,
) -> Result<(), AppError> {
    let events = viewer.ui_events();
    viewer.connect();
    // The receiver is owned by `viewer`, which outlives these sends.
    if let Some(selection) = model {
        let _ = events.send(UiEvent::ModelSelected(selection));
    }
    if let Some(path) = environment {
        let _ = events.send(UiEvent::EnvironmentSelected(path));
    }
    if !viewer.settle(CAPTURE_SETTLE_TIMEOUT) {
        log::warn!("capturing before all loads finished");
    }

    let viewport = Viewport {
        window_width: config.window.width,
        element_height: config.window.height,
    };
    viewer.frame(viewport)?;
    viewer.capture_to(&config.capture_path)?;
    log::info!("wrote {}", config.capture_path.display());
    Ok(())
}
