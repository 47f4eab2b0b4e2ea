use crate::assets::ModelSelection;
use crate::config::EnvironmentPreset;
use crate::render::Statistics;
use crate::viewer::{
    environment_rotation_degrees, AssetSummary, CameraChange, DebugChannel, EnvironmentOutcome,
    LoadOutcome, OptionChange, ToneMap, UiEvent,
};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};

const ROTATION_LABELS: [&str; 4] = ["+X", "+Z", "-X", "-Z"];
const EXPOSURE_STEP: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("system clipboard unavailable: {0}")]
    Unavailable(#[from] arboard::Error),
}

/// Destination for exported text.
pub trait ClipboardSink {
    fn set_text(&mut self, text: String) -> Result<(), ClipboardError>;
}

/// Clipboard backed by the OS, opened on first use.
#[derive(Default)]
pub struct SystemClipboard {
    clipboard: Option<arboard::Clipboard>,
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: String) -> Result<(), ClipboardError> {
        let clipboard = match &mut self.clipboard {
            Some(clipboard) => clipboard,
            slot @ None => slot.insert(arboard::Clipboard::new()?),
        };
        clipboard.set_text(text)?;
        Ok(())
    }
}

/// User intents decoded by the host from keys, dialogs and drops.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    OpenModel(ModelSelection),
    OpenEnvironment(PathBuf),
    NextEnvironmentPreset,
    NextScene,
    CycleCamera,
    NextVariant,
    NextToneMap,
    NextDebugChannel,
    ToggleIbl,
    TogglePunctual,
    ToggleBackground,
    RotateEnvironment,
    ExposureUp,
    ExposureDown,
    TogglePlayback,
    ToggleAnimation(usize),
    Capture,
    ExportCamera,
}

/// The UI side of the viewer: turns actions into events and mirrors what the
/// viewer reports back.
pub struct UiModel {
    events: Sender<UiEvent>,
    loads: Option<Receiver<LoadOutcome>>,
    environments: Option<Receiver<EnvironmentOutcome>>,
    camera_changes: Option<Receiver<CameraChange>>,
    statistics: Option<Receiver<Statistics>>,
    disabled_animations: Option<Receiver<Vec<usize>>>,
    presets: Vec<EnvironmentPreset>,
    preset_index: Option<usize>,

    asset: Option<AssetSummary>,
    scene_index: usize,
    scene_cameras: Vec<usize>,
    camera: Option<usize>,
    variant: Option<usize>,
    tone_map: usize,
    debug_channel: usize,
    use_ibl: bool,
    use_punctual: bool,
    environment_background: bool,
    rotation: usize,
    exposure_stops: f32,
    playing: bool,
    active_animations: Vec<usize>,
    disabled: Vec<usize>,
    stats: Statistics,
    environment: Option<String>,
    status: String,
}

impl UiModel {
    pub fn new(events: Sender<UiEvent>, presets: Vec<EnvironmentPreset>) -> Self {
        Self {
            events,
            loads: None,
            environments: None,
            camera_changes: None,
            statistics: None,
            disabled_animations: None,
            presets,
            preset_index: None,
            asset: None,
            scene_index: 0,
            scene_cameras: Vec::new(),
            camera: None,
            variant: None,
            tone_map: 0,
            debug_channel: 0,
            use_ibl: true,
            use_punctual: true,
            environment_background: true,
            // 90 degrees, the default rotation.
            rotation: 1,
            exposure_stops: 0.0,
            playing: true,
            active_animations: Vec::new(),
            disabled: Vec::new(),
            stats: Statistics::default(),
            environment: None,
            status: String::new(),
        }
    }

    pub fn attach_loads(&mut self, receiver: Receiver<LoadOutcome>) {
        self.loads = Some(receiver);
    }

    pub fn attach_environments(&mut self, receiver: Receiver<EnvironmentOutcome>) {
        self.environments = Some(receiver);
    }

    pub fn attach_camera_changes(&mut self, receiver: Receiver<CameraChange>) {
        self.camera_changes = Some(receiver);
    }

    pub fn attach_statistics(&mut self, receiver: Receiver<Statistics>) {
        self.statistics = Some(receiver);
    }

    pub fn attach_disabled_animations(&mut self, receiver: Receiver<Vec<usize>>) {
        self.disabled_animations = Some(receiver);
    }

    #[cfg(test)]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Drain everything the viewer reported since the last call.
    pub fn update(&mut self) {
        let loads: Vec<LoadOutcome> = drain(&self.loads);
        for outcome in loads {
            match outcome {
                LoadOutcome::Loaded(summary) => {
                    self.scene_index = summary.scene_index;
                    self.scene_cameras = summary.scene_cameras.clone();
                    self.camera = None;
                    self.variant = None;
                    self.active_animations = summary.animation_indices.clone();
                    log::debug!("ui mirrors {} (generation {})", summary.name, summary.generation);
                    self.status = format!("Loaded {}", summary.name);
                    self.asset = Some(summary);
                }
                LoadOutcome::Failed { path, message, .. } => {
                    self.status = format!("Failed to load {}: {}", path.display(), message);
                }
            }
        }
        for outcome in drain(&self.environments) {
            match outcome {
                EnvironmentOutcome::Loaded { name } => self.environment = Some(name),
                EnvironmentOutcome::Failed { path, message } => {
                    self.status =
                        format!("Failed to load environment {}: {}", path.display(), message);
                }
            }
        }
        for change in drain(&self.camera_changes) {
            self.scene_index = change.scene_index;
            self.scene_cameras = change.cameras;
            self.camera = change.camera_index;
        }
        if let Some(stats) = drain(&self.statistics).pop() {
            self.stats = stats;
        }
        if let Some(disabled) = drain(&self.disabled_animations).pop() {
            self.disabled = disabled;
        }
    }

    /// One-line description for the window title.
    pub fn summary(&self) -> String {
        let mut summary = match &self.asset {
            Some(asset) => format!(
                "{} | scene {}/{} | camera {} of {} | {} meshes, {} faces, {}+{} materials",
                asset.name,
                self.scene_index + 1,
                asset.scene_count,
                self.camera
                    .map(|camera| camera.to_string())
                    .unwrap_or_else(|| "free".to_string()),
                asset.camera_count,
                self.stats.mesh_count,
                self.stats.face_count,
                self.stats.opaque_material_count,
                self.stats.transparent_material_count,
            ),
            None => "no model".to_string(),
        };
        if !self.active_animations.is_empty() {
            summary.push_str(&format!(" | playing {:?}", self.active_animations));
        }
        if !self.disabled.is_empty() {
            summary.push_str(&format!(" (blocked {:?})", self.disabled));
        }
        if let Some(environment) = &self.environment {
            summary.push_str(&format!(" | env {environment}"));
        }
        summary.push_str(&format!(
            " | {} | {:+.1} EV",
            ToneMap::ALL[self.tone_map].label(),
            self.exposure_stops
        ));
        if !self.status.is_empty() {
            summary.push_str(" | ");
            summary.push_str(&self.status);
        }
        summary
    }

    /// Translate and send. Returns whether an event went out.
    pub fn handle(&mut self, action: UiAction) -> bool {
        let Some(event) = self.event_for(action) else {
            return false;
        };
        // The viewer owns the receiver for the whole session.
        self.events.send(event).is_ok()
    }

    fn event_for(&mut self, action: UiAction) -> Option<UiEvent> {
        let event = match action {
            UiAction::OpenModel(selection) => UiEvent::ModelSelected(selection),
            UiAction::OpenEnvironment(path) => {
                self.preset_index = None;
                UiEvent::EnvironmentSelected(path)
            }
            UiAction::NextEnvironmentPreset => {
                if self.presets.is_empty() {
                    return None;
                }
                let next = self
                    .preset_index
                    .map_or(0, |index| (index + 1) % self.presets.len());
                self.preset_index = Some(next);
                UiEvent::EnvironmentPreset(self.presets[next].key.clone())
            }
            UiAction::NextScene => {
                let asset = self.asset.as_ref()?;
                if asset.scene_count == 0 {
                    return None;
                }
                UiEvent::SceneChanged((self.scene_index + 1) % asset.scene_count)
            }
            UiAction::CycleCamera => {
                let next = match self.camera {
                    None => self.scene_cameras.first().copied(),
                    Some(current) => self
                        .scene_cameras
                        .iter()
                        .position(|camera| *camera == current)
                        .and_then(|position| self.scene_cameras.get(position + 1))
                        .copied(),
                };
                self.camera = next;
                UiEvent::Option(OptionChange::Camera(next))
            }
            UiAction::NextVariant => {
                let variants = &self.asset.as_ref()?.variants;
                if variants.is_empty() {
                    return None;
                }
                let next = match self.variant {
                    None => Some(0),
                    Some(index) if index + 1 < variants.len() => Some(index + 1),
                    Some(_) => None,
                };
                let name = next.map(|index| variants[index].clone());
                self.variant = next;
                UiEvent::Option(OptionChange::Variant(name))
            }
            UiAction::NextToneMap => {
                self.tone_map = (self.tone_map + 1) % ToneMap::ALL.len();
                UiEvent::Option(OptionChange::ToneMap(ToneMap::ALL[self.tone_map]))
            }
            UiAction::NextDebugChannel => {
                self.debug_channel = (self.debug_channel + 1) % DebugChannel::ALL.len();
                UiEvent::Option(OptionChange::DebugOutput(
                    DebugChannel::ALL[self.debug_channel],
                ))
            }
            UiAction::ToggleIbl => {
                self.use_ibl = !self.use_ibl;
                UiEvent::Option(OptionChange::UseIbl(self.use_ibl))
            }
            UiAction::TogglePunctual => {
                self.use_punctual = !self.use_punctual;
                UiEvent::Option(OptionChange::UsePunctual(self.use_punctual))
            }
            UiAction::ToggleBackground => {
                self.environment_background = !self.environment_background;
                UiEvent::Option(OptionChange::EnvironmentBackground(
                    self.environment_background,
                ))
            }
            UiAction::RotateEnvironment => {
                self.rotation = (self.rotation + 1) % ROTATION_LABELS.len();
                let label = ROTATION_LABELS[self.rotation];
                log::debug!(
                    "environment rotation {label} ({:?} degrees)",
                    environment_rotation_degrees(label)
                );
                UiEvent::Option(OptionChange::EnvironmentRotation(label.to_string()))
            }
            UiAction::ExposureUp => {
                self.exposure_stops += EXPOSURE_STEP;
                UiEvent::Option(OptionChange::Exposure(self.exposure_stops))
            }
            UiAction::ExposureDown => {
                self.exposure_stops -= EXPOSURE_STEP;
                UiEvent::Option(OptionChange::Exposure(self.exposure_stops))
            }
            UiAction::TogglePlayback => {
                self.playing = !self.playing;
                UiEvent::Option(OptionChange::AnimationPlaying(self.playing))
            }
            UiAction::ToggleAnimation(index) => {
                let count = self.asset.as_ref()?.animation_count;
                if index >= count {
                    return None;
                }
                let mut selection = self.active_animations.clone();
                if let Some(position) = selection.iter().position(|active| *active == index) {
                    selection.remove(position);
                } else if self.disabled.contains(&index) {
                    self.status = format!("animation {} conflicts with the active set", index + 1);
                    return None;
                } else {
                    selection.push(index);
                    selection.sort_unstable();
                }
                self.active_animations = selection.clone();
                UiEvent::AnimationsSelected(selection)
            }
            UiAction::Capture => UiEvent::CaptureRequested,
            UiAction::ExportCamera => UiEvent::CameraExportRequested,
        };
        Some(event)
    }
}

fn drain<T>(receiver: &Option<Receiver<T>>) -> Vec<T> {
    receiver
        .as_ref()
        .map(|receiver| receiver.try_iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn summary() -> AssetSummary {
        AssetSummary {
            generation: 1,
            name: "box".into(),
            scene_count: 2,
            scene_index: 0,
            camera_count: 2,
            scene_cameras: vec![0, 1],
            animation_count: 4,
            animation_indices: vec![0, 2, 3],
            variants: vec!["red".into(), "blue".into()],
        }
    }

    fn loaded_model() -> (UiModel, Receiver<UiEvent>) {
        let (events, rx) = mpsc::channel();
        let mut ui = UiModel::new(events, Vec::new());
        let (loads_tx, loads_rx) = mpsc::channel();
        ui.attach_loads(loads_rx);
        loads_tx.send(LoadOutcome::Loaded(summary())).unwrap();
        ui.update();
        (ui, rx)
    }

    #[test]
    fn camera_cycles_through_scene_cameras_back_to_free() {
        let (mut ui, rx) = loaded_model();
        for _ in 0..3 {
            assert!(ui.handle(UiAction::CycleCamera));
        }
        let cameras: Vec<UiEvent> = rx.try_iter().collect();
        assert_eq!(
            cameras,
            vec![
                UiEvent::Option(OptionChange::Camera(Some(0))),
                UiEvent::Option(OptionChange::Camera(Some(1))),
                UiEvent::Option(OptionChange::Camera(None)),
            ]
        );
    }

    #[test]
    fn conflicting_animation_is_refused() {
        let (mut ui, rx) = loaded_model();
        let (disabled_tx, disabled_rx) = mpsc::channel();
        ui.attach_disabled_animations(disabled_rx);
        disabled_tx.send(vec![1]).unwrap();
        ui.update();

        assert!(!ui.handle(UiAction::ToggleAnimation(1)));
        assert!(ui.status().contains("conflicts"));
        assert!(ui.handle(UiAction::ToggleAnimation(2)));
        assert_eq!(
            rx.try_recv(),
            Ok(UiEvent::AnimationsSelected(vec![0, 3]))
        );
        assert!(!ui.handle(UiAction::ToggleAnimation(9)));
    }

    #[test]
    fn scene_and_variant_need_an_asset() {
        let (events, _rx) = mpsc::channel();
        let mut ui = UiModel::new(events, Vec::new());
        assert!(!ui.handle(UiAction::NextScene));
        assert!(!ui.handle(UiAction::NextVariant));
        assert!(!ui.handle(UiAction::NextEnvironmentPreset));
    }

    #[test]
    fn variants_wrap_back_to_none() {
        let (mut ui, rx) = loaded_model();
        for _ in 0..3 {
            ui.handle(UiAction::NextVariant);
        }
        let variants: Vec<UiEvent> = rx.try_iter().collect();
        assert_eq!(
            variants.last(),
            Some(&UiEvent::Option(OptionChange::Variant(None)))
        );
    }

    #[test]
    fn rotation_cycles_compass_labels() {
        let (events, rx) = mpsc::channel();
        let mut ui = UiModel::new(events, Vec::new());
        for _ in 0..4 {
            ui.handle(UiAction::RotateEnvironment);
        }
        let labels: Vec<String> = rx
            .try_iter()
            .filter_map(|event| match event {
                UiEvent::Option(OptionChange::EnvironmentRotation(label)) => Some(label),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["-X", "-Z", "+X", "+Z"]);
    }

    #[test]
    fn failed_load_surfaces_in_status() {
        let (mut ui, _rx) = loaded_model();
        let (loads_tx, loads_rx) = mpsc::channel();
        ui.attach_loads(loads_rx);
        loads_tx
            .send(LoadOutcome::Failed {
                generation: 2,
                path: PathBuf::from("bad.gltf"),
                message: "boom".into(),
            })
            .unwrap();
        ui.update();
        assert!(ui.summary().contains("box"));
        assert!(ui.status().contains("bad.gltf"));
    }
}
