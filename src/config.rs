use crate::render::UserCamera;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "glTF Viewer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub yfov_degrees: f32,
    pub orbit_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let camera = UserCamera::default();
        Self {
            yfov_degrees: camera.yfov.to_degrees(),
            orbit_speed: camera.orbit_speed,
            pan_speed: camera.pan_speed,
            zoom_speed: camera.zoom_speed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentPreset {
    pub key: String,
    pub label: String,
}

impl EnvironmentPreset {
    fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
        }
    }
}

fn default_presets() -> Vec<EnvironmentPreset> {
    vec![
        EnvironmentPreset::new("footprint_court_512", "Footprint Court (512p)"),
        EnvironmentPreset::new("footprint_court", "Footprint Court"),
        EnvironmentPreset::new("pisa", "Pisa courtyard"),
        EnvironmentPreset::new("doge2", "Doge's palace"),
        EnvironmentPreset::new("ennis", "Dining room"),
        EnvironmentPreset::new("field", "Field"),
        EnvironmentPreset::new("helipad", "Helipad Goldenhour"),
        EnvironmentPreset::new("papermill", "Papermill Ruins"),
        EnvironmentPreset::new("neutral", "Studio Neutral"),
        EnvironmentPreset::new("chromatic", "Chromatic"),
        EnvironmentPreset::new("directional", "Directional"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    /// Width reserved for the UI panel, subtracted from the render surface.
    pub ui_panel_width: u32,
    pub capture_path: PathBuf,
    pub camera: CameraConfig,
    pub environment_dir: PathBuf,
    pub environments: Vec<EnvironmentPreset>,
    /// Preset key or path loaded at startup.
    pub default_environment: Option<String>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            ui_panel_width: 0,
            capture_path: PathBuf::from("capture.png"),
            camera: CameraConfig::default(),
            environment_dir: PathBuf::from("assets/environments"),
            environments: default_presets(),
            default_environment: None,
        }
    }
}

impl ViewerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: ViewerConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn user_camera(&self) -> UserCamera {
        UserCamera {
            yfov: self.camera.yfov_degrees.to_radians(),
            orbit_speed: self.camera.orbit_speed,
            pan_speed: self.camera.pan_speed,
            zoom_speed: self.camera.zoom_speed,
            aspect_ratio: self.window.width as f32 / self.window.height.max(1) as f32,
            ..UserCamera::default()
        }
    }

    /// A preset key maps to `<environment_dir>/<key>.hdr`; anything else is a path.
    pub fn resolve_environment(&self, name: &str) -> PathBuf {
        if self.environments.iter().any(|preset| preset.key == name) {
            self.environment_dir.join(format!("{name}.hdr"))
        } else {
            PathBuf::from(name)
        }
    }
}
