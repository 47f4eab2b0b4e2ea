use crate::assets::Environment;
use crate::render::UserCamera;
use crate::scene::{GltfAsset, SelectionError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToneMap {
    #[default]
    KhronosPbrNeutral,
    AcesHillExposureBoost,
    AcesNarkowicz,
    AcesHill,
    None,
}

impl ToneMap {
    pub const ALL: [ToneMap; 5] = [
        ToneMap::KhronosPbrNeutral,
        ToneMap::AcesHillExposureBoost,
        ToneMap::AcesNarkowicz,
        ToneMap::AcesHill,
        ToneMap::None,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ToneMap::KhronosPbrNeutral => "Khronos PBR Neutral",
            ToneMap::AcesHillExposureBoost => "ACES Filmic (Hill, exposure boost)",
            ToneMap::AcesNarkowicz => "ACES Filmic (Narkowicz)",
            ToneMap::AcesHill => "ACES Filmic (Hill)",
            ToneMap::None => "None (linear)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugChannel {
    #[default]
    None,
    UvCoords0,
    NormalTexture,
    GeometryNormal,
    Tangent,
    Bitangent,
    WorldSpaceNormal,
    Alpha,
    Occlusion,
    Emissive,
    Metallic,
    Roughness,
    BaseColor,
    Clearcoat,
    Sheen,
    Transmission,
}

impl DebugChannel {
    pub const ALL: [DebugChannel; 16] = [
        DebugChannel::None,
        DebugChannel::UvCoords0,
        DebugChannel::NormalTexture,
        DebugChannel::GeometryNormal,
        DebugChannel::Tangent,
        DebugChannel::Bitangent,
        DebugChannel::WorldSpaceNormal,
        DebugChannel::Alpha,
        DebugChannel::Occlusion,
        DebugChannel::Emissive,
        DebugChannel::Metallic,
        DebugChannel::Roughness,
        DebugChannel::BaseColor,
        DebugChannel::Clearcoat,
        DebugChannel::Sheen,
        DebugChannel::Transmission,
    ];
}

/// Flat per-frame render configuration. Fields are independent.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderingParameters {
    pub tone_map: ToneMap,
    pub debug_output: DebugChannel,
    pub skinning: bool,
    pub morphing: bool,
    pub clearcoat: bool,
    pub sheen: bool,
    pub transmission: bool,
    pub use_ibl: bool,
    pub render_environment_map: bool,
    pub blur_environment_map: bool,
    pub use_punctual: bool,
    pub environment_background: bool,
    /// Degrees around the vertical axis.
    pub environment_rotation: f32,
    pub exposure: f32,
    pub clear_color: [f32; 4],
}

impl Default for RenderingParameters {
    fn default() -> Self {
        Self {
            tone_map: ToneMap::default(),
            debug_output: DebugChannel::default(),
            skinning: true,
            morphing: true,
            clearcoat: true,
            sheen: true,
            transmission: true,
            use_ibl: true,
            render_environment_map: true,
            blur_environment_map: true,
            use_punctual: true,
            environment_background: true,
            environment_rotation: 90.0,
            exposure: 1.0,
            clear_color: [0.2, 0.2, 0.2, 1.0],
        }
    }
}

/// Pausable clock sampled by animation playback.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnimationTimer {
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
}

impl AnimationTimer {
    /// Restart from zero. A paused timer stays paused at zero.
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        if self.paused_at.is_some() {
            self.paused_at = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn unpause(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            if let Some(started_at) = self.started_at.as_mut() {
                *started_at += now.saturating_duration_since(paused_at);
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let Some(started_at) = self.started_at else {
            return Duration::ZERO;
        };
        self.paused_at
            .unwrap_or(now)
            .saturating_duration_since(started_at)
    }
}

/// The record the renderer reads every frame. Owned by the viewer for the process lifetime.
#[derive(Debug, Clone)]
pub struct RenderState {
    pub asset: Option<GltfAsset>,
    pub scene_index: usize,
    pub camera_index: Option<usize>,
    pub user_camera: UserCamera,
    pub animation_indices: Vec<usize>,
    pub animation_timer: AnimationTimer,
    pub environment: Option<Environment>,
    pub rendering_parameters: RenderingParameters,
    pub variant: Option<String>,
}

impl RenderState {
    pub fn new(user_camera: UserCamera) -> Self {
        Self {
            asset: None,
            scene_index: 0,
            camera_index: None,
            user_camera,
            animation_indices: Vec::new(),
            animation_timer: AnimationTimer::default(),
            environment: None,
            rendering_parameters: RenderingParameters::default(),
            variant: None,
        }
    }

    pub fn asset(&self) -> Result<&GltfAsset, SelectionError> {
        self.asset.as_ref().ok_or(SelectionError::NoAsset)
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new(UserCamera::default())
    }
}
