use super::state::{DebugChannel, RenderState, ToneMap};
use crate::scene::SelectionError;
use std::time::Instant;

/// A single user-settable option. Each maps onto one `RenderState` field.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionChange {
    ToneMap(ToneMap),
    DebugOutput(DebugChannel),
    Skinning(bool),
    Morphing(bool),
    Clearcoat(bool),
    Sheen(bool),
    Transmission(bool),
    UseIbl(bool),
    RenderEnvironmentMap(bool),
    BlurEnvironmentMap(bool),
    UsePunctual(bool),
    EnvironmentBackground(bool),
    /// Compass label, one of `+Z`, `-X`, `-Z`, `+X`.
    EnvironmentRotation(String),
    ClearColor([f32; 4]),
    /// Exposure compensation in stops.
    Exposure(f32),
    Variant(Option<String>),
    /// `None` selects the free camera.
    Camera(Option<usize>),
    AnimationPlaying(bool),
}

/// Degrees for an environment rotation label.
pub fn environment_rotation_degrees(label: &str) -> Option<f32> {
    match label {
        "+Z" => Some(90.0),
        "-X" => Some(180.0),
        "-Z" => Some(270.0),
        "+X" => Some(0.0),
        _ => None,
    }
}

impl OptionChange {
    pub fn apply(self, state: &mut RenderState, now: Instant) -> Result<(), SelectionError> {
        let params = &mut state.rendering_parameters;
        match self {
            OptionChange::ToneMap(tone_map) => params.tone_map = tone_map,
            OptionChange::DebugOutput(channel) => params.debug_output = channel,
            OptionChange::Skinning(enabled) => params.skinning = enabled,
            OptionChange::Morphing(enabled) => params.morphing = enabled,
            OptionChange::Clearcoat(enabled) => params.clearcoat = enabled,
            OptionChange::Sheen(enabled) => params.sheen = enabled,
            OptionChange::Transmission(enabled) => params.transmission = enabled,
            OptionChange::UseIbl(enabled) => params.use_ibl = enabled,
            OptionChange::RenderEnvironmentMap(enabled) => params.render_environment_map = enabled,
            OptionChange::BlurEnvironmentMap(enabled) => params.blur_environment_map = enabled,
            OptionChange::UsePunctual(enabled) => params.use_punctual = enabled,
            OptionChange::EnvironmentBackground(enabled) => params.environment_background = enabled,
            OptionChange::EnvironmentRotation(label) => {
                match environment_rotation_degrees(&label) {
                    Some(degrees) => params.environment_rotation = degrees,
                    None => log::debug!("ignoring environment rotation label {label:?}"),
                }
            }
            OptionChange::ClearColor(color) => params.clear_color = color,
            OptionChange::Exposure(stops) => params.exposure = stops.exp2(),
            OptionChange::Variant(variant) => state.variant = variant,
            OptionChange::Camera(camera) => {
                if let Some(index) = camera {
                    state.asset()?.check_camera(index)?;
                }
                state.camera_index = camera;
            }
            OptionChange::AnimationPlaying(true) => state.animation_timer.unpause(now),
            OptionChange::AnimationPlaying(false) => state.animation_timer.pause(now),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::fixtures::two_scene_asset;

    fn apply(state: &mut RenderState, change: OptionChange) -> Result<(), SelectionError> {
        change.apply(state, Instant::now())
    }

    #[test]
    fn rotation_labels_map_exactly() {
        let mut state = RenderState::default();
        for (label, degrees) in [("+Z", 90.0), ("-X", 180.0), ("-Z", 270.0), ("+X", 0.0)] {
            apply(&mut state, OptionChange::EnvironmentRotation(label.into())).unwrap();
            assert_eq!(state.rendering_parameters.environment_rotation, degrees);
        }
    }

    #[test]
    fn unknown_rotation_label_keeps_rotation() {
        let mut state = RenderState::default();
        apply(&mut state, OptionChange::EnvironmentRotation("-X".into())).unwrap();
        for label in ["", "+Y", "z", "+Z "] {
            apply(&mut state, OptionChange::EnvironmentRotation(label.into())).unwrap();
            assert_eq!(state.rendering_parameters.environment_rotation, 180.0);
        }
    }

    #[test]
    fn exposure_is_stored_linear() {
        let mut state = RenderState::default();
        for (stops, linear) in [(0.0, 1.0), (1.0, 2.0), (-2.0, 0.25), (3.5, 11.313708)] {
            apply(&mut state, OptionChange::Exposure(stops)).unwrap();
            assert!((state.rendering_parameters.exposure - linear).abs() < 1e-4);
        }
    }

    #[test]
    fn camera_selection_is_range_checked() {
        let mut state = RenderState::default();
        assert_eq!(
            apply(&mut state, OptionChange::Camera(Some(0))),
            Err(SelectionError::NoAsset)
        );

        state.asset = Some(two_scene_asset("a"));
        apply(&mut state, OptionChange::Camera(Some(0))).unwrap();
        assert_eq!(state.camera_index, Some(0));

        let err = apply(&mut state, OptionChange::Camera(Some(4))).unwrap_err();
        assert_eq!(err, SelectionError::Camera { index: 4, count: 1 });
        assert_eq!(state.camera_index, Some(0));

        apply(&mut state, OptionChange::Camera(None)).unwrap();
        assert_eq!(state.camera_index, None);
    }

    #[test]
    fn toggles_write_their_own_field_only() {
        let mut state = RenderState::default();
        let before = state.rendering_parameters.clone();
        apply(&mut state, OptionChange::UseIbl(false)).unwrap();
        assert!(!state.rendering_parameters.use_ibl);
        let mut expected = before;
        expected.use_ibl = false;
        assert_eq!(state.rendering_parameters, expected);
    }

    #[test]
    fn play_pause_drives_timer() {
        let mut state = RenderState::default();
        apply(&mut state, OptionChange::AnimationPlaying(false)).unwrap();
        assert!(state.animation_timer.is_paused());
        apply(&mut state, OptionChange::AnimationPlaying(true)).unwrap();
        assert!(!state.animation_timer.is_paused());
    }
}
