use super::state::RenderState;

/// Already-decoded gesture deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Rotate { delta_x: f32, delta_y: f32 },
    Pan { delta_x: f32, delta_y: f32 },
    Zoom { delta: f32 },
}

/// Applies gestures to the free camera while no fixed camera is active.
#[derive(Debug, Default)]
pub struct InputRouter {
    dropped: u64,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the gesture moved the free camera.
    pub fn route(&mut self, state: &mut RenderState, gesture: Gesture) -> bool {
        if state.camera_index.is_some() {
            self.dropped += 1;
            log::trace!("fixed camera active, dropped {} gesture(s)", self.dropped);
            return false;
        }
        let camera = &mut state.user_camera;
        match gesture {
            Gesture::Rotate { delta_x, delta_y } => camera.orbit(delta_x, delta_y),
            Gesture::Pan { delta_x, delta_y } => camera.pan(delta_x, delta_y),
            Gesture::Zoom { delta } => camera.zoom_by(delta),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_camera_swallows_gestures() {
        let mut router = InputRouter::new();
        let mut state = RenderState::default();
        state.camera_index = Some(0);
        let before = state.user_camera;

        let gestures = [
            Gesture::Rotate {
                delta_x: 40.0,
                delta_y: -15.0,
            },
            Gesture::Pan {
                delta_x: 3.0,
                delta_y: 4.0,
            },
            Gesture::Zoom { delta: 2.0 },
        ];
        for gesture in gestures {
            assert!(!router.route(&mut state, gesture));
        }
        assert_eq!(state.user_camera, before);
        assert_eq!(router.dropped, 3);
    }

    #[test]
    fn free_camera_follows_rotate() {
        let mut router = InputRouter::new();
        let mut state = RenderState::default();
        let yaw = state.user_camera.yaw;
        assert!(router.route(
            &mut state,
            Gesture::Rotate {
                delta_x: 90.0,
                delta_y: 0.0
            }
        ));
        assert_ne!(state.user_camera.yaw, yaw);
    }
}
