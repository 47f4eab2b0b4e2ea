use crate::ui::UiAction;
use crate::viewer::Gesture;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};
use winit::keyboard::{KeyCode, PhysicalKey};

const PIXELS_PER_WHEEL_LINE: f32 = 50.0;

/// Key presses the host handles itself versus those forwarded to the UI model.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyCommand {
    Ui(UiAction),
    OpenModelDialog,
    OpenEnvironmentDialog,
    Quit,
}

pub fn key_command(key: PhysicalKey, state: ElementState) -> Option<KeyCommand> {
    if state != ElementState::Pressed {
        return None;
    }
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    let action = match code {
        KeyCode::Escape => return Some(KeyCommand::Quit),
        KeyCode::KeyO => return Some(KeyCommand::OpenModelDialog),
        KeyCode::KeyH => return Some(KeyCommand::OpenEnvironmentDialog),
        KeyCode::KeyN => UiAction::NextEnvironmentPreset,
        KeyCode::KeyS => UiAction::NextScene,
        KeyCode::KeyC => UiAction::CycleCamera,
        KeyCode::KeyV => UiAction::NextVariant,
        KeyCode::KeyT => UiAction::NextToneMap,
        KeyCode::KeyD => UiAction::NextDebugChannel,
        KeyCode::KeyI => UiAction::ToggleIbl,
        KeyCode::KeyL => UiAction::TogglePunctual,
        KeyCode::KeyB => UiAction::ToggleBackground,
        KeyCode::KeyR => UiAction::RotateEnvironment,
        KeyCode::Equal | KeyCode::NumpadAdd => UiAction::ExposureUp,
        KeyCode::Minus | KeyCode::NumpadSubtract => UiAction::ExposureDown,
        KeyCode::Space => UiAction::TogglePlayback,
        KeyCode::KeyP => UiAction::Capture,
        KeyCode::KeyE => UiAction::ExportCamera,
        other => UiAction::ToggleAnimation(digit_index(other)?),
    };
    Some(KeyCommand::Ui(action))
}

fn digit_index(code: KeyCode) -> Option<usize> {
    let index = match code {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        KeyCode::Digit5 => 4,
        KeyCode::Digit6 => 5,
        KeyCode::Digit7 => 6,
        KeyCode::Digit8 => 7,
        KeyCode::Digit9 => 8,
        _ => return None,
    };
    Some(index)
}

/// Mouse drag tracking. Left drag orbits, right or middle drag pans.
#[derive(Default, Debug, Clone, Copy)]
pub struct PointerState {
    position: Option<(f32, f32)>,
    orbiting: bool,
    panning: bool,
}

impl PointerState {
    pub fn handle_button(&mut self, button: MouseButton, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match button {
            MouseButton::Left => self.orbiting = pressed,
            MouseButton::Right | MouseButton::Middle => self.panning = pressed,
            _ => {}
        }
    }

    pub fn handle_move(&mut self, x: f32, y: f32) -> Option<Gesture> {
        let previous = self.position.replace((x, y));
        let (last_x, last_y) = previous?;
        let (delta_x, delta_y) = (x - last_x, y - last_y);
        if self.orbiting {
            Some(Gesture::Rotate { delta_x, delta_y })
        } else if self.panning {
            Some(Gesture::Pan { delta_x, delta_y })
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Wheel up zooms in.
pub fn wheel_gesture(delta: MouseScrollDelta) -> Gesture {
    let lines = match delta {
        MouseScrollDelta::LineDelta(_, y) => y,
        MouseScrollDelta::PixelDelta(position) => position.y as f32 / PIXELS_PER_WHEEL_LINE,
    };
    Gesture::Zoom { delta: -lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_toggle_animations() {
        assert_eq!(
            key_command(PhysicalKey::Code(KeyCode::Digit3), ElementState::Pressed),
            Some(KeyCommand::Ui(UiAction::ToggleAnimation(2)))
        );
        assert_eq!(
            key_command(PhysicalKey::Code(KeyCode::Digit3), ElementState::Released),
            None
        );
        assert_eq!(
            key_command(PhysicalKey::Code(KeyCode::KeyZ), ElementState::Pressed),
            None
        );
    }

    #[test]
    fn drag_produces_deltas_after_first_sample() {
        let mut pointer = PointerState::default();
        pointer.handle_button(MouseButton::Left, ElementState::Pressed);
        assert_eq!(pointer.handle_move(10.0, 10.0), None);
        assert_eq!(
            pointer.handle_move(14.0, 7.0),
            Some(Gesture::Rotate {
                delta_x: 4.0,
                delta_y: -3.0
            })
        );
        pointer.handle_button(MouseButton::Left, ElementState::Released);
        pointer.handle_button(MouseButton::Right, ElementState::Pressed);
        assert!(matches!(
            pointer.handle_move(15.0, 7.0),
            Some(Gesture::Pan { .. })
        ));
    }

    #[test]
    fn wheel_up_zooms_in() {
        assert_eq!(
            wheel_gesture(MouseScrollDelta::LineDelta(0.0, 2.0)),
            Gesture::Zoom { delta: -2.0 }
        );
    }
}
