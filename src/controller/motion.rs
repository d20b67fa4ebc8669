//! Generic joystick motion events and their mapping onto a controller state

use super::state::{Buttons, ControllerState};

/// Input source class bit set by joystick devices
pub const SOURCE_CLASS_JOYSTICK: u32 = 0x0000_0010;
pub const SOURCE_JOYSTICK: u32 = 0x0100_0000 | SOURCE_CLASS_JOYSTICK;
pub const SOURCE_GAMEPAD: u32 = 0x0000_0401;
pub const SOURCE_TOUCHSCREEN: u32 = 0x0000_1002;

const HAT_THRESHOLD: f32 = 0.5;

/// Snapshot of every joystick axis carried by one motion event.
///
/// Sticks are normalized to `[-1, 1]` with positive Y pointing down,
/// triggers to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MotionEvent {
    pub source: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rz: f32,
    pub ltrigger: f32,
    pub rtrigger: f32,
    pub hat_x: f32,
    pub hat_y: f32,
}

impl MotionEvent {
    pub fn joystick() -> Self {
        Self {
            source: SOURCE_JOYSTICK,
            ..Default::default()
        }
    }

    pub fn is_joystick(&self) -> bool {
        self.source & SOURCE_CLASS_JOYSTICK == SOURCE_CLASS_JOYSTICK
    }

    /// Writes the axes into `state`, replacing the d-pad bits and keeping
    /// every other button
    pub fn apply_to(&self, state: &mut ControllerState) {
        state.left_x = signed_axis(self.x);
        state.left_y = signed_axis(self.y);
        state.right_x = signed_axis(self.z);
        state.right_y = signed_axis(self.rz);
        state.l2_state = unsigned_axis(self.ltrigger);
        state.r2_state = unsigned_axis(self.rtrigger);
        state.buttons = (state.buttons - Buttons::DPAD) | self.dpad_buttons();
    }

    pub fn dpad_buttons(&self) -> Buttons {
        let mut dpad = Buttons::empty();
        if self.hat_x > HAT_THRESHOLD {
            dpad |= Buttons::DPAD_RIGHT;
        }
        if self.hat_x < -HAT_THRESHOLD {
            dpad |= Buttons::DPAD_LEFT;
        }
        if self.hat_y > HAT_THRESHOLD {
            dpad |= Buttons::DPAD_DOWN;
        }
        if self.hat_y < -HAT_THRESHOLD {
            dpad |= Buttons::DPAD_UP;
        }
        dpad
    }
}

/// `[-1, 1]` to the full `i16` range. Out of range input wraps like a
/// 16-bit truncation.
pub fn signed_axis(value: f32) -> i16 {
    (value * i16::MAX as f32) as i32 as i16
}

/// `[0, 1]` to `u8`. Negative input saturates to zero.
pub fn unsigned_axis(value: f32) -> u8 {
    (value * u8::MAX as f32) as u32 as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_deflection_scales_to_extremes() {
        assert_eq!(signed_axis(1.0), 32767);
        assert_eq!(signed_axis(-1.0), -32767);
        assert_eq!(signed_axis(0.0), 0);
        assert_eq!(unsigned_axis(1.0), 255);
        assert_eq!(unsigned_axis(0.0), 0);
        assert_eq!(unsigned_axis(-0.3), 0);
    }

    #[test]
    fn axes_land_in_their_fields() {
        let event = MotionEvent {
            x: 1.0,
            y: -0.5,
            z: 0.25,
            rz: -1.0,
            ltrigger: 0.5,
            rtrigger: 1.0,
            ..MotionEvent::joystick()
        };
        let mut state = ControllerState::default();
        event.apply_to(&mut state);

        assert_eq!(state.left_x, 32767);
        assert_eq!(state.left_y, -16383);
        assert_eq!(state.right_x, 8191);
        assert_eq!(state.right_y, -32767);
        assert_eq!(state.l2_state, 127);
        assert_eq!(state.r2_state, 255);
    }

    #[test]
    fn hat_replaces_dpad_bits_only() {
        let mut state = ControllerState::default();
        state.buttons = Buttons::DPAD_LEFT | Buttons::DPAD_UP | Buttons::CROSS;

        let event = MotionEvent {
            hat_x: 0.6,
            ..MotionEvent::joystick()
        };
        event.apply_to(&mut state);

        assert_eq!(state.buttons, Buttons::DPAD_RIGHT | Buttons::CROSS);
    }

    #[test]
    fn hat_threshold_is_exclusive() {
        let event = MotionEvent {
            hat_x: 0.5,
            hat_y: -0.5,
            ..MotionEvent::joystick()
        };
        assert_eq!(event.dpad_buttons(), Buttons::empty());

        let event = MotionEvent {
            hat_x: -0.9,
            hat_y: 0.9,
            ..MotionEvent::joystick()
        };
        assert_eq!(event.dpad_buttons(), Buttons::DPAD_LEFT | Buttons::DPAD_DOWN);
    }

    #[test]
    fn source_class_check() {
        assert!(MotionEvent::joystick().is_joystick());
        let touch = MotionEvent {
            source: SOURCE_TOUCHSCREEN,
            ..Default::default()
        };
        assert!(!touch.is_joystick());
        let pad = MotionEvent {
            source: SOURCE_GAMEPAD,
            ..Default::default()
        };
        assert!(!pad.is_joystick());
    }
}
