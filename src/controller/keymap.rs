//! Key code to button mapping
//!
//! Key codes follow the Android `KeyEvent` numbering because that is what the
//! host input stack reports. The gamepad collector translates physical buttons
//! into the same codes.

use super::state::Buttons;
use tracing::debug;

pub type KeyCode = i32;

pub const KEYCODE_BUTTON_A: KeyCode = 96;
pub const KEYCODE_BUTTON_B: KeyCode = 97;
pub const KEYCODE_BUTTON_C: KeyCode = 98;
pub const KEYCODE_BUTTON_X: KeyCode = 99;
pub const KEYCODE_BUTTON_Y: KeyCode = 100;
pub const KEYCODE_BUTTON_Z: KeyCode = 101;
pub const KEYCODE_BUTTON_L1: KeyCode = 102;
pub const KEYCODE_BUTTON_R1: KeyCode = 103;
pub const KEYCODE_BUTTON_L2: KeyCode = 104;
pub const KEYCODE_BUTTON_R2: KeyCode = 105;
pub const KEYCODE_BUTTON_THUMBL: KeyCode = 106;
pub const KEYCODE_BUTTON_THUMBR: KeyCode = 107;
pub const KEYCODE_BUTTON_START: KeyCode = 108;
pub const KEYCODE_BUTTON_SELECT: KeyCode = 109;
pub const KEYCODE_BUTTON_MODE: KeyCode = 110;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down,
    Up,
    /// Repeats and anything else the host reports
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub action: KeyAction,
}

impl KeyEvent {
    pub fn down(code: KeyCode) -> Self {
        Self {
            code,
            action: KeyAction::Down,
        }
    }

    pub fn up(code: KeyCode) -> Self {
        Self {
            code,
            action: KeyAction::Up,
        }
    }
}

/// Which analog trigger a digital key drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKey {
    L2,
    R2,
}

/// Result of looking up a key code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTarget {
    Button(Buttons),
    Trigger(TriggerKey),
}

/// Fixed key table with the two configurable overlays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyMap {
    swap_cross_moon: bool,
    touchpad_key: Option<KeyCode>,
}

impl KeyMap {
    pub fn new(swap_cross_moon: bool, touchpad_key: Option<KeyCode>) -> Self {
        debug!(
            "Key map: swap_cross_moon={}, touchpad_key={:?}",
            swap_cross_moon, touchpad_key
        );
        Self {
            swap_cross_moon,
            touchpad_key,
        }
    }

    pub fn lookup(&self, code: KeyCode) -> Option<KeyTarget> {
        match code {
            KEYCODE_BUTTON_L2 => return Some(KeyTarget::Trigger(TriggerKey::L2)),
            KEYCODE_BUTTON_R2 => return Some(KeyTarget::Trigger(TriggerKey::R2)),
            _ => {}
        }

        if self.touchpad_key == Some(code) {
            return Some(KeyTarget::Button(Buttons::TOUCHPAD));
        }

        let swap = self.swap_cross_moon;
        let button = match code {
            KEYCODE_BUTTON_A if swap => Buttons::MOON,
            KEYCODE_BUTTON_A => Buttons::CROSS,
            KEYCODE_BUTTON_B if swap => Buttons::CROSS,
            KEYCODE_BUTTON_B => Buttons::MOON,
            KEYCODE_BUTTON_X if swap => Buttons::PYRAMID,
            KEYCODE_BUTTON_X => Buttons::BOX,
            KEYCODE_BUTTON_Y if swap => Buttons::BOX,
            KEYCODE_BUTTON_Y => Buttons::PYRAMID,
            KEYCODE_BUTTON_L1 => Buttons::L1,
            KEYCODE_BUTTON_R1 => Buttons::R1,
            KEYCODE_BUTTON_THUMBL => Buttons::L3,
            KEYCODE_BUTTON_THUMBR => Buttons::R3,
            KEYCODE_BUTTON_SELECT => Buttons::SHARE,
            KEYCODE_BUTTON_START => Buttons::OPTIONS,
            KEYCODE_BUTTON_C | KEYCODE_BUTTON_MODE => Buttons::PS,
            // d-pad arrives as hat axes on motion events
            _ => return None,
        };
        Some(KeyTarget::Button(button))
    }
}
