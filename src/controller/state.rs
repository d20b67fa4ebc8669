//! Controller state snapshot shared by every input producer
//!
//! A [`ControllerState`] is the fixed-layout view of a virtual gamepad at one
//! instant. Producers each own one snapshot; the aggregator folds them together
//! with the `|` operator.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Number of simultaneous touch contacts the remote peer tracks
pub const CONTROLLER_TOUCHES_MAX: usize = 2;

/// Touchpad resolution in remote coordinates
pub const TOUCHPAD_WIDTH: u16 = 1920;
pub const TOUCHPAD_HEIGHT: u16 = 942;

/// Marker id of a free touch slot
pub const TOUCH_ID_NONE: i8 = -1;

const TOUCH_ID_MASK: u8 = 0x7f;

bitflags! {
    /// Button flags of the virtual gamepad
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Buttons: u32 {
        const CROSS      = 1 << 0;
        const MOON       = 1 << 1;
        const BOX        = 1 << 2;
        const PYRAMID    = 1 << 3;
        const DPAD_LEFT  = 1 << 4;
        const DPAD_RIGHT = 1 << 5;
        const DPAD_UP    = 1 << 6;
        const DPAD_DOWN  = 1 << 7;
        const L1         = 1 << 8;
        const R1         = 1 << 9;
        const L3         = 1 << 10;
        const R3         = 1 << 11;
        const OPTIONS    = 1 << 12;
        const SHARE      = 1 << 13;
        const TOUCHPAD   = 1 << 14;
        const PS         = 1 << 15;

        const DPAD = Self::DPAD_LEFT.bits()
            | Self::DPAD_RIGHT.bits()
            | Self::DPAD_UP.bits()
            | Self::DPAD_DOWN.bits();
    }
}

/// Display rotation of the host device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

/// One touch contact slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerTouch {
    pub x: u16,
    pub y: u16,
    /// `TOUCH_ID_NONE` when the slot is free
    pub id: i8,
}

impl Default for ControllerTouch {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            id: TOUCH_ID_NONE,
        }
    }
}

impl ControllerTouch {
    pub fn is_active(&self) -> bool {
        self.id >= 0
    }

    fn matches(&self, id: u8) -> bool {
        self.is_active() && self.id == id as i8
    }
}

/// Snapshot of the virtual gamepad sent to the remote peer
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub buttons: Buttons,
    pub l2_state: u8,
    pub r2_state: u8,
    pub left_x: i16,
    pub left_y: i16,
    pub right_x: i16,
    pub right_y: i16,
    touch_id_next: u8,
    pub touches: [ControllerTouch; CONTROLLER_TOUCHES_MAX],
    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,
    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
    pub orient_x: f32,
    pub orient_y: f32,
    pub orient_z: f32,
    pub orient_w: f32,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            buttons: Buttons::empty(),
            l2_state: 0,
            r2_state: 0,
            left_x: 0,
            left_y: 0,
            right_x: 0,
            right_y: 0,
            touch_id_next: 0,
            touches: [ControllerTouch::default(); CONTROLLER_TOUCHES_MAX],
            gyro_x: 0.0,
            gyro_y: 0.0,
            gyro_z: 0.0,
            // gravity points down the y axis while the device rests
            accel_x: 0.0,
            accel_y: 1.0,
            accel_z: 0.0,
            orient_x: 0.0,
            orient_y: 0.0,
            orient_z: 0.0,
            orient_w: 1.0,
        }
    }
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next call to [`start_touch`](Self::start_touch) will hand out
    pub fn touch_id_next(&self) -> u8 {
        self.touch_id_next
    }

    /// Starts a touch contact in the first free slot.
    ///
    /// Returns the allocated id, or `None` when both slots are occupied; the
    /// contact is dropped in that case and nothing is mutated.
    ///
    /// Ids come from a 7-bit rolling counter. After 128 allocations an id may
    /// be handed out again while a stale message for the old contact is still
    /// in flight; the counter does not guard against that.
    pub fn start_touch(&mut self, x: u16, y: u16) -> Option<u8> {
        let next = self.touch_id_next;
        let touch = self.touches.iter_mut().find(|t| !t.is_active())?;
        touch.id = next as i8;
        touch.x = x;
        touch.y = y;
        self.touch_id_next = next.wrapping_add(1) & TOUCH_ID_MASK;
        Some(next)
    }

    /// Frees the slot holding `id`. Unknown ids are ignored.
    pub fn stop_touch(&mut self, id: u8) {
        if let Some(touch) = self.touches.iter_mut().find(|t| t.matches(id)) {
            touch.id = TOUCH_ID_NONE;
        }
    }

    /// Moves the contact `id`, returning whether its position changed
    pub fn set_touch_pos(&mut self, id: u8, x: u16, y: u16) -> bool {
        match self.touches.iter_mut().find(|t| t.matches(id)) {
            Some(touch) => {
                let changed = touch.x != x || touch.y != y;
                touch.x = x;
                touch.y = y;
                changed
            }
            None => false,
        }
    }

    /// Flips the motion axes that are mirrored when the display is rotated
    /// by 90 degrees. Every other rotation is left untouched.
    pub fn compensate_rotation(&mut self, rotation: Rotation) {
        if rotation != Rotation::Deg90 {
            return;
        }
        self.accel_x = -self.accel_x;
        self.accel_z = -self.accel_z;
        self.gyro_x = -self.gyro_x;
        self.gyro_z = -self.gyro_z;
        self.orient_x = -self.orient_x;
        self.orient_z = -self.orient_z;
    }
}

fn max_abs(a: i16, b: i16) -> i16 {
    if b.unsigned_abs() > a.unsigned_abs() {
        b
    } else {
        a
    }
}

impl BitOr for &ControllerState {
    type Output = ControllerState;

    /// Merges two snapshots.
    ///
    /// Buttons are OR-ed, triggers take the maximum, stick axes take the value
    /// further from rest (ties keep `self`). Active touches of `self` shadow
    /// the same slot of `rhs`. Motion sensor fields always come from `self`.
    fn bitor(self, rhs: &ControllerState) -> ControllerState {
        let mut touches = self.touches;
        for (slot, other) in touches.iter_mut().zip(rhs.touches.iter()) {
            if !slot.is_active() {
                *slot = *other;
            }
        }

        ControllerState {
            buttons: self.buttons | rhs.buttons,
            l2_state: self.l2_state.max(rhs.l2_state),
            r2_state: self.r2_state.max(rhs.r2_state),
            left_x: max_abs(self.left_x, rhs.left_x),
            left_y: max_abs(self.left_y, rhs.left_y),
            right_x: max_abs(self.right_x, rhs.right_x),
            right_y: max_abs(self.right_y, rhs.right_y),
            touch_id_next: 0,
            touches,
            gyro_x: self.gyro_x,
            gyro_y: self.gyro_y,
            gyro_z: self.gyro_z,
            accel_x: self.accel_x,
            accel_y: self.accel_y,
            accel_z: self.accel_z,
            orient_x: self.orient_x,
            orient_y: self.orient_y,
            orient_z: self.orient_z,
            orient_w: self.orient_w,
        }
    }
}

impl BitOr for ControllerState {
    type Output = ControllerState;

    fn bitor(self, rhs: ControllerState) -> ControllerState {
        &self | &rhs
    }
}
