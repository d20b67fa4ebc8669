//! On-screen touchpad surface
//!
//! Translates pointer contacts in view coordinates into touch slots on the
//! remote touchpad. Every change yields the snapshot to hand to
//! [`StreamInput::set_touch_state`](super::input::StreamInput::set_touch_state).

use super::motion::signed_axis;
use super::state::{ControllerState, TOUCHPAD_HEIGHT, TOUCHPAD_WIDTH};
use super::stick::StickSide;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Host pointer id as reported by the windowing system
pub type PointerId = i32;

#[derive(Debug, Clone)]
pub struct TouchSurface {
    state: ControllerState,
    // pointer id -> touch id
    pointers: HashMap<PointerId, u8>,
    view_width: f32,
    view_height: f32,
}

impl TouchSurface {
    pub fn new(view_width: f32, view_height: f32) -> Self {
        Self {
            state: ControllerState::default(),
            pointers: HashMap::new(),
            view_width,
            view_height,
        }
    }

    pub fn set_view_size(&mut self, view_width: f32, view_height: f32) {
        self.view_width = view_width;
        self.view_height = view_height;
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn active_pointers(&self) -> usize {
        self.pointers.len()
    }

    fn to_touchpad(&self, x: f32, y: f32) -> (u16, u16) {
        fn scale(value: f32, extent: f32, target: u16) -> u16 {
            if extent <= 0.0 {
                return 0;
            }
            let scaled = value / extent * target as f32;
            scaled.clamp(0.0, (target - 1) as f32) as u16
        }
        (
            scale(x, self.view_width, TOUCHPAD_WIDTH),
            scale(y, self.view_height, TOUCHPAD_HEIGHT),
        )
    }

    /// Starts a contact. Returns `None` if the pointer is already down or both
    /// touch slots are taken.
    pub fn pointer_down(&mut self, pointer: PointerId, x: f32, y: f32) -> Option<ControllerState> {
        if self.pointers.contains_key(&pointer) {
            warn!("Pointer {} is already down", pointer);
            return None;
        }
        let (tx, ty) = self.to_touchpad(x, y);
        let Some(id) = self.state.start_touch(tx, ty) else {
            debug!("No free touch slot for pointer {}", pointer);
            return None;
        };
        debug!("Pointer {} -> touch {} at ({}, {})", pointer, id, tx, ty);
        self.pointers.insert(pointer, id);
        Some(self.state.clone())
    }

    /// Moves a contact. Returns a snapshot only when the touchpad position
    /// actually changed.
    pub fn pointer_move(&mut self, pointer: PointerId, x: f32, y: f32) -> Option<ControllerState> {
        let id = *self.pointers.get(&pointer)?;
        let (tx, ty) = self.to_touchpad(x, y);
        if self.state.set_touch_pos(id, tx, ty) {
            Some(self.state.clone())
        } else {
            None
        }
    }

    pub fn pointer_up(&mut self, pointer: PointerId) -> Option<ControllerState> {
        let id = self.pointers.remove(&pointer)?;
        self.state.stop_touch(id);
        debug!("Pointer {} released touch {}", pointer, id);
        Some(self.state.clone())
    }

    /// Writes an on-screen stick deflection into the snapshot
    pub fn set_stick(&mut self, side: StickSide, (x, y): (f32, f32)) -> ControllerState {
        let (x, y) = (signed_axis(x), signed_axis(y));
        match side {
            StickSide::Left => {
                self.state.left_x = x;
                self.state.left_y = y;
            }
            StickSide::Right => {
                self.state.right_x = x;
                self.state.right_y = y;
            }
        }
        self.state.clone()
    }

    /// Releases every contact, e.g. when the gesture is cancelled
    pub fn cancel(&mut self) -> Option<ControllerState> {
        if self.pointers.is_empty() {
            return None;
        }
        for (_, id) in self.pointers.drain() {
            self.state.stop_touch(id);
        }
        Some(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_view_to_touchpad() {
        let mut surface = TouchSurface::new(960.0, 471.0);
        let state = surface.pointer_down(7, 480.0, 235.5).unwrap();
        assert_eq!(state.touches[0].id, 0);
        assert_eq!((state.touches[0].x, state.touches[0].y), (960, 471));
    }

    #[test]
    fn clamps_outside_view() {
        let mut surface = TouchSurface::new(100.0, 100.0);
        let state = surface.pointer_down(1, -20.0, 500.0).unwrap();
        assert_eq!(state.touches[0].x, 0);
        assert_eq!(state.touches[0].y, TOUCHPAD_HEIGHT - 1);
    }

    #[test]
    fn third_pointer_is_dropped() {
        let mut surface = TouchSurface::new(100.0, 100.0);
        assert!(surface.pointer_down(1, 10.0, 10.0).is_some());
        assert!(surface.pointer_down(2, 20.0, 20.0).is_some());
        assert!(surface.pointer_down(3, 30.0, 30.0).is_none());
        assert_eq!(surface.active_pointers(), 2);
        // the dropped pointer's moves and release are ignored
        assert!(surface.pointer_move(3, 40.0, 40.0).is_none());
        assert!(surface.pointer_up(3).is_none());
    }

    #[test]
    fn move_only_reports_changes() {
        let mut surface = TouchSurface::new(1920.0, 942.0);
        surface.pointer_down(1, 10.0, 10.0);
        assert!(surface.pointer_move(1, 10.2, 10.2).is_none());
        let state = surface.pointer_move(1, 50.0, 60.0).unwrap();
        assert_eq!((state.touches[0].x, state.touches[0].y), (50, 60));
    }

    #[test]
    fn release_frees_slot() {
        let mut surface = TouchSurface::new(100.0, 100.0);
        surface.pointer_down(1, 10.0, 10.0);
        let state = surface.pointer_up(1).unwrap();
        assert!(!state.touches[0].is_active());
        assert_eq!(surface.active_pointers(), 0);

        let state = surface.pointer_down(2, 10.0, 10.0).unwrap();
        assert_eq!(state.touches[0].id, 1);
    }

    #[test]
    fn cancel_releases_everything() {
        let mut surface = TouchSurface::new(100.0, 100.0);
        assert!(surface.cancel().is_none());
        surface.pointer_down(1, 10.0, 10.0);
        surface.pointer_down(2, 20.0, 20.0);
        let state = surface.cancel().unwrap();
        assert!(state.touches.iter().all(|t| !t.is_active()));
    }

    #[test]
    fn stick_deflection_lands_in_snapshot() {
        use crate::controller::stick::AnalogStick;

        let mut surface = TouchSurface::new(100.0, 100.0);
        let mut stick = AnalogStick::new(20.0);
        stick.update(Some((50.0, 50.0)));
        let value = stick.update(Some((90.0, 50.0)));

        let state = surface.set_stick(StickSide::Right, value);
        assert_eq!((state.right_x, state.right_y), (32767, 0));
        assert_eq!((state.left_x, state.left_y), (0, 0));

        let state = surface.set_stick(StickSide::Right, stick.update(None));
        assert_eq!(state.right_x, 0);
    }
}
