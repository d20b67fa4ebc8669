//! Controller state aggregator
//!
//! [`StreamInput`] owns one snapshot per producer and folds them into the
//! state that is sent to the console:
//!
//! ```text
//! sensor ─┐
//! key ────┼─► merge ─► rotation ─► analog trigger priority ─► merge(touch) ─► listener
//! motion ─┘
//! ```
//!
//! Every mutation recomputes the aggregate and hands it to the registered
//! [`ControllerStateListener`]. The aggregator does no locking; callers must
//! serialize access (see [`crate::controller::pump`]).

use super::keymap::{KeyAction, KeyEvent, KeyMap, KeyTarget, TriggerKey};
use super::motion::MotionEvent;
use super::sensor::{SensorListener, SensorSample};
use super::state::{ControllerState, Rotation};
use crate::config::InputConfig;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Receives every recomputed aggregate
pub trait ControllerStateListener {
    fn on_state_changed(&mut self, state: &ControllerState);
}

impl<F> ControllerStateListener for F
where
    F: FnMut(&ControllerState),
{
    fn on_state_changed(&mut self, state: &ControllerState) {
        self(state)
    }
}

/// Current display rotation of the host device
pub trait RotationSource {
    fn rotation(&self) -> Rotation;
}

impl RotationSource for Rotation {
    fn rotation(&self) -> Rotation {
        *self
    }
}

impl RotationSource for watch::Receiver<Rotation> {
    fn rotation(&self) -> Rotation {
        *self.borrow()
    }
}

pub struct StreamInput<L, R> {
    // each snapshot is written by exactly one producer
    sensor_state: ControllerState,
    key_state: ControllerState,
    motion_state: ControllerState,
    touch_state: ControllerState,

    key_map: KeyMap,
    rotation: R,
    listener: Option<L>,
}

impl<L, R> StreamInput<L, R>
where
    L: ControllerStateListener,
    R: RotationSource,
{
    /// Settings are read once here and not reloaded for the rest of the
    /// session.
    pub fn new(config: &InputConfig, rotation: R) -> Self {
        debug!("Creating stream input with {:?}", config);
        Self {
            sensor_state: ControllerState::default(),
            key_state: ControllerState::default(),
            motion_state: ControllerState::default(),
            touch_state: ControllerState::default(),
            key_map: KeyMap::new(config.swap_cross_moon, config.touchpad_key),
            rotation,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: L) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn set_listener(&mut self, listener: L) {
        self.listener = Some(listener);
    }

    pub fn take_listener(&mut self) -> Option<L> {
        self.listener.take()
    }

    /// Merged state of every producer
    pub fn controller_state(&self) -> ControllerState {
        let mut state = &(&self.sensor_state | &self.key_state) | &self.motion_state;

        state.compensate_rotation(self.rotation.rotation());

        // An analog reading beats the saturated value of a digital press.
        // Some pads send the key before the axis reaches full travel.
        if self.motion_state.l2_state > 0 {
            state.l2_state = self.motion_state.l2_state;
        }
        if self.motion_state.r2_state > 0 {
            state.r2_state = self.motion_state.r2_state;
        }

        &state | &self.touch_state
    }

    pub fn touch_state(&self) -> &ControllerState {
        &self.touch_state
    }

    /// Replaces the on-screen touch snapshot
    pub fn set_touch_state(&mut self, state: ControllerState) {
        self.touch_state = state;
        self.state_updated();
    }

    /// Applies a key event. Returns whether the key was consumed.
    pub fn dispatch_key_event(&mut self, event: KeyEvent) -> bool {
        let pressed = match event.action {
            KeyAction::Down => true,
            KeyAction::Up => false,
            KeyAction::Other => return false,
        };

        let Some(target) = self.key_map.lookup(event.code) else {
            trace!("Unmapped key code {}", event.code);
            return false;
        };

        match target {
            KeyTarget::Trigger(trigger) => {
                let value = if pressed { u8::MAX } else { 0 };
                match trigger {
                    TriggerKey::L2 => self.key_state.l2_state = value,
                    TriggerKey::R2 => self.key_state.r2_state = value,
                }
            }
            KeyTarget::Button(button) => {
                self.key_state.buttons.set(button, pressed);
            }
        }

        debug!("Key {} {:?} -> {:?}", event.code, event.action, target);
        self.state_updated();
        true
    }

    /// Applies a generic motion event. Only joystick sources are consumed.
    pub fn on_generic_motion_event(&mut self, event: &MotionEvent) -> bool {
        if !event.is_joystick() {
            return false;
        }
        event.apply_to(&mut self.motion_state);
        trace!("Motion event -> {:?}", self.motion_state);
        self.state_updated();
        true
    }

    fn state_updated(&mut self) {
        if self.listener.is_none() {
            return;
        }
        let state = self.controller_state();
        if let Some(listener) = self.listener.as_mut() {
            listener.on_state_changed(&state);
        }
    }
}

impl<L, R> SensorListener for StreamInput<L, R>
where
    L: ControllerStateListener,
    R: RotationSource,
{
    fn on_sensor_sample(&mut self, sample: SensorSample) {
        if sample.apply_to(&mut self.sensor_state) {
            self.state_updated();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::keymap::{
        KEYCODE_BUTTON_A, KEYCODE_BUTTON_L1, KEYCODE_BUTTON_L2, KEYCODE_BUTTON_R2,
    };
    use crate::controller::state::Buttons;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Recorded = Rc<RefCell<Vec<ControllerState>>>;
    type TestInput = StreamInput<Box<dyn FnMut(&ControllerState)>, Rotation>;

    fn input_with(config: InputConfig, rotation: Rotation) -> (TestInput, Recorded) {
        let recorded: Recorded = Rc::new(RefCell::new(Vec::new()));
        let sink = recorded.clone();
        let listener: Box<dyn FnMut(&ControllerState)> =
            Box::new(move |state: &ControllerState| sink.borrow_mut().push(state.clone()));
        let input = StreamInput::new(&config, rotation).with_listener(listener);
        (input, recorded)
    }

    fn input() -> (TestInput, Recorded) {
        input_with(InputConfig::default(), Rotation::Deg0)
    }

    #[test]
    fn key_down_sets_cross_without_swap() {
        let (mut input, recorded) = input();
        assert!(input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_A)));
        assert_eq!(input.key_state.buttons, Buttons::CROSS);
        assert_eq!(recorded.borrow().last().unwrap().buttons, Buttons::CROSS);
    }

    #[test]
    fn key_down_sets_moon_with_swap() {
        let config = InputConfig {
            swap_cross_moon: true,
            ..Default::default()
        };
        let (mut input, _) = input_with(config, Rotation::Deg0);
        input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_L1));
        input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_A));
        assert_eq!(input.key_state.buttons, Buttons::MOON | Buttons::L1);
    }

    #[test]
    fn key_up_clears_only_its_bit() {
        let (mut input, _) = input();
        input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_A));
        input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_L1));
        input.dispatch_key_event(KeyEvent::up(KEYCODE_BUTTON_A));
        assert_eq!(input.controller_state().buttons, Buttons::L1);
    }

    #[test]
    fn unmapped_keys_are_not_consumed() {
        let (mut input, recorded) = input();
        assert!(!input.dispatch_key_event(KeyEvent::down(4242)));
        assert!(!input.dispatch_key_event(KeyEvent {
            code: KEYCODE_BUTTON_A,
            action: KeyAction::Other,
        }));
        assert!(recorded.borrow().is_empty());
    }

    #[test]
    fn trigger_keys_drive_full_scale() {
        let (mut input, _) = input();
        input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_L2));
        input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_R2));
        let state = input.controller_state();
        assert_eq!((state.l2_state, state.r2_state), (255, 255));
        assert_eq!(state.buttons, Buttons::empty());

        input.dispatch_key_event(KeyEvent::up(KEYCODE_BUTTON_L2));
        assert_eq!(input.controller_state().l2_state, 0);
    }

    #[test]
    fn analog_trigger_overrides_digital_press() {
        let (mut input, _) = input();
        input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_L2));
        input.on_generic_motion_event(&MotionEvent {
            ltrigger: 0.5,
            ..MotionEvent::joystick()
        });

        let state = input.controller_state();
        assert_eq!(state.l2_state, 127);
        // no analog reading on r2, so the max rule still applies
        assert_eq!(state.r2_state, 0);
    }

    #[test]
    fn left_stick_full_deflection() {
        let (mut input, recorded) = input();
        assert!(input.on_generic_motion_event(&MotionEvent {
            x: 1.0,
            ..MotionEvent::joystick()
        }));
        assert_eq!(input.controller_state().left_x, 32767);
        assert_eq!(recorded.borrow().len(), 1);
    }

    #[test]
    fn non_joystick_motion_is_ignored() {
        let (mut input, recorded) = input();
        let event = MotionEvent {
            source: crate::controller::motion::SOURCE_TOUCHSCREEN,
            x: 1.0,
            ..Default::default()
        };
        assert!(!input.on_generic_motion_event(&event));
        assert_eq!(input.controller_state().left_x, 0);
        assert!(recorded.borrow().is_empty());
    }

    #[test]
    fn hat_keeps_key_buttons() {
        let (mut input, _) = input();
        input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_A));
        input.on_generic_motion_event(&MotionEvent {
            hat_x: 0.6,
            ..MotionEvent::joystick()
        });
        assert_eq!(
            input.controller_state().buttons,
            Buttons::CROSS | Buttons::DPAD_RIGHT
        );

        input.on_generic_motion_event(&MotionEvent {
            hat_x: -0.6,
            ..MotionEvent::joystick()
        });
        assert_eq!(
            input.controller_state().buttons,
            Buttons::CROSS | Buttons::DPAD_LEFT
        );
    }

    #[test]
    fn sensor_fields_are_rotated_at_90_degrees() {
        let (mut input, recorded) = input_with(InputConfig::default(), Rotation::Deg90);
        input.on_sensor_sample(SensorSample::Gyroscope([3.0, 1.0, 2.0]));

        let state = input.controller_state();
        assert_eq!((state.gyro_x, state.gyro_y, state.gyro_z), (-1.0, 2.0, -3.0));
        // the producer snapshot itself stays in device frame
        assert_eq!(input.sensor_state.gyro_x, 1.0);
        assert_eq!(recorded.borrow().len(), 1);
    }

    #[test]
    fn sensor_fields_are_not_rotated_at_270_degrees() {
        let (mut input, _) = input_with(InputConfig::default(), Rotation::Deg270);
        input.on_sensor_sample(SensorSample::Gyroscope([3.0, 1.0, 2.0]));
        let state = input.controller_state();
        assert_eq!((state.gyro_x, state.gyro_z), (1.0, 3.0));
    }

    #[test]
    fn rotation_follows_watch_channel() {
        let (tx, rx) = watch::channel(Rotation::Deg0);
        let mut input: StreamInput<fn(&ControllerState), _> =
            StreamInput::new(&InputConfig::default(), rx);
        input.on_sensor_sample(SensorSample::Gyroscope([0.0, 1.0, 0.0]));
        assert_eq!(input.controller_state().gyro_x, 1.0);

        tx.send(Rotation::Deg90).unwrap();
        assert_eq!(input.controller_state().gyro_x, -1.0);
    }

    #[test]
    fn touch_snapshot_is_merged_last() {
        let (mut input, recorded) = input();
        let mut touch = ControllerState::default();
        touch.start_touch(960, 471);
        touch.buttons = Buttons::TOUCHPAD;
        input.set_touch_state(touch.clone());

        let state = input.controller_state();
        assert_eq!(state.touches[0], touch.touches[0]);
        assert!(state.buttons.contains(Buttons::TOUCHPAD));
        assert_eq!(recorded.borrow().len(), 1);
    }

    #[test]
    fn every_mutation_notifies_once() {
        let (mut input, recorded) = input();
        input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_A));
        input.on_generic_motion_event(&MotionEvent::joystick());
        input.on_sensor_sample(SensorSample::Accelerometer([0.0, 9.8, 0.0]));
        input.set_touch_state(ControllerState::default());
        assert_eq!(recorded.borrow().len(), 4);
        assert_eq!(recorded.borrow()[3], input.controller_state());
    }

    #[test]
    fn without_listener_nothing_panics() {
        let mut input: StreamInput<fn(&ControllerState), Rotation> =
            StreamInput::new(&InputConfig::default(), Rotation::Deg0);
        assert!(input.dispatch_key_event(KeyEvent::down(KEYCODE_BUTTON_A)));
        assert_eq!(input.controller_state().buttons, Buttons::CROSS);
    }
}
