//! Gamepad collector - physical gamepad input via gilrs
//!
//! Polls gilrs on a blocking thread and turns its events into the same key
//! and joystick motion events the host input stack would deliver, then submits
//! them to the input pump.

use super::keymap::{
    KeyCode, KeyEvent, KEYCODE_BUTTON_A, KEYCODE_BUTTON_B, KEYCODE_BUTTON_C, KEYCODE_BUTTON_L1,
    KEYCODE_BUTTON_L2, KEYCODE_BUTTON_MODE, KEYCODE_BUTTON_R1, KEYCODE_BUTTON_R2,
    KEYCODE_BUTTON_SELECT, KEYCODE_BUTTON_START, KEYCODE_BUTTON_THUMBL, KEYCODE_BUTTON_THUMBR,
    KEYCODE_BUTTON_X, KEYCODE_BUTTON_Y, KEYCODE_BUTTON_Z,
};
use super::motion::MotionEvent;
use super::pump::{InputEvent, InputSender, PumpError};
use crate::config::CollectorConfig;
use chrono::Local;
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use statum::{machine, state};
use std::collections::BTreeSet;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),

    #[error("Failed to send event: {0}")]
    EventSendError(#[from] PumpError),
}

/// Keeps the full axis snapshot a joystick motion event carries and the
/// keys currently held
#[derive(Debug, Clone)]
pub struct GamepadTranslator {
    deadzone: f32,
    motion: MotionEvent,
    pressed: BTreeSet<KeyCode>,
}

impl GamepadTranslator {
    pub fn new(deadzone: f32) -> Self {
        Self {
            deadzone,
            motion: MotionEvent::joystick(),
            pressed: BTreeSet::new(),
        }
    }

    pub fn pressed_keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.pressed.iter().copied()
    }

    /// Key ups for every held key followed by a centered joystick
    pub fn release_all(&mut self) -> Vec<InputEvent> {
        let mut events: Vec<InputEvent> = std::mem::take(&mut self.pressed)
            .into_iter()
            .map(|code| InputEvent::Key(KeyEvent::up(code)))
            .collect();
        self.motion = MotionEvent::joystick();
        events.push(InputEvent::Motion(self.motion));
        events
    }

    pub fn on_button(&mut self, button: Button, pressed: bool) -> Option<InputEvent> {
        let hat = if pressed { 1.0 } else { 0.0 };
        match button {
            Button::DPadUp => self.motion.hat_y = -hat,
            Button::DPadDown => self.motion.hat_y = hat,
            Button::DPadLeft => self.motion.hat_x = -hat,
            Button::DPadRight => self.motion.hat_x = hat,
            _ => {
                let code = key_code(button)?;
                let event = if pressed {
                    self.pressed.insert(code);
                    KeyEvent::down(code)
                } else {
                    self.pressed.remove(&code);
                    KeyEvent::up(code)
                };
                return Some(InputEvent::Key(event));
            }
        }
        Some(InputEvent::Motion(self.motion))
    }

    /// Analog value of a pressure sensitive button
    pub fn on_button_value(&mut self, button: Button, value: f32) -> Option<InputEvent> {
        match button {
            Button::LeftTrigger2 => self.motion.ltrigger = value.clamp(0.0, 1.0),
            Button::RightTrigger2 => self.motion.rtrigger = value.clamp(0.0, 1.0),
            _ => return None,
        }
        Some(InputEvent::Motion(self.motion))
    }

    /// gilrs reports Y up, the motion event carries Y down
    pub fn on_axis(&mut self, axis: Axis, value: f32) -> Option<InputEvent> {
        match axis {
            Axis::LeftStickX => self.motion.x = apply_deadzone(value, self.deadzone),
            Axis::LeftStickY => self.motion.y = -apply_deadzone(value, self.deadzone),
            Axis::RightStickX => self.motion.z = apply_deadzone(value, self.deadzone),
            Axis::RightStickY => self.motion.rz = -apply_deadzone(value, self.deadzone),
            Axis::LeftZ => self.motion.ltrigger = value.clamp(0.0, 1.0),
            Axis::RightZ => self.motion.rtrigger = value.clamp(0.0, 1.0),
            Axis::DPadX => self.motion.hat_x = value,
            Axis::DPadY => self.motion.hat_y = -value,
            _ => {
                debug!("Ignoring unsupported axis: {:?}", axis);
                return None;
            }
        }
        Some(InputEvent::Motion(self.motion))
    }

    pub fn translate(&mut self, event: EventType) -> Vec<InputEvent> {
        if let EventType::Disconnected = event {
            // nothing may stay held on the console once the pad is gone
            warn!("Controller disconnected, releasing all input");
            return self.release_all();
        }
        self.translate_one(event).into_iter().collect()
    }

    fn translate_one(&mut self, event: EventType) -> Option<InputEvent> {
        match event {
            EventType::ButtonPressed(button, _) => self.on_button(button, true),
            EventType::ButtonReleased(button, _) => self.on_button(button, false),
            EventType::ButtonChanged(button, value, _) => self.on_button_value(button, value),
            EventType::AxisChanged(axis, value, _) => self.on_axis(axis, value),
            EventType::ButtonRepeated(button, _) => {
                debug!("Button repeat ignored: {:?}", button);
                None
            }
            EventType::Connected => {
                info!("Controller connected event detected");
                None
            }
            _ => {
                debug!("Unhandled event type: {:?}", event);
                None
            }
        }
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct EventCollector<S: CollectionState> {
    gilrs: Gilrs,

    // None accepts events from every gamepad
    active_gamepad: Option<GamepadId>,

    settings: CollectorConfig,

    sender: InputSender,

    translator: GamepadTranslator,
}

impl<S: CollectionState> EventCollector<S> {
    pub fn settings(&self) -> &CollectorConfig {
        &self.settings
    }
}

impl EventCollector<Initializing> {
    pub fn create(settings: CollectorConfig, sender: InputSender) -> Result<Self, CollectorError> {
        debug!("Creating Event Collector with settings: {:?}", settings);

        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        let translator = GamepadTranslator::new(settings.joystick_deadzone);
        Ok(Self::new(gilrs, None, settings, sender, translator))
    }

    /// Picks the gamepad to follow and starts collecting
    pub fn initialize(mut self) -> EventCollector<Collecting> {
        let gamepads: Vec<(GamepadId, Gamepad<'_>)> = self.gilrs.gamepads().collect();

        if gamepads.is_empty() {
            warn!("No gamepad connected, accepting the first one that shows up");
        } else {
            info!("Found {} gamepads:", gamepads.len());
            for (idx, (id, gamepad)) in gamepads.iter().enumerate() {
                info!("  [{}] ID: {}, Name: {}", idx, id, gamepad.name());
            }
            let (id, gamepad) = &gamepads[0];
            self.active_gamepad = Some(*id);
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
        }

        info!("Event Collector initialized, transitioning to Collecting state");
        self.transition()
    }
}

impl EventCollector<Collecting> {
    /// Forwards at most one pending gilrs event. Returns whether an event was
    /// pending.
    pub fn collect_next_event(&mut self) -> Result<bool, CollectorError> {
        let Some(Event { id, event, .. }) = self.gilrs.next_event() else {
            return Ok(false);
        };

        match self.active_gamepad {
            Some(active_id) if id != active_id => {
                debug!("Skipping event from non-active gamepad: {:?}", id);
                return Ok(true);
            }
            None => {
                info!("Following gamepad {}", id);
                self.active_gamepad = Some(id);
            }
            _ => {}
        }

        for input_event in self.translator.translate(event) {
            debug!("Captured event: {:?}", input_event);
            forward_event(&self.sender, input_event)?;
        }
        Ok(true)
    }

    /// Runs until cancelled or the input pump goes away
    pub fn run_collection_loop(&mut self, cancel: CancellationToken) {
        info!("Starting Event Collector loop");

        let mut event_count: u64 = 0;
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);

        while !cancel.is_cancelled() {
            match self.collect_next_event() {
                Ok(true) => {
                    event_count += 1;
                    continue;
                }
                Ok(false) => {}
                Err(CollectorError::EventSendError(PumpError::Closed)) => {
                    info!("Input pump closed, stopping collector");
                    break;
                }
                Err(e) => error!("Error collecting event: {}", e),
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                info!(
                    "Event Collector stats: {} events in last {} seconds",
                    event_count,
                    log_interval.num_seconds()
                );
                event_count = 0;
                last_log_time = now;
            }

            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        info!("Event Collector loop finished");
    }
}

pub struct CollectorHandle {
    task: JoinHandle<()>,
}

impl CollectorHandle {
    /// Creates the collector and moves it onto a blocking thread
    pub fn spawn(
        settings: CollectorConfig,
        sender: InputSender,
        cancel: CancellationToken,
    ) -> Result<Self, CollectorError> {
        info!("Spawning Event Collector with settings: {:?}", settings);
        let collector = EventCollector::create(settings, sender)?;

        let task = tokio::task::spawn_blocking(move || {
            let mut collecting = collector.initialize();
            collecting.run_collection_loop(cancel);
        });

        info!("Event Collector successfully started");
        Ok(Self { task })
    }

    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Collector task failed: {}", e);
        }
    }
}

/// Key edges wait for queue space, a lost release would keep the button held.
/// Motion events carry the whole axis snapshot, so one may be dropped when
/// the queue is full.
fn forward_event(sender: &InputSender, event: InputEvent) -> Result<(), PumpError> {
    match event {
        InputEvent::Key(_) => sender.blocking_send(event),
        _ => match sender.try_send(event) {
            Err(PumpError::QueueFull) => {
                debug!("Input queue full, motion snapshot dropped");
                Ok(())
            }
            result => result,
        },
    }
}

fn key_code(button: Button) -> Option<KeyCode> {
    let code = match button {
        Button::South => KEYCODE_BUTTON_A,
        Button::East => KEYCODE_BUTTON_B,
        Button::West => KEYCODE_BUTTON_X,
        Button::North => KEYCODE_BUTTON_Y,
        Button::C => KEYCODE_BUTTON_C,
        Button::Z => KEYCODE_BUTTON_Z,
        Button::LeftTrigger => KEYCODE_BUTTON_L1,
        Button::RightTrigger => KEYCODE_BUTTON_R1,
        Button::LeftTrigger2 => KEYCODE_BUTTON_L2,
        Button::RightTrigger2 => KEYCODE_BUTTON_R2,
        Button::LeftThumb => KEYCODE_BUTTON_THUMBL,
        Button::RightThumb => KEYCODE_BUTTON_THUMBR,
        Button::Select => KEYCODE_BUTTON_SELECT,
        Button::Start => KEYCODE_BUTTON_START,
        Button::Mode => KEYCODE_BUTTON_MODE,
        _ => return None,
    };
    Some(code)
}

// Rescales the remaining travel so the output still reaches 1.0
fn apply_deadzone(value: f32, deadzone: f32) -> f32 {
    if value.abs() < deadzone {
        0.0
    } else {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        sign * (value.abs() - deadzone) / (1.0 - deadzone)
    }
}
