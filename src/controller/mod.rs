//! Controller subsystem for the stream client
//!
//! Gathers input from every producer into one controller state:
//!
//! 1. [`state`] - Controller state model, touch tracking and the merge rule
//! 2. [`keymap`], [`motion`], [`sensor`], [`touch`], [`stick`] - Producer translation
//! 3. [`input`] - The aggregator that folds producer snapshots together
//! 4. [`pump`] - Single task owning the aggregator and its event queue
//! 5. [`collector`] - Physical gamepad input via gilrs
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Collector ──┐
//! Sensors ────────────────┼──► Pump (StreamInput) ──► WatchTransport ──► Session
//! Touch ──► TouchSurface ─┘
//! ```

pub mod collector;
pub mod input;
pub mod keymap;
pub mod motion;
pub mod pump;
pub mod sensor;
pub mod state;
pub mod stick;
pub mod touch;

pub use input::{ControllerStateListener, RotationSource, StreamInput};
pub use pump::{InputEvent, InputHandle, InputSender, WatchTransport};
pub use state::{Buttons, ControllerState, ControllerTouch, Rotation};
