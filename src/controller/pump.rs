//! Input pump - the single task that owns the aggregator
//!
//! Producers run on their own threads (gamepad polling, sensor callbacks, UI
//! touch handling) and only submit [`InputEvent`]s to one bounded queue. The
//! pump applies them in arrival order, so the producer snapshots inside
//! [`StreamInput`] are never touched concurrently.
//!
//! ```text
//! Collector ──┐
//! Sensors ────┼─[InputEvent]─► pump task (StreamInput) ─► WatchTransport ─► session
//! Touch UI ───┘  (mpsc)                                     (latest only)
//! ```

use super::input::{ControllerStateListener, RotationSource, StreamInput};
use super::keymap::KeyEvent;
use super::motion::MotionEvent;
use super::sensor::{SensorListener, SensorSample};
use super::state::ControllerState;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Capacity of the producer queue
pub const INPUT_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Motion(MotionEvent),
    Sensor(SensorSample),
    Touch(ControllerState),
}

#[derive(Debug, thiserror::Error)]
pub enum PumpError {
    #[error("Input pump is not running")]
    Closed,

    #[error("Input queue full, event dropped")]
    QueueFull,

    #[error("Input pump task failed: {0}")]
    TaskError(String),
}

/// Publishes each aggregate into a watch channel.
///
/// Readers only ever observe the newest state, so a slow consumer coalesces
/// bursts of input without any rate limiting here.
#[derive(Debug)]
pub struct WatchTransport {
    sender: watch::Sender<ControllerState>,
}

impl WatchTransport {
    pub fn new() -> (Self, watch::Receiver<ControllerState>) {
        let (sender, receiver) = watch::channel(ControllerState::default());
        (Self { sender }, receiver)
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.sender.subscribe()
    }
}

impl ControllerStateListener for WatchTransport {
    fn on_state_changed(&mut self, state: &ControllerState) {
        // send_replace keeps working after every receiver is gone
        self.sender.send_replace(state.clone());
    }
}

/// Cloneable producer side of the pump
#[derive(Debug, Clone)]
pub struct InputSender {
    sender: mpsc::Sender<InputEvent>,
}

impl InputSender {
    pub fn new(sender: mpsc::Sender<InputEvent>) -> Self {
        Self { sender }
    }

    /// Non-blocking submit for callback and polling threads
    pub fn try_send(&self, event: InputEvent) -> Result<(), PumpError> {
        self.sender.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PumpError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PumpError::Closed,
        })
    }

    /// Waits for queue space. Only for threads outside the async runtime.
    pub fn blocking_send(&self, event: InputEvent) -> Result<(), PumpError> {
        self.sender
            .blocking_send(event)
            .map_err(|_| PumpError::Closed)
    }

    pub async fn send(&self, event: InputEvent) -> Result<(), PumpError> {
        self.sender.send(event).await.map_err(|_| PumpError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<L, R> StreamInput<L, R>
where
    L: ControllerStateListener,
    R: RotationSource,
{
    /// Routes one queued event to the matching producer entry point.
    /// Returns whether the event was consumed.
    pub fn apply(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::Key(key) => self.dispatch_key_event(key),
            InputEvent::Motion(motion) => self.on_generic_motion_event(&motion),
            InputEvent::Sensor(sample) => {
                self.on_sensor_sample(sample);
                true
            }
            InputEvent::Touch(state) => {
                self.set_touch_state(state);
                true
            }
        }
    }
}

pub struct InputHandle<L, R> {
    sender: InputSender,
    task: JoinHandle<StreamInput<L, R>>,
    cancel: CancellationToken,
}

impl<L, R> InputHandle<L, R>
where
    L: ControllerStateListener + Send + 'static,
    R: RotationSource + Send + 'static,
{
    /// Moves `input` into a new task and returns the handle producers submit
    /// events through
    pub fn spawn(input: StreamInput<L, R>, cancel: CancellationToken) -> Self {
        Self::with_capacity(input, cancel, INPUT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(
        input: StreamInput<L, R>,
        cancel: CancellationToken,
        capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        debug!("Created input queue with capacity {}", capacity);

        info!("Spawning input pump task");
        let task = tokio::spawn(run_pump(input, receiver, cancel.clone()));

        Self {
            sender: InputSender::new(sender),
            task,
            cancel,
        }
    }

    pub fn sender(&self) -> InputSender {
        self.sender.clone()
    }

    /// Stops the pump and hands the aggregator back
    pub async fn shutdown(self) -> Result<StreamInput<L, R>, PumpError> {
        self.cancel.cancel();
        drop(self.sender);
        self.task
            .await
            .map_err(|e| PumpError::TaskError(e.to_string()))
    }
}

async fn run_pump<L, R>(
    mut input: StreamInput<L, R>,
    mut receiver: mpsc::Receiver<InputEvent>,
    cancel: CancellationToken,
) -> StreamInput<L, R>
where
    L: ControllerStateListener,
    R: RotationSource,
{
    let mut applied: u64 = 0;
    let mut ignored: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Input pump cancelled");
                break;
            }
            event = receiver.recv() => {
                let Some(event) = event else {
                    info!("All input producers gone, stopping pump");
                    break;
                };
                trace!("Applying {:?}", event);
                if input.apply(event) {
                    applied += 1;
                } else {
                    ignored += 1;
                }
            }
        }
    }

    if ignored > 0 {
        warn!("Input pump ignored {} unconsumed events", ignored);
    }
    info!("Input pump stopped after {} events", applied);
    input
}
