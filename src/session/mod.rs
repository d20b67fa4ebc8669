//! Stream session lifecycle
//!
//! [`StreamSession`] owns the streaming engine backend while the stream is in
//! the foreground, forwards controller states and login PINs to it, and
//! publishes the stream state and rumble feedback on watch channels.
//!
//! ```text
//!           resume()                 Connected event
//! Idle ───────────────► Connecting ──────────────────► Connected
//!  ▲                        │                              │
//!  │ shutdown()/pause()     │ Quit / LoginPinRequest event │
//!  └────────────────────────┴──────────────────────────────┘
//! ```

pub mod log_backend;

use crate::controller::state::ControllerState;
use std::fmt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to create session: {0}")]
    CreateError(String),

    #[error("Failed to start session: {0}")]
    StartError(String),
}

/// Why the engine ended the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuitReason {
    pub code: i32,
    pub is_error: bool,
    pub description: String,
}

impl fmt::Display for QuitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RumbleState {
    pub left: u8,
    pub right: u8,
    pub kind: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Connecting,
    Connected,
    CreateError(SessionError),
    Quit {
        reason: QuitReason,
        reason_string: Option<String>,
    },
    LoginPinRequest {
        pin_incorrect: bool,
    },
}

/// Events reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    LoginPinRequest { pin_incorrect: bool },
    Quit {
        reason: QuitReason,
        reason_string: Option<String>,
    },
    Rumble(RumbleState),
}

/// Where a backend reports engine events
pub type EventSink = mpsc::UnboundedSender<SessionEvent>;

/// The native streaming engine
pub trait SessionBackend {
    /// Starts streaming. Engine events go to `events` from now on.
    fn start(&mut self, events: EventSink) -> Result<(), SessionError>;

    fn stop(&mut self);

    fn set_controller_state(&mut self, state: &ControllerState);

    fn set_login_pin(&mut self, pin: &str);
}

pub struct StreamSession<B, F> {
    factory: F,
    backend: Option<B>,
    state: watch::Sender<StreamState>,
    rumble: watch::Sender<RumbleState>,
    events_tx: EventSink,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<B, F> StreamSession<B, F>
where
    B: SessionBackend,
    F: FnMut() -> Result<B, SessionError>,
{
    /// `factory` builds a fresh backend on every resume
    pub fn new(factory: F) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);
        let (rumble, _) = watch::channel(RumbleState::default());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            factory,
            backend: None,
            state,
            rumble,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }

    pub fn rumble_state(&self) -> watch::Receiver<RumbleState> {
        self.rumble.subscribe()
    }

    pub fn current_state(&self) -> StreamState {
        self.state.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    fn set_state(&self, state: StreamState) {
        debug!("Stream state -> {:?}", state);
        self.state.send_replace(state);
    }

    /// Creates and starts a backend unless one is already running
    pub fn resume(&mut self) {
        if self.backend.is_some() {
            debug!("Session already active");
            return;
        }

        let mut backend = match (self.factory)() {
            Ok(backend) => backend,
            Err(e) => {
                error!("Failed to create session: {}", e);
                self.set_state(StreamState::CreateError(e));
                return;
            }
        };

        self.set_state(StreamState::Connecting);
        if let Err(e) = backend.start(self.events_tx.clone()) {
            error!("Failed to start session: {}", e);
            self.set_state(StreamState::CreateError(e));
            return;
        }
        info!("Session started");
        self.backend = Some(backend);
    }

    pub fn shutdown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            info!("Stopping session");
            backend.stop();
        }
        // events still queued belong to the stopped backend
        while self.events_rx.try_recv().is_ok() {}
        self.set_state(StreamState::Idle);
    }

    pub fn pause(&mut self) {
        self.shutdown();
    }

    /// Waits for the next engine event. Never resolves while no backend is
    /// sending.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Handles every engine event queued so far and returns how many there
    /// were
    pub fn poll_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => self.set_state(StreamState::Connected),
            SessionEvent::LoginPinRequest { pin_incorrect } => {
                self.set_state(StreamState::LoginPinRequest { pin_incorrect })
            }
            SessionEvent::Quit {
                reason,
                reason_string,
            } => {
                if reason.is_error {
                    warn!("Session quit: {} {:?}", reason, reason_string);
                } else {
                    info!("Session quit: {}", reason);
                }
                self.set_state(StreamState::Quit {
                    reason,
                    reason_string,
                });
            }
            SessionEvent::Rumble(rumble) => {
                self.rumble.send_replace(rumble);
            }
        }
    }

    /// Forwards the aggregate to the engine. Dropped while no session runs.
    pub fn set_controller_state(&mut self, state: &ControllerState) {
        if let Some(backend) = self.backend.as_mut() {
            backend.set_controller_state(state);
        }
    }

    pub fn set_login_pin(&mut self, pin: &str) {
        match self.backend.as_mut() {
            Some(backend) => backend.set_login_pin(pin),
            None => warn!("Login PIN entered without an active session"),
        }
    }
}
