//! Backend that only logs what would be sent to the console
//!
//! Used by the binary when no streaming engine is linked in, and handy for
//! checking a controller mapping without a console on the network.

use super::{EventSink, SessionBackend, SessionError, SessionEvent};
use crate::controller::state::ControllerState;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Lets an action through at most once per interval
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_event_time: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_event_time: None,
        }
    }

    pub fn should_process(&mut self) -> bool {
        self.should_process_at(Instant::now())
    }

    fn should_process_at(&mut self, now: Instant) -> bool {
        match self.last_event_time {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                self.last_event_time = Some(now);
                true
            }
        }
    }
}

#[derive(Debug)]
pub struct LogBackend {
    host: String,
    verbose: bool,
    running: bool,
    limiter: RateLimiter,
    states_received: u64,
    last_state: Option<ControllerState>,
    events: Option<EventSink>,
}

impl LogBackend {
    pub fn new(host: impl Into<String>, verbose: bool) -> Self {
        Self {
            host: host.into(),
            verbose,
            running: false,
            limiter: RateLimiter::new(Duration::from_millis(250)),
            states_received: 0,
            last_state: None,
            events: None,
        }
    }

    pub fn states_received(&self) -> u64 {
        self.states_received
    }

    pub fn last_state(&self) -> Option<&ControllerState> {
        self.last_state.as_ref()
    }
}

impl SessionBackend for LogBackend {
    fn start(&mut self, events: EventSink) -> Result<(), SessionError> {
        if self.host.is_empty() {
            return Err(SessionError::CreateError("no host configured".into()));
        }
        info!("Log session for {} started", self.host);
        self.running = true;
        // nothing to negotiate, the session counts as connected right away
        if events.send(SessionEvent::Connected).is_err() {
            warn!("Session is no longer listening for events");
        }
        self.events = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        info!(
            "Log session for {} stopped after {} controller states",
            self.host, self.states_received
        );
        self.running = false;
        self.events = None;
    }

    fn set_controller_state(&mut self, state: &ControllerState) {
        if !self.running {
            return;
        }
        self.states_received += 1;
        if self.verbose || self.limiter.should_process() {
            info!(
                "Buttons:{:?} L:({},{}) R:({},{}) L2:{} R2:{}",
                state.buttons,
                state.left_x,
                state.left_y,
                state.right_x,
                state.right_y,
                state.l2_state,
                state.r2_state
            );
        }
        self.last_state = Some(state.clone());
    }

    fn set_login_pin(&mut self, pin: &str) {
        info!("Login PIN with {} digits submitted", pin.len());
    }
}
