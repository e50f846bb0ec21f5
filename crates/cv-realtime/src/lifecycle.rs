//! Connection lifecycle state machine.
//!
//! Pure and synchronous: every input returns the side effect the driver must
//! perform next ([`LifecycleAction`]), and the driver feeds the outcome back
//! in.
//!
//! ```text
//!                 interest                handshake ok
//! DISCONNECTED ─────────────► CONNECTING ──────────────► CONNECTED
//!      ▲                        ▲    │ failure               │ drop / failure
//!      │ no interest            │    ▼                       ▼
//!      └──── (any state)        └─ RECONNECTING ◄────────────┘
//!                          delay elapsed │ strategy exhausted
//!                                        ▼
//!                                     FAILED ── interest change / reconnect ──► CONNECTING
//! ```

use std::time::Duration;

use cv_core::ConnectionState;
use tracing::debug;

use crate::backoff::ReconnectionStrategy;

/// Side effect requested by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Open a session for the current active set, then report
    /// [`on_connected`](ConnectionLifecycle::on_connected) or
    /// [`on_transport_failure`](ConnectionLifecycle::on_transport_failure).
    Connect,
    /// Push the new active set to the open session.
    Resubscribe,
    /// Close the session and cancel any pending retry.
    Close,
    /// Wait, then report [`on_retry_elapsed`](ConnectionLifecycle::on_retry_elapsed).
    ScheduleRetry(Duration),
    /// The strategy is exhausted. Call [`give_up`](ConnectionLifecycle::give_up).
    GiveUp,
}

/// Connection state plus the reconnect attempt counter.
pub struct ConnectionLifecycle {
    state: ConnectionState,
    attempt: u32,
    strategy: Box<dyn ReconnectionStrategy>,
}

impl ConnectionLifecycle {
    pub fn new(strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self { state: ConnectionState::Disconnected, attempt: 0, strategy }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last successful connect.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The active set changed. `has_interest` is false when it became empty.
    pub fn on_interest_changed(&mut self, has_interest: bool) -> Option<LifecycleAction> {
        use ConnectionState::*;

        if !has_interest {
            if self.state == Disconnected {
                return None;
            }
            self.clear_attempts();
            return Some(self.transition(Disconnected, LifecycleAction::Close));
        }

        match self.state {
            Disconnected => Some(self.transition(Connecting, LifecycleAction::Connect)),
            Failed => {
                self.clear_attempts();
                Some(self.transition(Connecting, LifecycleAction::Connect))
            }
            Connected => Some(LifecycleAction::Resubscribe),
            // The next connect picks up the latest set.
            Connecting | Reconnecting => None,
        }
    }

    /// The transport completed its handshake.
    ///
    /// Only honoured while `CONNECTING`; a late success in any other state
    /// is ignored.
    pub fn on_connected(&mut self) -> Option<LifecycleAction> {
        if self.state != ConnectionState::Connecting {
            debug!("[lifecycle] ignoring connect success in {}", self.state);
            return None;
        }
        self.clear_attempts();
        self.state = ConnectionState::Connected;
        None
    }

    /// A connect attempt failed or an open session dropped.
    pub fn on_transport_failure(&mut self) -> Option<LifecycleAction> {
        use ConnectionState::*;

        if !matches!(self.state, Connecting | Connected) {
            debug!("[lifecycle] ignoring transport failure in {}", self.state);
            return None;
        }

        self.attempt = self.attempt.saturating_add(1);
        self.state = Reconnecting;
        if self.strategy.should_fallback(self.attempt) {
            return Some(LifecycleAction::GiveUp);
        }
        Some(LifecycleAction::ScheduleRetry(self.strategy.next_delay(self.attempt)))
    }

    /// The scheduled retry delay elapsed.
    pub fn on_retry_elapsed(&mut self) -> Option<LifecycleAction> {
        if self.state != ConnectionState::Reconnecting {
            return None;
        }
        Some(self.transition(ConnectionState::Connecting, LifecycleAction::Connect))
    }

    /// Stop retrying via the primary transport.
    pub fn give_up(&mut self) {
        if self.state == ConnectionState::Reconnecting {
            self.state = ConnectionState::Failed;
        }
    }

    /// Explicit external reconnect request.
    ///
    /// Restarts from a clean strategy when `FAILED` or waiting in
    /// `RECONNECTING`; ignored while connecting or connected.
    pub fn on_reconnect_requested(&mut self, has_interest: bool) -> Option<LifecycleAction> {
        use ConnectionState::*;

        if !has_interest {
            return self.on_interest_changed(false);
        }
        match self.state {
            Failed | Reconnecting | Disconnected => {
                self.clear_attempts();
                Some(self.transition(Connecting, LifecycleAction::Connect))
            }
            Connecting | Connected => None,
        }
    }

    fn transition(&mut self, to: ConnectionState, action: LifecycleAction) -> LifecycleAction {
        debug!("[lifecycle] {} -> {to} ({action:?})", self.state);
        self.state = to;
        action
    }

    fn clear_attempts(&mut self) {
        self.attempt = 0;
        self.strategy.reset();
    }
}
