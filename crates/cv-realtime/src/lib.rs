//! # cv-realtime
//!
//! Realtime price feed coordination.
//!
//! ## Architecture
//!
//! Screens register interest in coin ids with the
//! [`coordinator::SubscriptionCoordinator`]. The coordinator keeps the union of
//! all interests in a [`registry::SubscriptionRegistry`], and a background
//! driver task keeps exactly one upstream [`Transport`] session in line with
//! that union. Connection lifecycle decisions live in the pure
//! [`lifecycle::ConnectionLifecycle`] state machine; reconnect pacing comes
//! from a pluggable [`backoff::ReconnectionStrategy`].
//!
//! ```text
//! screen ─subscribe/unsubscribe─► registry ─active set─► driver ─connect/close─► Transport
//!                                                           ▲                        │
//!                                                           └──── disconnect ◄───────┤
//! observers ◄─────────── FeedEvent (state, prices, fallback) ◄──── on_message ◄──────┘
//! ```
//!
//! ## Modules
//!
//! - [`backoff`]: reconnection strategies
//! - [`registry`]: per-screen interest table
//! - [`lifecycle`]: connection state machine
//! - [`coordinator`]: async driver + public API
//! - [`event`]: events broadcast to observers
//! - [`coincap`]: CoinCap prices wire codec
//! - [`ws_transport`]: WebSocket [`Transport`] implementation

pub mod backoff;
pub mod coincap;
pub mod coordinator;
pub mod event;
pub mod lifecycle;
pub mod registry;
pub mod ws_transport;

use std::sync::Arc;

use async_trait::async_trait;
use cv_core::{CvError, PriceUpdate};

pub use backoff::{ExponentialBackoff, FixedBackoff, ReconnectionStrategy};
pub use coordinator::SubscriptionCoordinator;
pub use event::FeedEvent;

/// Handler invoked for each decoded price update.
pub type MessageHandler = Arc<dyn Fn(PriceUpdate) + Send + Sync>;

/// Handler invoked when an open session drops. Parameter: reason.
pub type DisconnectHandler = Arc<dyn Fn(String) + Send + Sync>;

/// An opaque realtime channel streaming prices for a set of coins.
///
/// Implementations must be safe to call from the coordinator's driver task
/// while handlers fire from their own tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session streaming `coin_ids`, replacing any existing session.
    ///
    /// Resolves once the handshake has completed (`Ok`) or failed (`Err`).
    async fn connect(&self, coin_ids: &[String]) -> Result<(), CvError>;

    /// Change the streamed coin set on an open session.
    ///
    /// Transports that cannot change the set in place reopen the session.
    async fn resubscribe(&self, coin_ids: &[String]) -> Result<(), CvError> {
        self.connect(coin_ids).await
    }

    /// Register the handler for decoded price updates.
    fn on_message(&self, handler: MessageHandler);

    /// Register the handler for unexpected session drops.
    ///
    /// Must not fire for a [`close`](Transport::close) requested by the caller.
    fn on_disconnect(&self, handler: DisconnectHandler);

    /// Close the current session, if any.
    async fn close(&self);
}
