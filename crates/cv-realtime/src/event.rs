//! Event types broadcast by the coordinator to its observers (screens).
//!
//! Observers call [`SubscriptionCoordinator::events`](crate::SubscriptionCoordinator::events)
//! and react to lifecycle transitions and price updates.

use cv_core::{ConnectionState, PriceUpdate};

/// A typed event emitted by the [`SubscriptionCoordinator`](crate::SubscriptionCoordinator).
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The connection lifecycle moved from one state to another.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
        /// Reconnect attempt counter after the transition.
        attempt: u32,
    },

    /// A decoded price update from the transport.
    Price(PriceUpdate),

    /// The reconnection strategy gave up. A fallback data source (e.g.
    /// polling) may take over until the active set changes or a reconnect
    /// is requested.
    FallbackRequested {
        /// Number of consecutive failed attempts.
        attempts: u32,
    },

    /// A non-fatal transport error (connect or resubscribe failure).
    TransportError { message: String },
}

/// Sender half of the feed event channel.
pub type FeedEventSender = tokio::sync::broadcast::Sender<FeedEvent>;

/// Receiver half of the feed event channel.
///
/// Slow receivers lag and skip events rather than blocking the driver.
pub type FeedEventReceiver = tokio::sync::broadcast::Receiver<FeedEvent>;

/// Capacity of the broadcast channel.
pub const FEED_EVENT_CAPACITY: usize = 1024;
