//! Typed error definitions for the CryptoVault services.
//!
//! [`CvError`] is returned by every collaborator trait (transport, onboarding
//! store, watchlist store). The coordinators never propagate it to their own
//! callers; they log it and fold it into observable state instead.

use thiserror::Error;

/// Domain-specific errors for the CryptoVault services.
#[derive(Debug, Error)]
pub enum CvError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Realtime transport failure that is not specific to WebSocket framing.
    #[error("transport error: {0}")]
    Transport(String),

    /// Onboarding state could not be loaded or saved.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A watchlist mutation was rejected.
    #[error("watchlist error: {0}")]
    Watchlist(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Shorthand result alias used by the collaborator traits.
pub type CvResult<T> = Result<T, CvError>;
