//! # cv-core
//!
//! Core crate for the CryptoVault realtime and onboarding services, providing:
//!
//! - **Types** (`types`): connection lifecycle states and decoded price updates
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `CvError` via thiserror
//! - **WebSocket** (`ws`): single-session WS client with ping keep-alive
//! - **Time utilities** (`time_util`): wall-clock timestamps
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;
pub mod ws;

pub use error::CvError;
// Re-export types at crate root for convenience.
pub use types::*;
