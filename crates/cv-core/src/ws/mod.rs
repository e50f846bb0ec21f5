//! WebSocket client: one session per connect, reconnection is left to the caller.

pub mod client;

pub use client::{OnCloseCallback, OnTextCallback, PingPayload, WsConnConfig, WsSession};
