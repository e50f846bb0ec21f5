//! Core data types shared by the realtime and onboarding crates.

pub mod connection;
pub mod price;

pub use connection::*;
pub use price::*;
