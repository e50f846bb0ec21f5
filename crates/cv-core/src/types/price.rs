//! Decoded realtime price update.

use serde::{Deserialize, Serialize};

/// One price tick for one coin, as decoded by a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Upstream coin identifier (e.g. `"bitcoin"`).
    pub coin_id: String,
    /// Last traded price in USD.
    pub price_usd: f64,
    /// Local receive time, milliseconds since Unix epoch.
    pub received_at_ms: u64,
}

impl PriceUpdate {
    pub fn new(coin_id: impl Into<String>, price_usd: f64) -> Self {
        Self { coin_id: coin_id.into(), price_usd, received_at_ms: crate::time_util::now_ms() }
    }
}
