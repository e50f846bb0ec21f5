//! Popular coins offered on the coin selection step.

/// One selectable coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopularCoin {
    /// Ticker symbol, as stored in the selection.
    pub symbol: &'static str,
    pub name: &'static str,
    /// Upstream id used by the watchlist and the price feed.
    pub coin_id: &'static str,
}

pub const POPULAR_COINS: &[PopularCoin] = &[
    PopularCoin { symbol: "BTC", name: "Bitcoin", coin_id: "bitcoin" },
    PopularCoin { symbol: "ETH", name: "Ethereum", coin_id: "ethereum" },
    PopularCoin { symbol: "BNB", name: "Binance", coin_id: "binancecoin" },
    PopularCoin { symbol: "SOL", name: "Solana", coin_id: "solana" },
    PopularCoin { symbol: "ADA", name: "Cardano", coin_id: "cardano" },
    PopularCoin { symbol: "XRP", name: "Ripple", coin_id: "ripple" },
];

/// Map a symbol to its coin id. Unknown symbols are lower-cased.
pub fn coin_id_for_symbol(symbol: &str) -> String {
    POPULAR_COINS
        .iter()
        .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
        .map(|c| c.coin_id.to_string())
        .unwrap_or_else(|| symbol.to_lowercase())
}
