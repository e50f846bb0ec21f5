//! CoinCap prices stream codec.
//!
//! The subscription is expressed in the URL (`?assets=bitcoin,ethereum`);
//! the server then pushes flat JSON objects mapping coin id to price:
//!
//! ```json
//! {"bitcoin":"64012.55","ethereum":"3120.10"}
//! ```
//!
//! Prices arrive as strings; numbers are accepted too.

use cv_core::{CvError, PriceUpdate};
use tracing::debug;
use url::Url;

/// Build the stream URL for `coin_ids` on top of `base`.
///
/// Any existing `assets` query on `base` is replaced.
pub fn prices_url(base: &str, coin_ids: &[String]) -> Result<String, CvError> {
    if coin_ids.is_empty() {
        return Err(CvError::Transport("no coins to stream".into()));
    }
    let mut url = Url::parse(base).map_err(|e| CvError::Config(format!("invalid ws url '{base}': {e}")))?;

    let kept: Vec<(String, String)> =
        url.query_pairs().filter(|(k, _)| k != "assets").map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        query.append_pair("assets", &coin_ids.join(","));
    }
    Ok(url.into())
}

/// Decode one pushed message.
///
/// Entries whose price is not a finite number are skipped. Anything that is
/// not a JSON object yields nothing.
pub fn parse_prices(text: &str) -> Vec<PriceUpdate> {
    let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(text) else {
        debug!("[coincap] ignoring non-price message: {text}");
        return Vec::new();
    };

    map.into_iter()
        .filter_map(|(coin_id, value)| {
            let price = match &value {
                serde_json::Value::String(s) => s.parse::<f64>().ok(),
                serde_json::Value::Number(n) => n.as_f64(),
                _ => None,
            }?;
            price.is_finite().then(|| PriceUpdate::new(coin_id, price))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn url_carries_assets_query() {
        let url = prices_url("wss://ws.coincap.io/prices", &coins(&["bitcoin", "ethereum"])).unwrap();
        assert_eq!(url, "wss://ws.coincap.io/prices?assets=bitcoin%2Cethereum");
    }

    #[test]
    fn url_keeps_other_query_pairs() {
        let url = prices_url("wss://example.test/prices?key=abc&assets=old", &coins(&["solana"])).unwrap();
        assert_eq!(url, "wss://example.test/prices?key=abc&assets=solana");
    }

    #[test]
    fn url_rejects_bad_input() {
        assert!(matches!(prices_url("not a url", &coins(&["bitcoin"])), Err(CvError::Config(_))));
        assert!(matches!(prices_url("wss://ws.coincap.io/prices", &[]), Err(CvError::Transport(_))));
    }

    #[test]
    fn parses_string_and_number_prices() {
        let mut updates = parse_prices(r#"{"bitcoin":"64012.55","ethereum":3120.1}"#);
        updates.sort_by(|a, b| a.coin_id.cmp(&b.coin_id));
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].coin_id, "bitcoin");
        assert_eq!(updates[0].price_usd, 64012.55);
        assert_eq!(updates[1].coin_id, "ethereum");
        assert_eq!(updates[1].price_usd, 3120.1);
    }

    #[test]
    fn skips_garbage_entries() {
        let updates = parse_prices(r#"{"bitcoin":"n/a","ethereum":null,"solana":"151.2"}"#);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].coin_id, "solana");

        assert!(parse_prices("pong").is_empty());
        assert!(parse_prices("[1,2]").is_empty());
        assert!(parse_prices(r#"{"bitcoin":"inf"}"#).is_empty());
    }
}
