//! Watchlist collaborator and the best-effort selection commit.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use cv_core::error::CvResult;
use tracing::{info, warn};

use crate::coins::coin_id_for_symbol;

/// Store the user's watched coins.
///
/// `add_to_watchlist` must be additive and idempotent so concurrent writers
/// elsewhere in the app can interleave safely.
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    async fn add_to_watchlist(&self, coin_id: &str) -> CvResult<()>;
}

/// In-process watchlist.
#[derive(Debug, Default)]
pub struct MemoryWatchlist {
    ids: Mutex<BTreeSet<String>>,
}

impl MemoryWatchlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl WatchlistStore for MemoryWatchlist {
    async fn add_to_watchlist(&self, coin_id: &str) -> CvResult<()> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).insert(coin_id.to_string());
        Ok(())
    }
}

/// Outcome of [`commit_selection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub added: Vec<String>,
    pub failed: Vec<String>,
}

/// Add every selected symbol to the watchlist.
///
/// Per-item failures are logged and skipped; the batch always runs to the end.
pub async fn commit_selection(watchlist: &dyn WatchlistStore, symbols: &BTreeSet<String>) -> CommitSummary {
    let mut summary = CommitSummary::default();
    for symbol in symbols {
        let coin_id = coin_id_for_symbol(symbol);
        match watchlist.add_to_watchlist(&coin_id).await {
            Ok(()) => summary.added.push(coin_id),
            Err(e) => {
                warn!("[onboarding] watchlist add '{coin_id}' failed: {e}");
                summary.failed.push(coin_id);
            }
        }
    }
    info!("[onboarding] watchlist commit: {} added, {} failed", summary.added.len(), summary.failed.len());
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use cv_core::CvError;

    struct Flaky {
        inner: MemoryWatchlist,
        reject: &'static str,
    }

    #[async_trait]
    impl WatchlistStore for Flaky {
        async fn add_to_watchlist(&self, coin_id: &str) -> CvResult<()> {
            if coin_id == self.reject {
                return Err(CvError::Watchlist(format!("{coin_id} rejected")));
            }
            self.inner.add_to_watchlist(coin_id).await
        }
    }

    fn symbols(s: &[&str]) -> BTreeSet<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn commits_mapped_ids() {
        let wl = MemoryWatchlist::new();
        let summary = commit_selection(&wl, &symbols(&["BTC", "DOGE"])).await;
        assert_eq!(summary.added, vec!["bitcoin".to_string(), "doge".to_string()]);
        assert!(summary.failed.is_empty());
        assert_eq!(wl.ids(), symbols(&["bitcoin", "doge"]));
    }

    #[tokio::test]
    async fn failure_does_not_abort_batch() {
        let wl = Flaky { inner: MemoryWatchlist::new(), reject: "bitcoin" };
        let summary = commit_selection(&wl, &symbols(&["BTC", "ETH", "SOL"])).await;
        assert_eq!(summary.failed, vec!["bitcoin".to_string()]);
        assert_eq!(wl.inner.ids(), symbols(&["ethereum", "solana"]));
    }

    #[tokio::test]
    async fn add_is_idempotent() {
        let wl = MemoryWatchlist::new();
        wl.add_to_watchlist("cardano").await.unwrap();
        wl.add_to_watchlist("cardano").await.unwrap();
        assert_eq!(wl.ids().len(), 1);
    }
}
