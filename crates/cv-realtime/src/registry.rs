//! Per-screen subscription table.
//!
//! Each mounted screen owns at most one entry: the set of coin ids it wants
//! streamed. The active set handed to the transport is the union of all
//! entries, recomputed on demand so it can never go stale.

use std::collections::BTreeSet;

use ahash::{AHashMap, AHashSet};

/// Registry of screen interests.
///
/// Not thread-safe on its own; the coordinator guards it with a lock.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    screens: AHashMap<String, AHashSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the interest set for `screen_id`.
    ///
    /// Returns `true` if the stored entry changed. Registering the same set
    /// twice is a no-op.
    pub fn subscribe<I, S>(&mut self, screen_id: &str, coin_ids: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let coins: AHashSet<String> = coin_ids.into_iter().map(Into::into).collect();
        match self.screens.get(screen_id) {
            Some(existing) if *existing == coins => false,
            _ => {
                self.screens.insert(screen_id.to_string(), coins);
                true
            }
        }
    }

    /// Remove the entry for `screen_id`. Returns `false` if there was none.
    pub fn unsubscribe(&mut self, screen_id: &str) -> bool {
        self.screens.remove(screen_id).is_some()
    }

    /// Union of every screen's coin ids, sorted.
    pub fn active_set(&self) -> BTreeSet<String> {
        self.screens.values().flatten().cloned().collect()
    }

    /// The coin ids registered by one screen (empty if unregistered).
    pub fn screen_set(&self, screen_id: &str) -> BTreeSet<String> {
        self.screens.get(screen_id).map(|coins| coins.iter().cloned().collect()).unwrap_or_default()
    }

    /// Number of registered screens.
    pub fn screen_count(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.values().all(|coins| coins.is_empty())
    }
}
