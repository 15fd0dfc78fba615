//! Freshness gate.
//!
//! Decides whether the results previously fetched for a query can be reused
//! or must be refreshed from the external sources. The decision never fetches
//! anything itself; the engine acts on it.

use std::sync::Arc;

use crate::storage::{PaperStorage, StorageResult};

/// Pure staleness rule.
///
/// A query is stale when it has never been fetched, or when strictly more
/// than `threshold_secs` have elapsed since the last fetch. An age of
/// exactly `threshold_secs` is still fresh.
pub fn is_stale(last_fetched: Option<i64>, now: i64, threshold_secs: i64) -> bool {
    match last_fetched {
        None => true,
        Some(fetched) => now.saturating_sub(fetched) > threshold_secs,
    }
}

/// Store-backed freshness check.
pub struct FreshnessGate {
    storage: Arc<dyn PaperStorage>,
    threshold_secs: i64,
}

impl FreshnessGate {
    pub fn new(storage: Arc<dyn PaperStorage>, threshold_secs: i64) -> Self {
        Self {
            storage,
            threshold_secs,
        }
    }

    /// Look up the freshness record for `query` and apply [`is_stale`].
    pub async fn is_stale(&self, query: &str, now: i64) -> StorageResult<bool> {
        let last_fetched = self.storage.get_last_fetched(query).await?;
        Ok(is_stale(last_fetched, now, self.threshold_secs))
    }
}
