//! Ingestion coordinator.
//!
//! Refreshes the local store for a stale query: both external providers are
//! queried concurrently, their results are concatenated and persisted, and
//! only then is the query's freshness record moved forward.
//!
//! # Failure handling
//!
//! Each provider call is turned into a [`FetchOutcome`]. Whether a degraded
//! outcome aborts the refresh is decided in one place by the configured
//! [`FailurePolicy`]:
//!
//! - `Symmetric`: any failing provider contributes nothing and the refresh
//!   continues with the other one.
//! - `StrictPrimary`: a failing primary provider aborts the refresh; the
//!   secondary still degrades.
//!
//! A persistence failure always aborts and leaves the freshness record
//! untouched. When every provider degraded, nothing new was learned: no save
//! is issued, the freshness record is left untouched and the next query
//! retries.
//!
//! The freshness record is stamped with the clock reading taken after the
//! save completes.
//!
//! # Usage
//!
//! ```ignore
//! let coordinator = IngestionCoordinator::new(storage, arxiv, semantic_scholar, FailurePolicy::Symmetric);
//! let stats = coordinator.refresh("graph neural networks", &SystemClock, &cancel).await?;
//! println!("persisted {} new papers", stats.persisted);
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::FailurePolicy;
use crate::models::Paper;
use crate::provider::{fetch_outcome, FetchOutcome, PaperProvider, ProviderError};
use crate::storage::{PaperStorage, StorageError};

/// Errors that abort a refresh.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// A provider failed and the policy does not allow degrading it
    #[error("Fetch from {source_name} failed: {error}")]
    Fetch {
        source_name: String,
        #[source]
        error: ProviderError,
    },

    /// Writing papers or the freshness record failed
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StorageError),

    /// The caller cancelled the refresh
    #[error("Refresh cancelled")]
    Cancelled,
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Statistics from one refresh.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionStats {
    /// Papers returned by the primary provider
    pub primary: usize,

    /// Papers returned by the secondary provider
    pub secondary: usize,

    /// Papers newly inserted (duplicates already stored are not counted)
    pub persisted: usize,

    /// Names of providers whose failure was absorbed
    pub degraded_sources: Vec<String>,

    /// Whether the freshness record was moved to the refresh time
    pub timestamp_updated: bool,
}

impl IngestionStats {
    /// Total papers handed to storage.
    pub fn fetched(&self) -> usize {
        self.primary + self.secondary
    }

    /// Record a provider failure that was absorbed.
    fn record_degraded(&mut self, source: &str) {
        self.degraded_sources.push(source.to_string());
    }
}

/// Coordinates the two providers and the store during a refresh.
pub struct IngestionCoordinator {
    storage: Arc<dyn PaperStorage>,
    primary: Arc<dyn PaperProvider>,
    secondary: Arc<dyn PaperProvider>,
    policy: FailurePolicy,
}

impl IngestionCoordinator {
    pub fn new(
        storage: Arc<dyn PaperStorage>,
        primary: Arc<dyn PaperProvider>,
        secondary: Arc<dyn PaperProvider>,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            storage,
            primary,
            secondary,
            policy,
        }
    }

    /// Apply the failure policy to one outcome.
    fn absorb(
        &self,
        outcome: FetchOutcome,
        is_primary: bool,
        stats: &mut IngestionStats,
    ) -> IngestionResult<Vec<Paper>> {
        match outcome {
            FetchOutcome::Fetched(papers) => Ok(papers),
            FetchOutcome::Degraded { source, error } => {
                if is_primary && self.policy == FailurePolicy::StrictPrimary {
                    return Err(IngestionError::Fetch {
                        source_name: source,
                        error,
                    });
                }
                warn!(source = %source, error = %error, "provider failed; continuing without it");
                stats.record_degraded(&source);
                Ok(Vec::new())
            }
        }
    }

    /// Refresh the store for `query`, stamping the freshness record with the
    /// time `clock` reports once the papers are saved.
    ///
    /// # Errors
    /// - `IngestionError::Fetch` when the policy refuses to degrade a provider
    /// - `IngestionError::Persistence` when saving papers or the timestamp fails
    /// - `IngestionError::Cancelled` when `cancel` fires before the timestamp write
    pub async fn refresh(
        &self,
        query: &str,
        clock: &dyn Clock,
        cancel: &CancellationToken,
    ) -> IngestionResult<IngestionStats> {
        if cancel.is_cancelled() {
            return Err(IngestionError::Cancelled);
        }

        info!(query, "refreshing from external sources");
        let (primary_outcome, secondary_outcome) = tokio::select! {
            _ = cancel.cancelled() => return Err(IngestionError::Cancelled),
            outcomes = async {
                tokio::join!(
                    fetch_outcome(self.primary.as_ref(), query),
                    fetch_outcome(self.secondary.as_ref(), query),
                )
            } => outcomes,
        };

        let mut stats = IngestionStats::default();
        let mut papers = self.absorb(primary_outcome, true, &mut stats)?;
        let secondary = self.absorb(secondary_outcome, false, &mut stats)?;
        stats.primary = papers.len();
        stats.secondary = secondary.len();
        papers.extend(secondary);

        if stats.degraded_sources.len() == 2 {
            warn!(query, "every provider failed; nothing saved, freshness record left unchanged");
            return Ok(stats);
        }

        if cancel.is_cancelled() {
            return Err(IngestionError::Cancelled);
        }
        stats.persisted = self.storage.save_papers(&papers).await?;
        debug!(
            fetched = stats.fetched(),
            persisted = stats.persisted,
            "saved fetched papers"
        );

        if cancel.is_cancelled() {
            return Err(IngestionError::Cancelled);
        }
        self.storage.set_last_fetched(query, clock.now()).await?;
        stats.timestamp_updated = true;

        info!(
            query,
            primary = stats.primary,
            secondary = stats.secondary,
            persisted = stats.persisted,
            degraded = stats.degraded_sources.len(),
            "refresh complete"
        );
        Ok(stats)
    }
}
