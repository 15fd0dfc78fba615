//! Query orchestration.
//!
//! [`ResearchEngine`] drives one query through its stages:
//!
//! ```text
//! validate -> freshness check -> [stale: ingest] -> resolve candidates
//!          -> [empty: no results] -> rank + truncate -> summarize -> digest
//! ```
//!
//! Every collaborator is injected, so the engine can be exercised end to end
//! with in-memory storage and mock providers.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use crate::clock::{Clock, FixedClock, SystemClock};
use crate::config::DigestConfig;
use crate::freshness::FreshnessGate;
use crate::ingestion::{IngestionCoordinator, IngestionError};
use crate::models::DigestEntry;
use crate::pipeline::{PipelineError, ResultPipeline};
use crate::provider::PaperProvider;
use crate::ranking::Ranker;
use crate::resolver::CandidateResolver;
use crate::storage::{PaperStorage, StorageError};
use crate::summarize::Summarizer;

/// Successful result of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Ranked, summarized papers, most relevant first
    Digest(Vec<DigestEntry>),

    /// The store holds nothing to show
    NoResults,
}

/// Errors that end a query.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The query was rejected before any work was done
    #[error("Invalid query: {0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ingestion(IngestionError),

    #[error(transparent)]
    Pipeline(PipelineError),

    #[error("Query cancelled")]
    Cancelled,
}

impl From<IngestionError> for EngineError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Cancelled => EngineError::Cancelled,
            other => EngineError::Ingestion(other),
        }
    }
}

impl From<PipelineError> for EngineError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Cancelled => EngineError::Cancelled,
            other => EngineError::Pipeline(other),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Answers research queries.
pub struct ResearchEngine {
    gate: FreshnessGate,
    ingestion: IngestionCoordinator,
    resolver: CandidateResolver,
    pipeline: ResultPipeline,
    clock: Arc<dyn Clock>,
}

impl ResearchEngine {
    /// Wire the engine from its collaborators.
    ///
    /// `primary` is the arXiv-style source; `secondary` is the
    /// Semantic-Scholar-style source. Which one is strict is decided by
    /// `config.ingestion.failure_policy`.
    pub fn new(
        storage: Arc<dyn PaperStorage>,
        primary: Arc<dyn PaperProvider>,
        secondary: Arc<dyn PaperProvider>,
        ranker: Arc<dyn Ranker>,
        summarizer: Arc<dyn Summarizer>,
        config: &DigestConfig,
    ) -> Self {
        Self {
            gate: FreshnessGate::new(storage.clone(), config.freshness.stale_after_secs),
            ingestion: IngestionCoordinator::new(
                storage.clone(),
                primary,
                secondary,
                config.ingestion.failure_policy,
            ),
            resolver: CandidateResolver::new(storage, config.top_k),
            pipeline: ResultPipeline::new(ranker, summarizer, config.top_k),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run `text` through the full query flow.
    ///
    /// The query is trimmed; the trimmed text is also the freshness key.
    ///
    /// # Errors
    /// - `EngineError::Validation` for a blank query (nothing else is touched)
    /// - `EngineError::Storage` when the freshness check or candidate lookup fails
    /// - `EngineError::Ingestion` when a refresh aborts
    /// - `EngineError::Pipeline` when ranking or summarization fails
    /// - `EngineError::Cancelled` when `cancel` fires
    pub async fn handle_query(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> EngineResult<QueryOutcome> {
        let query = text.trim();
        if query.is_empty() {
            return Err(EngineError::Validation("query is empty".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let now = self.clock.now();
        let stale = self.gate.is_stale(query, now).await?;
        info!(query, stale, "freshness checked");

        if stale {
            let stats = self.ingestion.refresh(query, self.clock.as_ref(), cancel).await?;
            if !stats.degraded_sources.is_empty() {
                warn!(query, degraded = ?stats.degraded_sources, "refresh completed with degraded sources");
            }
        }

        let candidates = self.resolver.resolve(query).await?;
        info!(query, candidates = candidates.len(), "candidates resolved");
        if candidates.is_empty() {
            return Ok(QueryOutcome::NoResults);
        }

        let entries = self.pipeline.present(query, candidates, cancel).await?;
        if entries.is_empty() {
            return Ok(QueryOutcome::NoResults);
        }
        debug!(query, presented = entries.len(), "digest ready");
        Ok(QueryOutcome::Digest(entries))
    }
}
