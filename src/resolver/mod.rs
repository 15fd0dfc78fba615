//! Candidate resolver.
//!
//! Pulls the locally stored papers a query should be ranked against. When
//! the query-specific match set is smaller than the number of results we
//! want to show, the whole corpus is used instead ("widening"), so the
//! ranker always has enough material to fill the digest.

use std::sync::Arc;

use tracing::debug;

use crate::models::Paper;
use crate::storage::{PaperStorage, StorageResult};

pub struct CandidateResolver {
    storage: Arc<dyn PaperStorage>,
    top_k: usize,
}

impl CandidateResolver {
    pub fn new(storage: Arc<dyn PaperStorage>, top_k: usize) -> Self {
        Self { storage, top_k }
    }

    /// Candidates for `query`; empty only when the store is empty.
    pub async fn resolve(&self, query: &str) -> StorageResult<Vec<Paper>> {
        let matches = self.storage.query_by_text(query).await?;
        if matches.len() >= self.top_k {
            debug!(matches = matches.len(), "using query matches");
            return Ok(matches);
        }

        let corpus = self.storage.get_all_papers().await?;
        debug!(
            matches = matches.len(),
            corpus = corpus.len(),
            "too few matches; widening to full corpus"
        );
        Ok(corpus)
    }
}
