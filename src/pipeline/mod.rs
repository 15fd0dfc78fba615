//! Result pipeline: rank, truncate, summarize.
//!
//! The pipeline trusts its collaborators only as far as their contracts go:
//! a ranking must be a permutation of the candidates, and the summarizer must
//! return one summary per abstract. Anything else is reported as a
//! [`PipelineError::ContractViolation`] rather than silently patched.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::models::{DigestEntry, Paper};
use crate::ranking::{Ranker, RankingError};
use crate::summarize::{SummarizeError, Summarizer};

/// Errors produced while turning candidates into digest entries.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Ranking failed: {0}")]
    Ranking(#[from] RankingError),

    #[error("Summarization failed: {0}")]
    Summarize(#[from] SummarizeError),

    /// A collaborator returned output of the wrong shape
    #[error("Collaborator contract violated: {0}")]
    ContractViolation(String),

    #[error("Pipeline cancelled")]
    Cancelled,
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

pub struct ResultPipeline {
    ranker: Arc<dyn Ranker>,
    summarizer: Arc<dyn Summarizer>,
    top_k: usize,
}

impl ResultPipeline {
    pub fn new(ranker: Arc<dyn Ranker>, summarizer: Arc<dyn Summarizer>, top_k: usize) -> Self {
        Self {
            ranker,
            summarizer,
            top_k,
        }
    }

    /// Rank `candidates` for `query`, keep the best `top_k`, and summarize them.
    ///
    /// Empty candidates produce an empty digest without calling either
    /// collaborator.
    pub async fn present(
        &self,
        query: &str,
        candidates: Vec<Paper>,
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<DigestEntry>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let candidate_count = candidates.len();
        let mut ranked = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            ranked = self.ranker.rank(query, candidates) => ranked?,
        };
        if ranked.len() != candidate_count {
            return Err(PipelineError::ContractViolation(format!(
                "ranker returned {} papers for {} candidates",
                ranked.len(),
                candidate_count
            )));
        }
        ranked.truncate(self.top_k);

        let abstracts: Vec<String> = ranked.iter().map(|p| p.abstract_text.clone()).collect();
        let summaries = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            summaries = self.summarizer.summarize(&abstracts) => summaries?,
        };
        if summaries.len() != ranked.len() {
            return Err(PipelineError::ContractViolation(format!(
                "summarizer returned {} summaries for {} abstracts",
                summaries.len(),
                ranked.len()
            )));
        }

        debug!(candidates = candidate_count, presented = ranked.len(), "pipeline complete");
        Ok(ranked
            .into_iter()
            .zip(summaries)
            .map(|(paper, summary)| DigestEntry { paper, summary })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TOP_K;
    use crate::ranking::RankingResult;
    use crate::summarize::SummarizeResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Reverses the input, or drops the last paper when `drop_one` is set.
    struct MockRanker {
        calls: Arc<Mutex<usize>>,
        drop_one: bool,
    }

    impl MockRanker {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(0)),
                drop_one: false,
            }
        }
    }

    #[async_trait]
    impl Ranker for MockRanker {
        async fn rank(&self, _query: &str, mut candidates: Vec<Paper>) -> RankingResult<Vec<Paper>> {
            *self.calls.lock().unwrap() += 1;
            candidates.reverse();
            if self.drop_one {
                candidates.pop();
            }
            Ok(candidates)
        }
    }

    /// Records every batch it receives; echoes "summary of <abstract>".
    /// With `cancel_and_hang` set it fires the token and never answers.
    struct MockSummarizer {
        batches: Arc<Mutex<Vec<Vec<String>>>>,
        short_by: usize,
        cancel_and_hang: Option<CancellationToken>,
    }

    impl MockSummarizer {
        fn new() -> Self {
            Self {
                batches: Arc::new(Mutex::new(Vec::new())),
                short_by: 0,
                cancel_and_hang: None,
            }
        }
    }

    #[async_trait]
    impl Summarizer for MockSummarizer {
        async fn summarize(&self, abstracts: &[String]) -> SummarizeResult<Vec<String>> {
            self.batches.lock().unwrap().push(abstracts.to_vec());
            if let Some(cancel) = &self.cancel_and_hang {
                cancel.cancel();
                std::future::pending::<()>().await;
            }
            let keep = abstracts.len().saturating_sub(self.short_by);
            Ok(abstracts[..keep].iter().map(|a| format!("summary of {a}")).collect())
        }
    }

    fn candidates(n: usize) -> Vec<Paper> {
        (0..n)
            .map(|i| Paper::new(format!("p{i}"), format!("Title {i}"), "arXiv", format!("abstract {i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_truncates_to_top_k_and_keeps_rank_order() {
        let summarizer = MockSummarizer::new();
        let batches = summarizer.batches.clone();
        let pipeline = ResultPipeline::new(Arc::new(MockRanker::new()), Arc::new(summarizer), TOP_K);

        let entries = pipeline
            .present("q", candidates(12), &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = entries.iter().map(|e| e.paper.id.as_str()).collect();
        assert_eq!(ids, vec!["p11", "p10", "p9", "p8", "p7"]);
        assert_eq!(entries[0].summary, "summary of abstract 11");

        let batches = batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), TOP_K);
        assert_eq!(batches[0][4], "abstract 7");
    }

    #[tokio::test]
    async fn test_fewer_candidates_than_top_k() {
        let pipeline = ResultPipeline::new(
            Arc::new(MockRanker::new()),
            Arc::new(MockSummarizer::new()),
            TOP_K,
        );
        let entries = pipeline
            .present("q", candidates(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(entries.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_candidates_call_nobody() {
        let ranker = MockRanker::new();
        let ranker_calls = ranker.calls.clone();
        let summarizer = MockSummarizer::new();
        let batches = summarizer.batches.clone();
        let pipeline = ResultPipeline::new(Arc::new(ranker), Arc::new(summarizer), TOP_K);

        let entries = pipeline
            .present("q", Vec::new(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(entries.is_empty());
        assert_eq!(*ranker_calls.lock().unwrap(), 0);
        assert!(batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ranker_dropping_papers_is_contract_violation() {
        let ranker = MockRanker {
            drop_one: true,
            ..MockRanker::new()
        };
        let pipeline = ResultPipeline::new(Arc::new(ranker), Arc::new(MockSummarizer::new()), TOP_K);

        let err = pipeline
            .present("q", candidates(4), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ContractViolation(_)));
    }

    #[tokio::test]
    async fn test_short_summary_list_is_contract_violation() {
        let summarizer = MockSummarizer {
            short_by: 1,
            ..MockSummarizer::new()
        };
        let pipeline = ResultPipeline::new(Arc::new(MockRanker::new()), Arc::new(summarizer), TOP_K);

        let err = pipeline
            .present("q", candidates(8), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ContractViolation(msg) if msg.contains("4 summaries for 5")));
    }

    #[tokio::test]
    async fn test_cancelled_before_ranking() {
        let ranker = MockRanker::new();
        let ranker_calls = ranker.calls.clone();
        let pipeline = ResultPipeline::new(Arc::new(ranker), Arc::new(MockSummarizer::new()), TOP_K);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = pipeline.present("q", candidates(2), &cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(*ranker_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_summarizing() {
        let cancel = CancellationToken::new();
        let ranker = MockRanker::new();
        let ranker_calls = ranker.calls.clone();
        let summarizer = MockSummarizer {
            cancel_and_hang: Some(cancel.clone()),
            ..MockSummarizer::new()
        };
        let batches = summarizer.batches.clone();
        let pipeline = ResultPipeline::new(Arc::new(ranker), Arc::new(summarizer), TOP_K);

        let err = pipeline.present("q", candidates(3), &cancel).await.unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert_eq!(*ranker_calls.lock().unwrap(), 1);
        assert_eq!(batches.lock().unwrap().len(), 1);
    }
}
