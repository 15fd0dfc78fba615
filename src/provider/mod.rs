//! Paper provider module.
//!
//! This module defines the interface for fetching paper metadata from
//! external sources and includes HTTP implementations for arXiv and Semantic
//! Scholar.
//!
//! Providers are unreliable by nature (network errors, malformed payloads,
//! rate limiting). Callers that must not abort on a provider failure turn each
//! call into a [`FetchOutcome`] with [`fetch_outcome`], which makes the
//! degrade-vs-abort decision an explicit branch instead of a swallowed error.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Paper;

pub mod arxiv;
pub mod semantic_scholar;

/// Errors that can occur when fetching papers from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to parse the response payload
    #[error("Parse error: {0}")]
    ParseError(String),

    /// API rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Network or connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Unexpected HTTP status
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::ParseError(e.to_string())
        } else {
            ProviderError::NetworkError(e.to_string())
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for fetching paper metadata for a query from an external source.
///
/// Providers return papers with stable ids. They do not deduplicate and do
/// not retry; both concerns belong elsewhere.
#[async_trait]
pub trait PaperProvider: Send + Sync {
    /// Fetch papers matching `query`.
    ///
    /// # Errors
    /// Returns `ProviderError` on network, status or format failures
    async fn fetch_papers(&self, query: &str) -> ProviderResult<Vec<Paper>>;

    /// Human-readable name of this provider, used in logs.
    fn name(&self) -> &str;
}

/// Result of one fetch call, with failure made explicit.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The provider answered
    Fetched(Vec<Paper>),

    /// The provider failed; its contribution counts as empty
    Degraded {
        source: String,
        error: ProviderError,
    },
}

/// Call `provider` and capture failure as [`FetchOutcome::Degraded`].
pub async fn fetch_outcome(provider: &dyn PaperProvider, query: &str) -> FetchOutcome {
    match provider.fetch_papers(query).await {
        Ok(papers) => FetchOutcome::Fetched(papers),
        Err(error) => FetchOutcome::Degraded {
            source: provider.name().to_string(),
            error,
        },
    }
}

/// Build the shared HTTP client used by the providers.
pub(crate) fn http_client(timeout_secs: u64) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("paper-digest/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        result: Option<Vec<Paper>>,
    }

    #[async_trait]
    impl PaperProvider for FixedProvider {
        async fn fetch_papers(&self, _query: &str) -> ProviderResult<Vec<Paper>> {
            self.result
                .clone()
                .ok_or_else(|| ProviderError::NetworkError("connection reset".to_string()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_fetch_outcome_success() {
        let provider = FixedProvider {
            result: Some(vec![Paper::new("1", "T", "S", "A")]),
        };
        let outcome = fetch_outcome(&provider, "q").await;
        assert!(matches!(outcome, FetchOutcome::Fetched(ref papers) if papers.len() == 1));
    }

    #[tokio::test]
    async fn test_fetch_outcome_failure_is_degraded() {
        let provider = FixedProvider { result: None };
        let outcome = fetch_outcome(&provider, "q").await;
        match outcome {
            FetchOutcome::Degraded { source, error } => {
                assert_eq!(source, "fixed");
                assert!(matches!(error, ProviderError::NetworkError(_)));
            }
            FetchOutcome::Fetched(_) => panic!("Expected Degraded"),
        }
    }
}
