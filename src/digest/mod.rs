//! Presentation boundary.
//!
//! Collapses every way a query can end into one of four user-visible
//! outcomes and renders them. Internal error detail is logged here and never
//! shown to the user.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::engine::{EngineError, EngineResult, QueryOutcome};
use crate::models::DigestEntry;

pub const PROMPT_FOR_INPUT_MESSAGE: &str = "Please enter a search query.";
pub const NO_RESULTS_MESSAGE: &str = "No results found.";
pub const FAILURE_MESSAGE: &str = "Something went wrong while searching. Please try again.";

/// What the user gets to see for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayableResult {
    /// The query was blank
    PromptForInput,

    /// Ranked and summarized papers
    Digest(Vec<DigestEntry>),

    /// Nothing stored matched or could be shown
    NoResults,

    /// Any internal failure
    Failure,
}

impl DisplayableResult {
    /// Map an engine result to exactly one outcome.
    pub fn from_outcome(result: EngineResult<QueryOutcome>) -> Self {
        match result {
            Ok(QueryOutcome::Digest(entries)) if !entries.is_empty() => Self::Digest(entries),
            Ok(QueryOutcome::Digest(_)) | Ok(QueryOutcome::NoResults) => Self::NoResults,
            Err(EngineError::Validation(_)) => Self::PromptForInput,
            Err(e) => {
                error!(error = %e, "query failed");
                Self::Failure
            }
        }
    }

    /// Render as markdown.
    ///
    /// Each entry is `**title**`, `*source*`, a blank line, then the summary;
    /// entries are separated by a blank line.
    pub fn render_markdown(&self) -> String {
        match self {
            Self::PromptForInput => PROMPT_FOR_INPUT_MESSAGE.to_string(),
            Self::NoResults => NO_RESULTS_MESSAGE.to_string(),
            Self::Failure => FAILURE_MESSAGE.to_string(),
            Self::Digest(entries) => entries
                .iter()
                .map(|e| format!("**{}**\n*{}*\n\n{}", e.paper.title, e.paper.source, e.summary))
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    /// Machine-readable form of this outcome.
    pub fn to_response(&self, query: &str) -> DigestResponse {
        let (status, results, message): (_, Vec<DigestEntryDto>, _) = match self {
            Self::Digest(entries) => (
                DigestStatus::Ok,
                entries.iter().cloned().map(DigestEntryDto::from).collect(),
                None,
            ),
            Self::PromptForInput => (
                DigestStatus::EmptyQuery,
                Vec::new(),
                Some(PROMPT_FOR_INPUT_MESSAGE.to_string()),
            ),
            Self::NoResults => (
                DigestStatus::NoResults,
                Vec::new(),
                Some(NO_RESULTS_MESSAGE.to_string()),
            ),
            Self::Failure => (DigestStatus::Error, Vec::new(), Some(FAILURE_MESSAGE.to_string())),
        };
        DigestResponse {
            count: results.len(),
            results,
            query: query.trim().to_string(),
            status,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestStatus {
    Ok,
    EmptyQuery,
    NoResults,
    Error,
}

/// JSON response for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestResponse {
    pub status: DigestStatus,

    /// Digest entries, most relevant first
    pub results: Vec<DigestEntryDto>,

    /// Total number of results returned
    pub count: usize,

    /// The query text, trimmed
    pub query: String,

    /// User-facing message for non-digest outcomes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Flattened digest entry for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestEntryDto {
    pub id: String,
    pub title: String,

    /// Comma-separated author names
    pub authors: String,
    pub source: String,
    pub summary: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<DigestEntry> for DigestEntryDto {
    fn from(entry: DigestEntry) -> Self {
        let authors = entry.paper.author_names();
        Self {
            id: entry.paper.id,
            title: entry.paper.title,
            authors,
            source: entry.paper.source,
            summary: entry.summary,
            publish_year: entry.paper.publish_year,
            url: entry.paper.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::IngestionError;
    use crate::models::Paper;
    use crate::pipeline::PipelineError;
    use crate::storage::StorageError;

    fn entry(title: &str, source: &str, summary: &str) -> DigestEntry {
        DigestEntry {
            paper: Paper::new(format!("id-{title}"), title, source, "abstract"),
            summary: summary.to_string(),
        }
    }

    #[test]
    fn test_render_digest_blocks() {
        let result = DisplayableResult::Digest(vec![
            entry("Attention Is All You Need", "arXiv", "Transformers."),
            entry("BERT", "NAACL", "Bidirectional pretraining."),
        ]);
        assert_eq!(
            result.render_markdown(),
            "**Attention Is All You Need**\n*arXiv*\n\nTransformers.\n\n**BERT**\n*NAACL*\n\nBidirectional pretraining."
        );
    }

    #[test]
    fn test_fixed_messages() {
        assert_eq!(DisplayableResult::PromptForInput.render_markdown(), PROMPT_FOR_INPUT_MESSAGE);
        assert_eq!(DisplayableResult::NoResults.render_markdown(), NO_RESULTS_MESSAGE);
        assert_eq!(DisplayableResult::Failure.render_markdown(), FAILURE_MESSAGE);
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            DisplayableResult::from_outcome(Err(EngineError::Validation("empty".into()))),
            DisplayableResult::PromptForInput
        );
        assert_eq!(
            DisplayableResult::from_outcome(Ok(QueryOutcome::NoResults)),
            DisplayableResult::NoResults
        );
        assert_eq!(
            DisplayableResult::from_outcome(Ok(QueryOutcome::Digest(Vec::new()))),
            DisplayableResult::NoResults
        );
        assert!(matches!(
            DisplayableResult::from_outcome(Ok(QueryOutcome::Digest(vec![entry("t", "s", "x")]))),
            DisplayableResult::Digest(ref e) if e.len() == 1
        ));
    }

    #[test]
    fn test_every_internal_error_is_failure() {
        let errors = vec![
            EngineError::Storage(StorageError::QueryError("disk".into())),
            EngineError::Ingestion(IngestionError::Persistence(StorageError::Other("x".into()))),
            EngineError::Pipeline(PipelineError::ContractViolation("short".into())),
            EngineError::Cancelled,
        ];
        for err in errors {
            assert_eq!(DisplayableResult::from_outcome(Err(err)), DisplayableResult::Failure);
        }
    }

    #[test]
    fn test_json_response() {
        let mut e = entry("Title", "arXiv", "Sum");
        e.paper.url = Some("https://arxiv.org/abs/1".into());
        let response = DisplayableResult::Digest(vec![e]).to_response("  q ");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["count"], 1);
        assert_eq!(json["query"], "q");
        assert_eq!(json["results"][0]["url"], "https://arxiv.org/abs/1");
        assert!(json.get("message").is_none());

        let failure = DisplayableResult::Failure.to_response("q");
        assert_eq!(failure.status, DigestStatus::Error);
        assert_eq!(failure.message.as_deref(), Some(FAILURE_MESSAGE));
    }
}
