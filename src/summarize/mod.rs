//! Abstract summarization.
//!
//! A [`Summarizer`] turns a list of abstracts into exactly one summary per
//! abstract, in the same order. The local [`ExtractiveSummarizer`] keeps the
//! leading sentences of each abstract; [`openai::ChatSummarizer`] asks an
//! OpenAI-compatible chat model.

pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Placeholder summary for a paper that has no abstract.
pub const NO_ABSTRACT: &str = "No abstract available.";

/// Errors that can occur during summarization.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Network or API communication error
    #[error("API request failed: {0}")]
    ApiError(String),

    /// The model returned no usable text
    #[error("Empty summary returned for abstract {index}")]
    EmptyResponse { index: usize },

    /// Configuration error (e.g., missing API key)
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for summarization operations.
pub type SummarizeResult<T> = Result<T, SummarizeError>;

/// Produces one summary per abstract.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `abstracts`.
    ///
    /// # Returns
    /// Summaries in the same order, one per input
    async fn summarize(&self, abstracts: &[String]) -> SummarizeResult<Vec<String>>;
}

/// Keeps the first sentences of each abstract, bounded in characters.
#[derive(Debug, Clone)]
pub struct ExtractiveSummarizer {
    max_sentences: usize,
    max_chars: usize,
}

impl ExtractiveSummarizer {
    pub fn new(max_sentences: usize, max_chars: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
            max_chars: max_chars.max(1),
        }
    }

    /// Summarize a single abstract.
    pub fn summarize_one(&self, abstract_text: &str) -> String {
        let text = crate::embedding::normalize_whitespace(abstract_text);
        if text.is_empty() {
            return NO_ABSTRACT.to_string();
        }

        let lead: Vec<&str> = split_sentences(&text)
            .into_iter()
            .take(self.max_sentences)
            .collect();
        truncate_chars(&lead.join(" "), self.max_chars)
    }
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self::new(2, 400)
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, abstracts: &[String]) -> SummarizeResult<Vec<String>> {
        Ok(abstracts.iter().map(|a| self.summarize_one(a)).collect())
    }
}

/// Split text after `.`, `!` or `?` when followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_i, next_c)) = chars.peek() {
                if next_c.is_whitespace() {
                    let sentence = text[start..i + c.len_utf8()].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = next_i;
                }
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Cut `text` to at most `max_chars` characters, preferring a word boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    let trimmed = match cut.rfind(' ') {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}...", trimmed.trim_end_matches(&[',', ';', ':', ' '][..]))
}
