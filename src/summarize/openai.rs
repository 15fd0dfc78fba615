//! OpenAI-compatible chat summarizer.
//!
//! Sends one `/chat/completions` request per abstract and keeps the
//! first choice's message content as the summary.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{SummarizeError, SummarizeResult, Summarizer, NO_ABSTRACT};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "Summarize the research abstract you are given in two \
or three plain sentences for a reader deciding whether to open the paper.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions summarizer.
#[derive(Debug, Clone)]
pub struct ChatSummarizer {
    http: reqwest::Client,

    api_key: String,

    base_url: String,

    /// Model identifier (e.g., "gpt-4o-mini")
    model: String,
}

impl ChatSummarizer {
    /// Create a new chat summarizer.
    ///
    /// # Arguments
    /// * `api_key` - API key sent as a bearer token
    /// * `model` - Model name (defaults to "gpt-4o-mini" if None)
    /// * `timeout_secs` - Per-request timeout
    pub fn new(api_key: String, model: Option<String>, timeout_secs: u64) -> SummarizeResult<Self> {
        if api_key.trim().is_empty() {
            return Err(SummarizeError::ConfigError("API key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SummarizeError::ConfigError(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// Point the summarizer at a different OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn summarize_one(&self, index: usize, abstract_text: &str) -> SummarizeResult<String> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    ChatMessage {
                        role: "user",
                        content: abstract_text,
                    },
                ],
                temperature: 0.2,
            })
            .send()
            .await
            .map_err(|e| SummarizeError::ApiError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizeError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::ApiError(format!("Malformed chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(SummarizeError::EmptyResponse { index })
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, abstracts: &[String]) -> SummarizeResult<Vec<String>> {
        let mut summaries = Vec::with_capacity(abstracts.len());
        for (index, abstract_text) in abstracts.iter().enumerate() {
            if abstract_text.trim().is_empty() {
                summaries.push(NO_ABSTRACT.to_string());
                continue;
            }
            summaries.push(self.summarize_one(index, abstract_text).await?);
        }
        debug!(count = summaries.len(), model = %self.model, "summarized abstracts");
        Ok(summaries)
    }
}
