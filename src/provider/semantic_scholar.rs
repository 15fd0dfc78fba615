//! Semantic Scholar Graph API provider.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{http_client, PaperProvider, ProviderError, ProviderResult};
use crate::config::SemanticScholarConfig;
use crate::embedding::normalize_whitespace;
use crate::models::{Author, Paper};

/// Source label used when a paper carries no venue.
pub const SEMANTIC_SCHOLAR_SOURCE: &str = "Semantic Scholar";

const SEARCH_FIELDS: &str = "paperId,title,abstract,venue,year,authors,url,externalIds";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    paper_id: String,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    venue: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    authors: Vec<HitAuthor>,
    url: Option<String>,
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct HitAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

impl SearchHit {
    /// Convert to a paper; hits without a title or abstract are dropped.
    fn into_paper(self) -> Option<Paper> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let abstract_text = self.abstract_text.filter(|a| !a.trim().is_empty())?;

        // arXiv-hosted papers share the arXiv id so both sources dedupe to one record.
        let id = match self.external_ids.and_then(|ids| ids.arxiv) {
            Some(arxiv_id) => format!("arxiv:{}", arxiv_id),
            None => format!("s2:{}", self.paper_id),
        };
        let source = self
            .venue
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| SEMANTIC_SCHOLAR_SOURCE.to_string());

        Some(Paper {
            id,
            title: normalize_whitespace(&title),
            authors: self
                .authors
                .into_iter()
                .filter_map(|a| a.name)
                .map(Author::named)
                .collect(),
            source,
            abstract_text: normalize_whitespace(&abstract_text),
            publish_year: self.year,
            url: self.url,
        })
    }
}

/// Fetches papers from the Semantic Scholar paper search endpoint.
#[derive(Debug, Clone)]
pub struct SemanticScholarProvider {
    http: reqwest::Client,
    base_url: String,
    max_results: usize,
    api_key: Option<String>,
}

impl SemanticScholarProvider {
    /// Create a provider from configuration. `api_key` overrides the config value.
    pub fn new(config: &SemanticScholarConfig, api_key: Option<String>) -> ProviderResult<Self> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
            api_key: api_key.or_else(|| config.api_key.clone()),
        })
    }
}

/// Parse a paper search response body.
pub fn parse_search_response(body: &str) -> ProviderResult<Vec<Paper>> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::ParseError(e.to_string()))?;
    let total = response.data.len();
    let papers: Vec<Paper> = response.data.into_iter().filter_map(SearchHit::into_paper).collect();
    if papers.len() < total {
        debug!(dropped = total - papers.len(), "skipped hits without title or abstract");
    }
    Ok(papers)
}

#[async_trait]
impl PaperProvider for SemanticScholarProvider {
    async fn fetch_papers(&self, query: &str) -> ProviderResult<Vec<Paper>> {
        let limit = self.max_results.to_string();
        let mut request = self
            .http
            .get(format!("{}/graph/v1/paper/search", self.base_url))
            .query(&[("query", query), ("limit", limit.as_str()), ("fields", SEARCH_FIELDS)]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimitExceeded(SEMANTIC_SCHOLAR_SOURCE.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        parse_search_response(&body)
    }

    fn name(&self) -> &str {
        SEMANTIC_SCHOLAR_SOURCE
    }
}
