//! Runtime configuration.
//!
//! Configuration is read from an optional TOML file. Every section has
//! defaults, so an empty file (or no file at all) yields a working setup that
//! stores papers locally, queries arXiv and Semantic Scholar, ranks by keyword
//! overlap and summarizes extractively.
//!
//! ```toml
//! top_k = 5
//!
//! [freshness]
//! stale_after_secs = 604800
//!
//! [ingestion]
//! failure_policy = "symmetric"
//!
//! [summarizer]
//! kind = "openai"
//! model = "gpt-4o-mini"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Number of papers kept after ranking and sent to summarization.
pub const TOP_K: usize = 5;

/// Cached results older than this are refreshed (one week).
pub const DEFAULT_STALE_SECONDS: i64 = 7 * 24 * 3600;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the ingestion coordinator treats a failing fetcher.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Either fetcher failing degrades to an empty contribution
    #[default]
    Symmetric,

    /// A primary fetcher failure aborts the refresh; secondary failures degrade
    StrictPrimary,
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Number of ranked papers to summarize
    pub top_k: usize,

    /// SQLite database path; `None` uses the platform data directory
    pub database_path: Option<PathBuf>,

    pub freshness: FreshnessConfig,
    pub ingestion: IngestionConfig,
    pub arxiv: ArxivConfig,
    pub semantic_scholar: SemanticScholarConfig,
    pub ranking: RankingConfig,
    pub summarizer: SummarizerConfig,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            top_k: TOP_K,
            database_path: None,
            freshness: FreshnessConfig::default(),
            ingestion: IngestionConfig::default(),
            arxiv: ArxivConfig::default(),
            semantic_scholar: SemanticScholarConfig::default(),
            ranking: RankingConfig::default(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

impl DigestConfig {
    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be at least 1".to_string()));
        }
        if self.freshness.stale_after_secs < 0 {
            return Err(ConfigError::Invalid(
                "freshness.stale_after_secs cannot be negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ranking.semantic_weight) {
            return Err(ConfigError::Invalid(
                "ranking.semantic_weight must be within [0, 1]".to_string(),
            ));
        }
        if self.ranking.embedding_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "ranking.embedding_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved database path, falling back to `<data_dir>/paper-digest/papers.db`.
    pub fn resolved_database_path(&self) -> PathBuf {
        self.database_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("paper-digest")
                .join("papers.db")
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    /// Maximum age in seconds before cached results are refreshed
    pub stale_after_secs: i64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: DEFAULT_STALE_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArxivConfig {
    pub base_url: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: "https://export.arxiv.org".to_string(),
            max_results: 10,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SemanticScholarConfig {
    pub base_url: String,
    pub max_results: usize,
    pub timeout_secs: u64,
    /// Optional API key; `SEMANTIC_SCHOLAR_API_KEY` is used when unset
    pub api_key: Option<String>,
}

impl Default for SemanticScholarConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.semanticscholar.org".to_string(),
            max_results: 10,
            timeout_secs: 15,
            api_key: None,
        }
    }
}

/// Which ranker the binary wires in.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankerKind {
    /// Token overlap only, no model required
    #[default]
    Keyword,
    /// Embedding similarity blended with token overlap
    Hybrid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub kind: RankerKind,

    /// Weight of the semantic score in the hybrid blend
    pub semantic_weight: f32,

    /// Embedding model for hybrid ranking; `text-embedding-*` names use the
    /// OpenAI API, anything else (or unset) uses the local FastEmbed model
    pub embedding_model: Option<String>,

    /// Inputs per OpenAI embeddings request
    pub embedding_batch_size: usize,

    /// FastEmbed model cache directory
    pub cache_dir: Option<PathBuf>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            kind: RankerKind::default(),
            semantic_weight: 0.7,
            embedding_model: None,
            embedding_batch_size: 2048,
            cache_dir: None,
        }
    }
}

/// Which summarizer the binary wires in.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummarizerKind {
    /// Leading sentences of the abstract
    #[default]
    Extractive,
    /// OpenAI-compatible chat completions (needs `OPENAI_API_KEY`)
    Openai,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub kind: SummarizerKind,
    pub max_sentences: usize,
    pub max_chars: usize,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            kind: SummarizerKind::default(),
            max_sentences: 2,
            max_chars: 400,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 30,
        }
    }
}
