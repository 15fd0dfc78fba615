//! Paper Digest - answer research queries with a short, summarized reading list.
//!
//! A query is answered from a local paper store. When the store's copy of a
//! query is missing or older than the staleness threshold, it is first
//! refreshed from arXiv and Semantic Scholar. The best matches are then
//! ranked, cut to the top results, and each abstract is summarized.
//!
//! # Architecture
//!
//! - **models**: Core data structures (Paper, Author, DigestEntry, ...)
//! - **clock**: Injectable time source
//! - **config**: TOML configuration with defaults for every section
//! - **storage**: Paper and freshness persistence (SQLite and in-memory)
//! - **provider**: External paper sources (arXiv, Semantic Scholar)
//! - **freshness**: Staleness rule and store-backed gate
//! - **ingestion**: Concurrent fetch-and-persist refresh
//! - **resolver**: Candidate lookup with widening to the whole corpus
//! - **embedding**: Text embeddings and normalization helpers
//! - **ranking**: Keyword and hybrid semantic rankers
//! - **summarize**: Extractive and chat-model summarizers
//! - **pipeline**: Rank, truncate, summarize
//! - **engine**: Query orchestration
//! - **digest**: User-facing outcomes and rendering
//!
//! # Workflow
//!
//! 1. Trim and validate the query
//! 2. Check the freshness record for the query
//! 3. If stale, fetch from both sources concurrently, persist, stamp the record
//! 4. Resolve candidates from the store (widen if too few match)
//! 5. Rank, keep the top results, summarize their abstracts
//! 6. Render the digest
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use paper_digest::{
//!     config::DigestConfig,
//!     digest::DisplayableResult,
//!     engine::ResearchEngine,
//!     provider::{arxiv::ArxivProvider, semantic_scholar::SemanticScholarProvider},
//!     ranking::KeywordRanker,
//!     storage::sqlite::SqliteStorage,
//!     summarize::ExtractiveSummarizer,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DigestConfig::default();
//!     let storage = Arc::new(SqliteStorage::open(config.resolved_database_path()).await?);
//!     let engine = ResearchEngine::new(
//!         storage,
//!         Arc::new(ArxivProvider::new(&config.arxiv)?),
//!         Arc::new(SemanticScholarProvider::new(&config.semantic_scholar, None)?),
//!         Arc::new(KeywordRanker),
//!         Arc::new(ExtractiveSummarizer::default()),
//!         &config,
//!     );
//!
//!     let result = engine.handle_query("graph neural networks", &CancellationToken::new()).await;
//!     println!("{}", DisplayableResult::from_outcome(result).render_markdown());
//!     Ok(())
//! }
//! ```

// Public modules
pub mod clock;
pub mod config;
pub mod digest;
pub mod embedding;
pub mod engine;
pub mod freshness;
pub mod ingestion;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod ranking;
pub mod resolver;
pub mod storage;
pub mod summarize;

// Re-export commonly used types at the crate root
pub use config::{DigestConfig, TOP_K};
pub use digest::DisplayableResult;
pub use embedding::EmbeddingProvider;
pub use clock::{Clock, SystemClock};
pub use engine::{EngineError, QueryOutcome, ResearchEngine};
pub use models::{Author, DigestEntry, Paper};
pub use provider::PaperProvider;
pub use ranking::Ranker;
pub use storage::PaperStorage;
pub use summarize::Summarizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
