//! Storage layer abstraction and implementations.
//!
//! This module defines the interface for persisting and retrieving paper
//! metadata together with the per-query freshness records that drive cache
//! refresh. The abstraction allows different backends (SQLite, in-memory)
//! while the orchestration code stays unchanged.
//!
//! # Consistency
//!
//! Backends are shared across concurrent queries. They must provide
//! read-your-writes consistency per query key: after `set_last_fetched`
//! returns, a following `get_last_fetched` for the same query observes it.
//! No locking across queries is expected; two callers refreshing the same
//! query concurrently both write, and `save_papers` is idempotent on `id`.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Paper;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Data serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Schema or migration error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Other unexpected errors
    #[error("Unexpected storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for paper storage backends.
///
/// Covers both the paper corpus and the query freshness records. All methods
/// take `&self`; backends use interior mutability so a single store can be
/// shared behind an `Arc`.
#[async_trait]
pub trait PaperStorage: Send + Sync {
    /// Initialize the storage (create tables, indexes, etc.).
    ///
    /// This should be idempotent and safe to call multiple times.
    async fn initialize(&self) -> StorageResult<()>;

    /// Epoch seconds of the last successful ingestion for `query`, if any.
    async fn get_last_fetched(&self, query: &str) -> StorageResult<Option<i64>>;

    /// Create or overwrite the freshness record for `query`.
    async fn set_last_fetched(&self, query: &str, timestamp: i64) -> StorageResult<()>;

    /// Papers whose title or abstract contains the query text.
    ///
    /// Matching is case-insensitive on the whitespace-normalized query.
    async fn query_by_text(&self, query: &str) -> StorageResult<Vec<Paper>>;

    /// Every stored paper.
    async fn get_all_papers(&self) -> StorageResult<Vec<Paper>>;

    /// Persist papers, skipping ids that are already stored.
    ///
    /// # Returns
    /// The number of newly inserted papers
    ///
    /// # Errors
    /// Returns `StorageError` if the write fails; in that case no guarantee is
    /// made about partial inserts, but the caller must treat the batch as
    /// not persisted.
    async fn save_papers(&self, papers: &[Paper]) -> StorageResult<usize>;

    /// Get the total count of papers in storage.
    async fn count_papers(&self) -> StorageResult<usize>;
}

/// Lowercased, whitespace-collapsed form used for text matching.
pub(crate) fn match_key(text: &str) -> String {
    crate::embedding::normalize_text(text)
}
