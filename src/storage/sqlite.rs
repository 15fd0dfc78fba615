//! SQLite storage implementation.
//!
//! This module provides a SQLite-based implementation of the `PaperStorage`
//! trait using rusqlite. Author lists are stored as JSON text.
//!
//! # Schema
//! - `papers`: paper metadata keyed by the stable paper id, plus normalized
//!   title/abstract columns used for text matching
//! - `query_freshness`: last successful fetch time per query

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{match_key, PaperStorage, StorageError, StorageResult};
use crate::models::{Author, Paper};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS papers (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    id             TEXT NOT NULL UNIQUE,
    title          TEXT NOT NULL,
    authors        TEXT NOT NULL,
    source         TEXT NOT NULL,
    abstract       TEXT NOT NULL,
    publish_year   INTEGER,
    url            TEXT,
    title_key      TEXT NOT NULL,
    abstract_key   TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS query_freshness (
    query          TEXT PRIMARY KEY,
    last_fetched   INTEGER NOT NULL
);
";

const PAPER_COLUMNS: &str = "id, title, authors, source, abstract, publish_year, url";

/// SQLite-based paper storage.
///
/// The connection is opened lazily by `initialize` and guarded by a mutex,
/// so one instance can serve concurrent queries.
pub struct SqliteStorage {
    /// Path to the SQLite database file
    db_path: PathBuf,

    conn: Mutex<Option<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance. Call `initialize` before use.
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            conn: Mutex::new(None),
        }
    }

    /// Open (creating if needed) and initialize the database at `db_path`.
    pub async fn open(db_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let storage = Self::new(db_path);
        storage.initialize().await?;
        Ok(storage)
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::ConnectionError("connection lock poisoned".to_string()))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StorageResult<T>) -> StorageResult<T> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or_else(|| {
            StorageError::ConnectionError("storage not initialized; call initialize() first".to_string())
        })?;
        f(conn)
    }

    fn row_to_paper(row: &Row<'_>) -> rusqlite::Result<(Paper, String)> {
        let authors_json: String = row.get(2)?;
        let paper = Paper {
            id: row.get(0)?,
            title: row.get(1)?,
            authors: Vec::new(),
            source: row.get(3)?,
            abstract_text: row.get(4)?,
            publish_year: row.get(5)?,
            url: row.get(6)?,
        };
        Ok((paper, authors_json))
    }

    fn collect_papers(
        rows: impl Iterator<Item = rusqlite::Result<(Paper, String)>>,
    ) -> StorageResult<Vec<Paper>> {
        let mut papers = Vec::new();
        for row in rows {
            let (mut paper, authors_json) = row.map_err(query_error)?;
            paper.authors = serde_json::from_str::<Vec<Author>>(&authors_json)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?;
            papers.push(paper);
        }
        Ok(papers)
    }
}

fn query_error(e: rusqlite::Error) -> StorageError {
    StorageError::QueryError(e.to_string())
}

#[async_trait]
impl PaperStorage for SqliteStorage {
    async fn initialize(&self) -> StorageResult<()> {
        let mut guard = self.lock()?;
        if guard.is_none() {
            if let Some(parent) = self.db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
                }
            }
            let conn = Connection::open(&self.db_path)
                .map_err(|e| StorageError::ConnectionError(e.to_string()))?;
            debug!(path = %self.db_path.display(), "opened sqlite database");
            *guard = Some(conn);
        }
        if let Some(conn) = guard.as_ref() {
            conn.execute_batch(SCHEMA)
                .map_err(|e| StorageError::SchemaError(e.to_string()))?;
        }
        Ok(())
    }

    async fn get_last_fetched(&self, query: &str) -> StorageResult<Option<i64>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT last_fetched FROM query_freshness WHERE query = ?1",
                params![query],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)
        })
    }

    async fn set_last_fetched(&self, query: &str, timestamp: i64) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO query_freshness (query, last_fetched) VALUES (?1, ?2)
                 ON CONFLICT(query) DO UPDATE SET last_fetched = excluded.last_fetched",
                params![query, timestamp],
            )
            .map_err(query_error)?;
            Ok(())
        })
    }

    async fn query_by_text(&self, query: &str) -> StorageResult<Vec<Paper>> {
        let needle = match_key(query);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {PAPER_COLUMNS} FROM papers
                 WHERE instr(title_key, ?1) > 0 OR instr(abstract_key, ?1) > 0
                 ORDER BY seq"
            );
            let mut stmt = conn.prepare(&sql).map_err(query_error)?;
            let rows = stmt
                .query_map(params![needle], Self::row_to_paper)
                .map_err(query_error)?;
            Self::collect_papers(rows)
        })
    }

    async fn get_all_papers(&self) -> StorageResult<Vec<Paper>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PAPER_COLUMNS} FROM papers ORDER BY seq");
            let mut stmt = conn.prepare(&sql).map_err(query_error)?;
            let rows = stmt.query_map([], Self::row_to_paper).map_err(query_error)?;
            Self::collect_papers(rows)
        })
    }

    async fn save_papers(&self, papers: &[Paper]) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(query_error)?;
            let mut inserted = 0;
            {
                let mut stmt = tx
                    .prepare(
                        "INSERT OR IGNORE INTO papers
                         (id, title, authors, source, abstract, publish_year, url, title_key, abstract_key)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    )
                    .map_err(query_error)?;
                for paper in papers {
                    let authors = serde_json::to_string(&paper.authors)
                        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
                    inserted += stmt
                        .execute(params![
                            paper.id,
                            paper.title,
                            authors,
                            paper.source,
                            paper.abstract_text,
                            paper.publish_year,
                            paper.url,
                            match_key(&paper.title),
                            match_key(&paper.abstract_text),
                        ])
                        .map_err(query_error)?;
                }
            }
            tx.commit().map_err(query_error)?;
            Ok(inserted)
        })
    }

    async fn count_papers(&self) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))
                .map_err(query_error)?;
            Ok(count as usize)
        })
    }
}
