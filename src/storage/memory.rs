//! In-memory storage implementation.
//!
//! Keeps papers in insertion order and freshness records in a map. Useful for
//! ephemeral sessions where nothing should touch disk.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{match_key, PaperStorage, StorageError, StorageResult};
use crate::models::Paper;

#[derive(Default)]
struct MemoryState {
    papers: Vec<Paper>,
    ids: HashSet<String>,
    freshness: HashMap<String, i64>,
}

/// Process-local paper store.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with papers.
    pub fn with_papers(papers: Vec<Paper>) -> Self {
        let ids = papers.iter().map(|p| p.id.clone()).collect();
        Self {
            state: Mutex::new(MemoryState {
                papers,
                ids,
                freshness: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Other("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl PaperStorage for MemoryStorage {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn get_last_fetched(&self, query: &str) -> StorageResult<Option<i64>> {
        Ok(self.lock()?.freshness.get(query).copied())
    }

    async fn set_last_fetched(&self, query: &str, timestamp: i64) -> StorageResult<()> {
        self.lock()?.freshness.insert(query.to_string(), timestamp);
        Ok(())
    }

    async fn query_by_text(&self, query: &str) -> StorageResult<Vec<Paper>> {
        let needle = match_key(query);
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let state = self.lock()?;
        Ok(state
            .papers
            .iter()
            .filter(|p| match_key(&p.title).contains(&needle) || match_key(&p.abstract_text).contains(&needle))
            .cloned()
            .collect())
    }

    async fn get_all_papers(&self) -> StorageResult<Vec<Paper>> {
        Ok(self.lock()?.papers.clone())
    }

    async fn save_papers(&self, papers: &[Paper]) -> StorageResult<usize> {
        let mut state = self.lock()?;
        let mut inserted = 0;
        for paper in papers {
            if state.ids.insert(paper.id.clone()) {
                state.papers.push(paper.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn count_papers(&self) -> StorageResult<usize> {
        Ok(self.lock()?.papers.len())
    }
}
