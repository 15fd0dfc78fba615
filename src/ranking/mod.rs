//! Relevance ranking.
//!
//! Rankers order a candidate set by descending relevance to the query. The
//! orchestration only relies on the output being a permutation of the input;
//! how relevance is scored is up to the implementation.
//!
//! Two rankers are provided:
//!
//! - [`KeywordRanker`]: share of query terms found in the title and abstract.
//! - [`HybridRanker`]: cosine similarity between query and paper embeddings,
//!   blended with the keyword score.
//!
//! Both sort stably, so candidates with equal scores keep their input order.

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::embedding::{normalize_text, tokenize, EmbeddingProvider};
use crate::models::Paper;

/// Errors that can occur while ranking.
#[derive(Debug, Error)]
pub enum RankingError {
    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// Other unexpected errors
    #[error("Unexpected ranking error: {0}")]
    Other(String),
}

/// Result type for ranking operations.
pub type RankingResult<T> = Result<T, RankingError>;

/// Orders candidates by descending relevance.
#[async_trait]
pub trait Ranker: Send + Sync {
    /// Rank `candidates` for `query`.
    ///
    /// # Returns
    /// The same papers, most relevant first
    async fn rank(&self, query: &str, candidates: Vec<Paper>) -> RankingResult<Vec<Paper>>;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude.
///
/// # Panics
/// Panics if the vectors have different lengths
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vectors must have the same length");

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product / (norm_a * norm_b)
}

/// Fraction of distinct query terms that occur in the paper's title or abstract.
pub fn keyword_score(query_terms: &HashSet<String>, paper: &Paper) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let paper_terms: HashSet<String> = tokenize(&paper.title)
        .into_iter()
        .chain(tokenize(&paper.abstract_text))
        .collect();
    let hits = query_terms.iter().filter(|t| paper_terms.contains(*t)).count();
    hits as f32 / query_terms.len() as f32
}

/// Sort papers by score, highest first, keeping input order on ties.
fn sort_by_score(scored: Vec<(f32, Paper)>) -> Vec<Paper> {
    let mut scored = scored;
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, paper)| paper).collect()
}

/// Keyword-overlap ranker. Needs no model.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRanker;

#[async_trait]
impl Ranker for KeywordRanker {
    async fn rank(&self, query: &str, candidates: Vec<Paper>) -> RankingResult<Vec<Paper>> {
        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        let scored = candidates
            .into_iter()
            .map(|paper| (keyword_score(&terms, &paper), paper))
            .collect();
        Ok(sort_by_score(scored))
    }
}

/// Hybrid semantic + keyword ranker.
///
/// `score = w * cosine(query, paper) + (1 - w) * keyword_score`, where the
/// paper text is its title followed by its abstract.
pub struct HybridRanker<E>
where
    E: EmbeddingProvider,
{
    embedding_provider: E,

    /// Weight of the semantic component, within [0, 1]
    semantic_weight: f32,
}

impl<E> HybridRanker<E>
where
    E: EmbeddingProvider,
{
    pub fn new(embedding_provider: E, semantic_weight: f32) -> Self {
        Self {
            embedding_provider,
            semantic_weight: semantic_weight.clamp(0.0, 1.0),
        }
    }

    fn paper_text(paper: &Paper) -> String {
        let text = normalize_text(&format!("{} {}", paper.title, paper.abstract_text));
        if text.is_empty() {
            paper.id.clone()
        } else {
            text
        }
    }
}

#[async_trait]
impl<E> Ranker for HybridRanker<E>
where
    E: EmbeddingProvider,
{
    async fn rank(&self, query: &str, candidates: Vec<Paper>) -> RankingResult<Vec<Paper>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let normalized_query = normalize_text(query);
        let paper_texts: Vec<String> = candidates.iter().map(Self::paper_text).collect();
        let mut inputs: Vec<&str> = Vec::with_capacity(paper_texts.len() + 1);
        inputs.push(&normalized_query);
        inputs.extend(paper_texts.iter().map(String::as_str));

        let embeddings = self
            .embedding_provider
            .embed_batch(&inputs)
            .await
            .map_err(|e| RankingError::EmbeddingError(e.to_string()))?;
        if embeddings.len() != inputs.len() {
            return Err(RankingError::EmbeddingError(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                embeddings.len()
            )));
        }
        let (query_embedding, paper_embeddings) = embeddings.split_at(1);
        let query_embedding = &query_embedding[0];
        if paper_embeddings.iter().any(|e| e.len() != query_embedding.len()) {
            return Err(RankingError::EmbeddingError(
                "embedding dimensions differ within one batch".to_string(),
            ));
        }

        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        let w = self.semantic_weight;
        let scored = candidates
            .into_iter()
            .zip(paper_embeddings)
            .map(|(paper, embedding)| {
                let semantic = cosine_similarity(query_embedding, embedding);
                let keyword = keyword_score(&terms, &paper);
                (w * semantic + (1.0 - w) * keyword, paper)
            })
            .collect();

        debug!(model = self.embedding_provider.model_name(), "hybrid ranking complete");
        Ok(sort_by_score(scored))
    }
}
