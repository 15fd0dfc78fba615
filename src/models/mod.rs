//! Core data models for the paper digest system.
//!
//! This module contains the data structures shared by every stage of a query:
//! paper metadata as returned by the external sources and kept in the store,
//! per-query freshness records, and the digest entries handed to presentation.

use serde::{Deserialize, Serialize};

/// Represents a single author with their affiliation information.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Author {
    /// Full name of the author
    pub name: String,

    /// Institutional affiliation (e.g., university, research lab)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    /// Create an author without affiliation.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: None,
        }
    }
}

/// Core metadata for a research paper.
///
/// Papers are immutable once stored. The `id` is derived from the upstream
/// source's own identifier (for example `arxiv:2106.09685` or `s2:<paperId>`)
/// so that repeated fetches of the same paper map to the same record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paper {
    /// Stable identifier, unique within the store
    pub id: String,

    /// Paper title
    pub title: String,

    /// List of authors
    #[serde(default)]
    pub authors: Vec<Author>,

    /// Venue or source label shown alongside the title
    pub source: String,

    /// Abstract text (input to summarization)
    pub abstract_text: String,

    /// Year of publication, when the source reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_year: Option<i32>,

    /// Landing page for the paper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Paper {
    /// Create a paper with the required fields; optional metadata starts empty.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<String>,
        abstract_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            source: source.into(),
            abstract_text: abstract_text.into(),
            publish_year: None,
            url: None,
        }
    }

    /// Comma-separated author names.
    pub fn author_names(&self) -> String {
        self.authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A ranked paper paired with the summary of its abstract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DigestEntry {
    /// The paper metadata
    pub paper: Paper,

    /// Short summary derived from the paper's abstract
    pub summary: String,
}
