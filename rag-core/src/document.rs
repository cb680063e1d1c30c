//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An indexed source document.
///
/// A document owns its [`Chunk`]s: re-indexing replaces all of them and
/// deleting the document deletes all of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document, assigned by the caller or
    /// generated with [`Document::generate_id`].
    pub id: String,
    /// Origin identifier, e.g. a file path or URL.
    pub source: String,
    /// Optional human-readable title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When the document was first indexed.
    pub created_at: DateTime<Utc>,
    /// When the document was last (re-)indexed.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a document stamped with the current time.
    pub fn new(id: impl Into<String>, source: impl Into<String>, title: Option<String>) -> Self {
        let now = Utc::now();
        Self { id: id.into(), source: source.into(), title, created_at: now, updated_at: now }
    }

    /// Generate a fresh random document id.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// A segment of a [`Document`] with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, derived as `{document_id}_{index}`.
    pub id: String,
    /// The ID of the owning [`Document`].
    pub document_id: String,
    /// 0-based position within the document; defines reconstruction order.
    pub index: usize,
    /// The text content of the chunk. Never empty.
    pub text: String,
    /// The vector embedding for this chunk's text. Empty until embedded.
    pub embedding: Vec<f32>,
    /// Metadata inherited from the indexing call plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Build the canonical chunk id for a document and ordinal.
    pub fn make_id(document_id: &str, index: usize) -> String {
        format!("{document_id}_{index}")
    }
}

/// A retrieved chunk joined with its owning document and a similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub similarity: f32,
    pub metadata: HashMap<String, String>,
}

/// A [`SearchResult`] after a reranking pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RerankedResult {
    /// The underlying search result.
    pub result: SearchResult,
    /// 1-based position in the list handed to the reranker.
    pub original_rank: usize,
    /// Judge relevance score in `[0, 1]`; only set after LLM judging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reranked_score: Option<f32>,
    /// Whether the result met the similarity threshold.
    pub passed_filter: bool,
}

impl RerankedResult {
    /// The score used for ordering: the judge score when present,
    /// otherwise the original similarity.
    pub fn effective_score(&self) -> f32 {
        self.reranked_score.unwrap_or(self.result.similarity)
    }
}
