//! Vector store trait for persisting documents and searching their chunks.

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::document::{Chunk, Document, SearchResult};
use crate::error::{RagError, Result};

/// A persistence backend for documents, their chunk embeddings, and
/// full-scan similarity search.
///
/// # Contract
///
/// - [`upsert_document`](VectorStore::upsert_document) is atomic: the document
///   row is written, every existing chunk of that document is deleted, and the
///   new chunks are inserted as one unit. On failure prior state is left intact,
///   and concurrent readers observe either the old or the new chunk set, never a
///   mix.
/// - Every stored chunk has the same embedding dimension. A write whose
///   dimension disagrees with the rest of the store fails with
///   [`RagError::StoreError`].
/// - [`search_similar`](VectorStore::search_similar) rejects a query vector whose
///   dimension differs from the stored vectors with
///   [`RagError::ValidationError`].
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.upsert_document(&document, &chunks).await?;
/// let results = store.search_similar(&query_embedding, 5, 0.2).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a document together with its full chunk set.
    async fn upsert_document(&self, document: &Document, chunks: &[Chunk]) -> Result<()>;

    /// Fetch a document by id.
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// List all documents ordered by id.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Number of stored documents.
    async fn count_documents(&self) -> Result<usize>;

    /// Delete a document and all of its chunks. Returns `false` if the
    /// document did not exist.
    async fn delete_document(&self, id: &str) -> Result<bool>;

    /// Return a document's chunks ordered by chunk index.
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Rank every stored chunk against `query` by cosine similarity.
    ///
    /// Keeps hits with `similarity >= min_similarity` and returns at most
    /// `limit` of them, ordered by descending similarity.
    async fn search_similar(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>>;
}

/// Validate an upsert payload and return the shared embedding
/// dimension of the chunk set (`None` for an empty set).
pub(crate) fn validate_upsert(
    backend: &str,
    document: &Document,
    chunks: &[Chunk],
) -> Result<Option<usize>> {
    if document.id.trim().is_empty() {
        return Err(RagError::ValidationError("document id must not be empty".to_string()));
    }

    let mut dimension = None;
    let mut previous_index = None;
    for chunk in chunks {
        if chunk.document_id != document.id {
            return Err(RagError::ValidationError(format!(
                "chunk '{}' belongs to document '{}', not '{}'",
                chunk.id, chunk.document_id, document.id
            )));
        }
        if chunk.text.is_empty() {
            return Err(RagError::ValidationError(format!("chunk '{}' has empty text", chunk.id)));
        }
        if previous_index.is_some_and(|prev| chunk.index <= prev) {
            return Err(RagError::ValidationError(format!(
                "chunk indices for document '{}' must be strictly increasing",
                document.id
            )));
        }
        previous_index = Some(chunk.index);

        if chunk.embedding.is_empty() {
            return Err(RagError::store(backend, format!("chunk '{}' has no embedding", chunk.id)));
        }
        match dimension {
            None => dimension = Some(chunk.embedding.len()),
            Some(dim) if dim != chunk.embedding.len() => {
                return Err(RagError::store(
                    backend,
                    format!(
                        "dimension mismatch within document '{}': {} vs {dim}",
                        document.id,
                        chunk.embedding.len()
                    ),
                ));
            }
            Some(_) => {}
        }
    }
    Ok(dimension)
}

/// Fail if a write's dimension disagrees with what the store already holds.
pub(crate) fn check_store_dimension(
    backend: &str,
    stored: Option<usize>,
    incoming: Option<usize>,
) -> Result<()> {
    match (stored, incoming) {
        (Some(stored), Some(incoming)) if stored != incoming => Err(RagError::store(
            backend,
            format!("dimension mismatch on write: store holds {stored}, got {incoming}"),
        )),
        _ => Ok(()),
    }
}

pub(crate) fn validate_query(query: &[f32]) -> Result<()> {
    if query.is_empty() {
        return Err(RagError::ValidationError("query vector must not be empty".to_string()));
    }
    Ok(())
}

/// Filter by `min_similarity`, sort descending, and truncate to `limit`.
///
/// Ties are broken by document id and chunk index so the order is stable.
pub(crate) fn rank_results(
    mut results: Vec<SearchResult>,
    limit: usize,
    min_similarity: f32,
) -> Vec<SearchResult> {
    results.retain(|r| r.similarity >= min_similarity);
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    results.truncate(limit);
    results
}
