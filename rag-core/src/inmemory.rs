//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by
//! `HashMap`s protected by a `tokio::sync::RwLock`. It is suitable for
//! development, testing, and small-scale use cases.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, Document, SearchResult};
use crate::error::{RagError, Result};
use crate::similarity::cosine_similarity;
use crate::vectorstore::{
    VectorStore, check_store_dimension, rank_results, validate_query, validate_upsert,
};

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct StoreState {
    documents: HashMap<String, Document>,
    // document id → chunks ordered by index
    chunks: HashMap<String, Vec<Chunk>>,
}

impl StoreState {
    /// Embedding dimension held by any document other than `exclude`.
    fn dimension_excluding(&self, exclude: &str) -> Option<usize> {
        self.chunks
            .iter()
            .filter(|(document_id, _)| document_id.as_str() != exclude)
            .find_map(|(_, chunks)| chunks.first().map(|c| c.embedding.len()))
    }
}

/// An in-memory vector store using cosine similarity for search.
///
/// Every upsert runs under a single write guard, so readers see either the
/// previous or the new chunk set of a document.
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.upsert_document(&document, &chunks).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    state: RwLock<StoreState>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_document(&self, document: &Document, chunks: &[Chunk]) -> Result<()> {
        let dimension = validate_upsert(BACKEND, document, chunks)?;

        let mut state = self.state.write().await;
        check_store_dimension(BACKEND, state.dimension_excluding(&document.id), dimension)?;

        let mut stored = document.clone();
        if let Some(existing) = state.documents.get(&document.id) {
            stored.created_at = existing.created_at;
        }
        state.documents.insert(document.id.clone(), stored);
        state.chunks.insert(document.id.clone(), chunks.to_vec());

        debug!(document.id = %document.id, count = chunks.len(), "upserted document in memory");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.state.read().await.documents.get(id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        let mut documents: Vec<Document> = state.documents.values().cloned().collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(documents)
    }

    async fn count_documents(&self) -> Result<usize> {
        Ok(self.state.read().await.documents.len())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        state.chunks.remove(id);
        let existed = state.documents.remove(id).is_some();
        debug!(document.id = id, existed, "deleted document from memory");
        Ok(existed)
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        Ok(self.state.read().await.chunks.get(document_id).cloned().unwrap_or_default())
    }

    async fn search_similar(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        validate_query(query)?;
        let state = self.state.read().await;

        let mut scored = Vec::new();
        for (document_id, chunks) in &state.chunks {
            let Some(document) = state.documents.get(document_id) else {
                continue;
            };
            for chunk in chunks {
                if chunk.embedding.len() != query.len() {
                    return Err(RagError::ValidationError(format!(
                        "query has dimension {}, stored vectors have {}",
                        query.len(),
                        chunk.embedding.len()
                    )));
                }
                let similarity = cosine_similarity(query, &chunk.embedding)?;
                if similarity < min_similarity {
                    continue;
                }
                scored.push(SearchResult {
                    chunk_id: chunk.id.clone(),
                    document_id: document.id.clone(),
                    chunk_index: chunk.index,
                    text: chunk.text.clone(),
                    source: document.source.clone(),
                    title: document.title.clone(),
                    similarity,
                    metadata: chunk.metadata.clone(),
                });
            }
        }

        Ok(rank_results(scored, limit, min_similarity))
    }
}
