//! Query-side retrieval: embed the query, rank stored chunks.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Embeds query text and delegates to [`VectorStore::search_similar`].
///
/// Failures propagate as typed errors: an empty result always means "no
/// match", never "the provider was down".
pub struct RetrievalService {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
}

impl RetrievalService {
    /// Create a retrieval service over the given provider and store.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
    ) -> Self {
        Self { embedding_provider, vector_store }
    }

    /// Return up to `limit` chunks with `similarity >= min_similarity`,
    /// most similar first.
    ///
    /// An empty store returns an empty list without calling the embedding
    /// provider.
    ///
    /// # Errors
    ///
    /// - [`RagError::ValidationError`] for blank query text or a query vector
    ///   whose dimension differs from the stored vectors
    /// - [`RagError::ProviderError`] if embedding the query fails
    /// - [`RagError::StoreError`] if the store cannot be read
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(RagError::ValidationError("query text must not be empty".to_string()));
        }

        if self.vector_store.count_documents().await? == 0 {
            debug!("store is empty, skipping query embedding");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding_provider.embed(query).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;

        let results =
            self.vector_store.search_similar(&query_embedding, limit, min_similarity).await?;

        info!(result_count = results.len(), limit, "search completed");
        Ok(results)
    }
}
