//! Document indexing: chunk → embed → store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, error, info};

use crate::chunking::Chunker;
use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Orchestrates [`Chunker`] → [`EmbeddingProvider`] → [`VectorStore`] for one
/// document at a time.
///
/// Embedding calls for a document run with bounded parallelism. Only a fully
/// embedded chunk set reaches the store, so a provider failure or a dropped
/// future never leaves a partially indexed document behind. Provider failures
/// are not retried here.
pub struct Indexer {
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    concurrency: usize,
}

impl Indexer {
    /// Create an indexer. `concurrency` bounds the in-flight embedding calls
    /// per document and is raised to at least 1.
    pub fn new(
        chunker: Arc<dyn Chunker>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        concurrency: usize,
    ) -> Self {
        Self { chunker, embedding_provider, vector_store, concurrency: concurrency.max(1) }
    }

    /// Index (or re-index) a document and return the number of chunks stored.
    ///
    /// Returns `Ok(0)` without touching the store when the text produces no
    /// chunks.
    ///
    /// # Errors
    ///
    /// - [`RagError::ValidationError`] if `document_id` is empty
    /// - [`RagError::ProviderError`] if any embedding call fails or returns a
    ///   vector of the wrong dimension
    /// - [`RagError::StoreError`] if the transactional upsert fails
    pub async fn index_document(
        &self,
        document_id: &str,
        text: &str,
        source: &str,
        title: Option<&str>,
        metadata: &HashMap<String, String>,
    ) -> Result<usize> {
        if document_id.trim().is_empty() {
            return Err(RagError::ValidationError("document id must not be empty".to_string()));
        }

        // 1. Chunk the text
        let mut chunks = self.chunker.chunk(document_id, text, metadata);
        if chunks.is_empty() {
            info!(document.id = document_id, chunk_count = 0, "indexed document (empty)");
            return Ok(0);
        }

        // 2. Embed every chunk, preserving order
        let provider = self.embedding_provider.as_ref();
        let embeddings: Vec<Vec<f32>> = stream::iter(chunks.iter())
            .map(|chunk| provider.embed(&chunk.text))
            .buffered(self.concurrency)
            .try_collect()
            .await
            .inspect_err(|e| {
                error!(document.id = document_id, error = %e, "embedding failed during indexing");
            })?;

        let expected = provider.dimensions();
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            if embedding.len() != expected {
                error!(document.id = document_id, got = embedding.len(), expected, "bad embedding");
                return Err(RagError::provider(
                    provider.name(),
                    format!(
                        "returned a {}-dimensional vector for chunk '{}', expected {expected}",
                        embedding.len(),
                        chunk.id
                    ),
                ));
            }
            chunk.embedding = embedding;
        }
        debug!(document.id = document_id, count = chunks.len(), "embedded chunks");

        // 3. Replace the document and its chunks atomically
        let now = Utc::now();
        let document = Document {
            id: document_id.to_string(),
            source: source.to_string(),
            title: title.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        self.vector_store.upsert_document(&document, &chunks).await.inspect_err(|e| {
            error!(document.id = document_id, error = %e, "upsert failed during indexing");
        })?;

        let chunk_count = chunks.len();
        info!(document.id = document_id, chunk_count, "indexed document");
        Ok(chunk_count)
    }
}
