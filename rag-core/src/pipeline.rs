//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] exposes the indexing and query APIs over a shared
//! [`EmbeddingProvider`], [`VectorStore`], [`Chunker`] and [`Reranker`].
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_core::{RagPipeline, RagConfig, InMemoryVectorStore};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! pipeline.index("doc1", &text, "notes.md", None, &HashMap::new()).await?;
//! let results = pipeline.query("search query").await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::{Chunker, ParagraphChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, RerankedResult, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::indexer::Indexer;
use crate::reranker::Reranker;
use crate::retrieval::RetrievalService;
use crate::vectorstore::VectorStore;

/// The RAG pipeline orchestrator.
///
/// Coordinates indexing (chunk → embed → store) and querying
/// (embed → search → rerank). Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    vector_store: Arc<dyn VectorStore>,
    indexer: Indexer,
    retrieval: RetrievalService,
    reranker: Reranker,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Return the configured reranker.
    pub fn reranker(&self) -> &Reranker {
        &self.reranker
    }

    /// Index (or re-index) a document. Returns the number of chunks stored.
    ///
    /// # Errors
    ///
    /// See [`Indexer::index_document`]. No partial document is ever written.
    pub async fn index(
        &self,
        document_id: &str,
        text: &str,
        source: &str,
        title: Option<&str>,
        metadata: &HashMap<String, String>,
    ) -> Result<usize> {
        self.indexer.index_document(document_id, text, source, title, metadata).await
    }

    /// Delete a document and all of its chunks.
    ///
    /// Returns `false` if no such document existed.
    pub async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let deleted = self.vector_store.delete_document(document_id).await.inspect_err(|e| {
            error!(document.id = document_id, error = %e, "failed to delete document");
        })?;
        info!(document.id = document_id, deleted, "delete document");
        Ok(deleted)
    }

    /// List all indexed documents.
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        self.vector_store.list_documents().await
    }

    /// Fetch a single document.
    pub async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        self.vector_store.get_document(document_id).await
    }

    /// Fetch a document's chunks in index order.
    pub async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        self.vector_store.get_chunks(document_id).await
    }

    /// Similarity search with explicit limits.
    ///
    /// # Errors
    ///
    /// See [`RetrievalService::search`].
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>> {
        self.retrieval.search(query, limit, min_similarity).await
    }

    /// Apply the configured reranker to `results`.
    pub async fn rerank(&self, query: &str, results: Vec<SearchResult>) -> Vec<RerankedResult> {
        self.reranker.rerank(query, results).await
    }

    /// Search with the configured `top_k` and `min_similarity`, then rerank.
    ///
    /// # Errors
    ///
    /// Propagates search failures. Reranking never fails.
    pub async fn query(&self, query: &str) -> Result<Vec<RerankedResult>> {
        let results = self.search(query, self.config.top_k, self.config.min_similarity).await?;
        let reranked = self.rerank(query, results).await;
        info!(result_count = reranked.len(), "query completed");
        Ok(reranked)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider` and `vector_store` are required. The chunker defaults
/// to a [`ParagraphChunker`] sized from the config, and the reranker to a
/// threshold reranker using `rerank_threshold`.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .reranker(Reranker::hybrid(0.3, 5, Arc::new(judge)))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Reranker>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration. Defaults to [`RagConfig::default`].
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Override the reranking strategy.
    pub fn reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// config is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker: Arc<dyn Chunker> =
            self.chunker.unwrap_or_else(|| Arc::new(ParagraphChunker::from_config(&config)));
        let reranker =
            self.reranker.unwrap_or_else(|| Reranker::threshold(config.rerank_threshold));

        let indexer = Indexer::new(
            chunker,
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store),
            config.embed_concurrency,
        );
        let retrieval = RetrievalService::new(embedding_provider, Arc::clone(&vector_store));

        Ok(RagPipeline { config, vector_store, indexer, retrieval, reranker })
    }
}
