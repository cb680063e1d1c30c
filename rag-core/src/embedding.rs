//! Embedding provider trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that maps text to a fixed-dimension embedding vector.
///
/// Implementations wrap a specific backend (a local model server, a hosted
/// API, a deterministic test double) behind a unified async interface. The
/// dimension is fixed for the lifetime of a store: every vector returned by
/// [`embed`](EmbeddingProvider::embed) must have exactly
/// [`dimensions`](EmbeddingProvider::dimensions) entries.
///
/// Retries and timeouts belong to the implementation; callers treat any
/// failure, including a timeout, as a [`RagError::ProviderError`](crate::RagError::ProviderError).
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name used in logs and error messages.
    fn name(&self) -> &str {
        "embedding"
    }
}
