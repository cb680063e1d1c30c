//! Configuration for indexing, retrieval and reranking.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of trailing characters of a chunk carried into the next one.
    pub chunk_overlap: usize,
    /// Number of results to return from similarity search.
    pub top_k: usize,
    /// Minimum cosine similarity for a search hit.
    pub min_similarity: f32,
    /// Similarity threshold applied by the reranker.
    pub rerank_threshold: f32,
    /// Maximum results kept by the hybrid reranker.
    pub max_reranked_results: usize,
    /// Maximum number of in-flight embedding calls while indexing one document.
    pub embed_concurrency: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 100,
            top_k: 10,
            min_similarity: 0.0,
            rerank_threshold: 0.3,
            max_reranked_results: 5,
            embed_concurrency: 4,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`, `max_reranked_results == 0` or `embed_concurrency == 0`
    /// - `min_similarity` or `rerank_threshold` lies outside `[-1, 1]`
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.max_reranked_results == 0 {
            return Err(RagError::ConfigError(
                "max_reranked_results must be greater than zero".to_string(),
            ));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::ConfigError(
                "embed_concurrency must be greater than zero".to_string(),
            ));
        }
        for (name, value) in
            [("min_similarity", self.min_similarity), ("rerank_threshold", self.rerank_threshold)]
        {
            if !(-1.0..=1.0).contains(&value) {
                return Err(RagError::ConfigError(format!(
                    "{name} ({value}) must be within [-1, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of results to return from similarity search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity for search hits.
    pub fn min_similarity(mut self, min: f32) -> Self {
        self.config.min_similarity = min;
        self
    }

    /// Set the reranker's similarity threshold.
    pub fn rerank_threshold(mut self, threshold: f32) -> Self {
        self.config.rerank_threshold = threshold;
        self
    }

    /// Set the number of results kept by the hybrid reranker.
    pub fn max_reranked_results(mut self, max: usize) -> Self {
        self.config.max_reranked_results = max;
        self
    }

    /// Set how many embedding calls may run concurrently for one document.
    pub fn embed_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embed_concurrency = concurrency;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
