//! Error types for the `rag-core` crate.

use thiserror::Error;

/// Errors that can occur in indexing, retrieval and reranking.
#[derive(Debug, Error)]
pub enum RagError {
    /// An embedding or judge call failed, or returned a malformed response.
    #[error("Provider error ({provider}): {message}")]
    ProviderError {
        /// The collaborator that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A persistence failure: I/O, a rolled-back transaction, a dimension
    /// mismatch on write, or stored bytes that cannot be decoded.
    #[error("Vector store error ({backend}): {message}")]
    StoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The caller supplied invalid input.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A judge response was not a well-formed score array.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    pub(crate) fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn store(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreError { backend: backend.into(), message: message.into() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
