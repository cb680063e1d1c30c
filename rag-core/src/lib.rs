//! # rag-core
//!
//! Retrieval-augmented generation core: document chunking, a persisted vector
//! index, cosine-similarity search and reranking.
//!
//! ## Overview
//!
//! - [`ParagraphChunker`] splits text into overlapping, boundary-respecting chunks
//! - [`EmbeddingProvider`] turns text into vectors (bring your own, or enable `ollama`)
//! - [`VectorStore`] persists documents, chunks and embeddings
//!   ([`InMemoryVectorStore`], or [`SqliteVectorStore`] with the `sqlite` feature)
//! - [`Indexer`] and [`RetrievalService`] drive the indexing and query flows
//! - [`Reranker`] filters by threshold and optionally reorders with an [`LlmJudge`]
//! - [`RagPipeline`] ties the pieces together behind one facade
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use rag_core::{InMemoryVectorStore, RagConfig, RagPipeline};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! pipeline.index("guide", &text, "guide.md", Some("User Guide"), &HashMap::new()).await?;
//! for hit in pipeline.query("how do I configure logging?").await? {
//!     println!("{:.3} {}", hit.effective_score(), hit.result.text);
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `sqlite` (default) | [`SqliteVectorStore`] via sqlx |
//! | `ollama` | Ollama embedding provider and judge via reqwest |
//! | `full` | Everything |

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod encoding;
pub mod error;
pub mod indexer;
pub mod inmemory;
pub mod judge;
pub mod pipeline;
pub mod reranker;
pub mod retrieval;
pub mod similarity;
pub mod vectorstore;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use chunking::{Chunker, ParagraphChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, RerankedResult, SearchResult};
pub use embedding::EmbeddingProvider;
pub use encoding::{decode_embedding, encode_embedding};
pub use error::{RagError, Result};
pub use indexer::Indexer;
pub use inmemory::InMemoryVectorStore;
pub use judge::{LlmJudge, build_judge_prompt, parse_scores};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use reranker::Reranker;
pub use retrieval::RetrievalService;
pub use similarity::cosine_similarity;
pub use vectorstore::VectorStore;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaEmbeddingProvider, OllamaJudge};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorStore;
