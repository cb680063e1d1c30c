//! # RAG Basic Demo
//!
//! Indexes a few documents into an `InMemoryVectorStore`, then runs queries
//! through the threshold reranker.
//!
//! Uses a deterministic `MockEmbeddingProvider`, so no model server is needed.
//!
//! Run: `cargo run -p rag-demos --bin rag_basic`

use std::collections::HashMap;
use std::sync::Arc;

use rag_core::{EmbeddingProvider, InMemoryVectorStore, RagConfig, RagPipeline};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// MockEmbeddingProvider: letter-trigram hashing into a fixed-size vector
// ---------------------------------------------------------------------------

struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> rag_core::Result<Vec<f32>> {
        let mut emb = vec![0.0f32; self.dimensions];
        let lower: Vec<char> = text.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect();
        for window in lower.windows(3) {
            let hash = window.iter().fold(0u64, |acc, c| acc.wrapping_mul(31).wrapping_add(*c as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // -- 1. Configure the pipeline ----------------------------------------
    let config = RagConfig::builder()
        .chunk_size(200)
        .chunk_overlap(40)
        .top_k(3)
        .rerank_threshold(0.1)
        .build()?;

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(MockEmbeddingProvider::new(128)))
        .vector_store(Arc::new(InMemoryVectorStore::new()))
        .build()?;

    // -- 2. Index sample documents ----------------------------------------
    let documents = [
        (
            "rust",
            "https://www.rust-lang.org",
            "Rust",
            "Rust is a systems programming language focused on safety, speed, and \
             concurrency.\n\nIt achieves memory safety without a garbage collector through \
             its ownership system. Borrowing rules are checked at compile time.",
        ),
        (
            "python",
            "https://www.python.org",
            "Python",
            "Python is a high-level, interpreted programming language known for its \
             readability.\n\nIt is widely used in data science, web development, and \
             automation.",
        ),
        (
            "rag",
            "notes/rag.md",
            "RAG",
            "Retrieval-augmented generation combines a retrieval system with a language \
             model.\n\nDocuments are chunked, embedded, and stored in a vector index. At \
             query time the most relevant chunks are retrieved and handed to the model.",
        ),
    ];

    println!("Indexing {} documents...", documents.len());
    for (id, source, title, text) in documents {
        let metadata = HashMap::from([("topic".to_string(), id.to_string())]);
        let count = pipeline.index(id, text, source, Some(title), &metadata).await?;
        println!("  {id} → {count} chunk(s)");
    }

    // -- 3. Query ----------------------------------------------------------
    let queries = ["memory safety without garbage collection", "data science", "vector index"];

    for query in queries {
        println!("\nQuery: \"{query}\"");
        let results = pipeline.query(query).await?;
        if results.is_empty() {
            println!("  (no results)");
        }
        for (i, hit) in results.iter().enumerate() {
            let preview: String = hit.result.text.chars().take(70).collect();
            println!(
                "  {}. [similarity={:.3}] {} | {preview}",
                i + 1,
                hit.result.similarity,
                hit.result.document_id,
            );
        }
    }

    // -- 4. Delete -----------------------------------------------------------
    pipeline.delete_document("python").await?;
    let remaining = pipeline.list_documents().await?.len();
    println!("\nAfter deleting 'python': {remaining} document(s) remain");

    Ok(())
}
