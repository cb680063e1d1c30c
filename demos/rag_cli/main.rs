//! # RAG CLI
//!
//! Index, search and manage documents in a SQLite vector index, using a local
//! Ollama server for embeddings and (optionally) LLM reranking.
//!
//! Reads `OLLAMA_BASE_URL`, `OLLAMA_MODEL`, `OLLAMA_EMBED_MODEL` and
//! `OLLAMA_EMBED_DIMENSIONS` from the environment or a `.env` file.
//!
//! Run:
//!
//! ```text
//! cargo run -p rag-demos --bin rag_cli -- index notes/guide.md --title "User Guide"
//! cargo run -p rag-demos --bin rag_cli -- search "how do I configure logging?" --rerank
//! cargo run -p rag-demos --bin rag_cli -- list
//! cargo run -p rag-demos --bin rag_cli -- delete guide
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use rag_core::{
    Document, OllamaEmbeddingProvider, OllamaJudge, RagConfig, RagPipeline, Reranker,
    SqliteVectorStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rag_cli")]
#[command(about = "Index and search documents with a SQLite vector index and Ollama")]
struct Args {
    /// SQLite database file
    #[arg(long, default_value = "rag.db")]
    db: PathBuf,

    /// Maximum chunk size in characters
    #[arg(long, default_value_t = 512)]
    chunk_size: usize,

    /// Characters of overlap between consecutive chunks
    #[arg(long, default_value_t = 100)]
    chunk_overlap: usize,

    /// Output dimension of the embedding model (overrides OLLAMA_EMBED_DIMENSIONS)
    #[arg(long)]
    embed_dimensions: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index (or re-index) a text file
    Index {
        /// File to index
        path: PathBuf,

        /// Document id (defaults to the file stem, or a random id)
        #[arg(long)]
        id: Option<String>,

        /// Document title
        #[arg(long)]
        title: Option<String>,
    },
    /// Search the index
    Search {
        /// Query text
        query: String,

        /// Number of results
        #[arg(long, default_value_t = 5)]
        limit: usize,

        /// Minimum similarity for a result
        #[arg(long, default_value_t = 0.3)]
        threshold: f32,

        /// Rerank with the Ollama chat model
        #[arg(long)]
        rerank: bool,
    },
    /// Delete a document
    Delete {
        /// Document id
        id: String,
    },
    /// List indexed documents
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let config = RagConfig::builder()
        .chunk_size(args.chunk_size)
        .chunk_overlap(args.chunk_overlap)
        .build()?;

    let mut embedder = OllamaEmbeddingProvider::from_env()?;
    if let Some(dims) = args.embed_dimensions {
        if dims == 0 {
            bail!("--embed-dimensions must be greater than zero");
        }
        embedder = embedder.with_dimensions(dims);
    }
    let store = SqliteVectorStore::open(&args.db)
        .await
        .with_context(|| format!("failed to open {}", args.db.display()))?;

    let needs_model = matches!(args.command, Command::Index { .. } | Command::Search { .. });
    if needs_model && !embedder.is_available().await {
        bail!("Ollama is not reachable; start it with `ollama serve` or set OLLAMA_BASE_URL");
    }

    let reranker = match &args.command {
        Command::Search { threshold, rerank: true, limit, .. } => {
            let judge = OllamaJudge::from_env()?;
            info!(model = judge.model(), "using LLM reranking");
            Reranker::hybrid(*threshold, *limit, Arc::new(judge))
        }
        Command::Search { threshold, .. } => Reranker::threshold(*threshold),
        _ => Reranker::threshold(config.rerank_threshold),
    };

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .vector_store(Arc::new(store))
        .reranker(reranker)
        .build()?;

    match args.command {
        Command::Index { path, id, title } => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let id = id
                .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
                .unwrap_or_else(Document::generate_id);
            let source = path.display().to_string();
            let count =
                pipeline.index(&id, &text, &source, title.as_deref(), &HashMap::new()).await?;
            println!("Indexed '{id}' as {count} chunk(s)");
        }
        Command::Search { query, limit, rerank, .. } => {
            // The judge sees up to twice as many candidates as it keeps.
            let fetch = if rerank { limit.saturating_mul(2) } else { limit };
            let results = pipeline.search(&query, fetch, 0.0).await?;
            let reranked = pipeline.rerank(&query, results).await;
            if reranked.is_empty() {
                println!("No results.");
            }
            for (i, hit) in reranked.iter().enumerate() {
                let label = hit.result.title.as_deref().unwrap_or(&hit.result.source);
                let score = match hit.reranked_score {
                    Some(score) => format!("judge={score:.2} similarity={:.3}", hit.result.similarity),
                    None => format!("similarity={:.3}", hit.result.similarity),
                };
                println!("{}. [{score}] {label} #{}", i + 1, hit.result.chunk_index);
                let preview: String = hit.result.text.chars().take(200).collect();
                println!("   {}\n", preview.replace('\n', " "));
            }
        }
        Command::Delete { id } => {
            if pipeline.delete_document(&id).await? {
                println!("Deleted '{id}'");
            } else {
                println!("No document '{id}'");
            }
        }
        Command::List => {
            let documents = pipeline.list_documents().await?;
            if documents.is_empty() {
                println!("No documents indexed.");
            }
            for doc in documents {
                let chunks = pipeline.get_chunks(&doc.id).await?.len();
                println!(
                    "{}  {} ({} chunks, updated {})",
                    doc.id,
                    doc.title.as_deref().unwrap_or(&doc.source),
                    chunks,
                    doc.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}
