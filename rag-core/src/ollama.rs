//! Ollama-backed embedding provider and relevance judge.
//!
//! This module is only available when the `ollama` feature is enabled.
//!
//! Both clients talk to a local Ollama server over its JSON API with
//! non-streaming requests and a 60 second timeout.
//!
//! # Configuration
//!
//! | Variable | Default |
//! |----------|---------|
//! | `OLLAMA_BASE_URL` | `http://localhost:11434/api` |
//! | `OLLAMA_MODEL` | `llama3.2` (judge) |
//! | `OLLAMA_EMBED_MODEL` | `nomic-embed-text` (embeddings) |
//! | `OLLAMA_EMBED_DIMENSIONS` | `768` (output size of the embedding model) |
//!
//! # Example
//!
//! ```rust,ignore
//! use rag_core::ollama::{OllamaEmbeddingProvider, OllamaJudge};
//!
//! let embedder = OllamaEmbeddingProvider::from_env()?;
//! let judge = OllamaJudge::from_env()?;
//! if !judge.is_available().await {
//!     eprintln!("Ollama is not running");
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::judge::{LlmJudge, build_judge_prompt, parse_scores};

/// Default Ollama API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/api";

/// Default chat model used for judging.
pub const DEFAULT_CHAT_MODEL: &str = "llama3.2";

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

/// Output dimension of `nomic-embed-text`.
pub const DEFAULT_EMBED_DIMENSIONS: usize = 768;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const PROVIDER: &str = "Ollama";

fn base_url_from_env() -> String {
    std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

/// Parse an embedding dimension override. `None` keeps the default.
fn parse_dimensions(value: Option<&str>) -> Result<Option<usize>> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<usize>() {
        Ok(dims) if dims > 0 => Ok(Some(dims)),
        _ => Err(RagError::ConfigError(format!(
            "OLLAMA_EMBED_DIMENSIONS must be a positive integer, got '{raw}'"
        ))),
    }
}

fn normalize_base_url(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| RagError::provider(PROVIDER, format!("failed to build HTTP client: {e}")))
}

/// `GET {base}/tags` succeeds when the server is reachable.
async fn check_available(client: &reqwest::Client, base_url: &str) -> bool {
    match client.get(format!("{base_url}/tags")).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!(provider = PROVIDER, error = %e, "server not reachable");
            false
        }
    }
}

async fn post_json<Req, Resp>(client: &reqwest::Client, url: &str, body: &Req) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: for<'de> Deserialize<'de>,
{
    let response = client.post(url).json(body).send().await.map_err(|e| {
        error!(provider = PROVIDER, url, error = %e, "request failed");
        RagError::provider(PROVIDER, format!("request failed: {e}"))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
        error!(provider = PROVIDER, %status, "API error");
        return Err(RagError::provider(PROVIDER, format!("API returned {status}: {detail}")));
    }

    response.json().await.map_err(|e| {
        error!(provider = PROVIDER, error = %e, "failed to parse response");
        RagError::provider(PROVIDER, format!("failed to parse response: {e}"))
    })
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

// ── Embedding provider ─────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by Ollama's `/embeddings` endpoint.
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `model` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        if model.is_empty() {
            return Err(RagError::ConfigError("Ollama embedding model must not be empty".into()));
        }
        Ok(Self {
            client: build_client()?,
            base_url: normalize_base_url(base_url),
            model,
            dimensions: DEFAULT_EMBED_DIMENSIONS,
        })
    }

    /// Create a provider from `OLLAMA_BASE_URL`, `OLLAMA_EMBED_MODEL` and
    /// `OLLAMA_EMBED_DIMENSIONS`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `OLLAMA_EMBED_DIMENSIONS` is set
    /// but is not a positive integer.
    pub fn from_env() -> Result<Self> {
        let model =
            std::env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let dimensions = parse_dimensions(std::env::var("OLLAMA_EMBED_DIMENSIONS").ok().as_deref())?;
        let provider = Self::new(base_url_from_env(), model)?;
        Ok(match dimensions {
            Some(dims) => provider.with_dimensions(dims),
            None => provider,
        })
    }

    /// Set the expected output dimension for a model other than the default.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// The model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the Ollama server answers at all.
    pub async fn is_available(&self) -> bool {
        check_available(&self.client, &self.base_url).await
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest { model: &self.model, prompt: text };
        let response: EmbeddingResponse = post_json(&self.client, &url, &request).await?;

        if response.embedding.is_empty() {
            return Err(RagError::provider(PROVIDER, "API returned an empty embedding"));
        }
        Ok(response.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

// ── Judge ──────────────────────────────────────────────────────────

/// An [`LlmJudge`] that asks an Ollama chat model for a JSON score array.
pub struct OllamaJudge {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaJudge {
    /// Create a judge for `model` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let model = model.into();
        if model.is_empty() {
            return Err(RagError::ConfigError("Ollama chat model must not be empty".into()));
        }
        Ok(Self { client: build_client()?, base_url: normalize_base_url(base_url), model })
    }

    /// Create a judge from `OLLAMA_BASE_URL` and `OLLAMA_MODEL`.
    pub fn from_env() -> Result<Self> {
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());
        Self::new(base_url_from_env(), model)
    }

    /// The model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the Ollama server answers at all.
    pub async fn is_available(&self) -> bool {
        check_available(&self.client, &self.base_url).await
    }
}

#[async_trait]
impl LlmJudge for OllamaJudge {
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>> {
        let prompt = build_judge_prompt(query, candidates);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: &prompt }],
            stream: false,
        };

        debug!(provider = PROVIDER, model = %self.model, candidates = candidates.len(), "judging");
        let url = format!("{}/chat", self.base_url);
        let response: ChatResponse = post_json(&self.client, &url, &request).await?;

        parse_scores(&response.message.content, candidates.len())
    }
}
