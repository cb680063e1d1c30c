//! LLM judge trait and helpers for relevance scoring.
//!
//! A judge receives a query and an ordered list of candidate passages and
//! returns one relevance score per candidate. [`build_judge_prompt`] and
//! [`parse_scores`] implement the prompt and response format shared by the
//! LLM-backed judges in this crate.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::error::{RagError, Result};

/// Scores the relevance of candidate passages to a query.
///
/// Implementations must return exactly `candidates.len()` scores in
/// candidate order, each within `[0.0, 1.0]`.
#[async_trait]
pub trait LlmJudge: Send + Sync {
    /// Score each candidate's relevance to `query`.
    async fn score(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>>;
}

static NUMBER_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\[\]]*\]").expect("array pattern is valid"));

/// Build the instruction sent to an LLM judge.
pub fn build_judge_prompt(query: &str, candidates: &[String]) -> String {
    let mut prompt = String::from(
        "Rate how relevant each passage is to the query on a scale from 0.0 \
         (irrelevant) to 1.0 (directly answers it).\n\n",
    );
    prompt.push_str(&format!("Query: {query}\n\nPassages:\n"));
    for (i, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!("\nPassage {}: {candidate}\n", i + 1));
    }
    prompt.push_str(&format!(
        "\nRespond with only a JSON array of exactly {} numbers, one per passage, in order. \
         Example: [0.9, 0.1]",
        candidates.len()
    ));
    prompt
}

/// Extract the score array from a judge response.
///
/// Uses the last bracketed JSON array of numbers found in the text, so an
/// echoed example or passage reference ahead of the answer is skipped. Scores
/// are clamped to `[0, 1]`.
///
/// # Errors
///
/// Returns [`RagError::ParseError`] if no numeric array is present or if its
/// length differs from `expected`. A partial mapping is never guessed.
pub fn parse_scores(response: &str, expected: usize) -> Result<Vec<f32>> {
    let scores = NUMBER_ARRAY
        .find_iter(response)
        .filter_map(|m| serde_json::from_str::<Vec<f64>>(m.as_str()).ok())
        .last()
        .ok_or_else(|| {
            RagError::ParseError("judge response contains no JSON array of numbers".to_string())
        })?;

    if scores.len() != expected {
        return Err(RagError::ParseError(format!(
            "judge returned {} scores for {expected} candidates",
            scores.len()
        )));
    }

    Ok(scores.into_iter().map(|s| (s as f32).clamp(0.0, 1.0)).collect())
}
