//! Second-pass filtering and reordering of search results.
//!
//! [`Reranker`] is a closed set of strategies chosen at construction:
//!
//! - [`Reranker::Threshold`]: keep results whose similarity meets a threshold,
//!   in their original order. No external calls.
//! - [`Reranker::Hybrid`]: apply the threshold, then ask an [`LlmJudge`] to
//!   score a widened candidate pool and reorder by those scores.
//!
//! The hybrid strategy fails soft: if the judge errors or returns the wrong
//! number of scores, the threshold-filtered results are returned in their
//! similarity order.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::{RerankedResult, SearchResult};
use crate::error::{RagError, Result};
use crate::judge::LlmJudge;

/// Maximum number of characters of chunk text shown to the judge.
pub const JUDGE_EXCERPT_CHARS: usize = 500;

/// A reranking strategy with its parameters.
///
/// Values are immutable; [`with_threshold`](Reranker::with_threshold) returns
/// a new value, so a `Reranker` can be shared freely across tasks.
///
/// # Example
///
/// ```rust,ignore
/// use rag_core::Reranker;
///
/// let reranker = Reranker::hybrid(0.3, 5, Arc::new(my_judge));
/// let reranked = reranker.rerank("how do I configure X?", results).await;
/// ```
#[derive(Clone)]
pub enum Reranker {
    /// Keep results with `similarity >= threshold`.
    Threshold {
        /// Minimum similarity to keep a result.
        threshold: f32,
    },
    /// Threshold filter followed by LLM judging.
    Hybrid {
        /// Minimum similarity to keep a result.
        threshold: f32,
        /// Number of results returned. The judge sees up to twice as many.
        max_results: usize,
        /// The relevance judge.
        judge: Arc<dyn LlmJudge>,
    },
}

impl fmt::Debug for Reranker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Threshold { threshold } => {
                f.debug_struct("Threshold").field("threshold", threshold).finish()
            }
            Self::Hybrid { threshold, max_results, .. } => f
                .debug_struct("Hybrid")
                .field("threshold", threshold)
                .field("max_results", max_results)
                .finish_non_exhaustive(),
        }
    }
}

impl Reranker {
    /// Create a threshold-only reranker.
    pub fn threshold(threshold: f32) -> Self {
        Self::Threshold { threshold }
    }

    /// Create a hybrid reranker backed by `judge`.
    pub fn hybrid(threshold: f32, max_results: usize, judge: Arc<dyn LlmJudge>) -> Self {
        Self::Hybrid { threshold, max_results, judge }
    }

    /// The configured similarity threshold.
    pub fn threshold_value(&self) -> f32 {
        match self {
            Self::Threshold { threshold } | Self::Hybrid { threshold, .. } => *threshold,
        }
    }

    /// Return a copy of this reranker with a different threshold.
    pub fn with_threshold(&self, threshold: f32) -> Self {
        match self {
            Self::Threshold { .. } => Self::Threshold { threshold },
            Self::Hybrid { max_results, judge, .. } => {
                Self::Hybrid { threshold, max_results: *max_results, judge: Arc::clone(judge) }
            }
        }
    }

    /// Rerank `results`, which are expected in descending similarity order.
    pub async fn rerank(&self, query: &str, results: Vec<SearchResult>) -> Vec<RerankedResult> {
        match self {
            Self::Threshold { threshold } => filter_by_threshold(results, *threshold),
            Self::Hybrid { threshold, max_results, judge } => {
                let filtered = filter_by_threshold(results, *threshold);
                judge_candidates(query, filtered, *max_results, judge.as_ref()).await
            }
        }
    }
}

/// Keep results with `similarity >= threshold`, recording their 1-based
/// position in the input.
fn filter_by_threshold(results: Vec<SearchResult>, threshold: f32) -> Vec<RerankedResult> {
    results
        .into_iter()
        .enumerate()
        .filter(|(_, result)| result.similarity >= threshold)
        .map(|(i, result)| RerankedResult {
            result,
            original_rank: i + 1,
            reranked_score: None,
            passed_filter: true,
        })
        .collect()
}

async fn judge_candidates(
    query: &str,
    filtered: Vec<RerankedResult>,
    max_results: usize,
    judge: &dyn LlmJudge,
) -> Vec<RerankedResult> {
    if filtered.is_empty() {
        debug!("no results passed the threshold, skipping judge");
        return filtered;
    }

    let mut candidates = filtered;
    candidates.truncate(max_results.saturating_mul(2));
    if candidates.is_empty() {
        debug!("max_results is zero, skipping judge");
        return candidates;
    }
    let texts: Vec<String> = candidates.iter().map(|c| format_candidate(&c.result)).collect();

    match request_scores(judge, query, &texts).await {
        Ok(scores) => {
            for (candidate, score) in candidates.iter_mut().zip(scores) {
                candidate.reranked_score = score.is_finite().then(|| score.clamp(0.0, 1.0));
            }
            candidates.sort_by(|a, b| {
                b.effective_score()
                    .partial_cmp(&a.effective_score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            debug!(candidates = texts.len(), "judge scores applied");
        }
        Err(e) => {
            warn!(error = %e, "judge failed, keeping similarity order");
        }
    }

    candidates.truncate(max_results);
    candidates
}

async fn request_scores(judge: &dyn LlmJudge, query: &str, texts: &[String]) -> Result<Vec<f32>> {
    let scores = judge.score(query, texts).await?;
    if scores.len() != texts.len() {
        return Err(RagError::ParseError(format!(
            "judge returned {} scores for {} candidates",
            scores.len(),
            texts.len()
        )));
    }
    Ok(scores)
}

/// Render a candidate as `title (source)` or `source`, followed by a
/// truncated excerpt of its text.
fn format_candidate(result: &SearchResult) -> String {
    let label = match &result.title {
        Some(title) => format!("{title} ({})", result.source),
        None => result.source.clone(),
    };
    let mut excerpt: String = result.text.chars().take(JUDGE_EXCERPT_CHARS).collect();
    if result.text.chars().count() > JUDGE_EXCERPT_CHARS {
        excerpt.push_str("...");
    }
    format!("{label}\n{excerpt}")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use proptest::prelude::*;

    use super::*;

    fn result(id: &str, similarity: f32) -> SearchResult {
        SearchResult {
            chunk_id: format!("{id}_0"),
            document_id: id.to_string(),
            chunk_index: 0,
            text: format!("text of {id}"),
            source: format!("{id}.md"),
            title: None,
            similarity,
            metadata: HashMap::new(),
        }
    }

    fn ids(results: &[RerankedResult]) -> Vec<&str> {
        results.iter().map(|r| r.result.document_id.as_str()).collect()
    }

    /// Returns a fixed score list and records what it was asked.
    struct ScriptedJudge {
        scores: Result<Vec<f32>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedJudge {
        fn new(scores: Result<Vec<f32>>) -> Self {
            Self { scores, calls: AtomicUsize::new(0), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmJudge for ScriptedJudge {
        async fn score(&self, _query: &str, candidates: &[String]) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = candidates.to_vec();
            match &self.scores {
                Ok(scores) => Ok(scores.clone()),
                Err(e) => Err(RagError::provider("scripted", e.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn threshold_keeps_order_and_ranks() {
        let reranker = Reranker::threshold(0.5);
        let results = vec![result("a", 0.9), result("b", 0.4), result("c", 0.6), result("d", 0.5)];
        let reranked = reranker.rerank("q", results).await;

        assert_eq!(ids(&reranked), vec!["a", "c", "d"]);
        let ranks: Vec<usize> = reranked.iter().map(|r| r.original_rank).collect();
        assert_eq!(ranks, vec![1, 3, 4]);
        assert!(reranked.iter().all(|r| r.passed_filter && r.reranked_score.is_none()));
    }

    #[tokio::test]
    async fn hybrid_reorders_by_judge_scores() {
        let judge = Arc::new(ScriptedJudge::new(Ok(vec![0.1, 0.8, 0.5])));
        let reranker = Reranker::hybrid(0.2, 2, judge.clone());
        let results = vec![result("a", 0.9), result("b", 0.7), result("c", 0.6)];

        let reranked = reranker.rerank("q", results).await;

        assert_eq!(ids(&reranked), vec!["b", "c"]);
        assert_eq!(reranked[0].reranked_score, Some(0.8));
        assert_eq!(reranked[0].original_rank, 2);
        assert_eq!(judge.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hybrid_widens_pool_to_twice_max_results() {
        let judge = Arc::new(ScriptedJudge::new(Ok(vec![0.5; 4])));
        let reranker = Reranker::hybrid(0.0, 2, judge.clone());
        let results: Vec<SearchResult> =
            (0..7).map(|i| result(&format!("d{i}"), 0.9 - i as f32 * 0.1)).collect();

        let reranked = reranker.rerank("q", results).await;

        assert_eq!(judge.seen.lock().unwrap().len(), 4);
        assert_eq!(reranked.len(), 2);
    }

    #[tokio::test]
    async fn hybrid_skips_judge_when_nothing_passes() {
        let judge = Arc::new(ScriptedJudge::new(Ok(vec![])));
        let reranker = Reranker::hybrid(0.95, 3, judge.clone());

        let reranked = reranker.rerank("q", vec![result("a", 0.5), result("b", 0.2)]).await;

        assert!(reranked.is_empty());
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hybrid_with_zero_max_results_skips_judge() {
        let judge = Arc::new(ScriptedJudge::new(Ok(vec![])));
        let reranker = Reranker::hybrid(0.0, 0, judge.clone());

        let reranked = reranker.rerank("q", vec![result("a", 0.9), result("b", 0.8)]).await;

        assert!(reranked.is_empty());
        assert_eq!(judge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn hybrid_wrong_arity_falls_back_to_similarity_order() {
        let judge = Arc::new(ScriptedJudge::new(Ok(vec![1.0, 0.0])));
        let reranker = Reranker::hybrid(0.0, 2, judge);
        let results = vec![result("a", 0.9), result("b", 0.8), result("c", 0.7)];

        let reranked = reranker.rerank("q", results).await;

        assert_eq!(ids(&reranked), vec!["a", "b"]);
        assert!(reranked.iter().all(|r| r.reranked_score.is_none()));
    }

    #[tokio::test]
    async fn hybrid_judge_error_degrades_to_filtered_results() {
        let judge = Arc::new(ScriptedJudge::new(Err(RagError::provider("x", "timeout"))));
        let reranker = Reranker::hybrid(0.5, 5, judge);
        let results = vec![result("a", 0.9), result("b", 0.3), result("c", 0.6)];

        let reranked = reranker.rerank("q", results).await;

        assert_eq!(ids(&reranked), vec!["a", "c"]);
        assert!(reranked.iter().all(|r| r.reranked_score.is_none()));
    }

    #[tokio::test]
    async fn hybrid_clamps_scores_and_ignores_non_finite() {
        let judge = Arc::new(ScriptedJudge::new(Ok(vec![f32::NAN, 3.0])));
        let reranker = Reranker::hybrid(0.0, 2, judge);
        let reranked = reranker.rerank("q", vec![result("a", 0.9), result("b", 0.1)]).await;

        assert_eq!(ids(&reranked), vec!["b", "a"]);
        assert_eq!(reranked[0].reranked_score, Some(1.0));
        assert_eq!(reranked[1].reranked_score, None);
    }

    #[tokio::test]
    async fn candidates_carry_label_and_truncated_excerpt() {
        let judge = Arc::new(ScriptedJudge::new(Ok(vec![0.5])));
        let reranker = Reranker::hybrid(0.0, 1, judge.clone());
        let mut long = result("a", 0.9);
        long.title = Some("Guide".to_string());
        long.text = "x".repeat(JUDGE_EXCERPT_CHARS + 10);

        reranker.rerank("q", vec![long]).await;

        let seen = judge.seen.lock().unwrap();
        assert!(seen[0].starts_with("Guide (a.md)\n"));
        assert!(seen[0].ends_with("x..."));
        assert_eq!(seen[0].chars().filter(|c| *c == 'x').count(), JUDGE_EXCERPT_CHARS);
    }

    #[test]
    fn with_threshold_returns_new_value() {
        let judge: Arc<dyn LlmJudge> = Arc::new(ScriptedJudge::new(Ok(vec![])));
        let original = Reranker::hybrid(0.3, 4, judge);
        let updated = original.with_threshold(0.7);

        assert_eq!(original.threshold_value(), 0.3);
        assert_eq!(updated.threshold_value(), 0.7);
        assert!(matches!(updated, Reranker::Hybrid { max_results: 4, .. }));
        assert!(matches!(Reranker::threshold(0.1).with_threshold(0.2), Reranker::Threshold { .. }));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn threshold_output_is_exact_subset(
            similarities in proptest::collection::vec(-1.0f32..=1.0, 0..30),
            threshold in -1.0f32..=1.0,
        ) {
            let results: Vec<SearchResult> = similarities
                .iter()
                .enumerate()
                .map(|(i, s)| result(&format!("d{i}"), *s))
                .collect();
            let expected: Vec<String> = results
                .iter()
                .filter(|r| r.similarity >= threshold)
                .map(|r| r.document_id.clone())
                .collect();

            let rt = tokio::runtime::Runtime::new().unwrap();
            let reranked = rt.block_on(Reranker::threshold(threshold).rerank("q", results));

            let actual: Vec<String> =
                reranked.iter().map(|r| r.result.document_id.clone()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
