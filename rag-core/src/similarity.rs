//! Cosine similarity.

use crate::error::{RagError, Result};

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude. The result is clamped to
/// `[-1, 1]` to absorb floating-point rounding.
///
/// # Errors
///
/// Returns [`RagError::ValidationError`] if the vectors differ in length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(RagError::ValidationError(format!(
            "vector dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}
