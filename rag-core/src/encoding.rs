//! Binary layout for stored embeddings.
//!
//! A vector is persisted as a contiguous array of big-endian IEEE-754
//! 32-bit floats, alongside an explicit dimension count so readers never
//! infer the length from the byte count.

use crate::error::{RagError, Result};

const FLOAT_WIDTH: usize = std::mem::size_of::<f32>();

/// Encode an embedding as big-endian `f32`s.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * FLOAT_WIDTH);
    for value in embedding {
        bytes.extend_from_slice(&value.to_be_bytes());
    }
    bytes
}

/// Decode an embedding previously written by [`encode_embedding`].
///
/// # Errors
///
/// Returns [`RagError::StoreError`] if `bytes` is not exactly
/// `dimension * 4` bytes long.
pub fn decode_embedding(bytes: &[u8], dimension: usize) -> Result<Vec<f32>> {
    let expected = dimension.checked_mul(FLOAT_WIDTH).ok_or_else(|| {
        RagError::store("encoding", format!("stored dimension {dimension} is out of range"))
    })?;
    if bytes.len() != expected {
        return Err(RagError::store(
            "encoding",
            format!(
                "stored embedding has {} bytes, expected {expected} for dimension {dimension}",
                bytes.len()
            ),
        ));
    }

    Ok(bytes
        .chunks_exact(FLOAT_WIDTH)
        .map(|b| f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
