/// Sequence scorer seam — the next-token probability oracle used by decoding.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("scorer backend failed: {0}")]
    Backend(String),
    #[error("distribution has {actual} entries, expected {expected}")]
    WrongLength { expected: usize, actual: usize },
    #[error("non-finite probability {value} for token {token_id}")]
    NonFinite { token_id: u32, value: f32 },
    #[error("negative probability {value} for token {token_id}")]
    Negative { token_id: u32, value: f32 },
    #[error("probability {value} for token {token_id} exceeds 1")]
    OutOfRange { token_id: u32, value: f32 },
}

/// Slack allowed above 1.0 for rounding in the scorer's normalization.
pub const PROBABILITY_TOLERANCE: f32 = 1e-6;

/// A next-token probability model conditioned on an emotion.
///
/// `prefix` is the sequence decoded so far, starting with the start ID and
/// right-padded with PAD up to the decode's maximum length. `position` is
/// `unpadded_len - 1`, the slot of the most recently appended token. The
/// returned vector is indexed by token ID and holds the probability of each
/// token following that slot.
///
/// Implementations must be deterministic for identical inputs. Any failure
/// aborts the enclosing decode.
pub trait Scorer {
    fn score_next(
        &self,
        emotion_id: u32,
        prefix: &[u32],
        position: usize,
    ) -> Result<Vec<f32>, ScorerError>;
}

impl<F> Scorer for F
where
    F: Fn(u32, &[u32], usize) -> Result<Vec<f32>, ScorerError>,
{
    fn score_next(
        &self,
        emotion_id: u32,
        prefix: &[u32],
        position: usize,
    ) -> Result<Vec<f32>, ScorerError> {
        self(emotion_id, prefix, position)
    }
}

/// Check that a distribution is well-formed for a vocabulary of `size` entries.
pub fn validate_distribution(distribution: &[f32], size: usize) -> Result<(), ScorerError> {
    if distribution.len() != size {
        return Err(ScorerError::WrongLength {
            expected: size,
            actual: distribution.len(),
        });
    }
    for (token_id, &value) in distribution.iter().enumerate() {
        if !value.is_finite() {
            return Err(ScorerError::NonFinite {
                token_id: token_id as u32,
                value,
            });
        }
        if value < 0.0 {
            return Err(ScorerError::Negative {
                token_id: token_id as u32,
                value,
            });
        }
        if value > 1.0 + PROBABILITY_TOLERANCE {
            return Err(ScorerError::OutOfRange {
                token_id: token_id as u32,
                value,
            });
        }
    }
    Ok(())
}
