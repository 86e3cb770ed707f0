/// Beam search decoder — bounded best-first expansion over a next-token scorer.

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ranking::{compare_beams, sort_best_first};
use crate::core::scorer::{validate_distribution, Scorer, ScorerError};
use crate::core::vocab::Vocabulary;

/// Added to every probability before taking its log so a zero
/// probability still yields a finite score.
pub const EPSILON: f64 = 1e-9;

/// Default number of beams kept after each pruning step.
pub const DEFAULT_BEAM_WIDTH: usize = 3;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid emotion label: {0:?}")]
    InvalidEmotionLabel(String),
    #[error("emotion ID {0} is not in the vocabulary")]
    InvalidEmotionId(u32),
    #[error("beam width must be positive")]
    ZeroBeamWidth,
    #[error("scorer failed at step {step}: {source}")]
    Scorer {
        step: usize,
        #[source]
        source: ScorerError,
    },
}

/// A token sequence paired with its cumulative negative log-probability.
///
/// Beams are values: extending one produces a new beam and leaves the
/// parent untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    tokens: Vec<u32>,
    score: f64,
}

impl Beam {
    /// The initial beam: just the start ID, score zero.
    pub fn root(sos_id: u32) -> Self {
        Self {
            tokens: vec![sos_id],
            score: 0.0,
        }
    }

    /// A new beam with `token` appended and `-ln(probability + EPSILON)`
    /// added to the score.
    pub fn extend(&self, token: u32, probability: f32) -> Self {
        let mut tokens = Vec::with_capacity(self.tokens.len() + 1);
        tokens.extend_from_slice(&self.tokens);
        tokens.push(token);
        Self {
            tokens,
            score: self.score - (probability as f64 + EPSILON).ln(),
        }
    }

    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// How a beam left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    /// The beam emitted the end ID.
    Natural,
    /// The step budget ran out first.
    Forced,
}

/// A finished beam. Forced beams carry no score penalty relative to
/// natural ones.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedBeam {
    pub beam: Beam,
    pub termination: Termination,
}

/// Decoding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamSearch {
    /// Beams kept after each step. `1` is greedy decoding.
    pub beam_width: usize,
    /// Step budget. `None` uses the vocabulary's configured max length.
    pub max_len: Option<usize>,
}

impl Default for BeamSearch {
    fn default() -> Self {
        Self {
            beam_width: DEFAULT_BEAM_WIDTH,
            max_len: None,
        }
    }
}

impl BeamSearch {
    pub fn new(beam_width: usize) -> Self {
        Self {
            beam_width,
            max_len: None,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// Decode the best sequences for an emotion label.
    ///
    /// The label is validated before the scorer is touched. Results are
    /// sorted best first.
    pub fn decode<S>(
        &self,
        vocab: &Vocabulary,
        scorer: &S,
        emotion: &str,
    ) -> Result<Vec<CompletedBeam>, DecodeError>
    where
        S: Scorer + ?Sized,
    {
        let emotion_id = vocab
            .encode_emotion(emotion)
            .map_err(|_| DecodeError::InvalidEmotionLabel(emotion.to_string()))?;
        self.decode_id(vocab, scorer, emotion_id)
    }

    /// Decode for an already-encoded emotion ID.
    ///
    /// An ID outside the vocabulary's emotion table is rejected before the
    /// scorer is called.
    ///
    /// Each step expands every active beam by its `beam_width` most probable
    /// next tokens, moves end-ID children to the completed set, and prunes
    /// the remaining children (across all parents together) to the
    /// `beam_width` lowest scores. Beams still active when the step budget
    /// runs out are completed as forced.
    pub fn decode_id<S>(
        &self,
        vocab: &Vocabulary,
        scorer: &S,
        emotion_id: u32,
    ) -> Result<Vec<CompletedBeam>, DecodeError>
    where
        S: Scorer + ?Sized,
    {
        if !vocab.has_emotion_id(emotion_id) {
            return Err(DecodeError::InvalidEmotionId(emotion_id));
        }
        if self.beam_width == 0 {
            return Err(DecodeError::ZeroBeamWidth);
        }

        let max_len = self.max_len.unwrap_or_else(|| vocab.max_len());
        let width = self.beam_width;
        let eos_id = vocab.eos_id();

        let mut active = vec![Beam::root(vocab.sos_id())];
        let mut completed: Vec<CompletedBeam> = Vec::new();

        for step in 0..max_len {
            if active.is_empty() {
                break;
            }

            let mut pool: Vec<Beam> = Vec::with_capacity(active.len() * width);
            for beam in &active {
                let prefix = padded_prefix(beam.tokens(), max_len, vocab.pad_id());
                let position = beam.len() - 1;

                let distribution = scorer
                    .score_next(emotion_id, &prefix, position)
                    .and_then(|dist| validate_distribution(&dist, vocab.size()).map(|()| dist))
                    .map_err(|source| DecodeError::Scorer { step, source })?;

                for token in top_k(&distribution, width) {
                    let child = beam.extend(token, distribution[token as usize]);
                    if token == eos_id {
                        completed.push(CompletedBeam {
                            beam: child,
                            termination: Termination::Natural,
                        });
                    } else {
                        pool.push(child);
                    }
                }
            }

            pool.sort_by(compare_beams);
            pool.truncate(width);
            debug!(
                "step {}: {} active, {} completed",
                step,
                pool.len(),
                completed.len()
            );
            active = pool;
        }

        completed.extend(active.into_iter().map(|beam| CompletedBeam {
            beam,
            termination: Termination::Forced,
        }));
        sort_best_first(&mut completed);
        Ok(completed)
    }
}

/// The beam's tokens right-padded with PAD to `max_len`.
fn padded_prefix(tokens: &[u32], max_len: usize, pad_id: u32) -> Vec<u32> {
    let mut prefix = Vec::with_capacity(max_len.max(tokens.len()));
    prefix.extend_from_slice(tokens);
    prefix.resize(max_len.max(tokens.len()), pad_id);
    prefix
}

/// The `k` most probable token IDs. Equal probabilities go to the lower ID.
fn top_k(distribution: &[f32], k: usize) -> Vec<u32> {
    if k == 0 {
        return Vec::new();
    }
    let by_probability = |a: &u32, b: &u32| {
        distribution[*b as usize]
            .total_cmp(&distribution[*a as usize])
            .then(a.cmp(b))
    };
    let mut ids: Vec<u32> = (0..distribution.len() as u32).collect();
    if k < ids.len() {
        ids.select_nth_unstable_by(k - 1, by_probability);
        ids.truncate(k);
    }
    ids.sort_unstable_by(by_probability);
    ids
}
