/// Result formatting — best-first ordering and conversion back to text.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::beam::{Beam, CompletedBeam, Termination};
use crate::core::vocab::Vocabulary;

/// A decoded candidate phrase with its cumulative negative log-probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPhrase {
    pub text: String,
    pub score: f64,
    pub termination: Termination,
}

impl SeedPhrase {
    /// The phrase split into its words.
    pub fn words(&self) -> Vec<&str> {
        self.text.split_whitespace().collect()
    }
}

/// Ascending score, then lexicographic token sequence.
pub fn compare_beams(a: &Beam, b: &Beam) -> Ordering {
    a.score()
        .total_cmp(&b.score())
        .then_with(|| a.tokens().cmp(b.tokens()))
}

/// Sort completed beams best (lowest score) first.
pub fn sort_best_first(completed: &mut [CompletedBeam]) {
    completed.sort_by(|a, b| compare_beams(&a.beam, &b.beam));
}

/// Decode each completed beam to text, preserving order.
pub fn format_results(vocab: &Vocabulary, completed: &[CompletedBeam]) -> Vec<SeedPhrase> {
    completed
        .iter()
        .map(|done| SeedPhrase {
            text: vocab.decode_sequence(done.beam.tokens()),
            score: done.beam.score(),
            termination: done.termination,
        })
        .collect()
}

/// Sort and format in one pass.
pub fn rank(vocab: &Vocabulary, mut completed: Vec<CompletedBeam>) -> Vec<SeedPhrase> {
    sort_best_first(&mut completed);
    format_results(vocab, &completed)
}
