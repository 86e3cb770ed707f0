//! Mood Seed — emotion-conditioned seed phrase generation.
//!
//! Turns an emotion label into a small ranked set of candidate word
//! sequences by running a bounded beam search over a next-token scoring
//! model. The phrases are meant as creative seed input for a downstream
//! story generator.

pub mod core;
pub mod schema;
