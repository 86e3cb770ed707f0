/// Markov phrase model — training, serialization, and next-token scoring.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::core::scorer::{Scorer, ScorerError};
use crate::core::vocab::Vocabulary;

#[derive(Debug, Error)]
pub enum MarkovError {
    #[error("n-gram depth must be 2-4, got {0}")]
    InvalidDepth(usize),
    #[error("corpus tag is not a known emotion: {0:?}")]
    UnknownTag(String),
    #[error("model was trained against a different vocabulary")]
    VocabularyMismatch,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Transition table: n-gram prefix → [(next_token, count)].
pub type TransitionTable = HashMap<Vec<u32>, Vec<(u32, u32)>>;

/// A trained Markov model over vocabulary token IDs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MarkovModel {
    /// N-gram depth (e.g., 2 for bigrams, 3 for trigrams).
    pub n: usize,
    /// Distribution length, matching the vocabulary it was trained with.
    pub size: usize,
    pub sos_id: u32,
    pub eos_id: u32,
    pub transitions: TransitionTable,
    /// Emotion ID → transitions observed under that emotion's tag.
    pub tagged_transitions: HashMap<u32, TransitionTable>,
}

impl MarkovModel {
    /// Whether this model's token space lines up with `vocab`.
    pub fn is_compatible_with(&self, vocab: &Vocabulary) -> bool {
        self.size == vocab.size() && self.sos_id == vocab.sos_id() && self.eos_id == vocab.eos_id()
    }

    /// Check compatibility, reporting a mismatch as an error.
    pub fn check_vocabulary(&self, vocab: &Vocabulary) -> Result<(), MarkovError> {
        if self.is_compatible_with(vocab) {
            Ok(())
        } else {
            Err(MarkovError::VocabularyMismatch)
        }
    }

    /// The last n-1 tokens of `history`, left-filled with the start ID.
    fn state_for(&self, history: &[u32]) -> Vec<u32> {
        let width = self.n.saturating_sub(1);
        let take = history.len().min(width);
        let mut state = vec![self.sos_id; width - take];
        state.extend_from_slice(&history[history.len() - take..]);
        state
    }

    fn options_for(&self, emotion_id: u32, state: &[u32]) -> Option<&[(u32, u32)]> {
        self.tagged_transitions
            .get(&emotion_id)
            .and_then(|table| table.get(state))
            .or_else(|| self.transitions.get(state))
            .map(Vec::as_slice)
            .filter(|options| !options.is_empty())
    }
}

impl Scorer for MarkovModel {
    /// Relative frequencies of the tokens that followed this n-gram state.
    ///
    /// The emotion's own table is consulted before the global one. A state
    /// never seen in training puts all mass on the end ID.
    fn score_next(
        &self,
        emotion_id: u32,
        prefix: &[u32],
        position: usize,
    ) -> Result<Vec<f32>, ScorerError> {
        if position >= prefix.len() {
            return Err(ScorerError::Backend(format!(
                "position {} outside prefix of length {}",
                position,
                prefix.len()
            )));
        }

        let state = self.state_for(&prefix[..=position]);
        let mut distribution = vec![0.0f32; self.size];

        match self.options_for(emotion_id, &state) {
            Some(options) => {
                let total: u32 = options.iter().map(|(_, count)| count).sum();
                for (token, count) in options {
                    let slot = distribution.get_mut(*token as usize).ok_or_else(|| {
                        ScorerError::Backend(format!(
                            "token {} outside model size {}",
                            token, self.size
                        ))
                    })?;
                    *slot = *count as f32 / total as f32;
                }
            }
            None => {
                let slot = distribution.get_mut(self.eos_id as usize).ok_or_else(|| {
                    ScorerError::Backend(format!(
                        "end ID {} outside model size {}",
                        self.eos_id, self.size
                    ))
                })?;
                *slot = 1.0;
            }
        }

        Ok(distribution)
    }
}

/// Trains Markov models from raw text.
pub struct MarkovTrainer;

impl MarkovTrainer {
    /// Train a Markov model from a phrase corpus with the given n-gram depth.
    ///
    /// Lines of the form `[label]` tag all following phrases with that
    /// emotion until the next tag. Every other non-empty line is one phrase.
    /// Words missing from the vocabulary are skipped.
    pub fn train(text: &str, n: usize, vocab: &Vocabulary) -> Result<MarkovModel, MarkovError> {
        if !(2..=4).contains(&n) {
            return Err(MarkovError::InvalidDepth(n));
        }

        let mut transitions = TransitionTable::new();
        let mut tagged_transitions: HashMap<u32, TransitionTable> = HashMap::new();
        let mut current_tag: Option<u32> = None;

        for line in text.lines() {
            let trimmed = line.trim();

            if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() > 2 {
                let tag = &trimmed[1..trimmed.len() - 1];
                let emotion_id = vocab
                    .encode_emotion(tag)
                    .map_err(|_| MarkovError::UnknownTag(tag.to_string()))?;
                current_tag = Some(emotion_id);
                continue;
            }

            let tokens = tokenize(trimmed, vocab);
            if tokens.is_empty() {
                continue;
            }

            let mut padded = vec![vocab.sos_id(); n - 1];
            padded.extend(tokens);
            padded.push(vocab.eos_id());

            for window in padded.windows(n) {
                let prefix = window[..n - 1].to_vec();
                let next = window[n - 1];

                add_transition(&mut transitions, prefix.clone(), next);

                if let Some(tag) = current_tag {
                    add_transition(tagged_transitions.entry(tag).or_default(), prefix, next);
                }
            }
        }

        Ok(MarkovModel {
            n,
            size: vocab.size(),
            sos_id: vocab.sos_id(),
            eos_id: vocab.eos_id(),
            transitions,
            tagged_transitions,
        })
    }
}

/// Add a transition to a transition table, incrementing the count.
fn add_transition(table: &mut TransitionTable, prefix: Vec<u32>, next: u32) {
    let entries = table.entry(prefix).or_default();
    if let Some(entry) = entries.iter_mut().find(|(tok, _)| *tok == next) {
        entry.1 += 1;
    } else {
        entries.push((next, 1));
    }
}

/// Lowercase words with edge punctuation trimmed, mapped to vocabulary IDs.
fn tokenize(text: &str, vocab: &Vocabulary) -> Vec<u32> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .filter_map(|word| vocab.token_id(&word))
        .filter(|id| !vocab.is_special(*id))
        .collect()
}

/// Save a MarkovModel to a RON file.
pub fn save_model(model: &MarkovModel, path: &std::path::Path) -> Result<(), MarkovError> {
    let serialized = ron::ser::to_string_pretty(model, ron::ser::PrettyConfig::default())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    std::fs::write(path, serialized)?;
    Ok(())
}

/// Load a MarkovModel from a RON file.
pub fn load_model(path: &std::path::Path) -> Result<MarkovModel, MarkovError> {
    let contents = std::fs::read_to_string(path)?;
    let model: MarkovModel = ron::from_str(&contents)?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vocab() -> Vocabulary {
        Vocabulary::load_from_ron(std::path::Path::new("tests/fixtures/test_vocab.ron")).unwrap()
    }

    fn train_test_corpus(n: usize) -> (Vocabulary, MarkovModel) {
        let vocab = test_vocab();
        let corpus = std::fs::read_to_string("tests/fixtures/test_corpus.txt").unwrap();
        let model = MarkovTrainer::train(&corpus, n, &vocab).unwrap();
        (vocab, model)
    }

    fn id(vocab: &Vocabulary, word: &str) -> u32 {
        vocab.token_id(word).unwrap()
    }

    #[test]
    fn tokenize_maps_known_words() {
        let vocab = test_vocab();
        let tokens = tokenize("Courage, in the LIGHT!", &vocab);
        assert_eq!(
            tokens,
            vec![
                id(&vocab, "courage"),
                id(&vocab, "in"),
                id(&vocab, "the"),
                id(&vocab, "light")
            ]
        );
    }

    #[test]
    fn tokenize_skips_unknown_words() {
        let vocab = test_vocab();
        let tokens = tokenize("courage beyond measure", &vocab);
        assert_eq!(tokens, vec![id(&vocab, "courage")]);
    }

    #[test]
    fn train_creates_transitions() {
        let (vocab, model) = train_test_corpus(2);
        assert_eq!(model.n, 2);
        assert_eq!(model.size, vocab.size());
        assert!(!model.transitions.is_empty());
    }

    #[test]
    fn train_creates_tagged_transitions() {
        let (vocab, model) = train_test_corpus(2);
        for label in ["fear", "happy", "sad"] {
            let emotion = vocab.encode_emotion(label).unwrap();
            assert!(model.tagged_transitions.contains_key(&emotion), "{}", label);
        }
    }

    #[test]
    fn train_rejects_unknown_tag() {
        let vocab = test_vocab();
        let err = MarkovTrainer::train("[bored]\nthe day", 2, &vocab).unwrap_err();
        assert!(matches!(err, MarkovError::UnknownTag(ref t) if t == "bored"));
    }

    #[test]
    fn train_rejects_bad_depth() {
        let vocab = test_vocab();
        assert!(matches!(
            MarkovTrainer::train("the day", 5, &vocab),
            Err(MarkovError::InvalidDepth(5))
        ));
        assert!(matches!(
            MarkovTrainer::train("the day", 1, &vocab),
            Err(MarkovError::InvalidDepth(1))
        ));
    }

    #[test]
    fn tagged_distribution_uses_relative_counts() {
        let (vocab, model) = train_test_corpus(2);
        let fear = vocab.encode_emotion("fear").unwrap();
        let prefix = [vocab.sos_id(), vocab.pad_id(), vocab.pad_id()];

        let dist = model.score_next(fear, &prefix, 0).unwrap();
        assert_eq!(dist.len(), vocab.size());
        assert!((dist[id(&vocab, "courage") as usize] - 0.5).abs() < 1e-6);
        assert!((dist[id(&vocab, "hope") as usize] - 0.25).abs() < 1e-6);
        assert!((dist[id(&vocab, "a") as usize] - 0.25).abs() < 1e-6);
        let total: f32 = dist.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn padding_after_position_is_ignored() {
        let (vocab, model) = train_test_corpus(2);
        let fear = vocab.encode_emotion("fear").unwrap();
        let courage = id(&vocab, "courage");

        let padded = model
            .score_next(fear, &[vocab.sos_id(), courage, vocab.pad_id()], 1)
            .unwrap();
        let bare = model.score_next(fear, &[vocab.sos_id(), courage], 1).unwrap();
        assert_eq!(padded, bare);
        assert!((padded[id(&vocab, "in") as usize] - 0.5).abs() < 1e-6);
        assert!((padded[id(&vocab, "and") as usize] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn unseen_state_ends_phrase() {
        let (vocab, model) = train_test_corpus(2);
        let fear = vocab.encode_emotion("fear").unwrap();
        let twist = id(&vocab, "twist");

        let dist = model.score_next(fear, &[vocab.sos_id(), twist], 1).unwrap();
        assert_eq!(dist[vocab.eos_id() as usize], 1.0);
        assert_eq!(dist.iter().filter(|p| **p > 0.0).count(), 1);
    }

    #[test]
    fn untagged_emotion_falls_back_to_global_table() {
        let (vocab, model) = train_test_corpus(2);
        let surprise = vocab.encode_emotion("surprise").unwrap();
        assert!(!model.tagged_transitions.contains_key(&surprise));

        let prefix = [vocab.sos_id()];
        let dist = model.score_next(surprise, &prefix, 0).unwrap();
        let global = model.transitions.get(&vec![vocab.sos_id()]).unwrap();
        let total: u32 = global.iter().map(|(_, c)| c).sum();
        for (token, count) in global {
            let expected = *count as f32 / total as f32;
            assert!((dist[*token as usize] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn trigram_state_is_left_filled_with_start() {
        let (vocab, model) = train_test_corpus(3);
        assert_eq!(model.n, 3);
        let sos = vocab.sos_id();
        assert_eq!(model.state_for(&[sos]), vec![sos, sos]);
        assert_eq!(model.state_for(&[sos, 7]), vec![sos, 7]);
        assert_eq!(model.state_for(&[sos, 7, 9]), vec![7, 9]);

        let fear = vocab.encode_emotion("fear").unwrap();
        let dist = model.score_next(fear, &[sos, 0, 0], 0).unwrap();
        assert!((dist[id(&vocab, "courage") as usize] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn position_past_prefix_is_an_error() {
        let (vocab, model) = train_test_corpus(2);
        assert!(matches!(
            model.score_next(0, &[vocab.sos_id()], 3),
            Err(ScorerError::Backend(_))
        ));
    }

    #[test]
    fn compatibility_check() {
        let (vocab, mut model) = train_test_corpus(2);
        assert!(model.check_vocabulary(&vocab).is_ok());
        model.size += 1;
        assert!(matches!(
            model.check_vocabulary(&vocab),
            Err(MarkovError::VocabularyMismatch)
        ));
    }

    #[test]
    fn save_and_load_model() {
        let (_, model) = train_test_corpus(2);
        let path = std::path::PathBuf::from("target/test_markov_scorer.ron");
        std::fs::create_dir_all("target").unwrap();

        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();

        assert_eq!(loaded.n, model.n);
        assert_eq!(loaded.size, model.size);
        assert_eq!(loaded.transitions, model.transitions);
        assert_eq!(loaded.tagged_transitions, model.tagged_transitions);

        let _ = std::fs::remove_file(&path);
    }
}
