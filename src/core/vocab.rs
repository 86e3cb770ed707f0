/// Vocabulary codec — token and emotion lookup tables, sequence decoding.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VocabError {
    #[error("invalid emotion label: {0:?}")]
    InvalidEmotionLabel(String),
    #[error("vocabulary configuration error: {0}")]
    Configuration(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Placeholder emitted for IDs that have no entry in the vocabulary.
pub const UNKNOWN_TOKEN: &str = "<UNK>";

/// On-disk form of a vocabulary, as stored in a RON artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyFile {
    /// Token ID → token text. Sparse; gaps decode to [`UNKNOWN_TOKEN`].
    pub tokens: BTreeMap<u32, String>,
    /// Emotion label → emotion ID.
    pub emotions: BTreeMap<String, u32>,
    pub pad_id: u32,
    pub sos_id: u32,
    pub eos_id: u32,
    /// Configured maximum target sequence length.
    pub max_len: usize,
    /// Length of the distributions a scorer must return.
    /// Defaults to the highest known ID + 1.
    #[serde(default)]
    pub size: Option<usize>,
}

/// Immutable lookup tables for one trained model. Loaded once, never mutated.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: FxHashMap<u32, String>,
    token_ids: FxHashMap<String, u32>,
    emotions: FxHashMap<String, u32>,
    pad_id: u32,
    sos_id: u32,
    eos_id: u32,
    max_len: usize,
    size: usize,
}

impl Vocabulary {
    /// Validate a vocabulary artifact and build the lookup tables.
    pub fn from_file(file: VocabularyFile) -> Result<Self, VocabError> {
        let VocabularyFile {
            tokens,
            emotions,
            pad_id,
            sos_id,
            eos_id,
            max_len,
            size,
        } = file;

        if pad_id == sos_id || pad_id == eos_id || sos_id == eos_id {
            return Err(VocabError::Configuration(format!(
                "special IDs must be distinct (pad={}, sos={}, eos={})",
                pad_id, sos_id, eos_id
            )));
        }
        for (name, id) in [("pad", pad_id), ("sos", sos_id), ("eos", eos_id)] {
            if !tokens.contains_key(&id) {
                return Err(VocabError::Configuration(format!(
                    "{} ID {} has no entry in the token table",
                    name, id
                )));
            }
        }
        if max_len == 0 {
            return Err(VocabError::Configuration(
                "max_len must be positive".to_string(),
            ));
        }
        if emotions.is_empty() {
            return Err(VocabError::Configuration(
                "emotion table is empty".to_string(),
            ));
        }

        let highest = tokens
            .keys()
            .copied()
            .chain([pad_id, sos_id, eos_id])
            .max()
            .unwrap_or(0);
        let size = match size {
            Some(size) if size <= highest as usize => {
                return Err(VocabError::Configuration(format!(
                    "size {} does not cover token ID {}",
                    size, highest
                )));
            }
            Some(size) => size,
            None => highest as usize + 1,
        };

        // BTreeMap iterates in ascending ID order, so the lowest ID wins
        // when two IDs share the same text.
        let mut token_ids = FxHashMap::default();
        for (id, text) in &tokens {
            token_ids.entry(text.clone()).or_insert(*id);
        }

        Ok(Self {
            tokens: tokens.into_iter().collect(),
            token_ids,
            emotions: emotions.into_iter().collect(),
            pad_id,
            sos_id,
            eos_id,
            max_len,
            size,
        })
    }

    /// Parse a vocabulary from a RON string.
    pub fn parse_ron(input: &str) -> Result<Self, VocabError> {
        let file: VocabularyFile = ron::from_str(input)?;
        Self::from_file(file)
    }

    /// Load a vocabulary from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<Self, VocabError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Look up the ID of an emotion label.
    ///
    /// An unlisted label is a contract violation and is reported, never
    /// replaced by a default.
    pub fn encode_emotion(&self, label: &str) -> Result<u32, VocabError> {
        self.emotions
            .get(label)
            .copied()
            .ok_or_else(|| VocabError::InvalidEmotionLabel(label.to_string()))
    }

    /// Convert token IDs back to text.
    ///
    /// PAD, start and end IDs are dropped wherever they occur. IDs with no
    /// vocabulary entry become [`UNKNOWN_TOKEN`] in place. The remaining
    /// tokens are joined with single spaces.
    pub fn decode_sequence(&self, ids: &[u32]) -> String {
        ids.iter()
            .filter(|id| !self.is_special(**id))
            .map(|id| self.tokens.get(id).map(String::as_str).unwrap_or(UNKNOWN_TOKEN))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        self.tokens.get(&id).map(String::as_str)
    }

    pub fn token_id(&self, text: &str) -> Option<u32> {
        self.token_ids.get(text).copied()
    }

    /// Emotion labels in ascending order.
    pub fn emotion_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.emotions.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    /// Whether `id` is the encoding of some emotion label.
    pub fn has_emotion_id(&self, id: u32) -> bool {
        self.emotions.values().any(|&emotion_id| emotion_id == id)
    }

    pub fn is_special(&self, id: u32) -> bool {
        id == self.pad_id || id == self.sos_id || id == self.eos_id
    }

    pub fn pad_id(&self) -> u32 {
        self.pad_id
    }

    pub fn sos_id(&self) -> u32 {
        self.sos_id
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Number of entries a next-token distribution must have.
    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> VocabularyFile {
        VocabularyFile {
            tokens: BTreeMap::from([
                (0, "<PAD>".to_string()),
                (1, "<SOS>".to_string()),
                (2, "<EOS>".to_string()),
                (3, "light".to_string()),
                (4, "hope".to_string()),
            ]),
            emotions: BTreeMap::from([("fear".to_string(), 0), ("happy".to_string(), 1)]),
            pad_id: 0,
            sos_id: 1,
            eos_id: 2,
            max_len: 3,
            size: None,
        }
    }

    fn sample() -> Vocabulary {
        Vocabulary::from_file(sample_file()).unwrap()
    }

    #[test]
    fn encode_known_emotion() {
        let vocab = sample();
        assert_eq!(vocab.encode_emotion("fear").unwrap(), 0);
        assert_eq!(vocab.encode_emotion("happy").unwrap(), 1);
    }

    #[test]
    fn encode_unknown_emotion_fails() {
        let vocab = sample();
        match vocab.encode_emotion("unknown_label") {
            Err(VocabError::InvalidEmotionLabel(label)) => assert_eq!(label, "unknown_label"),
            other => panic!("expected InvalidEmotionLabel, got {:?}", other),
        }
    }

    #[test]
    fn decode_only_specials_is_empty() {
        let vocab = sample();
        assert_eq!(vocab.decode_sequence(&[1, 2]), "");
        assert_eq!(vocab.decode_sequence(&[]), "");
    }

    #[test]
    fn decode_strips_specials_anywhere() {
        let vocab = sample();
        assert_eq!(vocab.decode_sequence(&[1, 3, 0, 2, 4, 2, 0]), "light hope");
    }

    #[test]
    fn decode_unmapped_id_keeps_position() {
        let vocab = sample();
        assert_eq!(vocab.decode_sequence(&[1, 3, 42, 4, 2]), "light <UNK> hope");
    }

    #[test]
    fn size_defaults_to_highest_id_plus_one() {
        assert_eq!(sample().size(), 5);

        let mut file = sample_file();
        file.size = Some(8);
        assert_eq!(Vocabulary::from_file(file).unwrap().size(), 8);
    }

    #[test]
    fn size_too_small_is_rejected() {
        let mut file = sample_file();
        file.size = Some(4);
        assert!(matches!(
            Vocabulary::from_file(file),
            Err(VocabError::Configuration(_))
        ));
    }

    #[test]
    fn duplicate_special_ids_are_rejected() {
        let mut file = sample_file();
        file.eos_id = 1;
        assert!(matches!(
            Vocabulary::from_file(file),
            Err(VocabError::Configuration(_))
        ));
    }

    #[test]
    fn missing_special_token_is_rejected() {
        for id in [0, 1, 2] {
            let mut file = sample_file();
            file.tokens.remove(&id);
            assert!(matches!(
                Vocabulary::from_file(file),
                Err(VocabError::Configuration(_))
            ));
        }
    }

    #[test]
    fn emotion_ids_are_recognized() {
        let vocab = sample();
        assert!(vocab.has_emotion_id(0));
        assert!(vocab.has_emotion_id(1));
        assert!(!vocab.has_emotion_id(999));
    }

    #[test]
    fn zero_max_len_is_rejected() {
        let mut file = sample_file();
        file.max_len = 0;
        assert!(Vocabulary::from_file(file).is_err());
    }

    #[test]
    fn token_lookup_both_directions() {
        let vocab = sample();
        assert_eq!(vocab.token(3), Some("light"));
        assert_eq!(vocab.token(9), None);
        assert_eq!(vocab.token_id("hope"), Some(4));
        assert_eq!(vocab.token_id("despair"), None);
    }

    #[test]
    fn emotion_labels_sorted() {
        assert_eq!(sample().emotion_labels(), vec!["fear", "happy"]);
    }

    #[test]
    fn ron_round_trip() {
        let serialized = ron::to_string(&sample_file()).unwrap();
        let vocab = Vocabulary::parse_ron(&serialized).unwrap();
        assert_eq!(vocab.max_len(), 3);
        assert_eq!(vocab.eos_id(), 2);
        assert_eq!(vocab.decode_sequence(&[1, 4, 3, 2]), "hope light");
    }

    #[test]
    fn load_fixture_vocabulary() {
        let path = std::path::PathBuf::from("tests/fixtures/test_vocab.ron");
        let vocab = Vocabulary::load_from_ron(&path).unwrap();
        assert!(vocab.encode_emotion("fear").is_ok());
        assert!(vocab.token_id("light").is_some());
    }
}
