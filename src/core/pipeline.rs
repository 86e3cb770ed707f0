/// The seed phrase pipeline: emotion label → ranked phrases → seed words.
///
/// Wires together the vocabulary, a bound scorer, beam search decoding,
/// ranking, and the fallback word policy.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::beam::{BeamSearch, DecodeError, DEFAULT_BEAM_WIDTH};
use crate::core::fallback::{clean_words, fallback_words, DEFAULT_MAX_WORDS};
use crate::core::markov::{MarkovError, MarkovModel};
use crate::core::ranking::{format_results, SeedPhrase};
use crate::core::scorer::Scorer;
use crate::core::vocab::{VocabError, Vocabulary};
use crate::schema::brief::StoryBrief;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("markov error: {0}")]
    Markov(#[from] MarkovError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("configuration error: {0}")]
    Configuration(String),
}

fn default_beam_width() -> usize {
    DEFAULT_BEAM_WIDTH
}

fn default_max_words() -> usize {
    DEFAULT_MAX_WORDS
}

/// Engine settings, loadable from a RON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the vocabulary artifact.
    #[serde(default)]
    pub vocabulary: Option<String>,
    /// Path to a trained Markov scorer.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_beam_width")]
    pub beam_width: usize,
    /// Overrides the vocabulary's configured max length.
    #[serde(default)]
    pub max_len: Option<usize>,
    /// Seed for tone selection in story briefs.
    #[serde(default)]
    pub seed: u64,
    /// Cap on seed words handed downstream.
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            vocabulary: None,
            model: None,
            beam_width: DEFAULT_BEAM_WIDTH,
            max_len: None,
            seed: 0,
            max_words: DEFAULT_MAX_WORDS,
        }
    }
}

impl EngineConfig {
    pub fn parse_ron(input: &str) -> Result<Self, PipelineError> {
        Ok(ron::from_str(input)?)
    }

    pub fn load_from_ron(path: &Path) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }
}

/// The initialized, immutable decoding context. Built via `SeedEngine::builder()`.
///
/// Every call decodes over private state, so one engine can serve many
/// callers as long as the bound scorer tolerates concurrent use.
pub struct SeedEngine {
    vocab: Vocabulary,
    scorer: Box<dyn Scorer + Send + Sync>,
    search: BeamSearch,
    max_words: usize,
    seed: u64,
}

/// Builder for constructing a `SeedEngine`.
pub struct SeedEngineBuilder {
    config: Option<EngineConfig>,
    config_path: Option<String>,
    vocabulary_path: Option<String>,
    model_path: Option<String>,
    beam_width: Option<usize>,
    max_len: Option<usize>,
    seed: Option<u64>,
    max_words: Option<usize>,
    /// Directly provided vocabulary (for testing without files).
    vocabulary: Option<Vocabulary>,
    /// Directly provided scorer; takes precedence over any Markov model.
    scorer: Option<Box<dyn Scorer + Send + Sync>>,
    /// Directly provided Markov model (for testing without files).
    markov_model: Option<MarkovModel>,
}

impl SeedEngine {
    pub fn builder() -> SeedEngineBuilder {
        SeedEngineBuilder {
            config: None,
            config_path: None,
            vocabulary_path: None,
            model_path: None,
            beam_width: None,
            max_len: None,
            seed: None,
            max_words: None,
            vocabulary: None,
            scorer: None,
            markov_model: None,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn search(&self) -> BeamSearch {
        self.search
    }

    /// Ranked seed phrases for an emotion using the engine's defaults.
    pub fn generate(&self, emotion: &str) -> Result<Vec<SeedPhrase>, PipelineError> {
        self.generate_with(emotion, self.search)
    }

    /// Ranked seed phrases for an emotion with explicit search parameters.
    pub fn generate_with(
        &self,
        emotion: &str,
        search: BeamSearch,
    ) -> Result<Vec<SeedPhrase>, PipelineError> {
        let completed = search.decode(&self.vocab, &*self.scorer, emotion)?;
        debug!(
            "decoded {} candidates for {:?} (width {})",
            completed.len(),
            emotion,
            search.beam_width
        );
        Ok(format_results(&self.vocab, &completed))
    }

    /// Clean words from the best phrase, ready for a story generator.
    ///
    /// Any decode failure or an empty result is replaced by the emotion's
    /// static fallback list.
    pub fn seed_words(&self, emotion: &str) -> Vec<String> {
        let best = match self.generate(emotion) {
            Ok(phrases) => phrases.into_iter().next(),
            Err(e) => {
                warn!("decoding failed for {:?}, using fallback words: {}", emotion, e);
                None
            }
        };

        let words = best
            .map(|phrase| clean_words(&phrase.text, self.max_words))
            .unwrap_or_default();
        if words.is_empty() {
            warn!("no usable seed words for {:?}, using fallback words", emotion);
            return fallback_words(emotion);
        }
        words
    }

    /// A story brief for an emotion. `variant` offsets the tone seed.
    pub fn brief(&self, emotion: &str, variant: u64) -> StoryBrief {
        let words = self.seed_words(emotion);
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(variant));
        StoryBrief::compose(emotion, &words.join(" "), self.max_words, &mut rng)
    }
}

impl SeedEngineBuilder {
    /// Use these settings as the base configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the base configuration from a RON file at build time.
    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    pub fn vocabulary_path(mut self, path: &str) -> Self {
        self.vocabulary_path = Some(path.to_string());
        self
    }

    pub fn model_path(mut self, path: &str) -> Self {
        self.model_path = Some(path.to_string());
        self
    }

    pub fn beam_width(mut self, beam_width: usize) -> Self {
        self.beam_width = Some(beam_width);
        self
    }

    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn max_words(mut self, max_words: usize) -> Self {
        self.max_words = Some(max_words);
        self
    }

    /// Provide the vocabulary directly (for testing without files).
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Bind an arbitrary scorer.
    pub fn with_scorer<S>(mut self, scorer: S) -> Self
    where
        S: Scorer + Send + Sync + 'static,
    {
        self.scorer = Some(Box::new(scorer));
        self
    }

    /// Provide a Markov model directly (for testing without files).
    pub fn with_markov_model(mut self, model: MarkovModel) -> Self {
        self.markov_model = Some(model);
        self
    }

    pub fn build(self) -> Result<SeedEngine, PipelineError> {
        let mut config = match (self.config_path, self.config) {
            (Some(path), _) => EngineConfig::load_from_ron(Path::new(&path))?,
            (None, Some(config)) => config,
            (None, None) => EngineConfig::default(),
        };

        // Explicit builder settings override the base configuration.
        if let Some(path) = self.vocabulary_path {
            config.vocabulary = Some(path);
        }
        if let Some(path) = self.model_path {
            config.model = Some(path);
        }
        if let Some(beam_width) = self.beam_width {
            config.beam_width = beam_width;
        }
        if self.max_len.is_some() {
            config.max_len = self.max_len;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(max_words) = self.max_words {
            config.max_words = max_words;
        }

        if config.beam_width == 0 {
            return Err(PipelineError::Configuration(
                "beam width must be positive".to_string(),
            ));
        }

        let vocab = match (self.vocabulary, &config.vocabulary) {
            (Some(vocab), _) => vocab,
            (None, Some(path)) => {
                info!("loading vocabulary from {}", path);
                Vocabulary::load_from_ron(Path::new(path))?
            }
            (None, None) => {
                return Err(PipelineError::Configuration(
                    "no vocabulary provided".to_string(),
                ))
            }
        };

        let scorer: Box<dyn Scorer + Send + Sync> = match (self.scorer, self.markov_model) {
            (Some(scorer), _) => scorer,
            (None, Some(model)) => {
                model.check_vocabulary(&vocab)?;
                Box::new(model)
            }
            (None, None) => match &config.model {
                Some(path) => {
                    info!("loading markov scorer from {}", path);
                    let model = crate::core::markov::load_model(Path::new(path))?;
                    model.check_vocabulary(&vocab)?;
                    Box::new(model)
                }
                None => {
                    return Err(PipelineError::Configuration(
                        "no scorer bound".to_string(),
                    ))
                }
            },
        };

        let search = BeamSearch {
            beam_width: config.beam_width,
            max_len: config.max_len,
        };
        info!(
            "seed engine ready: {} emotions, vocabulary size {}, beam width {}",
            vocab.emotion_labels().len(),
            vocab.size(),
            search.beam_width
        );

        Ok(SeedEngine {
            vocab,
            scorer,
            search,
            max_words: config.max_words,
            seed: config.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::beam::Termination;
    use crate::core::markov::MarkovTrainer;
    use crate::core::scorer::ScorerError;

    fn test_vocab() -> Vocabulary {
        Vocabulary::load_from_ron(Path::new("tests/fixtures/test_vocab.ron")).unwrap()
    }

    fn build_test_engine() -> SeedEngine {
        let vocab = test_vocab();
        let corpus = std::fs::read_to_string("tests/fixtures/test_corpus.txt").unwrap();
        let model = MarkovTrainer::train(&corpus, 2, &vocab).unwrap();

        SeedEngine::builder()
            .seed(42)
            .with_vocabulary(vocab)
            .with_markov_model(model)
            .build()
            .unwrap()
    }

    #[test]
    fn generate_produces_sorted_output() {
        let engine = build_test_engine();
        let phrases = engine.generate("fear").unwrap();
        assert!(!phrases.is_empty());
        for pair in phrases.windows(2) {
            assert!(pair[0].score <= pair[1].score);
        }
    }

    #[test]
    fn greedy_fear_phrase() {
        // courage (1/2) → and/in tie goes to "and" (lower ID) → hope → end (2/3)
        let engine = build_test_engine();
        let phrases = engine
            .generate_with("fear", BeamSearch::new(1))
            .unwrap();
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].text, "courage and hope");
        assert_eq!(phrases[0].termination, Termination::Natural);
        let expected = -(0.5f64 + 1e-9).ln() * 2.0 - (1.0f64 + 1e-9).ln() - (2.0f64 / 3.0 + 1e-9).ln();
        assert!((phrases[0].score - expected).abs() < 1e-4);
    }

    #[test]
    fn wider_beam_finds_better_phrase() {
        let engine = build_test_engine();
        let phrases = engine.generate("fear").unwrap();
        assert_eq!(phrases[0].text, "courage in the light");
        assert!(phrases[0].score < 1.39);
    }

    #[test]
    fn invalid_emotion_is_reported() {
        let engine = build_test_engine();
        let err = engine.generate("unknown_label").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Decode(DecodeError::InvalidEmotionLabel(_))
        ));
    }

    #[test]
    fn seed_words_from_best_phrase() {
        let engine = build_test_engine();
        assert_eq!(engine.seed_words("fear"), vec!["courage", "in", "the", "light"]);
    }

    #[test]
    fn seed_words_fall_back_on_invalid_emotion() {
        let engine = build_test_engine();
        assert_eq!(
            engine.seed_words("bored"),
            vec!["light", "kindness", "calm", "friend", "moment"]
        );
    }

    #[test]
    fn seed_words_fall_back_on_scorer_failure() {
        let engine = SeedEngine::builder()
            .with_vocabulary(test_vocab())
            .with_scorer(|_: u32, _: &[u32], _: usize| -> Result<Vec<f32>, ScorerError> {
                Err(ScorerError::Backend("unavailable".to_string()))
            })
            .build()
            .unwrap();

        assert!(matches!(
            engine.generate("sad"),
            Err(PipelineError::Decode(DecodeError::Scorer { step: 0, .. }))
        ));
        assert_eq!(engine.seed_words("sad"), fallback_words("sad"));
    }

    #[test]
    fn seed_words_fall_back_on_empty_phrase() {
        let engine = SeedEngine::builder()
            .with_vocabulary(test_vocab())
            .with_scorer(|_: u32, _: &[u32], _: usize| -> Result<Vec<f32>, ScorerError> {
                let mut dist = vec![0.0; 43];
                dist[2] = 1.0;
                Ok(dist)
            })
            .build()
            .unwrap();

        let phrases = engine.generate("happy").unwrap();
        assert_eq!(phrases[0].text, "");
        assert_eq!(engine.seed_words("happy"), fallback_words("happy"));
    }

    #[test]
    fn brief_is_deterministic_for_same_variant() {
        let engine = build_test_engine();
        let a = engine.brief("fear", 0);
        let b = engine.brief("fear", 0);
        assert_eq!(a, b);
        assert_eq!(a.mood, "fear");
        assert_eq!(a.words, vec!["courage", "in", "the", "light"]);
    }

    #[test]
    fn builder_requires_vocabulary() {
        let result = SeedEngine::builder()
            .with_scorer(|_: u32, _: &[u32], _: usize| -> Result<Vec<f32>, ScorerError> {
                Ok(Vec::new())
            })
            .build();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn builder_requires_scorer() {
        let result = SeedEngine::builder().with_vocabulary(test_vocab()).build();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn builder_rejects_zero_width() {
        let result = SeedEngine::builder()
            .beam_width(0)
            .with_vocabulary(test_vocab())
            .with_markov_model(MarkovModel::default())
            .build();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn builder_rejects_mismatched_model() {
        let result = SeedEngine::builder()
            .with_vocabulary(test_vocab())
            .with_markov_model(MarkovModel::default())
            .build();
        assert!(matches!(
            result,
            Err(PipelineError::Markov(MarkovError::VocabularyMismatch))
        ));
    }

    #[test]
    fn builder_overrides_config() {
        let config = EngineConfig::parse_ron("(beam_width: 5, max_len: Some(2), seed: 9)").unwrap();
        assert_eq!(config.max_words, DEFAULT_MAX_WORDS);

        let vocab = test_vocab();
        let corpus = std::fs::read_to_string("tests/fixtures/test_corpus.txt").unwrap();
        let model = MarkovTrainer::train(&corpus, 2, &vocab).unwrap();
        let engine = SeedEngine::builder()
            .config(config)
            .beam_width(2)
            .with_vocabulary(vocab)
            .with_markov_model(model)
            .build()
            .unwrap();

        assert_eq!(engine.search(), BeamSearch::new(2).with_max_len(2));
        assert_eq!(engine.seed, 9);
    }

    #[test]
    fn builder_loads_from_paths() {
        let vocab = test_vocab();
        let corpus = std::fs::read_to_string("tests/fixtures/test_corpus.txt").unwrap();
        let model = MarkovTrainer::train(&corpus, 2, &vocab).unwrap();
        std::fs::create_dir_all("target").unwrap();
        let model_path = "target/test_pipeline_model.ron";
        crate::core::markov::save_model(&model, Path::new(model_path)).unwrap();

        let engine = SeedEngine::builder()
            .vocabulary_path("tests/fixtures/test_vocab.ron")
            .model_path(model_path)
            .build()
            .unwrap();
        assert_eq!(engine.generate("fear").unwrap()[0].text, "courage in the light");

        let _ = std::fs::remove_file(model_path);
    }

    #[test]
    fn config_defaults() {
        let config = EngineConfig::parse_ron("()").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.beam_width, 3);
    }
}
