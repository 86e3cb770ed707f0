//! WASM bindings for mood-seed — powers the interactive web demo.

use wasm_bindgen::prelude::*;

use mood_seed::core::beam::{BeamSearch, Termination};
use mood_seed::core::markov::MarkovTrainer;
use mood_seed::core::pipeline::SeedEngine;
use mood_seed::core::vocab::Vocabulary;

// ---------------------------------------------------------------------------
// Embedded data — compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const VOCABULARY: &str = include_str!("../../data/vocab.ron");
    pub const CORPUS: &str = include_str!("../../data/corpus.txt");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct PhraseOutput {
    text: String,
    score: f64,
    finished: bool,
}

/// Seed phrase generator backed by a Markov scorer trained at construction.
#[wasm_bindgen]
pub struct SeedGenerator {
    engine: SeedEngine,
}

#[wasm_bindgen]
impl SeedGenerator {
    /// Build a generator from the embedded vocabulary and corpus.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<SeedGenerator, JsError> {
        Self::from_sources(data::VOCABULARY, data::CORPUS, 2, seed)
    }

    /// Build a generator from a vocabulary RON string and a tagged corpus.
    pub fn from_sources(
        vocab_src: &str,
        corpus_src: &str,
        ngram: usize,
        seed: u64,
    ) -> Result<SeedGenerator, JsError> {
        let vocab = Vocabulary::parse_ron(vocab_src)
            .map_err(|e| JsError::new(&format!("Vocabulary parse error: {e}")))?;
        let model = MarkovTrainer::train(corpus_src, ngram, &vocab)
            .map_err(|e| JsError::new(&format!("Training error: {e}")))?;

        let engine = SeedEngine::builder()
            .seed(seed)
            .with_vocabulary(vocab)
            .with_markov_model(model)
            .build()
            .map_err(|e| JsError::new(&format!("Engine build error: {e}")))?;

        Ok(SeedGenerator { engine })
    }

    /// Ranked phrases for an emotion. Returns a JSON array of
    /// `{ "text", "score", "finished" }`, best first.
    pub fn generate(&self, emotion: &str, beam_width: usize) -> Result<String, JsError> {
        let search = BeamSearch {
            beam_width,
            ..self.engine.search()
        };
        let phrases = self
            .engine
            .generate_with(emotion, search)
            .map_err(|e| JsError::new(&format!("Generation error: {e}")))?;

        let output: Vec<PhraseOutput> = phrases
            .into_iter()
            .map(|p| PhraseOutput {
                text: p.text,
                score: p.score,
                finished: p.termination == Termination::Natural,
            })
            .collect();
        serde_json::to_string(&output)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Seed words for an emotion as a JSON array of strings.
    pub fn seed_words(&self, emotion: &str) -> String {
        serde_json::to_string(&self.engine.seed_words(emotion))
            .unwrap_or_else(|_| "[]".to_string())
    }

    /// A story brief as JSON: `{ "mood", "tone", "words" }`.
    pub fn brief(&self, emotion: &str, variant: u64) -> Result<String, JsError> {
        serde_json::to_string(&self.engine.brief(emotion, variant))
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Return JSON array of the emotion labels this vocabulary accepts.
    pub fn emotions(&self) -> String {
        serde_json::to_string(&self.engine.vocabulary().emotion_labels())
            .unwrap_or_else(|_| "[]".to_string())
    }
}
