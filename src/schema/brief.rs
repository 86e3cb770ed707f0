use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::emotion::Emotion;
use crate::core::fallback::{clean_words, fallback_words};

/// Tone used when the mood is not a recognized emotion.
pub const DEFAULT_TONE: &str = "feel-good short fiction";

/// Everything the downstream story generator needs as creative input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryBrief {
    pub mood: String,
    pub tone: String,
    pub words: Vec<String>,
}

/// Tone hints per emotion, each steering toward an uplifting story.
pub fn tones_for(emotion: Emotion) -> [&'static str; 3] {
    match emotion {
        Emotion::Angry => ["motivational comeback", "redemption arc", "reflective journey"],
        Emotion::Disgust => ["renewal story", "personal transformation", "fresh start"],
        Emotion::Fear => ["courageous adventure", "hopeful suspense", "inner triumph"],
        Emotion::Happy => ["wholesome slice of life", "romantic comedy", "light adventure"],
        Emotion::Neutral => ["simple reflection", "ordinary day", "gentle vignette"],
        Emotion::Sad => ["uplifting drama", "hopeful reflection", "quiet reunion"],
        Emotion::Surprise => ["unexpected joy", "serendipitous moment", "delightful twist"],
    }
}

impl StoryBrief {
    /// Build a brief from a mood label and raw seed text.
    ///
    /// Empty moods become "neutral". The seed text is cleaned; if nothing
    /// survives, the mood's fallback words are used instead.
    pub fn compose(mood: &str, raw_words: &str, max_words: usize, rng: &mut StdRng) -> Self {
        let mood = match mood.trim().to_lowercase() {
            m if m.is_empty() => "neutral".to_string(),
            m => m,
        };

        let tone = match mood.parse::<Emotion>() {
            Ok(emotion) => tones_for(emotion)
                .choose(rng)
                .copied()
                .unwrap_or(DEFAULT_TONE),
            Err(_) => DEFAULT_TONE,
        };

        let mut words = clean_words(raw_words, max_words);
        if words.is_empty() {
            words = fallback_words(&mood);
        }

        Self {
            mood,
            tone: tone.to_string(),
            words,
        }
    }
}
