/// Seed word cleanup and the static fallback lists used when decoding
/// yields nothing usable.

use crate::schema::emotion::Emotion;

/// Default cap on the number of seed words handed downstream.
pub const DEFAULT_MAX_WORDS: usize = 10;

/// Tokens that carry no meaning once special markers are stripped.
const INVALID_TOKENS: &[&str] = &["unk", "<unk>", "pad", "<pad>", "none", ""];

const DEFAULT_FALLBACK: [&str; 5] = ["light", "kindness", "calm", "friend", "moment"];

/// Split raw generator output into clean lowercase words.
///
/// Separators are whitespace and `, | / ;`. Non-word characters are
/// trimmed from each token's edges, placeholder tokens are dropped, and
/// only purely alphabetic ASCII words are kept, up to `max_words`.
pub fn clean_words(raw: &str, max_words: usize) -> Vec<String> {
    let mut cleaned = Vec::new();
    if max_words == 0 {
        return cleaned;
    }

    for token in raw.split(|c: char| c.is_whitespace() || matches!(c, ',' | '|' | '/' | ';')) {
        let word = token
            .trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'))
            .to_lowercase();
        if INVALID_TOKENS.contains(&word.as_str()) {
            continue;
        }
        if word.chars().all(|c| c.is_ascii_alphabetic()) {
            cleaned.push(word);
        }
        if cleaned.len() >= max_words {
            break;
        }
    }
    cleaned
}

/// The static word list for an emotion.
pub fn fallback_for(emotion: Emotion) -> [&'static str; 5] {
    match emotion {
        Emotion::Angry => ["focus", "path", "choice", "calm", "resolve"],
        Emotion::Disgust => ["change", "renewal", "growth", "fresh", "start"],
        Emotion::Fear => ["courage", "light", "hope", "friend", "bravery"],
        Emotion::Happy => ["sun", "music", "laughter", "joy", "breeze"],
        Emotion::Neutral => ["moment", "day", "quiet", "place", "time"],
        Emotion::Sad => ["rain", "warmth", "letter", "memory", "hug"],
        Emotion::Surprise => ["twist", "smile", "chance", "spark", "luck"],
    }
}

/// The static word list for a mood label, or a general list when the
/// label is not a known emotion.
pub fn fallback_words(mood: &str) -> Vec<String> {
    let words = match mood.parse::<Emotion>() {
        Ok(emotion) => fallback_for(emotion),
        Err(_) => DEFAULT_FALLBACK,
    };
    words.iter().map(|w| w.to_string()).collect()
}
