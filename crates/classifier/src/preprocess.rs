//! Text pre-processing applied before any tier runs

use concierge_config::constants::preprocessing::{REPEATED_WORD_MIN_WORDS, REPEATED_WORD_RATIO};
use std::borrow::Cow;
use std::collections::HashMap;

/// Collapse repeated-word spam to the repeated word
///
/// "wifi wifi wifi wifi" becomes "wifi". Applies only to messages of at
/// least three words where a single word makes up 80% or more of them.
pub fn collapse_repeated_words(text: &str) -> Cow<'_, str> {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    if words.len() < REPEATED_WORD_MIN_WORDS {
        return Cow::Borrowed(text);
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in &words {
        *counts.entry(word.as_str()).or_insert(0) += 1;
    }

    // At a ratio above one half at most one word can qualify
    let dominant = counts
        .into_iter()
        .find(|(_, count)| *count as f32 / words.len() as f32 >= REPEATED_WORD_RATIO);

    match dominant {
        Some((word, count)) => {
            tracing::debug!(word, count, total = words.len(), "Collapsed repeated-word message");
            Cow::Owned(word.to_string())
        }
        None => Cow::Borrowed(text),
    }
}
