//! Multi-intent splitter
//!
//! Guests often pack several requests into one message ("How much is the
//! room? And is there wifi?"). The splitter cuts such messages into
//! segments and classifies each with the keyword and semantic matchers.

use concierge_config::{IntentConfig, Tier};
use concierge_core::language::contains_cjk;
use concierge_core::{
    entity_keys, intents, ChatMessage, IntentResult, IntentSource, KeywordMatcher, Language,
    MatchQuery, SemanticMatcher,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Latin conjunctions need word boundaries; CJK ones cannot have them
static CONJUNCTIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:\b(?:and|also|but|plus|dan|juga|serta|tapi)\b|还有|另外|以及|并且|而且|和)\s*")
        .unwrap()
});

/// A segment made of nothing but a conjunction
static BARE_CONJUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:and|also|but|plus|dan|juga|serta|tapi|还有|另外|以及|并且|而且|和)$").unwrap()
});

static LEADING_CONJUNCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:and|also|but|plus|dan|juga|serta|tapi)\b|还有|另外|以及|并且|而且)[\s,，]*").unwrap()
});

/// Phrases that contain a conjunction but ask for one thing
static SINGLE_INTENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(book and pay|bed and breakfast|tea and coffee|pick ?up and drop ?off|check[ -]?in and check[ -]?out|check[ -]?in and out|in and out|come and go|tempah dan bayar|daftar masuk dan keluar)\b|入住和退房|预订和付款",
    )
    .unwrap()
});

const QUESTION_MARKS: [char; 2] = ['?', '？'];
const CJK_BOUNDARIES: [char; 3] = ['。', '，', '；'];

/// Segments must be longer than this to count on a `?` split
const MIN_QUESTION_SEGMENT_CHARS: usize = 2;

/// Split a compound message; `None` unless two or more segments result
pub fn split(text: &str) -> Option<Vec<String>> {
    let text = text.trim();
    if text.is_empty() || SINGLE_INTENT.is_match(text) {
        return None;
    }

    split_on_questions(text)
        .or_else(|| split_on_conjunctions(text))
        .or_else(|| {
            if contains_cjk(text) {
                split_on_cjk_punctuation(text)
            } else {
                None
            }
        })
}

fn at_least_two(segments: Vec<String>) -> Option<Vec<String>> {
    (segments.len() >= 2).then_some(segments)
}

fn strip_leading_conjunction(segment: &str) -> &str {
    match LEADING_CONJUNCTION.find(segment) {
        Some(m) if m.end() < segment.len() => segment[m.end()..].trim(),
        _ => segment,
    }
}

fn split_on_questions(text: &str) -> Option<Vec<String>> {
    if !text.contains(QUESTION_MARKS) {
        return None;
    }

    let parts: Vec<&str> = text.split(QUESTION_MARKS).collect();
    let last = parts.len() - 1;
    let segments = parts
        .iter()
        .enumerate()
        .filter_map(|(i, part)| {
            let part = strip_leading_conjunction(part.trim());
            if part.chars().count() <= MIN_QUESTION_SEGMENT_CHARS {
                return None;
            }
            // Only the text after the final '?' is a trailing fragment
            Some(if i < last { format!("{}?", part) } else { part.to_string() })
        })
        .collect();

    at_least_two(segments)
}

fn split_on_conjunctions(text: &str) -> Option<Vec<String>> {
    let segments = CONJUNCTIONS
        .split(text)
        .map(|s| s.trim().trim_matches(|c: char| c == ',' || c == '，'))
        .filter(|s| !s.is_empty() && !BARE_CONJUNCTION.is_match(s))
        .map(str::to_string)
        .collect();

    at_least_two(segments)
}

fn split_on_cjk_punctuation(text: &str) -> Option<Vec<String>> {
    let segments = text
        .split(CJK_BOUNDARIES)
        .map(|s| strip_leading_conjunction(s.trim()))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    at_least_two(segments)
}

/// Per-segment classifier for compound messages
pub struct MultiIntentSplitter {
    fuzzy: Arc<dyn KeywordMatcher>,
    semantic: Arc<dyn SemanticMatcher>,
}

impl MultiIntentSplitter {
    pub fn new(fuzzy: Arc<dyn KeywordMatcher>, semantic: Arc<dyn SemanticMatcher>) -> Self {
        Self { fuzzy, semantic }
    }

    pub fn split(&self, text: &str) -> Option<Vec<String>> {
        split(text)
    }

    /// Classify every segment and combine the distinct intents
    ///
    /// Two or more distinct non-trivial intents give the first one as
    /// primary, annotated with the full list. Exactly one is returned as
    /// is. Nothing usable gives `None`.
    pub async fn classify_compound(
        &self,
        text: &str,
        history: &[ChatMessage],
        last_intent: Option<&str>,
        language: Language,
        config: &IntentConfig,
    ) -> Option<IntentResult> {
        let segments = self.split(text)?;
        let mut found: Vec<IntentResult> = Vec::new();

        for segment in &segments {
            let Some(result) = self
                .classify_segment(segment, history, last_intent, language, config)
                .await
            else {
                continue;
            };
            if intents::is_trivial(&result.category) {
                continue;
            }
            if !found.iter().any(|r| r.category == result.category) {
                found.push(result);
            }
        }

        tracing::debug!(
            segments = segments.len(),
            intents = found.len(),
            "Multi-intent split"
        );

        match found.len() {
            0 => None,
            1 => found.into_iter().next(),
            _ => {
                let all = found
                    .iter()
                    .map(|r| r.category.as_str())
                    .collect::<Vec<_>>()
                    .join(",");
                let segment_count = segments.len().to_string();
                found.into_iter().next().map(|primary| {
                    primary
                        .with_entity(entity_keys::MULTI_INTENT, "true")
                        .with_entity(entity_keys::ALL_INTENTS, all)
                        .with_entity(entity_keys::SEGMENT_COUNT, segment_count)
                })
            }
        }
    }

    async fn classify_segment(
        &self,
        segment: &str,
        history: &[ChatMessage],
        last_intent: Option<&str>,
        language: Language,
        config: &IntentConfig,
    ) -> Option<IntentResult> {
        if config.is_enabled(Tier::Fuzzy) {
            let context = ChatMessage::window(history, config.tier(Tier::Fuzzy).context_messages);
            let query = MatchQuery::new(segment)
                .with_context(context)
                .with_last_intent(last_intent);
            if let Some(m) = self.fuzzy.find_match(&query) {
                if m.score >= config.threshold_for(Tier::Fuzzy, &m.intent) {
                    return Some(
                        IntentResult::new(m.intent, m.score, IntentSource::Fuzzy, language)
                            .with_matched_keyword(m.matched_keyword),
                    );
                }
            }
        }

        if config.is_enabled(Tier::Semantic) && self.semantic.is_ready() {
            let context =
                ChatMessage::window(history, config.tier(Tier::Semantic).context_messages);
            let query = MatchQuery::new(segment).with_context(context);
            match self.semantic.find_match(&query).await {
                Ok(Some(m)) if m.score >= config.threshold_for(Tier::Semantic, &m.intent) => {
                    return Some(
                        IntentResult::new(m.intent, m.score, IntentSource::Semantic, language)
                            .with_matched_example(m.matched_example),
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "Semantic match failed for segment"),
            }
        }

        None
    }
}
