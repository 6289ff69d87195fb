//! Fuzzy keyword matcher (Tier 2)
//!
//! Scores a message against per-language keyword tables:
//! - exact message match scores 1.0
//! - whole-phrase containment scores 0.9 plus up to 0.1 for coverage
//! - otherwise Jaro-Winkler similarity over token windows of the keyword's
//!   length, weighted down so a near-miss never outranks a containment
//!
//! CJK keywords only match by containment; guests do not misspell
//! ideographs the way they misspell "pasword".

use concierge_core::{
    ChatMessage, Error, KeywordMatch, KeywordMatcher, Language, MatchQuery, Result,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use concierge_core::language::contains_cjk;

/// Boost when the candidate repeats the previous intent
pub const LAST_INTENT_BOOST: f32 = 0.05;

/// Boost when a candidate keyword already appeared in the history window
pub const HISTORY_KEYWORD_BOOST: f32 = 0.03;

/// Weight on Jaro-Winkler similarity for non-contained keywords
const SIMILARITY_WEIGHT: f32 = 0.85;

/// Scores below this are not reported at all
const MIN_REPORTED_SCORE: f32 = 0.5;

/// Keyword table row: `{intent, keywords: {lang: [..]}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub intent: String,
    pub keywords: BTreeMap<Language, Vec<String>>,
}

impl KeywordEntry {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            keywords: BTreeMap::new(),
        }
    }

    pub fn with_keywords(mut self, language: Language, keywords: &[&str]) -> Self {
        self.keywords
            .entry(language)
            .or_default()
            .extend(keywords.iter().map(|k| k.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
struct PreparedKeyword {
    language: Language,
    original: String,
    normalized: String,
    token_count: usize,
    cjk: bool,
}

#[derive(Debug, Clone)]
struct PreparedEntry {
    intent: String,
    keywords: Vec<PreparedKeyword>,
}

impl PreparedEntry {
    fn from_entry(entry: &KeywordEntry) -> Self {
        let keywords = entry
            .keywords
            .iter()
            .flat_map(|(language, words)| {
                words.iter().filter_map(move |word| {
                    let normalized = normalize(word);
                    if normalized.is_empty() {
                        return None;
                    }
                    Some(PreparedKeyword {
                        language: *language,
                        original: word.clone(),
                        token_count: normalized.split(' ').count(),
                        cjk: contains_cjk(&normalized),
                        normalized,
                    })
                })
            })
            .collect();

        Self {
            intent: entry.intent.clone(),
            keywords,
        }
    }
}

/// Lowercase, punctuation to spaces, single-spaced
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Score one keyword against a normalized message
fn score_keyword(text: &str, tokens: &[&str], keyword: &PreparedKeyword) -> f32 {
    if text == keyword.normalized {
        return 1.0;
    }

    let contained = if keyword.cjk {
        text.contains(&keyword.normalized)
    } else {
        format!(" {} ", text).contains(&format!(" {} ", keyword.normalized))
    };
    if contained {
        let coverage =
            keyword.normalized.chars().count() as f32 / text.chars().count().max(1) as f32;
        return 0.9 + 0.1 * coverage.min(1.0);
    }

    if keyword.cjk || tokens.len() < keyword.token_count {
        return 0.0;
    }

    tokens
        .windows(keyword.token_count)
        .map(|window| strsim::jaro_winkler(&window.join(" "), &keyword.normalized) as f32)
        .fold(0.0_f32, f32::max)
        * SIMILARITY_WEIGHT
}

/// Keyword matcher over hot-swappable tables
pub struct FuzzyKeywordMatcher {
    entries: RwLock<Arc<Vec<PreparedEntry>>>,
}

impl FuzzyKeywordMatcher {
    pub fn new(entries: &[KeywordEntry]) -> Self {
        Self {
            entries: RwLock::new(Arc::new(entries.iter().map(PreparedEntry::from_entry).collect())),
        }
    }

    /// Matcher with no keywords; never matches
    pub fn empty() -> Self {
        Self::new(&[])
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let entries: Vec<KeywordEntry> = serde_json::from_str(json)?;
        Ok(Self::new(&entries))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(Self::new(&parse_yaml(yaml)?))
    }

    /// Load a `.json` file, anything else is read as YAML
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let matcher = Self::empty();
        matcher.reload_file(path).await?;
        Ok(matcher)
    }

    /// Swap in the table from a file; on error the current table stays
    pub async fn reload_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::configuration(format!("cannot read {}: {}", path.display(), e)))?;

        let entries: Vec<KeywordEntry> = if path.extension().map_or(false, |ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            parse_yaml(&content)?
        };

        self.replace(&entries);
        tracing::info!(path = %path.display(), intents = entries.len(), "Keyword table loaded");
        Ok(entries.len())
    }

    pub fn replace(&self, entries: &[KeywordEntry]) {
        *self.entries.write() = Arc::new(entries.iter().map(PreparedEntry::from_entry).collect());
    }

    /// Number of intents in the table
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn parse_yaml(yaml: &str) -> Result<Vec<KeywordEntry>> {
    serde_yaml::from_str(yaml)
        .map_err(|e| Error::configuration(format!("invalid keyword table: {}", e)))
}

impl Default for FuzzyKeywordMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

impl KeywordMatcher for FuzzyKeywordMatcher {
    fn find_match(&self, query: &MatchQuery<'_>) -> Option<KeywordMatch> {
        let text = normalize(query.text);
        if text.is_empty() {
            return None;
        }
        let tokens: Vec<&str> = text.split(' ').collect();
        let history = history_text(query.context);
        let entries = self.entries.read().clone();

        let mut best: Option<KeywordMatch> = None;

        for entry in entries.iter() {
            let mut entry_best: Option<(f32, &PreparedKeyword)> = None;
            for keyword in &entry.keywords {
                if query.language.map_or(false, |lang| lang != keyword.language) {
                    continue;
                }
                let score = score_keyword(&text, &tokens, keyword);
                if entry_best.map_or(true, |(s, _)| score > s) {
                    entry_best = Some((score, keyword));
                }
            }

            let Some((base, keyword)) = entry_best else {
                continue;
            };
            if base < MIN_REPORTED_SCORE {
                continue;
            }

            let mut boost = 0.0;
            if query.last_intent == Some(entry.intent.as_str()) {
                boost += LAST_INTENT_BOOST;
            }
            if !history.is_empty() && entry.keywords.iter().any(|k| mentions(&history, k)) {
                boost += HISTORY_KEYWORD_BOOST;
            }

            let score = (base + boost).min(1.0);
            // Strict comparison keeps the earlier table row on ties
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(KeywordMatch {
                    intent: entry.intent.clone(),
                    score,
                    matched_keyword: keyword.original.clone(),
                    context_boost: boost > 0.0,
                });
            }
        }

        if let Some(ref m) = best {
            tracing::trace!(
                intent = %m.intent,
                score = m.score,
                keyword = %m.matched_keyword,
                "Fuzzy match"
            );
        }
        best
    }
}

/// History as one padded, normalized string
fn history_text(context: &[ChatMessage]) -> String {
    let joined = context
        .iter()
        .map(|m| normalize(&m.text))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        joined
    } else {
        format!(" {} ", joined)
    }
}

fn mentions(history: &str, keyword: &PreparedKeyword) -> bool {
    if keyword.cjk {
        history.contains(&keyword.normalized)
    } else {
        history.contains(&format!(" {} ", keyword.normalized))
    }
}
