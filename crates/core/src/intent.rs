//! Classification result and conversation history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::language::Language;

/// Well-known intent names shared across tiers
pub mod intents {
    /// Canonical "classification failed" category
    pub const UNKNOWN: &str = "unknown";
    pub const GREETING: &str = "greeting";
    pub const THANKS: &str = "thanks";

    /// Intents that never count towards a multi-intent split
    pub const TRIVIAL: [&str; 3] = [GREETING, THANKS, UNKNOWN];

    pub fn is_trivial(intent: &str) -> bool {
        TRIVIAL.contains(&intent)
    }
}

/// Keys used in `IntentResult::entities`
pub mod entity_keys {
    /// "true" when Tier 1 matched an emergency rule
    pub const EMERGENCY: &str = "emergency";
    /// "true" when a regex deflection overrode the intent
    pub const DEFLECTED: &str = "deflected";
    /// "true" when a compound message yielded several intents
    pub const MULTI_INTENT: &str = "multiIntent";
    /// Comma-joined list of every distinct intent found in a compound message
    pub const ALL_INTENTS: &str = "allIntents";
    /// Number of segments a compound message was split into
    pub const SEGMENT_COUNT: &str = "segmentCount";
    /// "true" when conversation context raised the fuzzy score
    pub const CONTEXT_BOOST: &str = "contextBoost";
    /// Why a fallback path produced this result ("timeout", "llm_error", ...)
    pub const FALLBACK: &str = "fallback";
    /// Category the LLM returned before mapping
    pub const RAW_CATEGORY: &str = "rawCategory";
    /// Intent a correction rule replaced
    pub const CORRECTED_FROM: &str = "correctedFrom";
}

/// Which tier produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentSource {
    Regex,
    Fuzzy,
    Semantic,
    Llm,
}

impl IntentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Fuzzy => "fuzzy",
            Self::Semantic => "semantic",
            Self::Llm => "llm",
        }
    }
}

impl fmt::Display for IntentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one guest message
///
/// Treated as an immutable value: tiers never modify a result once built,
/// they derive a new one through the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResult {
    /// Handling category (e.g. "wifi", "theft_report", "unknown")
    pub category: String,
    /// Tier-specific certainty in [0, 1]
    pub confidence: f32,
    /// Free-form annotations, ordered for stable output
    #[serde(default)]
    pub entities: BTreeMap<String, String>,
    /// Tier that produced the result
    pub source: IntentSource,
    /// Language the message was detected as
    pub detected_language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_example: Option<String>,
}

impl IntentResult {
    pub fn new(
        category: impl Into<String>,
        confidence: f32,
        source: IntentSource,
        detected_language: Language,
    ) -> Self {
        Self {
            category: category.into(),
            confidence: confidence.clamp(0.0, 1.0),
            entities: BTreeMap::new(),
            source,
            detected_language,
            matched_keyword: None,
            matched_example: None,
        }
    }

    /// The canonical failure signal: `unknown`, confidence 0, source `llm`
    pub fn unknown(detected_language: Language) -> Self {
        Self::new(intents::UNKNOWN, 0.0, IntentSource::Llm, detected_language)
    }

    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entities.insert(key.into(), value.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_matched_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.matched_keyword = Some(keyword.into());
        self
    }

    pub fn with_matched_example(mut self, example: impl Into<String>) -> Self {
        self.matched_example = Some(example.into());
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.category == intents::UNKNOWN
    }

    pub fn is_emergency(&self) -> bool {
        self.entity(entity_keys::EMERGENCY) == Some("true")
    }

    pub fn is_multi_intent(&self) -> bool {
        self.entity(entity_keys::MULTI_INTENT) == Some("true")
    }

    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(|s| s.as_str())
    }
}

/// Author of a history message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    #[serde(alias = "user")]
    Guest,
    Assistant,
    Staff,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Assistant => "assistant",
            Self::Staff => "staff",
        }
    }
}

/// One message of read-only conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn guest(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Guest, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    /// Last `count` messages of a history, oldest first
    pub fn window(history: &[ChatMessage], count: usize) -> &[ChatMessage] {
        let start = history.len().saturating_sub(count);
        &history[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sentinel() {
        let result = IntentResult::unknown(Language::English);
        assert!(result.is_unknown());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.source, IntentSource::Llm);
    }

    #[test]
    fn test_confidence_clamped() {
        let result = IntentResult::new("wifi", 1.4, IntentSource::Fuzzy, Language::English);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.with_confidence(-0.2).confidence, 0.0);
    }

    #[test]
    fn test_with_overrides_copy() {
        let base = IntentResult::new("checkin_time", 0.9, IntentSource::Fuzzy, Language::English);
        let corrected = base
            .clone()
            .with_category("post_checkout_complaint")
            .with_entity(entity_keys::CORRECTED_FROM, "checkin_time");

        assert_eq!(base.category, "checkin_time");
        assert!(base.entities.is_empty());
        assert_eq!(corrected.category, "post_checkout_complaint");
        assert_eq!(corrected.entity(entity_keys::CORRECTED_FROM), Some("checkin_time"));
    }

    #[test]
    fn test_history_window() {
        let history: Vec<ChatMessage> =
            (0..5).map(|i| ChatMessage::guest(format!("m{}", i))).collect();
        let window = ChatMessage::window(&history, 2);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].text, "m3");
        assert!(ChatMessage::window(&history, 0).is_empty());
        assert_eq!(ChatMessage::window(&history, 10).len(), 5);
    }

    #[test]
    fn test_role_alias() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"role":"user","text":"hi","timestamp":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(msg.role, MessageRole::Guest);
    }

    #[test]
    fn test_result_json_shape() {
        let result = IntentResult::new("wifi", 0.9, IntentSource::Fuzzy, Language::Malay)
            .with_matched_keyword("wifi");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["detectedLanguage"], "ms");
        assert_eq!(json["matchedKeyword"], "wifi");
        assert_eq!(json["source"], "fuzzy");
        assert!(json.get("matchedExample").is_none());
    }

    #[test]
    fn test_trivial_intents() {
        assert!(intents::is_trivial("greeting"));
        assert!(intents::is_trivial("unknown"));
        assert!(!intents::is_trivial("wifi"));
    }
}
