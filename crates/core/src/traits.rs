//! Collaborator Traits
//!
//! Contracts the classifier and the escalation tracker need from the
//! outside world. Concrete implementations live in the classifier, llm and
//! escalation crates; tests substitute small mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::intent::ChatMessage;
use crate::language::Language;

/// Input to the keyword and semantic matchers
#[derive(Debug, Clone, Copy)]
pub struct MatchQuery<'a> {
    /// Message text (already pre-processed)
    pub text: &'a str,
    /// Windowed conversation history, oldest first
    pub context: &'a [ChatMessage],
    /// Intent of the previous guest message, if any
    pub last_intent: Option<&'a str>,
    /// Restrict matching to one language's tables
    pub language: Option<Language>,
}

impl<'a> MatchQuery<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            context: &[],
            last_intent: None,
            language: None,
        }
    }

    pub fn with_context(mut self, context: &'a [ChatMessage]) -> Self {
        self.context = context;
        self
    }

    pub fn with_last_intent(mut self, last_intent: Option<&'a str>) -> Self {
        self.last_intent = last_intent;
        self
    }

    pub fn with_language(mut self, language: Option<Language>) -> Self {
        self.language = language;
        self
    }
}

/// Best keyword hit for a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub intent: String,
    /// Score in [0, 1], context boost included
    pub score: f32,
    pub matched_keyword: String,
    /// Whether conversation context raised the score
    pub context_boost: bool,
}

/// Fuzzy keyword matching over per-language keyword tables
///
/// Implementations must be deterministic: identical queries against
/// identical tables yield identical matches.
pub trait KeywordMatcher: Send + Sync {
    fn find_match(&self, query: &MatchQuery<'_>) -> Option<KeywordMatch>;
}

/// Best example hit for a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub intent: String,
    /// Similarity in [0, 1]
    pub score: f32,
    pub matched_example: String,
}

/// Example-embedding similarity matching
///
/// Has an explicit lifecycle: callers check `is_ready` and skip the tier
/// rather than wait for initialization.
#[async_trait]
pub trait SemanticMatcher: Send + Sync {
    fn is_ready(&self) -> bool;

    async fn find_match(&self, query: &MatchQuery<'_>) -> Result<Option<SemanticMatch>>;
}

/// Category returned by a remote model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmClassification {
    /// Coarse category, refined afterwards by the intent mapper
    pub category: String,
    pub confidence: f32,
}

/// Remote model classification; may hang or fail
#[async_trait]
pub trait LlmClassifier: Send + Sync {
    async fn classify(&self, text: &str, context: &[ChatMessage]) -> Result<LlmClassification>;

    /// Provider name for logging
    fn name(&self) -> &str {
        "llm"
    }
}

/// Outbound messaging (WhatsApp gateway or similar)
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(
        &self,
        destination: &str,
        text: &str,
        instance_id: Option<&str>,
    ) -> Result<()>;
}

/// Localized fixed strings ("escalating", "error", ...)
pub trait TemplateProvider: Send + Sync {
    fn template(&self, key: &str, language: Language) -> String;
}
