//! Concierge Core
//!
//! Shared types and traits for the guest message classifier:
//! - `IntentResult` and friends: the value every classification returns
//! - `Language`: the three guest languages and script-based detection
//! - Collaborator traits (keyword/semantic matchers, LLM, messaging, templates)
//! - The crate-wide error taxonomy

pub mod error;
pub mod intent;
pub mod language;
pub mod traits;

pub use error::{Error, Result};
pub use intent::{entity_keys, intents, ChatMessage, IntentResult, IntentSource, MessageRole};
pub use language::{detect_language, Language};
pub use traits::{
    KeywordMatch, KeywordMatcher, LlmClassification, LlmClassifier, MatchQuery, MessageSender,
    SemanticMatch, SemanticMatcher, TemplateProvider,
};
