//! Guest message intent classifier
//!
//! A four-tier waterfall over free-text guest messages in English, Malay
//! and Chinese:
//!
//! 1. `emergency`: ordered regex rules (theft, lock-outs, fire, safety)
//! 2. `fuzzy`: keyword tables with typo-tolerant similarity
//! 3. `semantic`: example-embedding similarity, skipped until ready
//! 4. LLM: remote model bounded by a hard timeout, with a fallback chain
//!
//! `IntentClassifier` wires the tiers together; `GenericIntentMapper` and
//! `MultiIntentSplitter` are the pure helpers the tiers share.

pub mod emergency;
pub mod fuzzy;
pub mod mapper;
pub mod orchestrator;
pub mod preprocess;
pub mod semantic;
pub mod splitter;

pub use emergency::{
    EmergencyRule, EmergencyRuleSet, EmergencyType, LoadReport, PatternRecord, RuleAction,
};
pub use fuzzy::{FuzzyKeywordMatcher, KeywordEntry};
pub use mapper::GenericIntentMapper;
pub use orchestrator::IntentClassifier;
pub use preprocess::collapse_repeated_words;
pub use semantic::{Embedder, ExampleEntry, ExampleSemanticMatcher, ExampleSet, HashingEmbedder};
pub use splitter::MultiIntentSplitter;
