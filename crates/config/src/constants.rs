//! Centralized constants for the classifier
//!
//! Single source of truth for thresholds, timeouts and ratios. Admin
//! configuration overrides most of these at runtime; the values here are
//! what applies when a field is left out.

/// Tier acceptance thresholds
pub mod thresholds {
    /// Fuzzy tier default when neither tier nor intent sets one
    pub const FUZZY_DEFAULT: f32 = 0.80;

    /// Semantic tier default when neither tier nor intent sets one
    pub const SEMANTIC_DEFAULT: f32 = 0.70;

    /// Raw fuzzy score that skips the semantic tier even when the
    /// per-intent threshold rejected the match
    pub const HIGH_CONFIDENCE_SHORTCUT: f32 = 0.85;

    /// Threshold for the relaxed semantic/fuzzy retries after an LLM timeout
    pub const RELAXED: f32 = 0.55;

    /// Below this an LLM `unknown` is worth a multi-intent split attempt
    pub const LOW_CONFIDENCE: f32 = 0.3;
}

/// Timeouts (in milliseconds)
pub mod timeouts {
    /// Hard budget for the LLM tier
    pub const LLM_CLASSIFY_MS: u64 = 8_000;

    /// Delay before the secondary staff contact is paged
    pub const ESCALATION_SECONDARY_MS: u64 = 15 * 60 * 1_000;
}

/// Conversation history windows per tier
pub mod context {
    pub const FUZZY_MESSAGES: usize = 3;
    pub const SEMANTIC_MESSAGES: usize = 3;
    pub const LLM_MESSAGES: usize = 5;
}

/// Text pre-processing
pub mod preprocessing {
    /// Messages shorter than this are never collapsed
    pub const REPEATED_WORD_MIN_WORDS: usize = 3;

    /// Share of words one word must reach to collapse the message
    pub const REPEATED_WORD_RATIO: f32 = 0.8;
}

/// Escalation policy
pub mod escalation {
    /// Consecutive unknown classifications before a human is paged
    pub const UNKNOWN_THRESHOLD: u32 = 3;

    /// Party size treated as a group booking
    pub const GROUP_BOOKING_MIN_GUESTS: u32 = 5;

    /// Recent messages quoted in the staff alert
    pub const RECENT_MESSAGE_EXCERPT: usize = 3;
}

/// Service endpoints (defaults for local development)
pub mod endpoints {
    pub const BIND_ADDR: &str = "0.0.0.0:8080";

    /// OpenAI-compatible chat completions base URL (Ollama)
    pub const LLM_DEFAULT: &str = "http://localhost:11434/v1";

    pub const LLM_MODEL_DEFAULT: &str = "qwen2.5:7b-instruct";
}
