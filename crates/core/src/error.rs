//! Error taxonomy
//!
//! None of these escape the classifier: every tier failure is mapped to
//! another tier or to the `unknown` sentinel. They exist so collaborators
//! can report *why* they failed and the orchestrator can log it.

use thiserror::Error;

/// Errors raised by classifier collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed rule, pattern or table data
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Outbound message could not be delivered
    #[error("transport error: {0}")]
    Transport(String),

    /// An awaited call exceeded its budget
    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// A matcher was asked to work before it finished initializing
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// Remote model failed or returned something unusable
    #[error("llm error: {0}")]
    Llm(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout { elapsed_ms: 8000 };
        assert_eq!(err.to_string(), "timed out after 8000ms");
    }

    #[test]
    fn test_serialization_from() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
