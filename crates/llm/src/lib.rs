//! LLM classification adapter
//!
//! Sends a guest message plus a short history window to an
//! OpenAI-compatible chat completions endpoint (Ollama, vLLM, hosted APIs)
//! and reads back a coarse category with a confidence. The classifier
//! refines the category afterwards, so the prompt only offers the coarse
//! set in [`COARSE_CATEGORIES`].
//!
//! The adapter has its own HTTP timeout as a last resort; the classifier
//! races it against the tighter configured tier budget.

use async_trait::async_trait;
use concierge_core::{ChatMessage, Error, LlmClassification, LlmClassifier, MessageRole, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Categories the model may answer with
pub const COARSE_CATEGORIES: [&str; 10] = [
    "complaint",
    "booking",
    "directions",
    "facilities",
    "rules",
    "payment",
    "checkin",
    "checkout",
    "general",
    "unknown",
];

/// Confidence assumed when the model omits one
const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Adapter configuration
#[derive(Debug, Clone)]
pub struct HttpLlmConfig {
    /// Base URL, e.g. `http://localhost:11434/v1`
    pub endpoint: String,
    pub model: String,
    /// Sent as a bearer token when set
    pub api_key: Option<String>,
    /// HTTP-level timeout
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for HttpLlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            model: "qwen2.5:7b-instruct".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            temperature: 0.0,
            max_tokens: 64,
        }
    }
}

impl HttpLlmConfig {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatTurn {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatTurn,
}

/// The JSON object the model is asked to return
#[derive(Debug, Deserialize)]
struct CategoryReply {
    category: String,
    #[serde(default)]
    confidence: Option<f32>,
}

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// System prompt listing the allowed categories
pub fn system_prompt() -> String {
    format!(
        "You classify messages from hostel guests. Guests write in English, Malay or Chinese.\n\
         Answer with a single JSON object and nothing else: \
         {{\"category\": <one of: {}>, \"confidence\": <number between 0 and 1>}}.\n\
         Use \"unknown\" when the message fits no category.",
        COARSE_CATEGORIES.join(", ")
    )
}

/// User turn: the history window followed by the message to classify
pub fn user_prompt(text: &str, context: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    if !context.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for message in context {
            let speaker = match message.role {
                MessageRole::Guest => "Guest",
                MessageRole::Assistant => "Assistant",
                MessageRole::Staff => "Staff",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, message.text));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!("Message to classify: {}", text));
    prompt
}

/// Extract `{"category", "confidence"}` from a model reply
///
/// Tolerates code fences and chatter around the object. Confidence is
/// clamped to [0, 1].
pub fn parse_reply(content: &str) -> Result<LlmClassification> {
    let object = JSON_OBJECT
        .find(content)
        .ok_or_else(|| Error::llm(format!("no JSON object in reply: {}", content.trim())))?;

    let reply: CategoryReply = serde_json::from_str(object.as_str())
        .map_err(|e| Error::llm(format!("malformed reply {}: {}", object.as_str(), e)))?;

    let category = reply.category.trim().to_lowercase();
    if category.is_empty() {
        return Err(Error::llm("empty category in reply"));
    }

    let confidence = reply.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        DEFAULT_CONFIDENCE
    };

    Ok(LlmClassification {
        category,
        confidence,
    })
}

/// Classifier backed by an OpenAI-compatible HTTP endpoint
pub struct HttpLlmClassifier {
    config: HttpLlmConfig,
    client: reqwest::Client,
}

impl HttpLlmClassifier {
    pub fn new(config: HttpLlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;

        tracing::info!(
            endpoint = %config.endpoint,
            model = %config.model,
            "LLM classifier configured"
        );
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpLlmConfig {
        &self.config
    }
}

#[async_trait]
impl LlmClassifier for HttpLlmClassifier {
    async fn classify(&self, text: &str, context: &[ChatMessage]) -> Result<LlmClassification> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatTurn {
                    role: "system".into(),
                    content: system_prompt(),
                },
                ChatTurn {
                    role: "user".into(),
                    content: user_prompt(text, context),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut builder = self.client.post(self.config.completions_url()).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    elapsed_ms: self.config.timeout.as_millis() as u64,
                }
            } else {
                Error::transport(format!("LLM request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!("LLM returned {}: {}", status, body)));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("unreadable LLM response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::llm("LLM response has no choices"))?;

        let classification = parse_reply(&content)?;
        tracing::debug!(
            category = %classification.category,
            confidence = classification.confidence,
            "LLM classification"
        );
        Ok(classification)
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let c = parse_reply(r#"{"category": "booking", "confidence": 0.82}"#).unwrap();
        assert_eq!(c.category, "booking");
        assert!((c.confidence - 0.82).abs() < 1e-6);
    }

    #[test]
    fn test_parse_code_fence_and_chatter() {
        let c = parse_reply(
            "Sure!\n```json\n{\"category\": \"Complaint\", \"confidence\": 0.9}\n```",
        )
        .unwrap();
        assert_eq!(c.category, "complaint");
    }

    #[test]
    fn test_confidence_clamped_and_defaulted() {
        assert_eq!(parse_reply(r#"{"category": "general", "confidence": 3}"#).unwrap().confidence, 1.0);
        assert_eq!(parse_reply(r#"{"category": "general", "confidence": -1}"#).unwrap().confidence, 0.0);
        assert_eq!(parse_reply(r#"{"category": "general"}"#).unwrap().confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_reply("I think it's a booking"), Err(Error::Llm(_))));
        assert!(matches!(parse_reply(r#"{"confidence": 0.5}"#), Err(Error::Llm(_))));
        assert!(matches!(parse_reply(r#"{"category": "  "}"#), Err(Error::Llm(_))));
    }

    #[test]
    fn test_prompts() {
        let system = system_prompt();
        for category in COARSE_CATEGORIES {
            assert!(system.contains(category));
        }

        let history = vec![
            ChatMessage::guest("hi"),
            ChatMessage::assistant("Hello! How can I help?"),
        ];
        let user = user_prompt("wifi?", &history);
        assert!(user
            .starts_with("Conversation so far:\nGuest: hi\nAssistant: Hello! How can I help?\n"));
        assert!(user.ends_with("Message to classify: wifi?"));
        assert_eq!(user_prompt("wifi?", &[]), "Message to classify: wifi?");
    }

    #[test]
    fn test_completions_url() {
        let config = HttpLlmConfig::new("http://localhost:11434/v1/", "m");
        assert_eq!(config.completions_url(), "http://localhost:11434/v1/chat/completions");
        let config = config.with_api_key(Some(String::new()));
        assert!(config.api_key.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let mut config = HttpLlmConfig::new("http://127.0.0.1:9", "m");
        config.timeout = Duration::from_millis(500);
        let classifier = HttpLlmClassifier::new(config).unwrap();
        let result = classifier.classify("hello", &[]).await;
        assert!(matches!(result, Err(Error::Transport(_)) | Err(Error::Timeout { .. })));
    }
}
