//! Outbound message senders
//!
//! - `HttpMessageSender`: posts to a messaging gateway (WhatsApp bridge)
//! - `LoggingMessageSender`: dry-run, logs instead of sending

use async_trait::async_trait;
use concierge_core::{Error, MessageSender, Result};
use serde::Serialize;
use std::time::Duration;

/// Gateway request timeout
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_id: Option<&'a str>,
}

/// Posts `{to, text, instance_id}` to `{base_url}/send`
pub struct HttpMessageSender {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpMessageSender {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/send", base_url.trim_end_matches('/')),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MessageSender for HttpMessageSender {
    async fn send_message(
        &self,
        destination: &str,
        text: &str,
        instance_id: Option<&str>,
    ) -> Result<()> {
        let mut request = self.client.post(&self.url).json(&SendRequest {
            to: destination,
            text,
            instance_id,
        });
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(format!("gateway unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(format!("gateway returned {}: {}", status, body)));
        }

        tracing::debug!(to = destination, "Message delivered to gateway");
        Ok(())
    }
}

/// Logs every message instead of sending it
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMessageSender;

#[async_trait]
impl MessageSender for LoggingMessageSender {
    async fn send_message(
        &self,
        destination: &str,
        text: &str,
        instance_id: Option<&str>,
    ) -> Result<()> {
        tracing::info!(
            to = destination,
            instance = ?instance_id,
            text,
            "Outbound message (not sent)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_and_token() {
        let sender = HttpMessageSender::new("http://gateway:3000/", Some(String::new())).unwrap();
        assert_eq!(sender.url(), "http://gateway:3000/send");
        assert!(sender.token.is_none());
    }

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(SendRequest {
            to: "6011",
            text: "hi",
            instance_id: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"to": "6011", "text": "hi"}));
    }

    #[tokio::test]
    async fn test_logging_sender_never_fails() {
        assert!(LoggingMessageSender.send_message("6011", "hello", Some("wa-1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        let sender = HttpMessageSender::new("http://127.0.0.1:9", None).unwrap();
        let result = sender.send_message("6011", "hello", None).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
