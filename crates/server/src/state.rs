//! Application state shared by every handler

use std::sync::Arc;

use anyhow::Context;
use concierge_classifier::{
    EmergencyRuleSet, ExampleSemanticMatcher, FuzzyKeywordMatcher, HashingEmbedder,
    IntentClassifier,
};
use concierge_config::{ConfigStore, ServiceSettings};
use concierge_core::MessageSender;
use concierge_escalation::{EscalationTracker, HttpMessageSender, LoggingMessageSender};
use concierge_llm::{HttpLlmClassifier, HttpLlmConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

/// Outcome of reloading one data source
#[derive(Debug, Clone, Serialize)]
pub struct ReloadStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReloadStatus {
    fn loaded(loaded: usize) -> Self {
        Self {
            ok: true,
            loaded: Some(loaded),
            skipped: None,
            error: None,
        }
    }

    fn unchanged() -> Self {
        Self {
            ok: true,
            loaded: None,
            skipped: None,
            error: None,
        }
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            ok: false,
            loaded: None,
            skipped: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadReport {
    pub config: ReloadStatus,
    pub rules: ReloadStatus,
    pub keywords: ReloadStatus,
    pub examples: ReloadStatus,
}

impl ReloadReport {
    pub fn is_ok(&self) -> bool {
        self.config.ok && self.rules.ok && self.keywords.ok && self.examples.ok
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub classifier: Arc<IntentClassifier>,
    pub rules: Arc<EmergencyRuleSet>,
    pub keywords: Arc<FuzzyKeywordMatcher>,
    pub examples: Arc<ExampleSemanticMatcher>,
    pub escalations: EscalationTracker,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire collaborators from the service settings
    ///
    /// Rule and keyword files are loaded here; a broken file is logged and
    /// the built-in rules or an empty keyword table are used instead.
    /// Examples are indexed separately by [`AppState::initialize_examples`].
    pub async fn build(
        config: Arc<ConfigStore>,
        sender: Arc<dyn MessageSender>,
    ) -> anyhow::Result<Self> {
        let settings = config.service();

        let rules = Arc::new(EmergencyRuleSet::new());
        if let Some(ref path) = settings.emergency_rules_path {
            match rules.load_file(path).await {
                Ok(report) => tracing::info!(
                    path = %path.display(),
                    loaded = report.loaded,
                    skipped = report.skipped,
                    "Emergency rules loaded"
                ),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Using built-in emergency rules: {}", e)
                }
            }
        }

        let keywords = match settings.keywords_path {
            Some(ref path) => match FuzzyKeywordMatcher::load_file(path).await {
                Ok(matcher) => matcher,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Keyword table unavailable: {}", e);
                    FuzzyKeywordMatcher::empty()
                }
            },
            None => FuzzyKeywordMatcher::empty(),
        };
        let keywords = Arc::new(keywords);

        let examples = Arc::new(ExampleSemanticMatcher::new(Arc::new(HashingEmbedder::default())));

        let mut classifier = IntentClassifier::new(
            config.clone(),
            rules.clone(),
            keywords.clone(),
            examples.clone(),
        );
        if let Some(ref endpoint) = settings.llm_endpoint {
            let llm_config = HttpLlmConfig::new(endpoint.clone(), settings.llm_model.clone())
                .with_api_key(settings.llm_api_key.clone());
            let llm = HttpLlmClassifier::new(llm_config).context("failed to create LLM client")?;
            classifier = classifier.with_llm(Arc::new(llm));
        } else {
            tracing::info!("No LLM endpoint configured, LLM tier will fall back");
        }

        let escalations = EscalationTracker::new(config.clone(), sender);

        Ok(Self {
            config,
            classifier: Arc::new(classifier),
            rules,
            keywords,
            examples,
            escalations,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the semantic index from the configured example file
    pub async fn initialize_examples(&self) -> ReloadStatus {
        let settings = self.config.service();
        let Some(ref path) = settings.examples_path else {
            return ReloadStatus::unchanged();
        };

        match self.examples.initialize_from_file(path).await {
            Ok(count) => ReloadStatus::loaded(count),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Semantic index not built: {}", e);
                ReloadStatus::failed(e)
            }
        }
    }

    /// Re-read configuration and every data file
    ///
    /// Each source reloads independently; a failure keeps that source's
    /// previous contents.
    pub async fn reload(&self) -> ReloadReport {
        let config = match self.config.reload() {
            Ok(()) => ReloadStatus::unchanged(),
            Err(e) => {
                tracing::warn!("Configuration reload failed: {}", e);
                ReloadStatus::failed(e)
            }
        };

        // Paths come from the settings that were just reloaded
        let settings = self.config.service();

        let rules = match settings.emergency_rules_path {
            Some(ref path) => match self.rules.load_file(path).await {
                Ok(report) => ReloadStatus {
                    skipped: Some(report.skipped),
                    ..ReloadStatus::loaded(report.loaded)
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Emergency rule reload failed: {}", e);
                    ReloadStatus::failed(e)
                }
            },
            None => ReloadStatus::unchanged(),
        };

        let keywords = match settings.keywords_path {
            Some(ref path) => match self.keywords.reload_file(path).await {
                Ok(count) => ReloadStatus::loaded(count),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Keyword reload failed: {}", e);
                    ReloadStatus::failed(e)
                }
            },
            None => ReloadStatus::unchanged(),
        };

        let examples = self.initialize_examples().await;

        ReloadReport {
            config,
            rules,
            keywords,
            examples,
        }
    }
}

/// Gateway sender when configured, otherwise log-only
pub fn message_sender(settings: &ServiceSettings) -> anyhow::Result<Arc<dyn MessageSender>> {
    match settings.gateway_url {
        Some(ref url) if !url.trim().is_empty() => {
            let sender = HttpMessageSender::new(url, settings.gateway_token.clone())
                .context("failed to create gateway client")?;
            tracing::info!(url = %sender.url(), "Messaging gateway configured");
            Ok(Arc::new(sender))
        }
        _ => {
            tracing::warn!("No messaging gateway configured, staff alerts will only be logged");
            Ok(Arc::new(LoggingMessageSender))
        }
    }
}
