//! Hot-reloadable configuration store
//!
//! Every section is kept as an immutable `Arc` snapshot. Readers clone the
//! `Arc` and work on a consistent copy for the whole call; writers swap the
//! snapshot wholesale, so a reload can never be observed half-applied.

use concierge_core::{Language, TemplateProvider};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::endpoints;
use crate::intent::IntentConfig;
use crate::templates::Templates;
use crate::workflow::WorkflowConfig;
use crate::ConfigError;

/// Environment variable prefix, e.g. `CONCIERGE__WORKFLOW__ESCALATION__PRIMARY_PHONE`
pub const ENV_PREFIX: &str = "CONCIERGE";

/// Process-level settings (endpoints and data files); not hot-reloaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    pub bind_addr: String,
    /// JSON list of emergency pattern records
    pub emergency_rules_path: Option<PathBuf>,
    /// Keyword table for the fuzzy matcher (JSON or YAML)
    pub keywords_path: Option<PathBuf>,
    /// Example table for the semantic matcher (JSON or YAML)
    pub examples_path: Option<PathBuf>,
    /// OpenAI-compatible endpoint; the LLM tier is skipped when unset
    pub llm_endpoint: Option<String>,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    /// Messaging gateway base URL; messages are only logged when unset
    pub gateway_url: Option<String>,
    pub gateway_token: Option<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            bind_addr: endpoints::BIND_ADDR.to_string(),
            emergency_rules_path: None,
            keywords_path: None,
            examples_path: None,
            llm_endpoint: None,
            llm_model: endpoints::LLM_MODEL_DEFAULT.to_string(),
            llm_api_key: None,
            gateway_url: None,
            gateway_token: None,
        }
    }
}

/// Everything a configuration source can provide
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub intent: IntentConfig,
    pub workflow: WorkflowConfig,
    /// Merged on top of the built-in templates
    pub templates: Templates,
    pub service: ServiceSettings,
}

impl AppConfig {
    /// Read layered sources: optional file, then `CONCIERGE__*` environment
    pub fn from_sources(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

        let app: AppConfig = builder.build()?.try_deserialize()?;
        app.intent.validate()?;
        Ok(app)
    }
}

/// Shared, hot-reloadable configuration
pub struct ConfigStore {
    source: Option<PathBuf>,
    intent: RwLock<Arc<IntentConfig>>,
    workflow: RwLock<Arc<WorkflowConfig>>,
    templates: RwLock<Arc<Templates>>,
    service: RwLock<Arc<ServiceSettings>>,
}

impl ConfigStore {
    /// Create a store from an in-memory configuration
    pub fn new(config: AppConfig) -> Self {
        let store = Self {
            source: None,
            intent: RwLock::new(Arc::new(IntentConfig::default())),
            workflow: RwLock::new(Arc::new(WorkflowConfig::default())),
            templates: RwLock::new(Arc::new(Templates::default())),
            service: RwLock::new(Arc::new(ServiceSettings::default())),
        };
        store.apply(config);
        store
    }

    /// Load from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = AppConfig::from_sources(path)?;
        let mut store = Self::new(config);
        store.source = path.map(Path::to_path_buf);

        tracing::info!(
            source = ?store.source,
            "Configuration loaded"
        );
        Ok(store)
    }

    /// Re-read the original sources and swap every snapshot
    ///
    /// On error the previous configuration stays active.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let config = AppConfig::from_sources(self.source.as_deref())?;
        self.apply(config);
        tracing::info!(source = ?self.source, "Configuration reloaded");
        Ok(())
    }

    /// Replace every section at once
    pub fn apply(&self, config: AppConfig) {
        let mut templates = Templates::default();
        templates.merge(&config.templates);

        *self.intent.write() = Arc::new(config.intent);
        *self.workflow.write() = Arc::new(config.workflow);
        *self.templates.write() = Arc::new(templates);
        *self.service.write() = Arc::new(config.service);
    }

    pub fn intent_config(&self) -> Arc<IntentConfig> {
        self.intent.read().clone()
    }

    /// Admin edit of the tier configuration
    pub fn set_intent_config(&self, config: IntentConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.intent.write() = Arc::new(config);
        Ok(())
    }

    pub fn workflow(&self) -> Arc<WorkflowConfig> {
        self.workflow.read().clone()
    }

    pub fn set_workflow(&self, workflow: WorkflowConfig) {
        *self.workflow.write() = Arc::new(workflow);
    }

    pub fn templates(&self) -> Arc<Templates> {
        self.templates.read().clone()
    }

    pub fn service(&self) -> Arc<ServiceSettings> {
        self.service.read().clone()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl TemplateProvider for ConfigStore {
    fn template(&self, key: &str, language: Language) -> String {
        self.templates().template(key, language)
    }
}
