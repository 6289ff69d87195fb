//! Configuration management for the guest message classifier
//!
//! - `IntentConfig`: per-tier enable flags, thresholds and context windows
//! - `WorkflowConfig`: escalation contacts, timeout and policy
//! - `Templates`: localized guest-facing strings
//! - `ConfigStore`: hot-reloadable snapshots of all of the above

pub mod constants;
pub mod intent;
pub mod store;
pub mod templates;
pub mod workflow;

pub use intent::{FallbackSettings, IntentConfig, IntentOverride, Tier, TierSettings, TierTable};
pub use store::{AppConfig, ConfigStore, ServiceSettings, ENV_PREFIX};
pub use templates::{keys as template_keys, Templates};
pub use workflow::{EscalationConfig, WorkflowConfig};

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
