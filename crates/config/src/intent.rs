//! Tier configuration
//!
//! Admin-editable settings for the classification waterfall. Read fresh on
//! every classification, so edits apply without a restart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::constants::{context, thresholds, timeouts};
use crate::ConfigError;

/// Classification tiers in waterfall order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Emergency,
    Fuzzy,
    Semantic,
    Llm,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Fuzzy => "fuzzy",
            Self::Semantic => "semantic",
            Self::Llm => "llm",
        }
    }

    /// Built-in threshold used when nothing is configured
    fn default_threshold(&self) -> f32 {
        match self {
            Self::Fuzzy => thresholds::FUZZY_DEFAULT,
            Self::Semantic => thresholds::SEMANTIC_DEFAULT,
            Self::Emergency | Self::Llm => 0.0,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for a single tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Acceptance threshold (fuzzy and semantic only)
    #[serde(default)]
    pub threshold: Option<f32>,
    /// History messages handed to the tier
    #[serde(default)]
    pub context_messages: usize,
}

fn default_true() -> bool {
    true
}

impl TierSettings {
    pub fn enabled(context_messages: usize) -> Self {
        Self {
            enabled: true,
            threshold: None,
            context_messages,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            threshold: None,
            context_messages: 0,
        }
    }
}

/// Per-tier settings table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTable {
    pub emergency: TierSettings,
    pub fuzzy: TierSettings,
    pub semantic: TierSettings,
    pub llm: TierSettings,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            emergency: TierSettings::enabled(0),
            fuzzy: TierSettings::enabled(context::FUZZY_MESSAGES),
            semantic: TierSettings::enabled(context::SEMANTIC_MESSAGES),
            llm: TierSettings::enabled(context::LLM_MESSAGES),
        }
    }
}

/// Per-intent threshold overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentOverride {
    pub fuzzy_threshold: Option<f32>,
    pub semantic_threshold: Option<f32>,
    /// Applies to any tier without a tier-specific override
    pub min_confidence: Option<f32>,
}

/// Timeout and fallback tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    pub llm_timeout_ms: u64,
    pub relaxed_threshold: f32,
    pub high_confidence_shortcut: f32,
    pub low_confidence: f32,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            llm_timeout_ms: timeouts::LLM_CLASSIFY_MS,
            relaxed_threshold: thresholds::RELAXED,
            high_confidence_shortcut: thresholds::HIGH_CONFIDENCE_SHORTCUT,
            low_confidence: thresholds::LOW_CONFIDENCE,
        }
    }
}

/// The admin-editable classifier configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub tiers: TierTable,
    /// Overrides keyed by intent name
    pub intents: HashMap<String, IntentOverride>,
    pub fallback: FallbackSettings,
}

impl IntentConfig {
    pub fn tier(&self, tier: Tier) -> &TierSettings {
        match tier {
            Tier::Emergency => &self.tiers.emergency,
            Tier::Fuzzy => &self.tiers.fuzzy,
            Tier::Semantic => &self.tiers.semantic,
            Tier::Llm => &self.tiers.llm,
        }
    }

    pub fn tier_mut(&mut self, tier: Tier) -> &mut TierSettings {
        match tier {
            Tier::Emergency => &mut self.tiers.emergency,
            Tier::Fuzzy => &mut self.tiers.fuzzy,
            Tier::Semantic => &mut self.tiers.semantic,
            Tier::Llm => &mut self.tiers.llm,
        }
    }

    pub fn is_enabled(&self, tier: Tier) -> bool {
        self.tier(tier).enabled
    }

    pub fn any_enabled(&self) -> bool {
        [Tier::Emergency, Tier::Fuzzy, Tier::Semantic, Tier::Llm]
            .iter()
            .any(|t| self.is_enabled(*t))
    }

    /// Threshold an intent must reach on a tier
    ///
    /// Resolution order: intent tier-specific override, intent
    /// `min_confidence`, tier threshold, built-in tier default.
    pub fn threshold_for(&self, tier: Tier, intent: &str) -> f32 {
        if let Some(o) = self.intents.get(intent) {
            let specific = match tier {
                Tier::Fuzzy => o.fuzzy_threshold,
                Tier::Semantic => o.semantic_threshold,
                Tier::Emergency | Tier::Llm => None,
            };
            if let Some(t) = specific.or(o.min_confidence) {
                return t;
            }
        }
        self.tier_threshold(tier)
    }

    /// Tier-wide threshold ignoring per-intent overrides
    pub fn tier_threshold(&self, tier: Tier) -> f32 {
        self.tier(tier)
            .threshold
            .unwrap_or_else(|| tier.default_threshold())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback.llm_timeout_ms)
    }

    /// Reject values outside their valid ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);

        for tier in [Tier::Fuzzy, Tier::Semantic] {
            if let Some(t) = self.tier(tier).threshold {
                if !in_unit(t) {
                    return Err(ConfigError::Invalid(format!(
                        "{} threshold {} outside [0, 1]",
                        tier, t
                    )));
                }
            }
        }

        for (intent, o) in &self.intents {
            for t in [o.fuzzy_threshold, o.semantic_threshold, o.min_confidence]
                .into_iter()
                .flatten()
            {
                if !in_unit(t) {
                    return Err(ConfigError::Invalid(format!(
                        "threshold {} for intent '{}' outside [0, 1]",
                        t, intent
                    )));
                }
            }
        }

        let f = &self.fallback;
        if f.llm_timeout_ms == 0 {
            return Err(ConfigError::Invalid("llm_timeout_ms must be positive".into()));
        }
        for (name, v) in [
            ("relaxed_threshold", f.relaxed_threshold),
            ("high_confidence_shortcut", f.high_confidence_shortcut),
            ("low_confidence", f.low_confidence),
        ] {
            if !in_unit(v) {
                return Err(ConfigError::Invalid(format!("{} {} outside [0, 1]", name, v)));
            }
        }

        Ok(())
    }
}
