//! Localized fixed strings
//!
//! Guest-facing texts keyed by template name and language. Lookups fall
//! back to English, then to the key itself, so a missing translation never
//! blocks a reply.

use concierge_core::{Language, TemplateProvider};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Template keys used by the core
pub mod keys {
    /// Acknowledgment shown to a guest whose conversation is escalated
    pub const ESCALATING: &str = "escalating";
    /// Generic failure reply
    pub const ERROR: &str = "error";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Templates {
    entries: HashMap<String, HashMap<Language, String>>,
}

impl Default for Templates {
    fn default() -> Self {
        let mut templates = Self {
            entries: HashMap::new(),
        };

        templates.insert(
            keys::ESCALATING,
            Language::English,
            "Thanks for your patience. I'm connecting you with our staff now and someone will get back to you shortly.",
        );
        templates.insert(
            keys::ESCALATING,
            Language::Malay,
            "Terima kasih atas kesabaran anda. Saya sedang menghubungi kakitangan kami dan mereka akan membalas sebentar lagi.",
        );
        templates.insert(
            keys::ESCALATING,
            Language::Chinese,
            "感谢您的耐心等待。我正在为您联系工作人员，他们会尽快回复您。",
        );
        templates.insert(
            keys::ERROR,
            Language::English,
            "Sorry, something went wrong. Please try again or contact the front desk.",
        );
        templates.insert(
            keys::ERROR,
            Language::Malay,
            "Maaf, berlaku ralat. Sila cuba lagi atau hubungi kaunter depan.",
        );
        templates.insert(keys::ERROR, Language::Chinese, "抱歉，出现了问题。请重试或联系前台。");

        templates
    }
}

impl Templates {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, language: Language, text: impl Into<String>) {
        self.entries
            .entry(key.into())
            .or_default()
            .insert(language, text.into());
    }

    /// Exact lookup without fallback
    pub fn get(&self, key: &str, language: Language) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|by_lang| by_lang.get(&language))
            .map(|s| s.as_str())
    }

    /// Merge `other` on top of these templates
    pub fn merge(&mut self, other: &Templates) {
        for (key, by_lang) in &other.entries {
            for (language, text) in by_lang {
                self.insert(key.clone(), *language, text.clone());
            }
        }
    }
}

impl TemplateProvider for Templates {
    fn template(&self, key: &str, language: Language) -> String {
        self.get(key, language)
            .or_else(|| self.get(key, Language::English))
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                tracing::warn!(key, language = %language, "Missing template");
                key.to_string()
            })
    }
}
