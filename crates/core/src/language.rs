//! Guest languages and script-based detection
//!
//! Guests write in English, Malay or Chinese, frequently mixing them
//! ("有wifi吗", "boleh check in awal?"). Detection is deliberately cheap:
//! CJK ideograph share first, then Malay marker words, else English.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported guest languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ms")]
    Malay,
    #[serde(rename = "zh")]
    Chinese,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Malay, Language::Chinese];

    /// ISO 639-1 code
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Malay => "ms",
            Self::Chinese => "zh",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "ms" | "my" | "malay" | "bm" => Ok(Self::Malay),
            "zh" | "cn" | "chinese" | "zh-cn" => Ok(Self::Chinese),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// Malay function words that rarely appear in English guest messages
static MALAY_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(saya|boleh|tak|tidak|nak|mahu|bilik|terima kasih|macam mana|berapa|di mana|sudah|dah|kunci|tolong|bila|apa|ada|kami|awak|encik|cik|bayar|katil|tandas|bising|kotor)\b",
    )
    .expect("static regex")
});

/// Whether a character is a CJK unified ideograph
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF)
}

/// Whether the text contains any CJK ideograph
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

/// Detect the dominant language of a guest message
pub fn detect_language(text: &str) -> Language {
    let cjk = text.chars().filter(|c| is_cjk(*c)).count();
    let latin = text.chars().filter(|c| c.is_ascii_alphabetic()).count();

    // Ideographs carry roughly a word each, so they get double weight
    if cjk > 0 && cjk * 2 >= latin {
        return Language::Chinese;
    }

    if MALAY_MARKERS.is_match(text) {
        return Language::Malay;
    }

    Language::English
}
