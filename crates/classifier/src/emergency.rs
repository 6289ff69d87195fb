//! Emergency Rule Set (Tier 1)
//!
//! Ordered regex rules that catch messages needing immediate staff
//! attention (theft, lock-outs, fire, safety) before any other tier runs.
//! Rules that carry an intent override are *deflections*: non-emergency
//! redirects such as prompt-injection attempts answered with a greeting.
//! They are only reachable through [`EmergencyRuleSet::deflect`].
//!
//! # Rule data
//!
//! Rules load from a JSON list of records:
//!
//! ```json
//! [
//!   { "pattern": "/\\bstolen\\b/i", "emergencyType": "theft_report", "description": "Theft" },
//!   { "pattern": "kebakaran", "emergencyType": "complaint", "description": "Fire emergency" },
//!   { "pattern": "ignore all instructions", "description": "Injection", "intent": "greeting" }
//! ]
//! ```
//!
//! A pattern is either `/body/flags` or a bare pattern, which is matched
//! case-insensitively. Malformed records are skipped. If nothing usable
//! loads, the active list stays as it was.
//!
//! Fire-class rules (description contains "fire emergency") are suppressed
//! when a benign-context pattern also matches ("need fire for my birthday
//! cake", "where is the fire exit") and the message does not describe an
//! actual fire ("the bbq grill caught fire"). NOTE: keying this off free-text descriptions is fragile; a typo
//! in the description silently turns the benign check off for that rule.

use concierge_core::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Description marker that turns on benign-context suppression
const FIRE_CLASS_MARKER: &str = "fire emergency";

/// Kind of emergency a rule reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    TheftReport,
    CardLocked,
    Complaint,
}

impl EmergencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TheftReport => "theft_report",
            Self::CardLocked => "card_locked",
            Self::Complaint => "complaint",
        }
    }

    /// Normalize a rule-data tag; unknown tags become `Complaint`
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().replace('-', "_").as_str() {
            "theft_report" | "theft" => Self::TheftReport,
            "card_locked" | "locked_out" | "lockout" => Self::CardLocked,
            "complaint" => Self::Complaint,
            other => {
                tracing::warn!(tag = other, "Unknown emergency type, treating as complaint");
                Self::Complaint
            }
        }
    }
}

impl fmt::Display for EmergencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a matching rule does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    /// Report an emergency
    Emergency(EmergencyType),
    /// Redirect to a harmless intent
    Deflect(String),
}

/// One compiled rule
#[derive(Debug, Clone)]
pub struct EmergencyRule {
    pub pattern: Regex,
    pub action: RuleAction,
    pub is_fire_class: bool,
    pub description: String,
}

impl EmergencyRule {
    pub fn new(pattern: Regex, action: RuleAction, description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            is_fire_class: is_fire_description(&description),
            pattern,
            action,
            description,
        }
    }

    /// Regex hit that is not vetoed by a benign context
    fn matches(&self, text: &str) -> bool {
        if !self.pattern.is_match(text) {
            return false;
        }
        if self.is_fire_class && is_benign(text) {
            tracing::debug!(rule = %self.description, "Fire rule suppressed by benign context");
            return false;
        }
        true
    }

    /// Compile a data record
    pub fn from_record(record: &PatternRecord) -> Result<Self> {
        let pattern = parse_pattern(&record.pattern)?;

        let action = match record.intent.as_deref().map(str::trim) {
            Some(intent) if !intent.is_empty() => RuleAction::Deflect(intent.to_string()),
            _ => RuleAction::Emergency(
                record
                    .emergency_type
                    .as_deref()
                    .map(EmergencyType::from_tag)
                    .unwrap_or(EmergencyType::Complaint),
            ),
        };

        Ok(Self::new(pattern, action, record.description.clone()))
    }
}

// TODO: replace the description match with an explicit `fireClass` flag on pattern records
fn is_fire_description(description: &str) -> bool {
    description.to_lowercase().contains(FIRE_CLASS_MARKER)
}

/// Rule record as stored in the pattern data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRecord {
    pub pattern: String,
    #[serde(default, alias = "emergency_type")]
    pub emergency_type: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub intent: Option<String>,
}

/// Outcome of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

/// Parse `/body/flags` or a bare (case-insensitive) pattern
pub fn parse_pattern(raw: &str) -> Result<Regex> {
    let split = raw
        .strip_prefix('/')
        .and_then(|rest| rest.rfind('/').map(|idx| (&rest[..idx], &rest[idx + 1..])));
    let (body, flags) = match split {
        Some((body, "")) if !body.is_empty() => (body, "i"),
        Some((body, flags)) if !body.is_empty() => (body, flags),
        _ => (raw, "i"),
    };

    let mut builder = RegexBuilder::new(body);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            // Global/unicode/sticky have no meaning for a boolean match
            'g' | 'u' | 'y' => {}
            other => {
                return Err(Error::configuration(format!(
                    "unsupported regex flag '{}' in {}",
                    other, raw
                )))
            }
        }
    }

    builder
        .build()
        .map_err(|e| Error::configuration(format!("invalid pattern {}: {}", raw, e)))
}

static BENIGN_OVERRIDES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\b(birthday|cake|candles?|campfire|bonfire|bbq|barbecue|grill|fireworks?|firewall|fireplace|hot ?pot|spicy|lighter|matches|incense)\b",
        r"(?i)\b((can|may) (i|we) smoke|smoking (area|zone|room)|no smoking|smoke[- ]free|fired (from|up))\b",
        r"(?i)\b(fire (exits?|escapes?|extinguishers?|alarms?|drills?|doors?|blankets?|assembly point)|extinguishers?|smoke (detectors?|alarms?))\b",
        r"(?i)\b(pemadam api|pintu kecemasan|penggera (kebakaran|asap)|latihan kebakaran)\b",
        r"生日|蛋糕|蜡烛|烧烤|烟花|火锅|打火机|吸烟区|可以抽烟|灭火器|安全出口|消防通道|火警演习|消防演习|烟雾报警器",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Wording of an actual fire; it outranks any benign context in the same message
static FIRE_DISTRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(on fire|caught fire|catch(es|ing)? fire|set fire|smoke (is )?(coming|pouring|everywhere)|full of smoke|smell(s|ing)? (of )?(smoke|burning)|burning smell|evacuate|alarms? (is |are )?(going off|ringing)|call (the )?(fire ?(brigade|department|fighters?)|bomba)|terbakar|ada kebakaran)\b|着火了|起火了|失火了|冒烟了|救火",
    )
    .unwrap()
});

fn is_benign(text: &str) -> bool {
    !FIRE_DISTRESS.is_match(text) && BENIGN_OVERRIDES.iter().any(|re| re.is_match(text))
}

/// Rules active when no external data is available
pub fn builtin_rules() -> Vec<EmergencyRule> {
    let specs: [(&str, RuleAction, &str); 5] = [
        (
            r"(?i)\b(stolen|steal|stole|theft|thief|robbed|robbery|pickpocket(ed)?|kena curi|dicuri|dirompak|pencuri)\b|被偷|偷了|失窃|被盗|小偷",
            RuleAction::Emergency(EmergencyType::TheftReport),
            "Theft report",
        ),
        (
            r"(?i)\b(locked out|locked myself out|(key ?)?card (is )?(not working|doesn'?t work|broken|failed)|can'?t (open|get into) (my |the )?(room|door|locker)|door (won'?t|will not) open|terkunci di luar|kad (bilik |kunci )?(tak|tidak) (berfungsi|boleh)|pintu (tak|tidak) boleh buka)\b|房卡.*(不能用|没用|坏了|打不开)|门打不开|被锁在外面",
            RuleAction::Emergency(EmergencyType::CardLocked),
            "Card locked or guest locked out",
        ),
        (
            r"(?i)\b(fire|smoke|burning|kebakaran|terbakar|ada api)\b|火灾|着火|失火|冒烟",
            RuleAction::Emergency(EmergencyType::Complaint),
            "Fire emergency",
        ),
        (
            r"(?i)\b(emergency|ambulance|injured|bleeding|unconscious|fainted|heart attack|harass(ed|ment)?|assault(ed)?|police|kecemasan|cedera|berdarah|pengsan|polis)\b|急救|受伤|流血|晕倒|救命|报警|骚扰",
            RuleAction::Emergency(EmergencyType::Complaint),
            "Safety emergency",
        ),
        (
            r"(?i)\b(ignore (all |any )?(previous|prior|above) (instructions|prompts?)|system prompt|you are now|jailbreak|developer mode)\b|忽略(之前|以上)的?(指令|提示)",
            RuleAction::Deflect("greeting".to_string()),
            "Prompt injection deflection",
        ),
    ];

    specs
        .into_iter()
        .filter_map(|(pattern, action, description)| {
            Regex::new(pattern)
                .map(|re| EmergencyRule::new(re, action, description))
                .map_err(|e| {
                    tracing::error!(description, error = %e, "Built-in rule failed to compile")
                })
                .ok()
        })
        .collect()
}

/// Ordered emergency and deflection rules
///
/// The active list is an immutable snapshot; loads build a new list and
/// swap it in, so concurrent classifications never see a partial list.
pub struct EmergencyRuleSet {
    rules: RwLock<Arc<Vec<EmergencyRule>>>,
}

impl EmergencyRuleSet {
    /// Rule set with the built-in patterns
    pub fn new() -> Self {
        Self::with_rules(builtin_rules())
    }

    pub fn with_rules(rules: Vec<EmergencyRule>) -> Self {
        Self {
            rules: RwLock::new(Arc::new(rules)),
        }
    }

    fn snapshot(&self) -> Arc<Vec<EmergencyRule>> {
        self.rules.read().clone()
    }

    /// First matching emergency, ignoring deflection rules
    pub fn classify(&self, text: &str) -> Option<EmergencyType> {
        self.snapshot().iter().find_map(|rule| match &rule.action {
            RuleAction::Emergency(kind) if rule.matches(text) => Some(*kind),
            _ => None,
        })
    }

    /// First matching deflection's intent
    pub fn deflect(&self, text: &str) -> Option<String> {
        self.snapshot().iter().find_map(|rule| match &rule.action {
            RuleAction::Deflect(intent) if rule.matches(text) => Some(intent.clone()),
            _ => None,
        })
    }

    /// Replace the active list with compiled records
    ///
    /// Bad records are skipped. When nothing compiles the current list
    /// stays active.
    pub fn load_records(&self, records: &[PatternRecord]) -> LoadReport {
        let mut report = LoadReport::default();
        let mut rules = Vec::with_capacity(records.len());

        for record in records {
            match EmergencyRule::from_record(record) {
                Ok(rule) => {
                    if rule.is_fire_class {
                        tracing::debug!(description = %rule.description, "Loaded fire-class rule");
                    }
                    rules.push(rule);
                    report.loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        pattern = %record.pattern,
                        error = %e,
                        "Skipping emergency rule"
                    );
                    report.skipped += 1;
                }
            }
        }

        if rules.is_empty() {
            tracing::warn!(
                skipped = report.skipped,
                "No usable emergency rules, keeping active list"
            );
            return report;
        }

        *self.rules.write() = Arc::new(rules);
        tracing::info!(loaded = report.loaded, skipped = report.skipped, "Emergency rules loaded");
        report
    }

    /// Load from a JSON array; entries that are not valid records are skipped
    pub fn load_json(&self, json: &str) -> Result<LoadReport> {
        let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let mut malformed = 0;
        let records: Vec<PatternRecord> = values
            .into_iter()
            .filter_map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| {
                        tracing::warn!(error = %e, "Malformed emergency rule record");
                        malformed += 1;
                    })
                    .ok()
            })
            .collect();

        let mut report = self.load_records(&records);
        report.skipped += malformed;
        Ok(report)
    }

    /// Load from a JSON file; an unreadable file leaves the active list alone
    pub async fn load_file(&self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        self.load_json(&content)
    }

    /// Back to the built-in patterns
    pub fn reset(&self) {
        *self.rules.write() = Arc::new(builtin_rules());
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

impl Default for EmergencyRuleSet {
    fn default() -> Self {
        Self::new()
    }
}
