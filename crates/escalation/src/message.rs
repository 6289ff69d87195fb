//! Escalation context and staff-facing message text

use concierge_config::constants::escalation::RECENT_MESSAGE_EXCERPT;
use concierge_core::{ChatMessage, Language};
use serde::{Deserialize, Serialize};

use crate::reason::EscalationReason;

/// Everything the tracker needs to page staff about one guest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationContext {
    /// Guest phone number; the tracker key
    pub phone: String,
    /// Display name from the messaging app
    #[serde(default)]
    pub push_name: Option<String>,
    /// Messaging channel instance the guest wrote to
    #[serde(default)]
    pub instance_id: Option<String>,
    pub reason: EscalationReason,
    pub original_message: String,
    /// Conversation so far, oldest first
    #[serde(default)]
    pub recent_messages: Vec<ChatMessage>,
    /// Language of the acknowledgment; detected from the message if unset
    #[serde(default)]
    pub language: Option<Language>,
}

impl EscalationContext {
    pub fn new(
        phone: impl Into<String>,
        reason: EscalationReason,
        original_message: impl Into<String>,
    ) -> Self {
        Self {
            phone: phone.into(),
            push_name: None,
            instance_id: None,
            reason,
            original_message: original_message.into(),
            recent_messages: Vec::new(),
            language: None,
        }
    }

    pub fn with_push_name(mut self, name: impl Into<String>) -> Self {
        self.push_name = Some(name.into());
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    pub fn with_recent_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.recent_messages = messages;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// "Name (phone)" or just the phone
    pub fn guest_label(&self) -> String {
        guest_label(self.push_name.as_deref(), &self.phone)
    }
}

pub(crate) fn guest_label(name: Option<&str>, phone: &str) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{} ({})", name, phone),
        None => phone.to_string(),
    }
}

/// First alert sent to the primary contact
pub fn staff_alert(ctx: &EscalationContext) -> String {
    let mut text = format!(
        "[Escalation] {}\nGuest: {}\nMessage: \"{}\"",
        ctx.reason.label(),
        ctx.guest_label(),
        ctx.original_message.trim()
    );

    let recent = ChatMessage::window(&ctx.recent_messages, RECENT_MESSAGE_EXCERPT);
    if !recent.is_empty() {
        text.push_str("\n\nRecent messages:");
        for message in recent {
            text.push_str(&format!("\n- {}: {}", message.role.as_str(), message.text.trim()));
        }
    }

    text.push_str("\n\nReply to the guest to take over.");
    text
}

/// Reminder sent to the secondary contact when nobody answered
pub fn follow_up(
    reason: EscalationReason,
    guest: &str,
    original_message: &str,
    elapsed_minutes: u64,
) -> String {
    format!(
        "[Escalation reminder] No staff reply for {} min.\nReason: {}\nGuest: {}\nMessage: \"{}\"",
        elapsed_minutes,
        reason.label(),
        guest,
        original_message.trim()
    )
}

/// Digits only, e.g. "+60 12-345 6789" to "60123456789"
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Shortest digit string treated as a phone number when matching
const MIN_PHONE_DIGITS: usize = 7;

/// Whether `sender` is the configured staff number
///
/// Compares normalized digits by containment in either direction, so
/// "0123456789" matches "60123456789@s.whatsapp.net". Empty or very short
/// numbers never match.
pub fn is_same_number(sender: &str, configured: &str) -> bool {
    let sender = normalize_phone(sender);
    let configured = normalize_phone(configured);
    if sender.len() < MIN_PHONE_DIGITS || configured.len() < MIN_PHONE_DIGITS {
        return false;
    }
    sender.contains(&configured) || configured.contains(&sender)
}
