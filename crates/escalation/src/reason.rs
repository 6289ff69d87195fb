//! Escalation reasons and the should-escalate policy

use concierge_config::EscalationConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Why a conversation is handed to staff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// Guest explicitly asked for a person
    HumanRequest,
    Complaint,
    /// Tier 1 emergency (theft, lock-out, fire, safety)
    Emergency,
    /// Too many messages in a row the bot could not classify
    UnknownRepeated,
    GroupBooking,
}

impl EscalationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HumanRequest => "human_request",
            Self::Complaint => "complaint",
            Self::Emergency => "emergency",
            Self::UnknownRepeated => "unknown_repeated",
            Self::GroupBooking => "group_booking",
        }
    }

    /// Staff-facing label
    pub fn label(&self) -> &'static str {
        match self {
            Self::HumanRequest => "Guest asked to talk to a person",
            Self::Complaint => "Guest complaint",
            Self::Emergency => "EMERGENCY",
            Self::UnknownRepeated => "Bot could not understand the guest",
            Self::GroupBooking => "Group booking request",
        }
    }

    /// Reasons that escalate on their own, without a count
    pub fn is_unconditional(&self) -> bool {
        matches!(self, Self::HumanRequest | Self::Complaint | Self::Emergency)
    }
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown escalation reason: {0}")]
pub struct ParseReasonError(pub String);

impl FromStr for EscalationReason {
    type Err = ParseReasonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "human_request" | "human" => Ok(Self::HumanRequest),
            "complaint" => Ok(Self::Complaint),
            "emergency" => Ok(Self::Emergency),
            "unknown_repeated" => Ok(Self::UnknownRepeated),
            "group_booking" => Ok(Self::GroupBooking),
            other => Err(ParseReasonError(other.to_string())),
        }
    }
}

/// Decide whether a conversation needs a human
///
/// Human requests, complaints and emergencies always escalate. Otherwise
/// repeated unknowns escalate once `unknown_count` reaches the configured
/// threshold, and large parties once `guest_count` reaches the group size.
/// A threshold of zero turns that rule off.
pub fn should_escalate(
    reason: Option<EscalationReason>,
    unknown_count: u32,
    guest_count: Option<u32>,
    config: &EscalationConfig,
) -> Option<EscalationReason> {
    if let Some(reason) = reason.filter(EscalationReason::is_unconditional) {
        return Some(reason);
    }

    if config.unknown_threshold > 0 && unknown_count >= config.unknown_threshold {
        return Some(EscalationReason::UnknownRepeated);
    }

    let group_min = config.group_booking_min_guests;
    if group_min > 0 && guest_count.map_or(false, |g| g >= group_min) {
        return Some(EscalationReason::GroupBooking);
    }

    None
}
