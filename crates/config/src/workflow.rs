//! Workflow configuration (escalation contacts and policy)

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{escalation, timeouts};

/// Staff paging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Notified immediately on escalation
    pub primary_phone: String,
    /// Notified when nobody replied within `timeout_ms`
    pub secondary_phone: String,
    pub timeout_ms: u64,
    /// Unknown classifications in a row before escalating
    pub unknown_threshold: u32,
    pub group_booking_min_guests: u32,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            primary_phone: String::new(),
            secondary_phone: String::new(),
            timeout_ms: timeouts::ESCALATION_SECONDARY_MS,
            unknown_threshold: escalation::UNKNOWN_THRESHOLD,
            group_booking_min_guests: escalation::GROUP_BOOKING_MIN_GUESTS,
        }
    }
}

impl EscalationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub escalation: EscalationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.escalation.timeout(), Duration::from_secs(900));
        assert_eq!(config.escalation.unknown_threshold, 3);
        assert_eq!(config.escalation.group_booking_min_guests, 5);
        assert!(config.escalation.primary_phone.is_empty());
    }

    #[test]
    fn test_partial_yaml() {
        let config: WorkflowConfig = serde_yaml::from_str(
            "escalation:\n  primary_phone: \"+60 12-345 6789\"\n  timeout_ms: 60000\n",
        )
        .unwrap();
        assert_eq!(config.escalation.primary_phone, "+60 12-345 6789");
        assert_eq!(config.escalation.timeout_ms, 60_000);
        assert_eq!(config.escalation.unknown_threshold, 3);
    }
}
