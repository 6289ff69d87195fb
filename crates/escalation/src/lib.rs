//! Human escalation
//!
//! Pages the primary staff contact when a guest needs a person, and the
//! secondary contact if nobody replies in time:
//! - `EscalationTracker`: per-guest state machine and timers
//! - `should_escalate`: the escalation policy
//! - Message senders for the outbound gateway

pub mod message;
pub mod reason;
pub mod sender;
pub mod task;
pub mod tracker;

pub use message::{follow_up, is_same_number, normalize_phone, staff_alert, EscalationContext};
pub use reason::{should_escalate, EscalationReason, ParseReasonError};
pub use sender::{HttpMessageSender, LoggingMessageSender};
pub use task::ScheduledTask;
pub use tracker::{EscalationEntry, EscalationTracker};
