//! Escalation tracker
//!
//! Per guest phone the tracker moves through:
//!
//! ```text
//! Idle --escalate--> PrimaryNotified --timer--> SecondaryNotified
//!  ^                      |                          |
//!  +------ staff reply ---+--------------------------+
//! ```
//!
//! A new escalation for the same phone cancels the pending timer and
//! replaces the entry. All map writes happen under one lock, and the timer
//! callback claims its entry under that lock by task id, so a replaced or
//! cleared timer can never page the secondary contact.
//!
//! After paging the secondary contact the timer keeps the entry for one
//! more escalation timeout, then removes it unless a newer escalation has
//! taken its place. Staff replies from unlisted numbers therefore cannot
//! leave entries behind indefinitely.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use concierge_config::{template_keys, ConfigStore};
use concierge_core::{detect_language, MessageSender, TemplateProvider};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::message::{self, EscalationContext};
use crate::reason::{self, EscalationReason};
use crate::task::ScheduledTask;

/// Snapshot of one pending escalation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationEntry {
    pub escalation_id: Uuid,
    pub guest_phone: String,
    pub guest_name: Option<String>,
    pub instance_id: Option<String>,
    pub reason: EscalationReason,
    pub original_message: String,
    pub primary_notified_at: DateTime<Utc>,
    pub secondary_notified: bool,
}

struct Slot {
    entry: EscalationEntry,
    task: ScheduledTask,
    armed_at: Instant,
}

struct Inner {
    config: Arc<ConfigStore>,
    sender: Arc<dyn MessageSender>,
    slots: Mutex<HashMap<String, Slot>>,
    next_task_id: AtomicU64,
}

impl Inner {
    /// Send and log; delivery failures never abort the caller
    async fn deliver(
        &self,
        to: &str,
        text: &str,
        instance_id: Option<&str>,
        contact: &'static str,
    ) -> bool {
        if to.trim().is_empty() {
            tracing::warn!(contact, "No {} staff contact configured, alert not sent", contact);
            return false;
        }
        match self.sender.send_message(to, text, instance_id).await {
            Ok(()) => {
                tracing::info!(contact, to, "Staff notified");
                true
            }
            Err(e) => {
                tracing::warn!(contact, to, "Failed to notify staff: {}", e);
                false
            }
        }
    }

    /// Timer callback: page the secondary contact once
    ///
    /// Returns false when the timer was stale.
    async fn notify_secondary(&self, phone: &str, task_id: u64) -> bool {
        // Contacts may have changed since the timer was armed
        let workflow = self.config.workflow();

        let claimed = {
            let mut slots = self.slots.lock();
            match slots.get_mut(phone) {
                Some(slot) if slot.task.id() == task_id && !slot.entry.secondary_notified => {
                    slot.entry.secondary_notified = true;
                    Some((slot.entry.clone(), slot.armed_at.elapsed()))
                }
                _ => None,
            }
        };

        let Some((entry, elapsed)) = claimed else {
            tracing::debug!(phone, task_id, "Stale escalation timer ignored");
            return false;
        };

        let minutes = (elapsed.as_secs() + 30) / 60;
        let text = message::follow_up(
            entry.reason,
            &message::guest_label(entry.guest_name.as_deref(), &entry.guest_phone),
            &entry.original_message,
            minutes,
        );

        metrics::counter!("concierge_secondary_notifications_total").increment(1);
        tracing::warn!(
            escalation_id = %entry.escalation_id,
            phone = %entry.guest_phone,
            minutes,
            "No staff reply, paging secondary contact"
        );
        self.deliver(
            &workflow.escalation.secondary_phone,
            &text,
            entry.instance_id.as_deref(),
            "secondary",
        )
        .await;
        true
    }

    /// Drop a paged entry if it still belongs to `task_id`
    fn expire(&self, phone: &str, task_id: u64) {
        let mut slots = self.slots.lock();
        if slots.get(phone).is_some_and(|slot| slot.task.id() == task_id) {
            slots.remove(phone);
            tracing::debug!(phone, task_id, "Paged escalation expired");
        }
    }
}

/// Two-stage staff paging, one live entry per guest phone
#[derive(Clone)]
pub struct EscalationTracker {
    inner: Arc<Inner>,
}

impl EscalationTracker {
    pub fn new(config: Arc<ConfigStore>, sender: Arc<dyn MessageSender>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                sender,
                slots: Mutex::new(HashMap::new()),
                next_task_id: AtomicU64::new(1),
            }),
        }
    }

    /// Page the primary contact, arm the secondary timer, and return the
    /// acknowledgment to show the guest
    pub async fn escalate(&self, ctx: EscalationContext) -> String {
        let workflow = self.inner.config.workflow();
        let escalation = &workflow.escalation;

        metrics::counter!("concierge_escalations_total", "reason" => ctx.reason.as_str())
            .increment(1);
        tracing::info!(phone = %ctx.phone, reason = %ctx.reason, "Escalating to staff");

        let alert = message::staff_alert(&ctx);
        self.inner
            .deliver(&escalation.primary_phone, &alert, ctx.instance_id.as_deref(), "primary")
            .await;

        let language = ctx
            .language
            .unwrap_or_else(|| detect_language(&ctx.original_message));

        let task_id = self.inner.next_task_id.fetch_add(1, Ordering::Relaxed);
        let entry = EscalationEntry {
            escalation_id: Uuid::new_v4(),
            guest_phone: ctx.phone.clone(),
            guest_name: ctx.push_name,
            instance_id: ctx.instance_id,
            reason: ctx.reason,
            original_message: ctx.original_message,
            primary_notified_at: Utc::now(),
            secondary_notified: false,
        };

        {
            let mut slots = self.inner.slots.lock();
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            let phone = ctx.phone.clone();
            let task = ScheduledTask::spawn(task_id, escalation.timeout(), move || async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.notify_secondary(&phone, task_id).await {
                    return;
                }
                let retention = inner.config.workflow().escalation.timeout();
                drop(inner);

                tokio::time::sleep(retention).await;
                if let Some(inner) = weak.upgrade() {
                    inner.expire(&phone, task_id);
                }
            });

            let slot = Slot {
                entry,
                task,
                armed_at: Instant::now(),
            };
            if let Some(previous) = slots.insert(ctx.phone.clone(), slot) {
                previous.task.cancel();
                tracing::debug!(
                    phone = %ctx.phone,
                    replaced = %previous.entry.escalation_id,
                    "Replaced pending escalation"
                );
            }
        }

        self.inner
            .config
            .template(template_keys::ESCALATING, language)
    }

    /// A message arrived from `phone`; if it is a staff contact, clear
    /// every pending escalation
    ///
    /// Returns the number of escalations cleared.
    pub fn on_staff_reply(&self, phone: &str) -> usize {
        let workflow = self.inner.config.workflow();
        let escalation = &workflow.escalation;

        let is_staff = message::is_same_number(phone, &escalation.primary_phone)
            || message::is_same_number(phone, &escalation.secondary_phone);
        if !is_staff {
            return 0;
        }

        let cleared = self.clear_all();
        if cleared > 0 {
            tracing::info!(cleared, "Staff replied, pending escalations cleared");
        }
        cleared
    }

    /// Escalation decision with the current policy
    pub fn should_escalate(
        &self,
        reason: Option<EscalationReason>,
        unknown_count: u32,
        guest_count: Option<u32>,
    ) -> Option<EscalationReason> {
        let workflow = self.inner.config.workflow();
        reason::should_escalate(reason, unknown_count, guest_count, &workflow.escalation)
    }

    /// Pending escalations ordered by guest phone
    pub fn pending(&self) -> Vec<EscalationEntry> {
        let slots = self.inner.slots.lock();
        let mut entries: Vec<EscalationEntry> =
            slots.values().map(|s| s.entry.clone()).collect();
        entries.sort_by(|a, b| a.guest_phone.cmp(&b.guest_phone));
        entries
    }

    pub fn entry(&self, phone: &str) -> Option<EscalationEntry> {
        self.inner.slots.lock().get(phone).map(|s| s.entry.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every timer and drop every entry
    pub fn reset(&self) {
        let cleared = self.clear_all();
        tracing::debug!(cleared, "Escalation tracker reset");
    }

    fn clear_all(&self) -> usize {
        let drained: Vec<Slot> = self.inner.slots.lock().drain().map(|(_, slot)| slot).collect();
        for slot in &drained {
            slot.task.cancel();
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concierge_config::{AppConfig, WorkflowConfig};
    use concierge_core::{Error, Language, Result};
    use std::time::Duration;

    const PRIMARY: &str = "60111111111";
    const SECONDARY: &str = "60222222222";
    const TIMEOUT: Duration = Duration::from_secs(15 * 60);

    #[derive(Default)]
    struct RecordingSender {
        sent: parking_lot::Mutex<Vec<(String, String)>>,
        fail_to: Option<&'static str>,
    }

    impl RecordingSender {
        fn to(&self, phone: &str) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .filter(|(to, _)| to == phone)
                .map(|(_, text)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_message(
            &self,
            destination: &str,
            text: &str,
            _instance_id: Option<&str>,
        ) -> Result<()> {
            if self.fail_to == Some(destination) {
                return Err(Error::transport("gateway down"));
            }
            self.sent.lock().push((destination.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn store() -> Arc<ConfigStore> {
        let mut config = AppConfig::default();
        config.workflow.escalation.primary_phone = PRIMARY.into();
        config.workflow.escalation.secondary_phone = SECONDARY.into();
        config.workflow.escalation.timeout_ms = TIMEOUT.as_millis() as u64;
        Arc::new(ConfigStore::new(config))
    }

    fn tracker(sender: Arc<RecordingSender>) -> EscalationTracker {
        EscalationTracker::new(store(), sender)
    }

    fn ctx(phone: &str) -> EscalationContext {
        EscalationContext::new(phone, EscalationReason::Complaint, "the shower is broken")
            .with_push_name("Guest")
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalate_notifies_primary_and_acknowledges() {
        let sender = Arc::new(RecordingSender::default());
        let tracker = tracker(sender.clone());

        let ack = tracker.escalate(ctx("60123456789")).await;

        assert_eq!(ack, store().templates().template(template_keys::ESCALATING, Language::English));
        let alerts = sender.to(PRIMARY);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].contains("Guest complaint"));

        let entry = tracker.entry("60123456789").unwrap();
        assert!(!entry.secondary_notified);
        assert_eq!(entry.reason, EscalationReason::Complaint);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledgment_language() {
        let tracker = tracker(Arc::new(RecordingSender::default()));
        let ack = tracker
            .escalate(EscalationContext::new(
                "6011",
                EscalationReason::HumanRequest,
                "我要找人工客服",
            ))
            .await;
        assert_eq!(ack, store().template(template_keys::ESCALATING, Language::Chinese));

        let ack = tracker
            .escalate(
                EscalationContext::new("6012", EscalationReason::HumanRequest, "hi")
                    .with_language(Language::Malay),
            )
            .await;
        assert_eq!(ack, store().template(template_keys::ESCALATING, Language::Malay));
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_after_timeout() {
        let sender = Arc::new(RecordingSender::default());
        let tracker = tracker(sender.clone());
        tracker.escalate(ctx("60123456789")).await;

        tokio::time::sleep(TIMEOUT - Duration::from_secs(1)).await;
        assert!(sender.to(SECONDARY).is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let reminders = sender.to(SECONDARY);
        assert_eq!(reminders.len(), 1);
        assert!(reminders[0].contains("No staff reply for 15 min"));

        // Entry stays for one more timeout, marked as paged
        assert!(tracker.entry("60123456789").unwrap().secondary_notified);

        tokio::time::sleep(TIMEOUT * 2).await;
        assert_eq!(sender.to(SECONDARY).len(), 1);
        assert!(tracker.entry("60123456789").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paged_entry_expires_without_staff_reply() {
        let sender = Arc::new(RecordingSender::default());
        let tracker = tracker(sender.clone());
        tracker.escalate(ctx("60123456789")).await;

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(tracker.len(), 1);

        // A reply from an unlisted number is not a staff reply
        assert_eq!(tracker.on_staff_reply("60999999999"), 0);

        tokio::time::sleep(TIMEOUT).await;
        assert!(tracker.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_spares_newer_escalation() {
        let sender = Arc::new(RecordingSender::default());
        let tracker = tracker(sender.clone());
        tracker.escalate(ctx("60123456789")).await;

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        tracker.escalate(ctx("60123456789")).await;
        let current = tracker.entry("60123456789").unwrap();
        assert!(!current.secondary_notified);

        // Past the first timer's retention window, before the second timer fires
        tokio::time::sleep(TIMEOUT - Duration::from_millis(500)).await;
        assert_eq!(
            tracker.entry("60123456789").map(|e| e.escalation_id),
            Some(current.escalation_id)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_re_escalation_replaces_timer() {
        let sender = Arc::new(RecordingSender::default());
        let tracker = tracker(sender.clone());

        tracker.escalate(ctx("60123456789")).await;
        let first = tracker.entry("60123456789").unwrap().escalation_id;
        tokio::time::sleep(Duration::from_secs(60)).await;
        tracker.escalate(ctx("60123456789")).await;

        assert_eq!(tracker.len(), 1);
        assert_ne!(tracker.entry("60123456789").unwrap().escalation_id, first);

        tokio::time::sleep(TIMEOUT * 3).await;
        assert_eq!(sender.to(PRIMARY).len(), 2);
        assert_eq!(sender.to(SECONDARY).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_staff_reply_clears_everyone() {
        let sender = Arc::new(RecordingSender::default());
        let tracker = tracker(sender.clone());
        tracker.escalate(ctx("60123456789")).await;
        tracker.escalate(ctx("60987654321")).await;
        assert_eq!(tracker.len(), 2);

        assert_eq!(tracker.on_staff_reply("+60 11-111 1111"), 2);
        assert!(tracker.is_empty());

        tokio::time::sleep(TIMEOUT * 2).await;
        assert!(sender.to(SECONDARY).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_reply_clears_nothing() {
        let tracker = tracker(Arc::new(RecordingSender::default()));
        tracker.escalate(ctx("60123456789")).await;
        assert_eq!(tracker.on_staff_reply("60123456789"), 0);
        assert_eq!(tracker.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_failure_still_arms_timer() {
        let sender = Arc::new(RecordingSender {
            fail_to: Some(PRIMARY),
            ..Default::default()
        });
        let tracker = tracker(sender.clone());

        tracker.escalate(ctx("60123456789")).await;
        assert!(tracker.entry("60123456789").is_some());

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(sender.to(SECONDARY).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_reads_current_contacts() {
        let sender = Arc::new(RecordingSender::default());
        let config = store();
        let tracker = EscalationTracker::new(config.clone(), sender.clone());
        tracker.escalate(ctx("60123456789")).await;

        let mut workflow: WorkflowConfig = (*config.workflow()).clone();
        workflow.escalation.secondary_phone = "60333333333".into();
        config.set_workflow(workflow);

        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;
        assert!(sender.to(SECONDARY).is_empty());
        assert_eq!(sender.to("60333333333").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_timers() {
        let sender = Arc::new(RecordingSender::default());
        let tracker = tracker(sender.clone());
        tracker.escalate(ctx("60123456789")).await;
        tracker.reset();
        assert!(tracker.pending().is_empty());

        tokio::time::sleep(TIMEOUT * 2).await;
        assert!(sender.to(SECONDARY).is_empty());
    }

    #[tokio::test]
    async fn test_should_escalate_uses_config() {
        let tracker = tracker(Arc::new(RecordingSender::default()));
        assert_eq!(
            tracker.should_escalate(Some(EscalationReason::HumanRequest), 0, None),
            Some(EscalationReason::HumanRequest)
        );
        assert_eq!(tracker.should_escalate(None, 2, None), None);
        assert_eq!(
            tracker.should_escalate(None, 3, None),
            Some(EscalationReason::UnknownRepeated)
        );
    }
}
