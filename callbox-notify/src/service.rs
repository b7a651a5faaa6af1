use chrono::{DateTime, Utc};
use callbox_core::{GateContext, OptInStatus, Telephony};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    SkippedSnoozed,
    SkippedNotOptedIn,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifySummary {
    pub sent: usize,
    pub failed: usize,
    pub snoozed: usize,
    pub not_opted_in: usize,
    pub total: usize,
    /// Per-recipient outcomes in configured order.
    pub outcomes: Vec<(String, DispatchOutcome)>,
}

impl NotifySummary {
    fn record(&mut self, phone: &str, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::Failed => self.failed += 1,
            DispatchOutcome::SkippedSnoozed => self.snoozed += 1,
            DispatchOutcome::SkippedNotOptedIn => self.not_opted_in += 1,
        }
        self.outcomes.push((phone.to_string(), outcome));
    }

    pub fn outcome_for(&self, phone: &str) -> Option<DispatchOutcome> {
        self.outcomes
            .iter()
            .find(|(p, _)| p == phone)
            .map(|(_, o)| *o)
    }
}

pub fn notification_text(unlock_digit: &str) -> String {
    format!(
        "the civic callbox was answered and I did {}s, <3 lfic.",
        unlock_digit
    )
}

/// Tells the household that the gate was opened.
pub struct NotificationService {
    ctx: GateContext,
}

impl NotificationService {
    pub fn new(ctx: GateContext) -> Self {
        Self { ctx }
    }

    /// Sends the unlock notification to every configured number that is
    /// neither snoozed nor opted out, then clears all snoozes.
    ///
    /// Returns `None` when notifications are not configured; nothing is sent
    /// and snooze state is left alone in that case.
    pub async fn notify(&self, caller: &str, timestamp: DateTime<Utc>) -> Option<NotifySummary> {
        tracing::info!(
            "SMS notification run for caller {} at {}",
            caller,
            timestamp.to_rfc3339()
        );

        let config = &self.ctx.config;
        if config.notify.numbers.is_empty() {
            tracing::warn!("No notification numbers configured (NOTIFY_NUMBERS is empty)");
            return None;
        }
        if config.telephony.phone_number.is_empty() {
            tracing::warn!("No Telnyx phone number configured (TELNYX_PHONE_NUMBER is empty)");
            return None;
        }
        let Some((from, client)) = self.ctx.sms_channel() else {
            tracing::warn!("Telnyx client not initialized (API key missing)");
            return None;
        };

        let message = notification_text(&config.unlock.digit);
        tracing::info!(
            "Sending to {} recipient(s): {:?}",
            config.notify.numbers.len(),
            config.notify.numbers
        );

        let mut summary = NotifySummary {
            total: config.notify.numbers.len(),
            ..Default::default()
        };
        for phone in &config.notify.numbers {
            let outcome = self.dispatch(phone, from, client, &message).await;
            summary.record(phone, outcome);
        }

        self.ctx.snooze.reset_all().await;

        tracing::info!(
            "SMS notification summary: {} sent, {} failed, {} snoozed, {} not opted in, out of {} total",
            summary.sent,
            summary.failed,
            summary.snoozed,
            summary.not_opted_in,
            summary.total
        );

        Some(summary)
    }

    async fn dispatch(
        &self,
        phone: &str,
        from: &str,
        client: &Arc<dyn Telephony>,
        message: &str,
    ) -> DispatchOutcome {
        let name = self.ctx.config.notify.name_for(phone);
        if let Some(name) = name {
            if self.ctx.snooze.is_snoozed(name).await {
                tracing::info!("Skipping {} (snoozed)", name);
                return DispatchOutcome::SkippedSnoozed;
            }
        }

        // Consent is read from disk on every send, never from a startup snapshot.
        match self.ctx.opt_ins.get_status(phone).await {
            Some(OptInStatus::OptedIn) => {}
            Some(OptInStatus::OptedOut) => {
                tracing::warn!("Skipping SMS to {}: opted out", phone);
                return DispatchOutcome::SkippedNotOptedIn;
            }
            None => {
                tracing::warn!("Skipping SMS to {}: not opted in", phone);
                return DispatchOutcome::SkippedNotOptedIn;
            }
        }

        tracing::info!("Sending SMS to {}", phone);
        match client.send_message(from, phone, message).await {
            Ok(()) => {
                tracing::info!("SMS sent to {}", phone);
                DispatchOutcome::Sent
            }
            Err(e) => {
                tracing::error!("Failed to send SMS to {}: {}", phone, e);
                DispatchOutcome::Failed
            }
        }
    }
}

/// Runs a notification in the background. The caller does not wait on the
/// handle; the task logs its own outcome.
pub fn spawn_notify(ctx: GateContext, caller: String) -> JoinHandle<()> {
    let timestamp = Utc::now();
    tokio::spawn(async move {
        NotificationService::new(ctx).notify(&caller, timestamp).await;
    })
}
