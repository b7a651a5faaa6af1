//! Notifier recipient selection and snooze lifecycle tests

use async_trait::async_trait;
use callbox_core::config::{parse_recipients, Config, NotifyConfig, StorageConfig, TelephonyConfig};
use callbox_core::{CallEventSummary, GateContext, OptInSource, Telephony};
use callbox_notify::{initialize_opt_ins, DispatchOutcome, NotificationService};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const OWN_NUMBER: &str = "+12145550000";
const LINDA: &str = "+14693059242";
const SEAN: &str = "+12149090499";
const GUEST: &str = "+12145551234";

#[derive(Default)]
struct RecordingTelephony {
    sent: Mutex<Vec<(String, String, String)>>,
    failing: Vec<String>,
}

impl RecordingTelephony {
    fn failing_for(numbers: &[&str]) -> Self {
        Self {
            failing: numbers.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, to, _)| to.clone()).collect()
    }
}

#[async_trait]
impl Telephony for RecordingTelephony {
    async fn send_message(&self, from: &str, to: &str, text: &str) -> anyhow::Result<()> {
        if self.failing.iter().any(|n| n == to) {
            anyhow::bail!("carrier rejected {}", to);
        }
        self.sent
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string(), text.to_string()));
        Ok(())
    }

    async fn list_call_events(&self, _limit: u32) -> anyhow::Result<Vec<CallEventSummary>> {
        Ok(Vec::new())
    }
}

fn test_config(temp_dir: &TempDir, numbers: &[&str]) -> Config {
    Config {
        telephony: TelephonyConfig {
            api_key: Some("test-key".to_string()),
            phone_number: OWN_NUMBER.to_string(),
            ..Default::default()
        },
        notify: NotifyConfig {
            raw_numbers: numbers.iter().map(|n| n.to_string()).collect(),
            numbers: numbers.iter().map(|n| n.to_string()).collect(),
            recipients: parse_recipients(&format!("linda={},sean={}", LINDA, SEAN)),
        },
        storage: StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        },
        ..Default::default()
    }
}

fn setup(numbers: &[&str], telephony: RecordingTelephony) -> (GateContext, Arc<RecordingTelephony>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let telephony = Arc::new(telephony);
    let ctx = GateContext::new(test_config(&temp_dir, numbers), Some(telephony.clone()));
    (ctx, telephony, temp_dir)
}

async fn opt_in_all(ctx: &GateContext, numbers: &[&str]) {
    for n in numbers {
        ctx.opt_ins.record_opt_in(n, OptInSource::Manual).await;
    }
}

#[tokio::test]
async fn test_sends_to_every_opted_in_recipient_in_order() {
    let numbers = [LINDA, SEAN, GUEST];
    let (ctx, telephony, _temp_dir) = setup(&numbers, RecordingTelephony::default());
    opt_in_all(&ctx, &numbers).await;

    let summary = NotificationService::new(ctx.clone())
        .notify("+15551234567", Utc::now())
        .await
        .unwrap();

    assert_eq!(summary.sent, 3);
    assert_eq!(summary.total, 3);
    assert_eq!(telephony.recipients(), vec![LINDA, SEAN, GUEST]);
    let sent = telephony.sent.lock().unwrap();
    assert!(sent.iter().all(|(from, _, text)| from == OWN_NUMBER && text.contains("callbox")));
}

#[tokio::test]
async fn test_opted_out_recipient_never_receives() {
    let numbers = [LINDA, SEAN];
    let (ctx, telephony, _temp_dir) = setup(&numbers, RecordingTelephony::default());
    opt_in_all(&ctx, &numbers).await;
    ctx.opt_ins.record_opt_out(SEAN, OptInSource::SmsReply).await;

    let summary = NotificationService::new(ctx.clone())
        .notify("+15551234567", Utc::now())
        .await
        .unwrap();

    assert_eq!(telephony.recipients(), vec![LINDA]);
    assert_eq!(summary.outcome_for(SEAN), Some(DispatchOutcome::SkippedNotOptedIn));
    assert_eq!(summary.not_opted_in, 1);
}

#[tokio::test]
async fn test_unknown_consent_is_not_sent() {
    let (ctx, telephony, _temp_dir) = setup(&[GUEST], RecordingTelephony::default());

    let summary = NotificationService::new(ctx.clone())
        .notify("+15551234567", Utc::now())
        .await
        .unwrap();

    assert!(telephony.recipients().is_empty());
    assert_eq!(summary.outcome_for(GUEST), Some(DispatchOutcome::SkippedNotOptedIn));
}

#[tokio::test]
async fn test_snooze_skips_exactly_one_run() {
    let numbers = [LINDA, SEAN];
    let (ctx, telephony, _temp_dir) = setup(&numbers, RecordingTelephony::default());
    opt_in_all(&ctx, &numbers).await;
    ctx.snooze.set("sean", true).await.unwrap();
    let service = NotificationService::new(ctx.clone());

    let first = service.notify("+15551234567", Utc::now()).await.unwrap();
    assert_eq!(first.outcome_for(SEAN), Some(DispatchOutcome::SkippedSnoozed));
    assert_eq!(first.snoozed, 1);
    assert_eq!(telephony.recipients(), vec![LINDA]);

    let second = service.notify("+15551234567", Utc::now()).await.unwrap();
    assert_eq!(second.outcome_for(SEAN), Some(DispatchOutcome::Sent));
    assert_eq!(telephony.recipients(), vec![LINDA, LINDA, SEAN]);
}

#[tokio::test]
async fn test_snooze_applies_even_without_consent_record() {
    let (ctx, telephony, _temp_dir) = setup(&[SEAN], RecordingTelephony::default());
    ctx.snooze.set("sean", true).await.unwrap();

    let summary = NotificationService::new(ctx.clone())
        .notify("+15551234567", Utc::now())
        .await
        .unwrap();

    assert_eq!(summary.outcome_for(SEAN), Some(DispatchOutcome::SkippedSnoozed));
    assert!(telephony.recipients().is_empty());
}

#[tokio::test]
async fn test_failure_does_not_block_other_recipients_and_snooze_resets() {
    let numbers = [LINDA, SEAN, GUEST];
    let (ctx, telephony, _temp_dir) = setup(&numbers, RecordingTelephony::failing_for(&[LINDA, SEAN, GUEST]));
    opt_in_all(&ctx, &numbers).await;
    ctx.snooze.set("linda", true).await.unwrap();

    let summary = NotificationService::new(ctx.clone())
        .notify("+15551234567", Utc::now())
        .await
        .unwrap();

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.snoozed, 1);
    assert!(telephony.recipients().is_empty());
    let state = ctx.snooze.get_state().await;
    assert!(state.values().all(|snoozed| !snoozed));
}

#[tokio::test]
async fn test_partial_failure_continues() {
    let numbers = [LINDA, SEAN, GUEST];
    let (ctx, telephony, _temp_dir) = setup(&numbers, RecordingTelephony::failing_for(&[SEAN]));
    opt_in_all(&ctx, &numbers).await;

    let summary = NotificationService::new(ctx.clone())
        .notify("+15551234567", Utc::now())
        .await
        .unwrap();

    assert_eq!(summary.outcome_for(SEAN), Some(DispatchOutcome::Failed));
    assert_eq!(telephony.recipients(), vec![LINDA, GUEST]);
}

#[tokio::test]
async fn test_unconfigured_notifier_is_a_no_op() {
    let temp_dir = TempDir::new().unwrap();

    let no_numbers = GateContext::new(test_config(&temp_dir, &[]), Some(Arc::new(RecordingTelephony::default())));
    assert!(NotificationService::new(no_numbers).notify("x", Utc::now()).await.is_none());

    let no_client = GateContext::new(test_config(&temp_dir, &[LINDA]), None);
    no_client.snooze.set("linda", true).await.unwrap();
    assert!(NotificationService::new(no_client.clone()).notify("x", Utc::now()).await.is_none());
    // Snooze is only consumed by a real dispatch cycle.
    assert!(no_client.snooze.is_snoozed("linda").await);

    let mut config = test_config(&temp_dir, &[LINDA]);
    config.telephony.phone_number.clear();
    let no_from = GateContext::new(config, Some(Arc::new(RecordingTelephony::default())));
    assert!(NotificationService::new(no_from).notify("x", Utc::now()).await.is_none());
}

#[tokio::test]
async fn test_initialization_respects_existing_opt_outs() {
    let numbers = [LINDA, SEAN];
    let (ctx, telephony, _temp_dir) = setup(&numbers, RecordingTelephony::default());
    ctx.opt_ins.record_opt_out(SEAN, OptInSource::SmsReply).await;

    let added = initialize_opt_ins(&ctx).await;

    assert_eq!(added, 1);
    assert_eq!(telephony.recipients(), vec![LINDA]);
    let all = ctx.opt_ins.list_all().await;
    assert_eq!(all[LINDA].source, "initial_config");
    assert_eq!(all[SEAN].status, callbox_core::OptInStatus::OptedOut);

    // A second startup changes nothing.
    assert_eq!(initialize_opt_ins(&ctx).await, 0);
    assert_eq!(telephony.recipients().len(), 1);
}
