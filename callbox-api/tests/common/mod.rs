#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use callbox_core::config::{parse_recipients, Config, NotifyConfig, StorageConfig, TelephonyConfig};
use callbox_core::{CallEventSummary, GateContext, Telephony};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

pub const OWN_NUMBER: &str = "+12145550000";
pub const LINDA: &str = "+14693059242";
pub const SEAN: &str = "+12149090499";

#[derive(Default)]
pub struct FakeTelephony {
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub fail_sends: bool,
    pub events: Vec<CallEventSummary>,
    /// When set, every send waits here until the test releases it.
    pub hold_sends: Option<Arc<Notify>>,
}

impl FakeTelephony {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits for a background send to land, giving up after two seconds.
    pub async fn wait_for_sends(&self, count: usize) -> Vec<(String, String, String)> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }
}

#[async_trait]
impl Telephony for FakeTelephony {
    async fn send_message(&self, from: &str, to: &str, text: &str) -> anyhow::Result<()> {
        if self.fail_sends {
            anyhow::bail!("Telnyx API error (503): unavailable");
        }
        if let Some(gate) = &self.hold_sends {
            gate.notified().await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string(), text.to_string()));
        Ok(())
    }

    async fn list_call_events(&self, limit: u32) -> anyhow::Result<Vec<CallEventSummary>> {
        if self.fail_sends {
            anyhow::bail!("Telnyx API error (401): unauthorized");
        }
        Ok(self.events.iter().take(limit as usize).cloned().collect())
    }
}

pub fn test_config(temp_dir: &TempDir, numbers: &[&str]) -> Config {
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

pub struct Harness {
    pub ctx: GateContext,
    pub telephony: Arc<FakeTelephony>,
    pub temp_dir: TempDir,
}

impl Harness {
    pub fn new(numbers: &[&str]) -> Self {
        Self::with_telephony(numbers, FakeTelephony::default())
    }

    pub fn with_telephony(numbers: &[&str], telephony: FakeTelephony) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let telephony = Arc::new(telephony);
        let ctx = GateContext::new(test_config(&temp_dir, numbers), Some(telephony.clone()));
        Self {
            ctx,
            telephony,
            temp_dir,
        }
    }

    pub fn without_telephony(numbers: &[&str]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir, numbers);
        config.telephony.api_key = None;
        let ctx = GateContext::new(config, None);
        Self {
            ctx,
            telephony: Arc::new(FakeTelephony::default()),
            temp_dir,
        }
    }

    pub fn app(&self) -> Router {
        callbox_api::router(self.ctx.clone())
    }
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn parse_json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}
