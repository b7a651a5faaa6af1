use anyhow::{anyhow, Result};
use async_trait::async_trait;
use callbox_core::config::TelephonyConfig;
use callbox_core::{CallEventSummary, Telephony};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing;

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    data: MessageData,
}

#[derive(Debug, Deserialize)]
struct MessageData {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallEventsResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// Telnyx v2 REST client for outbound SMS and call-event queries.
pub struct TelnyxClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl TelnyxClient {
    /// Returns `Ok(None)` when no API key is configured.
    pub fn from_config(config: &TelephonyConfig) -> Result<Option<Self>> {
        match &config.api_key {
            Some(api_key) => {
                tracing::info!("Initializing Telnyx client");
                Ok(Some(Self::new(api_key, &config.api_base)?))
            }
            None => {
                tracing::warn!("Telnyx client disabled (missing API key)");
                Ok(None)
            }
        }
    }

    pub fn new(api_key: &str, api_base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(anyhow!(
            "Telnyx API returned error status {}: {}",
            status,
            error_text
        ))
    }
}

#[async_trait]
impl Telephony for TelnyxClient {
    async fn send_message(&self, from: &str, to: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/messages", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&SendMessageRequest { from, to, text })
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send HTTP request to Telnyx: {}", e))?;

        let response = Self::error_for_status(response).await?;

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse Telnyx message response: {}", e))?;

        tracing::debug!(
            "SMS accepted by Telnyx for {} (message_id: {})",
            to,
            message.data.id.as_deref().unwrap_or(NOT_AVAILABLE)
        );

        Ok(())
    }

    async fn list_call_events(&self, limit: u32) -> Result<Vec<CallEventSummary>> {
        let response = self
            .client
            .get(format!("{}/call_events", self.api_base))
            .bearer_auth(&self.api_key)
            .query(&[("page[size]", limit)])
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send HTTP request to Telnyx: {}", e))?;

        let response = Self::error_for_status(response).await?;

        let events: CallEventsResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse Telnyx call events: {}", e))?;

        Ok(events.data.iter().map(summarize_call_event).collect())
    }
}

/// Call event records vary by event kind; take the first field present.
fn summarize_call_event(event: &Value) -> CallEventSummary {
    let pick = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| match event.get(*k) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    };

    CallEventSummary {
        id: pick(&["id", "call_leg_id"]),
        from: pick(&["from", "caller_id_number"]),
        to: pick(&["to", "destination_number"]),
        event_type: pick(&["event_type", "name", "type"]),
        occurred_at: pick(&["occurred_at", "event_timestamp"]),
    }
}
