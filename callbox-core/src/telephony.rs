use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A call event as reported by the telephony provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEventSummary {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub occurred_at: String,
}

/// Outbound side of the voice/SMS provider.
#[async_trait]
pub trait Telephony: Send + Sync {
    async fn send_message(&self, from: &str, to: &str, text: &str) -> Result<()>;

    async fn list_call_events(&self, limit: u32) -> Result<Vec<CallEventSummary>>;
}
