use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use super::{quarantine, read_json, write_json};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateUnlockEvent {
    pub timestamp: DateTime<Utc>,
}

/// Append-only history of gate unlocks, oldest first.
///
/// Appends are read-modify-write of the whole file with no locking. Events
/// arrive a few times a day from a single source, so concurrent appends are
/// not guarded against.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Adds one event. An undecodable log is moved aside and a fresh one
    /// started; a log that cannot be read at all is left untouched and the
    /// event is dropped.
    pub async fn append(&self, timestamp: DateTime<Utc>) {
        let mut events = match self.load().await {
            Ok(events) => events.unwrap_or_default(),
            Err(e @ StoreError::Io { .. }) => {
                tracing::error!("Unlock event at {} not recorded: {}", timestamp.to_rfc3339(), e);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to load events: {}", e);
                match quarantine(&self.path).await {
                    Ok(moved) => tracing::warn!("Unreadable event log moved to {}", moved.display()),
                    Err(e) => {
                        tracing::error!("Unlock event not recorded: {}", e);
                        return;
                    }
                }
                Vec::new()
            }
        };
        events.push(GateUnlockEvent { timestamp });
        self.save(&events).await;
        tracing::debug!("Recorded unlock event at {}", timestamp.to_rfc3339());
    }

    /// All recorded events. An absent log is created empty; an unreadable or
    /// malformed one is logged and read as empty.
    pub async fn load_all(&self) -> Vec<GateUnlockEvent> {
        match self.load().await {
            Ok(Some(events)) => events,
            Ok(None) => {
                self.save(&[]).await;
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Failed to load events: {}", e);
                Vec::new()
            }
        }
    }

    async fn load(&self) -> Result<Option<Vec<GateUnlockEvent>>, StoreError> {
        let Some(value) = read_json(&self.path).await? else {
            return Ok(None);
        };
        if !matches!(value, Value::Array(_)) {
            return Err(StoreError::Shape {
                path: self.path.clone(),
                expected: "array of events",
            });
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })
    }

    async fn save(&self, events: &[GateUnlockEvent]) {
        if let Err(e) = write_json(&self.path, &events).await {
            tracing::error!("Failed to save events: {}", e);
        }
    }
}
