use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{read_json, write_json};
use crate::error::{SnoozeError, StoreError};

pub type SnoozeState = BTreeMap<String, bool>;

/// One-shot "skip my next notification" flags for the closed roster of
/// household members. Keyed by display name, not phone number.
#[derive(Debug, Clone)]
pub struct SnoozeStore {
    path: PathBuf,
    names: Vec<String>,
}

impl SnoozeStore {
    pub fn new(path: impl Into<PathBuf>, names: Vec<String>) -> Self {
        Self {
            path: path.into(),
            names,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    fn defaults(&self) -> SnoozeState {
        self.names.iter().map(|n| (n.clone(), false)).collect()
    }

    /// Current state with an entry for every roster name. Missing entries are
    /// backfilled as not snoozed and written back before returning.
    pub async fn get_state(&self) -> SnoozeState {
        let mut state = match self.load().await {
            Ok(Some(state)) => state,
            Ok(None) => SnoozeState::new(),
            Err(e) => {
                tracing::error!("Failed to load snooze state: {}", e);
                return self.defaults();
            }
        };

        let mut backfilled = false;
        for name in &self.names {
            if !state.contains_key(name) {
                state.insert(name.clone(), false);
                backfilled = true;
            }
        }
        if backfilled {
            self.save(&state).await;
        }

        state
    }

    pub async fn is_snoozed(&self, name: &str) -> bool {
        self.get_state().await.get(name).copied().unwrap_or(false)
    }

    pub async fn set(&self, name: &str, snoozed: bool) -> Result<SnoozeState, SnoozeError> {
        if !self.is_known(name) {
            return Err(SnoozeError::UnknownRecipient {
                name: name.to_string(),
                known: self.names.clone(),
            });
        }

        let mut state = self.get_state().await;
        state.insert(name.to_string(), snoozed);
        self.save(&state).await;
        tracing::info!("{} snooze set to {}", name, snoozed);
        Ok(state)
    }

    /// Clears every roster entry regardless of what is stored.
    pub async fn reset_all(&self) {
        self.save(&self.defaults()).await;
        tracing::info!("All snooze states reset to false");
    }

    async fn load(&self) -> Result<Option<SnoozeState>, StoreError> {
        let Some(value) = read_json(&self.path).await? else {
            return Ok(None);
        };
        let Value::Object(map) = value else {
            return Err(StoreError::Shape {
                path: self.path.clone(),
                expected: "object of recipient name to bool",
            });
        };

        // Non-boolean values are dropped here and backfilled by the caller.
        Ok(Some(
            map.into_iter()
                .filter_map(|(name, v)| v.as_bool().map(|b| (name, b)))
                .collect(),
        ))
    }

    async fn save(&self, state: &SnoozeState) {
        if let Err(e) = write_json(&self.path, state).await {
            tracing::error!("Failed to save snooze state: {}", e);
        }
    }
}
