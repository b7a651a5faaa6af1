use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use super::{ensure_parent, quarantine, read_json, write_json};
use crate::error::StoreError;
use crate::phone::normalize;

const RECORDS_FILE: &str = "opt-ins.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptInStatus {
    OptedIn,
    OptedOut,
}

impl OptInStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptInStatus::OptedIn => "opted_in",
            OptInStatus::OptedOut => "opted_out",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "opted_in" => Some(OptInStatus::OptedIn),
            "opted_out" => Some(OptInStatus::OptedOut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptInSource {
    InitialConfig,
    Manual,
    SmsReply,
}

impl OptInSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptInSource::InitialConfig => "initial_config",
            OptInSource::Manual => "manual",
            OptInSource::SmsReply => "sms_reply",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptInRecord {
    pub status: OptInStatus,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub opted_in_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub opted_out_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    phone_number: &'a str,
    action: &'static str,
    source: &'static str,
}

/// Consent records keyed by E.164 number, plus a month-partitioned audit trail
/// of every change. Records are never deleted.
#[derive(Debug, Clone)]
pub struct OptInStore {
    dir: PathBuf,
}

impl OptInStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    pub fn audit_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("audit-{}.log", at.format("%Y-%m")))
    }

    /// Current status, or `None` when the number is unknown or its status is
    /// anything other than `opted_in`/`opted_out`. Callers must treat `None`
    /// as "do not send". Only the `status` field is consulted.
    pub async fn get_status(&self, phone: &str) -> Option<OptInStatus> {
        let phone = normalize(phone);
        let raw = self.load_raw().await;
        let status = raw.get(&phone)?.get("status");
        let parsed = status.and_then(Value::as_str).and_then(OptInStatus::parse);
        if parsed.is_none() {
            tracing::warn!("Unrecognized opt-in status for {}: {:?}", phone, status);
        }
        parsed
    }

    pub async fn get(&self, phone: &str) -> Option<OptInRecord> {
        let phone = normalize(phone);
        let raw = self.load_raw().await;
        let value = raw.get(&phone)?;
        match serde_json::from_value(value.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Malformed opt-in record for {}: {}", phone, e);
                None
            }
        }
    }

    /// True when the number has any record at all, even a malformed one.
    pub async fn contains(&self, phone: &str) -> bool {
        self.load_raw().await.contains_key(&normalize(phone))
    }

    pub async fn list_all(&self) -> BTreeMap<String, OptInRecord> {
        self.load_raw()
            .await
            .into_iter()
            .filter_map(|(phone, value)| match serde_json::from_value(value) {
                Ok(record) => Some((phone, record)),
                Err(e) => {
                    tracing::warn!("Skipping malformed opt-in record for {}: {}", phone, e);
                    None
                }
            })
            .collect()
    }

    /// Marks the number opted in. A previous `opted_out_at` is kept as history.
    pub async fn record_opt_in(&self, phone: &str, source: OptInSource) -> OptInRecord {
        let record = self.update(phone, OptInStatus::OptedIn, source).await;
        tracing::info!("{} opted in (source: {})", normalize(phone), source.as_str());
        record
    }

    /// Marks the number opted out, preserving any earlier `opted_in_at`.
    pub async fn record_opt_out(&self, phone: &str, source: OptInSource) -> OptInRecord {
        let record = self.update(phone, OptInStatus::OptedOut, source).await;
        tracing::info!("{} opted out (source: {})", normalize(phone), source.as_str());
        record
    }

    async fn update(&self, phone: &str, status: OptInStatus, source: OptInSource) -> OptInRecord {
        let phone = normalize(phone);
        let now = Utc::now();

        let mut loaded = self.load_for_update().await;
        let value = merge_record(
            loaded.as_ref().and_then(|raw| raw.get(&phone)),
            status,
            source,
            now,
        );
        let record = serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            tracing::warn!("Re-reading merged opt-in record for {} failed: {}", phone, e);
            fallback_record(status, source, now)
        });

        match loaded.as_mut() {
            Some(raw) => {
                raw.insert(phone.clone(), value);
                if let Err(e) = write_json(&self.records_path(), &*raw).await {
                    tracing::error!("Failed to save opt-ins: {}", e);
                }
            }
            None => tracing::error!(
                "Opt-in change for {} not saved: existing records could not be read",
                phone
            ),
        }

        if let Err(e) = self.append_audit(&phone, status, source, now).await {
            tracing::error!("Failed to write audit log: {}", e);
        }
        record
    }

    async fn append_audit(
        &self,
        phone: &str,
        status: OptInStatus,
        source: OptInSource,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let path = self.audit_path(at);
        let entry = AuditEntry {
            timestamp: at,
            phone_number: phone,
            action: status.as_str(),
            source: source.as_str(),
        };
        let mut line = serde_json::to_vec(&entry).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        line.push(b'\n');

        ensure_parent(&path).await?;
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(&line).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)
    }

    async fn load_records(&self) -> Result<Map<String, Value>, StoreError> {
        let path = self.records_path();
        match read_json(&path).await? {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(_) => Err(StoreError::Shape {
                path,
                expected: "object keyed by phone number",
            }),
        }
    }

    /// Raw record map for reads. Unreadable or malformed storage behaves as
    /// empty.
    async fn load_raw(&self) -> Map<String, Value> {
        self.load_records().await.unwrap_or_else(|e| {
            tracing::error!("Failed to load opt-ins: {}", e);
            Map::new()
        })
    }

    /// Raw record map for a mutation. `None` means the file must not be
    /// overwritten. Undecodable content is moved aside first so no record is
    /// lost by the rewrite.
    async fn load_for_update(&self) -> Option<Map<String, Value>> {
        match self.load_records().await {
            Ok(map) => Some(map),
            Err(e @ StoreError::Io { .. }) => {
                tracing::error!("Failed to load opt-ins: {}", e);
                None
            }
            Err(e) => {
                tracing::error!("Failed to load opt-ins: {}", e);
                match quarantine(&self.records_path()).await {
                    Ok(moved) => {
                        tracing::warn!("Unreadable opt-in records moved to {}", moved.display());
                        Some(Map::new())
                    }
                    Err(e) => {
                        tracing::error!("Failed to move unreadable opt-ins aside: {}", e);
                        None
                    }
                }
            }
        }
    }
}

/// Applies a status change on top of whatever the stored record holds. Fields
/// this store does not own, and timestamps it cannot parse, pass through
/// unchanged.
fn merge_record(
    previous: Option<&Value>,
    status: OptInStatus,
    source: OptInSource,
    at: DateTime<Utc>,
) -> Value {
    let mut fields = previous
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let (stamped, kept) = match status {
        OptInStatus::OptedIn => ("opted_in_at", "opted_out_at"),
        OptInStatus::OptedOut => ("opted_out_at", "opted_in_at"),
    };

    fields.insert("status".to_string(), Value::String(status.as_str().to_string()));
    fields.insert(
        stamped.to_string(),
        Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    );
    fields.entry(kept.to_string()).or_insert(Value::Null);
    fields.insert("source".to_string(), Value::String(source.as_str().to_string()));
    Value::Object(fields)
}

fn fallback_record(status: OptInStatus, source: OptInSource, at: DateTime<Utc>) -> OptInRecord {
    OptInRecord {
        status,
        opted_in_at: (status == OptInStatus::OptedIn).then_some(at),
        opted_out_at: (status == OptInStatus::OptedOut).then_some(at),
        source: source.as_str().to_string(),
    }
}

/// RFC 3339, or a bare ISO-8601 local time taken as UTC. Anything else reads
/// as absent rather than failing the record.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_str).and_then(parse_timestamp))
}
