use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::phone::{normalize, normalize_phone, Normalized};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub telephony: TelephonyConfig,
    pub notify: NotifyConfig,
    pub unlock: UnlockConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyConfig {
    pub api_key: Option<String>,
    /// Outbound number in E.164 form, empty when not configured.
    pub phone_number: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Raw entries from NOTIFY_NUMBERS, kept for startup logging.
    pub raw_numbers: Vec<String>,
    /// Normalized notify list, in configured order.
    pub numbers: Vec<String>,
    /// Closed set of household members that can snooze.
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockConfig {
    pub digit: String,
    pub tone_repeats: u32,
    /// Seconds between tone iterations.
    pub pause_seconds: f64,
    pub iterations: u32,
    pub audio_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

const DEFAULT_API_BASE: &str = "https://api.telnyx.com/v2";
const DEFAULT_AUDIO_URL: &str = "https://let-food-into-civic.contrived.com/static/dtmf5-2sec.wav";

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            phone_number: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            digit: "5".to_string(),
            tone_repeats: 8,
            pause_seconds: 0.5,
            iterations: 6,
            audio_url: DEFAULT_AUDIO_URL.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/app/data"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            debug: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();

        let debug = env::var("DEBUG")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let raw_numbers = split_list(&env::var("NOTIFY_NUMBERS").unwrap_or_default());
        let numbers = raw_numbers.iter().map(|n| normalize(n)).collect();

        Config {
            telephony: TelephonyConfig {
                api_key: first_present([
                    env::var("TELNYX_API_KEY").ok(),
                    env::var("TELNYX_LET_FOOD_INTO_CIVIC_KEY").ok(),
                ]),
                phone_number: env::var("TELNYX_PHONE_NUMBER")
                    .ok()
                    .filter(|n| !n.trim().is_empty())
                    .map(|n| normalize(&n))
                    .unwrap_or_default(),
                api_base: env::var("TELNYX_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            },
            notify: NotifyConfig {
                raw_numbers,
                numbers,
                recipients: parse_recipients(&env::var("SNOOZE_RECIPIENTS").unwrap_or_default()),
            },
            unlock: UnlockConfig {
                digit: env::var("UNLOCK_DIGIT").unwrap_or_else(|_| "5".to_string()),
                tone_repeats: parse_or("TONE_DURATION_REPEATS", 8),
                pause_seconds: parse_or("PAUSE_DURATION", 0.5),
                iterations: parse_or("ITERATIONS", 6),
                audio_url: env::var("DTMF_AUDIO_URL")
                    .unwrap_or_else(|_| DEFAULT_AUDIO_URL.to_string()),
            },
            storage: StorageConfig {
                data_dir: env::var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/app/data")),
            },
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_or("PORT", 8080),
                debug,
            },
            logging: LoggingConfig {
                level: env::var("LOG_LEVEL")
                    .unwrap_or_else(|_| String::from(if debug { "debug" } else { "info" })),
            },
        }
    }

    pub fn telephony_configured(&self) -> bool {
        self.telephony.api_key.is_some()
    }
}

impl NotifyConfig {
    /// Display name for a phone number, if it belongs to the snooze roster.
    pub fn name_for(&self, phone: &str) -> Option<&str> {
        let phone = normalize(phone);
        self.recipients
            .iter()
            .find(|r| r.phone == phone)
            .map(|r| r.name.as_str())
    }

    pub fn phone_for(&self, name: &str) -> Option<&str> {
        self.recipients
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.phone.as_str())
    }

    pub fn recipient_names(&self) -> Vec<String> {
        self.recipients.iter().map(|r| r.name.clone()).collect()
    }

    /// Raw entries that normalization changed or could not handle.
    pub fn normalization_report(&self) -> Vec<(String, Normalized)> {
        self.raw_numbers
            .iter()
            .map(|raw| (raw.clone(), normalize_phone(raw)))
            .filter(|(raw, n)| !n.is_canonical() || n.as_str() != raw)
            .collect()
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// First candidate that holds more than whitespace.
fn first_present<I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Parses `name=phone` pairs; entries without a name or phone are dropped.
pub fn parse_recipients(raw: &str) -> Vec<Recipient> {
    let mut recipients: Vec<Recipient> = Vec::new();
    for entry in split_list(raw) {
        let Some((name, phone)) = entry.split_once('=') else {
            tracing::warn!("Ignoring snooze recipient without a phone number: {}", entry);
            continue;
        };
        let name = name.trim().to_lowercase();
        let phone = phone.trim();
        if name.is_empty() || phone.is_empty() {
            continue;
        }
        if recipients.iter().any(|r| r.name == name) {
            tracing::warn!("Duplicate snooze recipient {}, keeping the first entry", name);
            continue;
        }
        recipients.push(Recipient {
            name,
            phone: normalize(phone),
        });
    }
    recipients
}
