pub mod config;
pub mod context;
pub mod error;
pub mod phone;
pub mod store;
pub mod telephony;
pub mod webhook;

pub use config::Config;
pub use context::GateContext;
pub use error::{SnoozeError, StoreError};
pub use phone::normalize;
pub use store::{EventLog, GateUnlockEvent, OptInRecord, OptInSource, OptInStatus, OptInStore, SnoozeStore};
pub use telephony::{CallEventSummary, Telephony};
pub use webhook::{InboundCall, InboundMessage, SkipReason, SmsCommand};
