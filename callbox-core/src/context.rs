use std::sync::Arc;

use crate::config::Config;
use crate::store::{EventLog, OptInStore, SnoozeStore};
use crate::telephony::Telephony;

const OPT_IN_DIR: &str = "opt-in-flow";
const SNOOZE_FILE: &str = "snooze.json";
const EVENTS_FILE: &str = "events.json";
pub const LOGS_DIR: &str = "logs";

#[derive(Clone)]
pub struct GateContext {
    pub config: Arc<Config>,
    pub opt_ins: OptInStore,
    pub snooze: SnoozeStore,
    pub events: EventLog,
    pub telephony: Option<Arc<dyn Telephony>>,
}

impl GateContext {
    pub fn new(config: Config, telephony: Option<Arc<dyn Telephony>>) -> Self {
        let data_dir = config.storage.data_dir.clone();
        let opt_ins = OptInStore::new(data_dir.join(OPT_IN_DIR));
        let snooze = SnoozeStore::new(
            data_dir.join(SNOOZE_FILE),
            config.notify.recipient_names(),
        );
        let events = EventLog::new(data_dir.join(EVENTS_FILE));

        GateContext {
            config: Arc::new(config),
            opt_ins,
            snooze,
            events,
            telephony,
        }
    }

    /// Creates the data and log directories.
    pub async fn prepare_storage(&self) -> anyhow::Result<()> {
        let data_dir = &self.config.storage.data_dir;
        tokio::fs::create_dir_all(data_dir.join(OPT_IN_DIR)).await?;
        tokio::fs::create_dir_all(data_dir.join(LOGS_DIR)).await?;
        Ok(())
    }

    /// Outbound number and client, when both are configured.
    pub fn sms_channel(&self) -> Option<(&str, &Arc<dyn Telephony>)> {
        let from = self.config.telephony.phone_number.as_str();
        match &self.telephony {
            Some(client) if !from.is_empty() => Some((from, client)),
            _ => None,
        }
    }
}
