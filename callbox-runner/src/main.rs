use anyhow::Result;
use callbox_api::run as run_api;
use callbox_core::context::LOGS_DIR;
use callbox_core::{Config, GateContext, Telephony};
use callbox_delivery::TelnyxClient;
use callbox_notify::{initialize_opt_ins, log_normalization};
use std::sync::Arc;
use tokio;
use tracing;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "app.log";

/// Logs to stdout and, when the log directory is writable, to
/// `{DATA_DIR}/logs/app.log`. The guard must live as long as the process.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_dir = config.storage.data_dir.join(LOGS_DIR);
    match std::fs::create_dir_all(&log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stdout.and(non_blocking))
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            tracing::warn!("File logging disabled, cannot create {}: {}", log_dir.display(), e);
            None
        }
    }
}

fn log_config_summary(ctx: &GateContext) {
    let config = &ctx.config;
    tracing::info!("Unlock digit: {}", config.unlock.digit);
    tracing::info!("Tone duration: {} repeats", config.unlock.tone_repeats);
    tracing::info!("Pause duration: {}s", config.unlock.pause_seconds);
    tracing::info!("Iterations: {}", config.unlock.iterations);
    tracing::info!("Tone audio: {}", config.unlock.audio_url);
    tracing::info!(
        "Telnyx: {}",
        if config.telephony_configured() { "configured" } else { "not configured" }
    );
    if config.notify.numbers.is_empty() {
        tracing::warn!("SMS notifications: not configured");
    } else {
        tracing::info!("SMS notifications: {:?}", config.notify.numbers);
    }
    tracing::info!("Snooze recipients: {:?}", config.notify.recipient_names());
    tracing::info!("Data directory: {}", config.storage.data_dir.display());
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    let _log_guard = init_tracing(&config);

    tracing::info!("Starting Let Food Into Civic callbox service");

    let telephony = TelnyxClient::from_config(&config.telephony)?
        .map(|client| Arc::new(client) as Arc<dyn Telephony>);

    let ctx = GateContext::new(config, telephony);
    if let Err(e) = ctx.prepare_storage().await {
        tracing::error!("Failed to prepare data directory: {}", e);
    }

    log_normalization(&ctx);
    log_config_summary(&ctx);
    initialize_opt_ins(&ctx).await;

    tracing::info!("Gate context initialized");
    run_api(ctx).await?;

    Ok(())
}
