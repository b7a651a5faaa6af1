use callbox_core::{GateContext, OptInSource, OptInStatus};
use tracing;

pub const WELCOME_TEXT: &str = "Welcome to Let Food Into Civic gate unlock notifications! \
You'll receive alerts when deliveries arrive. \
Reply STOP to unsubscribe, HELP for assistance.";

/// Opts in configured numbers that have never been seen, sending each a
/// welcome message. Numbers with any existing record, including an opt-out,
/// are left as they are. Returns how many numbers were newly opted in.
pub async fn initialize_opt_ins(ctx: &GateContext) -> usize {
    let mut added = 0;

    for phone in &ctx.config.notify.numbers {
        if !ctx.opt_ins.contains(phone).await {
            ctx.opt_ins.record_opt_in(phone, OptInSource::InitialConfig).await;
            send_welcome_message(ctx, phone).await;
            tracing::info!("Auto-opted-in {} (new number in NOTIFY_NUMBERS)", phone);
            added += 1;
            continue;
        }

        match ctx.opt_ins.get_status(phone).await {
            Some(OptInStatus::OptedOut) => tracing::info!(
                "{} is in NOTIFY_NUMBERS but opted out, respecting opt-out status",
                phone
            ),
            Some(OptInStatus::OptedIn) => tracing::debug!("{} already opted in", phone),
            None => tracing::warn!("{} has an unreadable opt-in record, leaving it alone", phone),
        }
    }

    if added > 0 {
        tracing::info!("Initialized opt-ins for {} configured number(s)", added);
    }
    added
}

async fn send_welcome_message(ctx: &GateContext, phone: &str) {
    let Some((from, client)) = ctx.sms_channel() else {
        return;
    };

    match client.send_message(from, phone, WELCOME_TEXT).await {
        Ok(()) => tracing::info!("Welcome message sent to {}", phone),
        Err(e) => tracing::error!("Failed to send welcome message to {}: {}", phone, e),
    }
}

/// Logs how NOTIFY_NUMBERS entries were rewritten and which could not be
/// normalized.
pub fn log_normalization(ctx: &GateContext) {
    for (raw, normalized) in ctx.config.notify.normalization_report() {
        if normalized.is_canonical() {
            tracing::info!("Phone number normalized: {} -> {}", raw, normalized.as_str());
        } else {
            tracing::warn!("Could not normalize phone number {:?}, using it as-is", raw);
        }
    }
}
