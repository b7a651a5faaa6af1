use axum::{
    extract::Extension,
    http::header,
    response::{IntoResponse, Json, Response},
};
use callbox_core::{normalize, GateContext, InboundCall, InboundMessage, OptInSource, SmsCommand};
use callbox_notify::spawn_notify;
use chrono::Utc;
use serde_json::{json, Value};
use tracing;

use crate::params::WebhookParams;
use crate::texml;

pub const SERVICE_NAME: &str = "let-food-into-civic";

pub const STOP_REPLY: &str =
    "You have been unsubscribed from gate unlock notifications. Reply START to resubscribe.";
pub const HELP_REPLY: &str = "Let Food Into Civic: Automatic gate unlock notifications for deliveries. \
Very low volume - you'll only get notified when someone uses the callbox. \
No action needed - just kick back and enjoy the rare notification! \
Reply STOP to unsubscribe.";
pub const START_REPLY: &str =
    "You have been subscribed to gate unlock notifications. Reply STOP to unsubscribe.";
pub const UNKNOWN_REPLY: &str = "Unknown command. Reply STOP to unsubscribe, HELP for assistance.";

pub async fn health(Extension(ctx): Extension<GateContext>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "notifications_configured": !ctx.config.notify.numbers.is_empty(),
        "telnyx_configured": ctx.config.telephony_configured(),
    }))
}

/// Inbound call: record the unlock, notify in the background, and answer
/// with the tone sequence. The response never waits on notification.
pub async fn voice_webhook(
    Extension(ctx): Extension<GateContext>,
    WebhookParams(params): WebhookParams,
) -> Response {
    let call = InboundCall::from_params(&params);
    tracing::info!(
        call_id = %call.call_id,
        from = %call.from,
        to = %call.to,
        "Incoming call received"
    );
    tracing::info!(
        "Generating unlock sequence: tone '{}' x {} iterations",
        ctx.config.unlock.digit,
        ctx.config.unlock.iterations
    );

    ctx.events.append(Utc::now()).await;

    tracing::info!(
        "Initiating SMS notification to {} recipient(s)",
        ctx.config.notify.numbers.len()
    );
    spawn_notify(ctx.clone(), call.from.clone());

    let markup = texml::unlock_texml(&ctx.config.unlock);
    tracing::debug!("Response TeXML:\n{}", markup);

    ([(header::CONTENT_TYPE, texml::CONTENT_TYPE)], markup).into_response()
}

/// Inbound SMS: handles STOP/HELP/START keywords. Always acknowledges with 200
/// so the provider does not retry.
pub async fn sms_webhook(
    Extension(ctx): Extension<GateContext>,
    WebhookParams(params): WebhookParams,
) -> Json<Value> {
    let message = InboundMessage::from_params(&params);

    if let Some(reason) = message.skip_reason(&ctx.config.telephony.phone_number) {
        let reason = reason.describe();
        tracing::info!(
            event_type = ?message.event_type,
            direction = ?message.direction,
            "Skipping SMS webhook event ({})",
            reason
        );
        return Json(json!({ "status": "skipped", "reason": reason }));
    }

    let from = normalize(&message.from);
    let command = message.command();
    tracing::info!(from = %from, to = %message.to, command = ?command, "Incoming SMS received");

    let reply = match command {
        SmsCommand::Stop => {
            ctx.opt_ins.record_opt_out(&from, OptInSource::SmsReply).await;
            tracing::info!("Processed STOP request from {}", from);
            STOP_REPLY
        }
        SmsCommand::Help => {
            tracing::info!("Processed HELP request from {}", from);
            HELP_REPLY
        }
        SmsCommand::Start => {
            ctx.opt_ins.record_opt_in(&from, OptInSource::SmsReply).await;
            tracing::info!("Processed START request from {}", from);
            START_REPLY
        }
        SmsCommand::Unknown(text) => {
            tracing::info!("Unknown message from {}: {}", from, text);
            UNKNOWN_REPLY
        }
    };

    match ctx.sms_channel() {
        Some((own, client)) => match client.send_message(own, &from, reply).await {
            Ok(()) => tracing::info!("Sent reply to {}", from),
            Err(e) => tracing::error!("Failed to send reply SMS to {}: {}", from, e),
        },
        None => tracing::warn!("Cannot reply to {}: SMS sending not configured", from),
    }

    Json(json!({ "status": "processed" }))
}
