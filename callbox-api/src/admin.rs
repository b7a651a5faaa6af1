use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use callbox_core::{normalize, GateContext};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing;

use crate::params::{is_json, WebhookParams};

pub const TEST_MESSAGE: &str =
    "Test message from let-food-into-civic! Your SMS notifications are working.";

const DEFAULT_CALL_LOG_LIMIT: u32 = 10;
const MAX_CALL_LOG_LIMIT: u32 = 250;

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// `snoozed` may arrive as a JSON bool or as the string "true".
fn parse_snoozed(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Sets one recipient's snooze flag. Mounted behind the local-network gate.
pub async fn set_snooze(
    Extension(ctx): Extension<GateContext>,
    headers: HeaderMap,
    params: WebhookParams,
) -> Response {
    let recipient = params.get_str("recipient").unwrap_or_default().to_lowercase();
    let snoozed = parse_snoozed(params.0.get("snoozed"));

    let state = match ctx.snooze.set(&recipient, snoozed).await {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!("Rejected snooze request: {}", e);
            return error(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    if !is_json(&headers) {
        return Redirect::to("/").into_response();
    }

    Json(json!({
        "success": true,
        "recipient": recipient,
        "snoozed": snoozed,
        "state": state,
    }))
    .into_response()
}

pub async fn test_sms(Extension(ctx): Extension<GateContext>, params: WebhookParams) -> Response {
    let Some(client) = ctx.telephony.as_ref() else {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Telnyx API key not configured");
    };
    let from = ctx.config.telephony.phone_number.as_str();
    if from.is_empty() {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Telnyx phone number not configured");
    }

    let to = params
        .get_str("to")
        .filter(|to| !to.trim().is_empty())
        .map(normalize)
        .or_else(|| ctx.config.notify.numbers.first().cloned());
    let Some(to) = to else {
        return error(
            StatusCode::BAD_REQUEST,
            "No phone number provided and NOTIFY_NUMBERS is empty",
        );
    };

    match client.send_message(from, &to, TEST_MESSAGE).await {
        Ok(()) => {
            tracing::info!("Test SMS sent to {}", to);
            Json(json!({ "success": true, "to": to })).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to send test SMS: {}", e);
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallLogQuery {
    #[serde(default)]
    pub limit: Option<String>,
}

/// Anything that is not a whole number falls back to the default.
fn call_log_limit(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(DEFAULT_CALL_LOG_LIMIT)
        .clamp(1, MAX_CALL_LOG_LIMIT)
}

pub async fn call_logs(
    Extension(ctx): Extension<GateContext>,
    Query(query): Query<CallLogQuery>,
) -> Response {
    let Some(client) = ctx.telephony.as_ref() else {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "Telnyx API key not configured");
    };
    let limit = call_log_limit(query.limit.as_deref());

    match client.list_call_events(limit).await {
        Ok(calls) => {
            let count = calls.len();
            Json(json!({ "calls": calls, "count": count })).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to fetch call logs: {}", e);
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
