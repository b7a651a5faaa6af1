//! HTML pages: the household snooze controls, the public landing page and
//! the status page.

use axum::{
    extract::{ConnectInfo, Extension, Query},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use callbox_core::{phone, GateContext};
use serde::Deserialize;
use std::net::SocketAddr;
use tracing;

use crate::network;
use crate::markup::escape_markup;

const STYLE: &str = r#"
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: 'Inter', -apple-system, BlinkMacSystemFont, sans-serif; background: #fafaf9; color: #1c1917; line-height: 1.6; }
    .container { max-width: 560px; margin: 0 auto; padding: 48px 24px; }
    header { text-align: center; margin-bottom: 32px; }
    h1 { font-family: 'Source Serif 4', Georgia, serif; font-size: 1.75rem; margin-bottom: 8px; }
    h2 { font-size: 1.1rem; margin: 24px 0 8px; }
    .subtitle, .muted { color: #57534e; font-size: 0.95rem; }
    .info-box { background: #fef3c7; border-left: 4px solid #b45309; padding: 16px 20px; margin-bottom: 24px; border-radius: 0 8px 8px 0; font-size: 0.9rem; }
    .card { background: #fff; border: 1px solid #e7e5e4; border-radius: 12px; padding: 24px; margin-bottom: 16px; }
    .row { display: flex; justify-content: space-between; align-items: center; }
    .name { font-size: 1.25rem; font-weight: 600; text-transform: capitalize; }
    .phone { color: #a8a29e; font-size: 0.9rem; }
    .toggle { width: 64px; height: 36px; background: #22c55e; border-radius: 18px; border: none; cursor: pointer; }
    .toggle.snoozed { background: #a8a29e; }
    .status { font-size: 0.85rem; font-weight: 500; }
    .status.active { color: #22c55e; }
    .status.snoozed { color: #a8a29e; }
    footer { text-align: center; margin-top: 40px; color: #a8a29e; font-size: 0.8rem; }
    footer a { color: #a8a29e; }
    code { background: #e7e5e4; padding: 2px 6px; border-radius: 4px; }
"#;

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
    <style>{}</style>
</head>
<body>
    <div class="container">
{}
    </div>
</body>
</html>"#,
        escape_markup(title),
        STYLE,
        body
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub view: Option<String>,
}

/// Local callers get the snooze controls, everyone else the public page.
/// `?view=public` forces the public page; `?view=local` forces the controls
/// and is refused for non-local callers.
pub async fn index(
    Extension(ctx): Extension<GateContext>,
    Query(query): Query<ViewQuery>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let local = network::is_local(&headers, peer);
    let view = query.view.unwrap_or_default().to_lowercase();

    match view.as_str() {
        "local" if !local => {
            tracing::warn!("Refused local view for {:?}", network::client_ip(&headers, peer));
            network::access_denied()
        }
        "local" => Html(render_snooze_page(&ctx).await).into_response(),
        "public" => Html(render_public_page(&ctx)).into_response(),
        _ if local => Html(render_snooze_page(&ctx).await).into_response(),
        _ => Html(render_public_page(&ctx)).into_response(),
    }
}

pub async fn render_snooze_page(ctx: &GateContext) -> String {
    let state = ctx.snooze.get_state().await;
    let notify = &ctx.config.notify;

    let mut cards = String::new();
    for recipient in &notify.recipients {
        let snoozed = state.get(&recipient.name).copied().unwrap_or(false);
        let name = escape_markup(&recipient.name);
        cards.push_str(&format!(
            r#"        <div class="card">
            <div class="row">
                <div>
                    <div class="name">{name}</div>
                    <div class="phone">{phone}</div>
                </div>
                <form method="POST" action="/admin/snooze" style="margin: 0;">
                    <input type="hidden" name="recipient" value="{name}">
                    <input type="hidden" name="snoozed" value="{next}">
                    <button type="submit" class="{class}" aria-label="Toggle snooze for {name}"></button>
                </form>
            </div>
            <div class="row">
                <span class="muted">Notification status</span>
                <span class="status {status_class}">{status}</span>
            </div>
        </div>
"#,
            name = name,
            phone = escape_markup(&phone::display(&recipient.phone)),
            next = !snoozed,
            class = if snoozed { "toggle snoozed" } else { "toggle" },
            status_class = if snoozed { "snoozed" } else { "active" },
            status = if snoozed { "Snoozed" } else { "Active" },
        ));
    }
    if cards.is_empty() {
        cards.push_str(
            "        <div class=\"card muted\">No snooze recipients configured. Set SNOOZE_RECIPIENTS to add some.</div>\n",
        );
    }

    let body = format!(
        r#"        <header>
            <h1>Snooze Notifications</h1>
            <p class="subtitle">Manage who gets notified</p>
        </header>
        <div class="info-box">
            Snoozing skips the <strong>next gate unlock event only</strong>. After the gate unlocks,
            snooze automatically resets and notifications resume.
        </div>
{cards}        <footer>
            <p>Let Food Into Civic</p>
            <p>Local network access only</p>
            <p><a href="/?view=public">View Public Page</a></p>
        </footer>"#,
        cards = cards
    );

    page("Snooze Notifications - Let Food Into Civic", &body)
}

pub fn render_public_page(ctx: &GateContext) -> String {
    let body = format!(
        r#"        <header>
            <h1>Let Food Into Civic</h1>
            <p class="subtitle">Automatic gate access for food deliveries</p>
        </header>
        <div class="card">
            <h2>What this is</h2>
            <p>When a delivery driver dials our building's callbox, this service answers and
            plays the tone for digit <strong>{digit}</strong> to open the gate. Household members
            receive a text message each time the gate is opened.</p>
        </div>
        <div class="card">
            <h2>SMS notifications</h2>
            <ul style="margin-left: 20px;">
                <li><strong>Who receives them:</strong> only household members who have agreed to receive them.</li>
                <li><strong>How often:</strong> very low volume, one message per gate unlock.</li>
                <li><strong>Opt out anytime:</strong> reply STOP to any message to stop all future notifications.</li>
                <li><strong>Get help:</strong> reply HELP to any message.</li>
                <li>Message and data rates may apply.</li>
            </ul>
        </div>
        <footer>
            <p>Let Food Into Civic</p>
        </footer>"#,
        digit = escape_markup(&ctx.config.unlock.digit)
    );

    page("Let Food Into Civic", &body)
}

pub async fn status(Extension(ctx): Extension<GateContext>) -> Html<String> {
    let config = &ctx.config;
    let notify_status = if config.notify.numbers.is_empty() {
        "Not configured".to_string()
    } else {
        format!("{} number(s)", config.notify.numbers.len())
    };
    let telnyx_status = if config.telephony_configured() {
        "Configured"
    } else {
        "Not configured"
    };

    let body = format!(
        r#"        <div class="card">
            <h1>Let Food Into Civic</h1>
            <p>Automatic call box unlocker for food deliveries. When the call box calls, this
            service answers and plays tone "{digit}" to unlock the gate.</p>
            <h2>Status</h2>
            <p><strong>Service:</strong> Running</p>
            <p><strong>Telnyx API:</strong> {telnyx}</p>
            <p><strong>SMS Notifications:</strong> {notify}</p>
            <p><strong>Webhook URL:</strong> <code>/webhook/voice</code></p>
        </div>"#,
        digit = escape_markup(&config.unlock.digit),
        telnyx = telnyx_status,
        notify = notify_status
    );

    Html(page("Let Food Into Civic - Status", &body))
}
