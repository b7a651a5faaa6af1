//! Maps provider webhook payloads onto canonical inbound event types.
//!
//! Payloads arrive either as the Telnyx JSON envelope
//! (`{"data": {"event_type": .., "payload": {..}}}`) or as flat form/query
//! fields in the TwiML style (`From`, `To`, `Body`, `CallSid`). Nothing past
//! this module needs to know which.

use serde_json::{Map, Value};

use crate::phone::normalize;

pub const UNKNOWN: &str = "unknown";

const RECEIVED_EVENT: &str = "message.received";
const INBOUND: &str = "inbound";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCall {
    pub call_id: String,
    pub from: String,
    pub to: String,
}

impl InboundCall {
    pub fn from_params(params: &Map<String, Value>) -> Self {
        let payload = envelope_payload(params);
        Self {
            call_id: first_string(params, &["CallSid", "call_sid", "call_control_id"])
                .or_else(|| payload.and_then(|p| first_string(p, &["call_control_id", "call_session_id"])))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            from: first_string(params, &["From", "from"])
                .or_else(|| payload.and_then(|p| party(p.get("from"))))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            to: first_string(params, &["To", "to"])
                .or_else(|| payload.and_then(|p| party(p.get("to"))))
                .unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub event_type: Option<String>,
    pub direction: Option<String>,
    pub from: String,
    pub to: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingSender,
    Outbound,
    Direction(String),
    EventType(String),
    FromSelf,
}

impl SkipReason {
    pub fn describe(&self) -> String {
        match self {
            SkipReason::MissingSender => "missing sender".to_string(),
            SkipReason::Outbound => "outbound message".to_string(),
            SkipReason::Direction(d) => format!("direction: {}", d),
            SkipReason::EventType(t) => format!("event_type: {}", t),
            SkipReason::FromSelf => "message from self".to_string(),
        }
    }
}

impl InboundMessage {
    pub fn from_params(params: &Map<String, Value>) -> Self {
        let data = params.get("data").and_then(Value::as_object);
        let payload = envelope_payload(params);

        let event_type = data
            .and_then(|d| first_string(d, &["event_type"]))
            .or_else(|| first_string(params, &["event_type"]));
        let direction = payload
            .and_then(|p| first_string(p, &["direction"]))
            .or_else(|| first_string(params, &["direction", "Direction"]));

        let from = payload
            .and_then(|p| party(p.get("from")))
            .or_else(|| first_string(params, &["from", "From"]))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let to = payload
            .and_then(|p| party(p.get("to")))
            .or_else(|| first_string(params, &["to", "To"]))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let text = payload
            .and_then(|p| first_string(p, &["text"]))
            .filter(|t| !t.is_empty())
            .or_else(|| first_string(params, &["text", "Text", "Body", "body"]))
            .unwrap_or_default();

        Self {
            event_type,
            direction,
            from,
            to,
            text,
        }
    }

    /// Why this event should not be treated as a message from a subscriber,
    /// if it should not. `own_number` is the service's outbound number.
    pub fn skip_reason(&self, own_number: &str) -> Option<SkipReason> {
        if let Some(direction) = self.direction.as_deref().filter(|d| !d.is_empty()) {
            if direction.eq_ignore_ascii_case("outbound") {
                return Some(SkipReason::Outbound);
            }
            if !direction.eq_ignore_ascii_case(INBOUND) {
                return Some(SkipReason::Direction(direction.to_string()));
            }
        }
        if let Some(event_type) = self.event_type.as_deref().filter(|t| !t.is_empty()) {
            if event_type != RECEIVED_EVENT {
                return Some(SkipReason::EventType(event_type.to_string()));
            }
        }
        if self.from == UNKNOWN || self.from.trim().is_empty() {
            return Some(SkipReason::MissingSender);
        }
        if !own_number.is_empty() && normalize(&self.from) == normalize(own_number) {
            return Some(SkipReason::FromSelf);
        }
        None
    }

    pub fn command(&self) -> SmsCommand {
        SmsCommand::parse(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsCommand {
    Stop,
    Help,
    Start,
    Unknown(String),
}

impl SmsCommand {
    pub fn parse(text: &str) -> Self {
        let text = text.trim().to_uppercase();
        match text.as_str() {
            "STOP" => SmsCommand::Stop,
            "HELP" => SmsCommand::Help,
            "START" | "YES" | "OPTIN" | "SUBSCRIBE" => SmsCommand::Start,
            _ => SmsCommand::Unknown(text),
        }
    }
}

fn envelope_payload(params: &Map<String, Value>) -> Option<&Map<String, Value>> {
    params
        .get("data")
        .and_then(|d| d.get("payload"))
        .and_then(Value::as_object)
}

fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| scalar(map.get(*k)?))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A party field is a bare string, `{"phone_number": ..}`, or a list of those.
fn party(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Array(items) => party(items.first()),
        Value::Object(obj) => obj.get("phone_number").and_then(scalar),
        other => scalar(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test params must be an object"),
        }
    }

    #[test]
    fn call_from_form_fields() {
        let call = InboundCall::from_params(&params(json!({
            "From": "+15551234567",
            "To": "+12145550000",
            "CallSid": "v3:abc",
        })));
        assert_eq!(call.from, "+15551234567");
        assert_eq!(call.to, "+12145550000");
        assert_eq!(call.call_id, "v3:abc");
    }

    #[test]
    fn call_with_lowercase_and_missing_fields() {
        let call = InboundCall::from_params(&params(json!({"from": "+15551234567"})));
        assert_eq!(call.from, "+15551234567");
        assert_eq!(call.to, UNKNOWN);
        assert_eq!(call.call_id, UNKNOWN);
    }

    #[test]
    fn message_from_telnyx_envelope() {
        let msg = InboundMessage::from_params(&params(json!({
            "data": {
                "event_type": "message.received",
                "payload": {
                    "direction": "inbound",
                    "from": {"phone_number": "+12145551234"},
                    "to": [{"phone_number": "+12145550000"}],
                    "text": " stop ",
                }
            }
        })));
        assert_eq!(msg.from, "+12145551234");
        assert_eq!(msg.to, "+12145550000");
        assert_eq!(msg.command(), SmsCommand::Stop);
        assert_eq!(msg.skip_reason("+12145550000"), None);
    }

    #[test]
    fn message_from_flat_form() {
        let msg = InboundMessage::from_params(&params(json!({
            "From": "2145551234",
            "To": "2145550000",
            "Body": "help",
        })));
        assert_eq!(msg.from, "2145551234");
        assert_eq!(msg.command(), SmsCommand::Help);
        assert_eq!(msg.skip_reason("+12145550000"), None);
    }

    #[test]
    fn non_inbound_events_are_skipped() {
        let outbound = InboundMessage::from_params(&params(json!({
            "data": {"event_type": "message.sent", "payload": {"direction": "outbound"}}
        })));
        assert_eq!(outbound.skip_reason(""), Some(SkipReason::Outbound));

        let anonymous = InboundMessage::from_params(&params(json!({"text": "STOP"})));
        assert_eq!(anonymous.skip_reason(""), Some(SkipReason::MissingSender));

        let finalized = InboundMessage::from_params(&params(json!({
            "data": {"event_type": "message.finalized", "payload": {"direction": "inbound"}}
        })));
        assert_eq!(
            finalized.skip_reason(""),
            Some(SkipReason::EventType("message.finalized".into()))
        );
        assert_eq!(
            finalized.skip_reason("").map(|r| r.describe()).as_deref(),
            Some("event_type: message.finalized")
        );
    }

    #[test]
    fn messages_from_own_number_are_skipped() {
        let msg = InboundMessage::from_params(&params(json!({
            "from": "(214) 555-0000",
            "text": "hello",
        })));
        assert_eq!(msg.skip_reason("+12145550000"), Some(SkipReason::FromSelf));
    }

    #[test]
    fn command_keywords() {
        assert_eq!(SmsCommand::parse("STOP"), SmsCommand::Stop);
        assert_eq!(SmsCommand::parse("  Help\n"), SmsCommand::Help);
        for word in ["start", "Yes", "OPTIN", "subscribe"] {
            assert_eq!(SmsCommand::parse(word), SmsCommand::Start);
        }
        assert_eq!(
            SmsCommand::parse("open the gate"),
            SmsCommand::Unknown("OPEN THE GATE".into())
        );
        assert_eq!(SmsCommand::parse(""), SmsCommand::Unknown(String::new()));
    }
}
