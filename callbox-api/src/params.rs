use axum::{
    async_trait,
    extract::{FromRequest, Query, Request},
    http::{header::CONTENT_TYPE, HeaderMap, Method},
    Form, Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use tracing;

/// Query-string parameters merged with a JSON or urlencoded body.
///
/// Body fields win over query fields of the same name. Never rejects:
/// an unreadable body contributes nothing and the handler sees whatever the
/// query string carried.
#[derive(Debug, Clone, Default)]
pub struct WebhookParams(pub Map<String, Value>);

impl WebhookParams {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

#[async_trait]
impl<S> FromRequest<S> for WebhookParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut params: Map<String, Value> = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map(|Query(query)| {
                query
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect()
            })
            .unwrap_or_default();

        let body = match body_kind(req.method(), req.headers()) {
            Some(BodyKind::Json) => match Json::<Value>::from_request(req, state).await {
                Ok(Json(Value::Object(map))) => map,
                Ok(Json(other)) => {
                    tracing::debug!("Ignoring non-object JSON body: {}", other);
                    Map::new()
                }
                Err(e) => {
                    tracing::debug!("Unreadable JSON body: {}", e);
                    Map::new()
                }
            },
            Some(BodyKind::Form) => match Form::<HashMap<String, String>>::from_request(req, state).await {
                Ok(Form(form)) => form
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect(),
                Err(e) => {
                    tracing::debug!("Unreadable form body: {}", e);
                    Map::new()
                }
            },
            None => Map::new(),
        };

        params.extend(body);
        Ok(WebhookParams(params))
    }
}

enum BodyKind {
    Json,
    Form,
}

fn body_kind(method: &Method, headers: &HeaderMap) -> Option<BodyKind> {
    if method == Method::GET || method == Method::HEAD {
        return None;
    }
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    if content_type.starts_with("application/json") {
        Some(BodyKind::Json)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Some(BodyKind::Form)
    } else {
        None
    }
}

/// Whether the request body was sent as JSON.
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}
