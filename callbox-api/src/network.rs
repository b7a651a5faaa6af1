use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const ACCESS_DENIED: &str = "Access denied - local network only";

/// Address the request came from: the first hop of X-Forwarded-For when a
/// proxy supplied one, otherwise the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|h| h.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match forwarded {
        Some(first) => Some(first.to_string()),
        None => peer.map(|addr| addr.ip().to_string()),
    }
}

/// Unparseable or missing addresses are never local.
pub fn is_local(headers: &HeaderMap, peer: Option<SocketAddr>) -> bool {
    client_ip(headers, peer)
        .and_then(|ip| ip.parse::<IpAddr>().ok())
        .map(is_local_ip)
        .unwrap_or(false)
}

pub fn is_local_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_local_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_local_v4(v4),
            None => is_local_v6(v6),
        },
    }
}

fn is_local_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local()
}

fn is_local_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}

pub fn access_denied() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({ "error": ACCESS_DENIED })),
    )
        .into_response()
}

/// Axum middleware that rejects callers outside the local network.
pub async fn local_only(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);

    if !is_local(req.headers(), peer) {
        tracing::warn!(
            "Blocked {} {} from non-local address {:?}",
            req.method(),
            req.uri().path(),
            client_ip(req.headers(), peer)
        );
        return access_denied();
    }

    next.run(req).await
}
