//! Routing and forwarding header surface.
//!
//! # Responsibilities
//! - Name the routing headers clients steer the proxy with
//! - Set X-Forwarded-For / X-Forwarded-Host / X-Forwarded-Proto
//! - Strip hop-by-hop headers in both directions

use axum::http::{header, HeaderMap, HeaderValue};

/// Upstream hostname. Required unless dev mode is enabled.
pub const TARGET_HOST_HEADER: &str = "X-Gozero-Target-Host";
/// Upstream port, 1..=65535. Defaults to 443.
pub const TARGET_PORT_HEADER: &str = "X-Gozero-Target-Port";
/// Upstream scheme, `http` or `https`. Defaults to `https`.
pub const TARGET_SCHEME_HEADER: &str = "X-Gozero-Target-Scheme";
/// Maximum retry attempts. Defaults to 20.
pub const TARGET_RETRIES_HEADER: &str = "X-Gozero-Target-Retries";
/// Initial backoff duration string. Defaults to 100ms.
pub const TARGET_BACKOFF_HEADER: &str = "X-Gozero-Target-Backoff";

pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";
pub const X_FORWARDED_HOST: &str = "X-Forwarded-Host";
pub const X_FORWARDED_PROTO: &str = "X-Forwarded-Proto";

/// Connection-scoped headers that must not cross the proxy.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let connection_named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in connection_named {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Set the forwarding headers on an upstream-bound request.
///
/// `X-Forwarded-For` is only set when absent, preserving proxy chains;
/// the other two always reflect what this proxy observed.
pub fn set_forwarded_headers(
    headers: &mut HeaderMap,
    remote_addr: &str,
    original_host: &str,
    original_scheme: &str,
) {
    if !headers.contains_key(X_FORWARDED_FOR) {
        if let Ok(value) = HeaderValue::from_str(remote_addr) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    if let Ok(value) = HeaderValue::from_str(original_host) {
        headers.insert(X_FORWARDED_HOST, value);
    }
    if let Ok(value) = HeaderValue::from_str(original_scheme) {
        headers.insert(X_FORWARDED_PROTO, value);
    }
}
