//! Response rewriting toward the client.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response};
use url::Url;

use super::director::ForwardedContext;
use super::headers::strip_hop_by_hop;

/// Rewrite an upstream response before it is written to the client.
///
/// An absolute `Location` is pointed back at the caller-visible host and
/// scheme; a value that fails to parse is logged and left unchanged.
/// Upstream security policies are dropped along with hop-by-hop headers.
/// Status and body pass through untouched.
pub fn rewrite_response(response: &mut Response<Body>, forwarded: &ForwardedContext) {
    if let Some(location) = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
    {
        match Url::parse(&location) {
            Ok(url) => rewrite_location(response, url, &location, forwarded),
            Err(err) => {
                tracing::warn!(location = %location, error = %err, "Failed to parse Location header");
            }
        }
    }

    response.headers_mut().remove("Content-Security-Policy");
    response.headers_mut().remove("Referrer-Policy");
    strip_hop_by_hop(response.headers_mut());
}

fn rewrite_location(
    response: &mut Response<Body>,
    mut url: Url,
    location: &str,
    forwarded: &ForwardedContext,
) {
    let (host, port) = split_authority(&forwarded.original_host);

    let rewritten = url.set_scheme(&forwarded.original_scheme).is_ok()
        && url.set_host(Some(host)).is_ok()
        && url.set_port(port).is_ok();
    if !rewritten {
        tracing::warn!(location = %location, "Failed to rewrite Location header");
        return;
    }

    match HeaderValue::from_str(url.as_str()) {
        Ok(value) => {
            tracing::debug!(from = %location, to = %url, "Updated Location header");
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(err) => {
            tracing::warn!(location = %location, error = %err, "Rewritten Location is not a valid header value");
        }
    }
}

/// Split `host[:port]`; a non-numeric suffix means there was no port.
fn split_authority(authority: &str) -> (&str, Option<u16>) {
    match authority.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (authority, None),
        },
        None => (authority, None),
    }
}
