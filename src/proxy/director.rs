//! Request director: routing-header resolution and in-place rewrite.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use axum::http::{header, HeaderMap, Request};
use thiserror::Error;

use crate::events::{EventPublisher, RoutingEvent};
use crate::observability::metrics;
use crate::proxy::headers::{
    set_forwarded_headers, strip_hop_by_hop, TARGET_HOST_HEADER, TARGET_PORT_HEADER,
    TARGET_SCHEME_HEADER,
};
use crate::proxy::path::join_url_path;

/// Hard-coded upstream used for local bring-up when dev mode is on.
const DEV_TARGET_HOST: &str = "www.trivago.com";

const DEFAULT_TARGET_PORT: u16 = 443;
const DEFAULT_TARGET_SCHEME: &str = "https";

/// Routing-header failures on a live request.
///
/// These short-circuit the pipeline: no event is published and nothing is
/// retried; the client sees 503.
#[derive(Debug, Error)]
pub enum DirectorError {
    /// `X-Gozero-Target-Host` is absent and dev mode is off.
    #[error("target host is not set")]
    MissingTargetHost,

    /// The routing headers do not form a usable target URL.
    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
}

/// The upstream a request's routing headers resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub host: String,
    pub port: u16,
    pub scheme: String,
}

impl TargetSpec {
    /// Resolve the target from the routing headers, applying defaults.
    pub fn from_headers(headers: &HeaderMap, dev_mode: bool) -> Result<Self, DirectorError> {
        let host = if dev_mode {
            DEV_TARGET_HOST.to_string()
        } else {
            header_value(headers, TARGET_HOST_HEADER)
                .ok_or(DirectorError::MissingTargetHost)?
                .to_string()
        };

        let scheme = match header_value(headers, TARGET_SCHEME_HEADER) {
            None => DEFAULT_TARGET_SCHEME.to_string(),
            Some(scheme) if scheme == "http" || scheme == "https" => scheme.to_string(),
            Some(scheme) => {
                return Err(DirectorError::InvalidTarget {
                    target: host,
                    reason: format!("unsupported scheme '{scheme}'"),
                })
            }
        };

        let port = match header_value(headers, TARGET_PORT_HEADER) {
            None => DEFAULT_TARGET_PORT,
            Some(port) => match port.parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => {
                    return Err(DirectorError::InvalidTarget {
                        target: host,
                        reason: format!("invalid port '{port}'"),
                    })
                }
            },
        };

        Ok(Self { host, port, scheme })
    }

    /// The upstream authority, `hostname:port`.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// What the director observed and decided, needed later by the response
/// rewriter and the error policy.
#[derive(Debug, Clone)]
pub struct ForwardedContext {
    /// Authority the client addressed (becomes X-Forwarded-Host).
    pub original_host: String,
    /// Scheme the client spoke (becomes X-Forwarded-Proto).
    pub original_scheme: String,
    /// Resolved upstream authority.
    pub target_authority: String,
    /// Scheme the request was rewritten to.
    pub target_scheme: String,
}

/// Resolve the routing headers, publish the routing event, and rewrite
/// the request in place toward the upstream.
///
/// The publish happens strictly before the caller can make the first
/// upstream attempt, may block while the queue is full, and survives the
/// client disconnecting mid-request.
pub async fn direct(
    req: &mut Request<Body>,
    remote_addr: SocketAddr,
    dev_mode: bool,
    publisher: &EventPublisher,
) -> Result<ForwardedContext, DirectorError> {
    let original_host = request_authority(req);
    let original_scheme = req
        .uri()
        .scheme_str()
        .unwrap_or(DEFAULT_TARGET_SCHEME)
        .to_string();

    let target = TargetSpec::from_headers(req.headers(), dev_mode)?;

    let authority: Authority =
        target
            .authority()
            .parse()
            .map_err(|err: axum::http::uri::InvalidUri| DirectorError::InvalidTarget {
                target: target.authority(),
                reason: err.to_string(),
            })?;
    let scheme: Scheme =
        target
            .scheme
            .parse()
            .map_err(|err: axum::http::uri::InvalidUri| DirectorError::InvalidTarget {
                target: target.authority(),
                reason: err.to_string(),
            })?;

    tracing::debug!(from = %req.uri(), to = %target.host, "Proxying request");

    // The target URL carries no base path, so the join starts from "/".
    let (decoded_path, escaped_path) = join_url_path("", req.uri().path());

    let event = RoutingEvent {
        host: authority.to_string(),
        path: decoded_path,
    };
    metrics::record_routing_event(&event.host);
    match publisher.publish_detached(event).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "Routing event dropped"),
        Err(err) => tracing::warn!(error = %err, "Routing event publisher task failed"),
    }

    // Rewrite the request toward the upstream, keeping the query.
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{escaped_path}?{query}"),
        None => escaped_path,
    };
    let path_and_query: PathAndQuery =
        path_and_query
            .parse()
            .map_err(|err: axum::http::uri::InvalidUri| DirectorError::InvalidTarget {
                target: target.authority(),
                reason: err.to_string(),
            })?;

    let mut parts = req.uri().clone().into_parts();
    parts.scheme = Some(scheme.clone());
    parts.authority = Some(authority.clone());
    parts.path_and_query = Some(path_and_query);
    *req.uri_mut() = Uri::from_parts(parts).map_err(|err| DirectorError::InvalidTarget {
        target: target.authority(),
        reason: err.to_string(),
    })?;

    // The client's Host names the proxy; the upstream authority now lives
    // in the URI.
    req.headers_mut().remove(header::HOST);
    strip_hop_by_hop(req.headers_mut());
    set_forwarded_headers(
        req.headers_mut(),
        &remote_addr.to_string(),
        &original_host,
        &original_scheme,
    );

    tracing::debug!(scheme = %scheme, url = %req.uri(), to = %target.host, "Request rewritten");

    Ok(ForwardedContext {
        original_host,
        original_scheme,
        target_authority: authority.to_string(),
        target_scheme: scheme.to_string(),
    })
}

/// The authority the client addressed: URI authority on HTTP/2, Host
/// header on HTTP/1.1.
fn request_authority(req: &Request<Body>) -> String {
    if let Some(authority) = req.uri().authority() {
        return authority.to_string();
    }
    req.headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventQueue;
    use crate::proxy::headers::{
        TARGET_RETRIES_HEADER, X_FORWARDED_FOR, X_FORWARDED_HOST, X_FORWARDED_PROTO,
    };

    fn remote() -> SocketAddr {
        "127.0.0.1:54321".parse().unwrap()
    }

    fn harness() -> (EventQueue, EventPublisher) {
        let queue = EventQueue::new(16);
        let publisher = queue.publisher().unwrap();
        (queue, publisher)
    }

    #[tokio::test]
    async fn missing_target_host_fails_without_event() {
        let (queue, publisher) = harness();
        let mut stream = queue.take_stream().unwrap();
        let mut req = Request::builder()
            .uri("/pass")
            .header(header::HOST, "proxy.local:8080")
            .body(Body::empty())
            .unwrap();

        let err = direct(&mut req, remote(), false, &publisher)
            .await
            .unwrap_err();

        assert!(matches!(err, DirectorError::MissingTargetHost));
        assert!(stream.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_port_fails_without_event() {
        let (queue, publisher) = harness();
        let mut stream = queue.take_stream().unwrap();
        let mut req = Request::builder()
            .uri("/pass")
            .header(TARGET_HOST_HEADER, "localhost")
            .header(TARGET_PORT_HEADER, "notaport")
            .body(Body::empty())
            .unwrap();

        let err = direct(&mut req, remote(), false, &publisher)
            .await
            .unwrap_err();

        assert!(matches!(err, DirectorError::InvalidTarget { .. }));
        assert!(stream.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let (_queue, publisher) = harness();
        let mut req = Request::builder()
            .uri("/pass")
            .header(TARGET_HOST_HEADER, "localhost")
            .header(TARGET_SCHEME_HEADER, "ftp")
            .body(Body::empty())
            .unwrap();

        let err = direct(&mut req, remote(), false, &publisher)
            .await
            .unwrap_err();

        assert!(matches!(err, DirectorError::InvalidTarget { .. }));
    }

    #[tokio::test]
    async fn rewrites_request_and_publishes_event() {
        let (queue, publisher) = harness();
        let mut stream = queue.take_stream().unwrap();
        let mut req = Request::builder()
            .uri("/pass?x=1")
            .header(header::HOST, "proxy.local:8080")
            .header(TARGET_HOST_HEADER, "localhost")
            .header(TARGET_PORT_HEADER, "8081")
            .header(TARGET_SCHEME_HEADER, "http")
            .header(TARGET_RETRIES_HEADER, "10")
            .body(Body::empty())
            .unwrap();

        let forwarded = direct(&mut req, remote(), false, &publisher)
            .await
            .unwrap();

        assert_eq!(req.uri().to_string(), "http://localhost:8081/pass?x=1");
        assert!(req.headers().get(header::HOST).is_none());
        // Routing headers stay on the request for the retry layer.
        assert!(req.headers().get(TARGET_RETRIES_HEADER).is_some());
        assert_eq!(
            req.headers().get(X_FORWARDED_FOR).unwrap(),
            "127.0.0.1:54321"
        );
        assert_eq!(
            req.headers().get(X_FORWARDED_HOST).unwrap(),
            "proxy.local:8080"
        );
        assert_eq!(req.headers().get(X_FORWARDED_PROTO).unwrap(), "https");

        assert_eq!(forwarded.original_host, "proxy.local:8080");
        assert_eq!(forwarded.target_authority, "localhost:8081");
        assert_eq!(forwarded.target_scheme, "http");

        let event = stream.recv().await.unwrap();
        assert_eq!(event.host, "localhost:8081");
        assert_eq!(event.path, "/pass");
    }

    #[tokio::test]
    async fn event_path_is_percent_decoded() {
        let (queue, publisher) = harness();
        let mut stream = queue.take_stream().unwrap();
        let mut req = Request::builder()
            .uri("/a%20b")
            .header(TARGET_HOST_HEADER, "localhost")
            .header(TARGET_SCHEME_HEADER, "http")
            .header(TARGET_PORT_HEADER, "8081")
            .body(Body::empty())
            .unwrap();

        direct(&mut req, remote(), false, &publisher).await.unwrap();

        // The event carries the decoded path; the wire keeps the escapes.
        assert_eq!(stream.recv().await.unwrap().path, "/a b");
        assert_eq!(req.uri().path(), "/a%20b");
    }

    #[tokio::test]
    async fn dev_mode_overrides_the_target_host() {
        let (queue, publisher) = harness();
        let mut stream = queue.take_stream().unwrap();
        let mut req = Request::builder().uri("/pass").body(Body::empty()).unwrap();

        direct(&mut req, remote(), true, &publisher).await.unwrap();

        assert_eq!(req.uri().authority().unwrap().as_str(), "www.trivago.com:443");
        assert_eq!(req.uri().scheme_str(), Some("https"));
        assert_eq!(stream.recv().await.unwrap().host, "www.trivago.com:443");
    }

    #[tokio::test]
    async fn defaults_apply_when_optional_headers_are_absent() {
        let (_queue, publisher) = harness();
        let mut req = Request::builder()
            .uri("/pass")
            .header(TARGET_HOST_HEADER, "svc.cluster.local")
            .body(Body::empty())
            .unwrap();

        let forwarded = direct(&mut req, remote(), false, &publisher)
            .await
            .unwrap();

        assert_eq!(forwarded.target_authority, "svc.cluster.local:443");
        assert_eq!(forwarded.target_scheme, "https");
    }
}
