//! Retry round-tripper with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{request, HeaderMap, Request, Response, StatusCode};
use bytes::Bytes;
use http_body_util::BodyExt;

use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::headers::{TARGET_BACKOFF_HEADER, TARGET_RETRIES_HEADER, X_FORWARDED_HOST};

use super::{Transport, TransportError};

const DEFAULT_MAX_RETRIES: u32 = 20;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Body marker an absent upstream's ingress answers 503 with.
const NO_HEALTHY_UPSTREAM: &str = "no healthy upstream";

/// Per-request retry parameters, read from the routing headers.
///
/// Invalid or missing values fall back to the defaults without failing
/// the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let max_retries = headers
            .get(TARGET_RETRIES_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);

        let initial_backoff = headers
            .get(TARGET_BACKOFF_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_INITIAL_BACKOFF);

        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Delay after attempt `k` (zero-indexed): `initial_backoff * 2^k`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Parse a duration string of the form `<number><unit>` (`100ms`, `2s`,
/// `1m`, `1h`). A bare number carries no unit and does not parse.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(num) = s.strip_suffix("ms") {
        num.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(num) = s.strip_suffix('s') {
        num.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(num) = s.strip_suffix('m') {
        num.parse::<u64>().ok().map(|n| Duration::from_secs(n * 60))
    } else if let Some(num) = s.strip_suffix('h') {
        num.parse::<u64>().ok().map(|n| Duration::from_secs(n * 3600))
    } else {
        None
    }
}

/// Outcome of a single upstream attempt.
enum Attempt {
    /// Deliverable response; hand it to the client as-is.
    Done(Response<Body>),
    /// Retryable failure with a description for the exhaustion error.
    Retry(String),
}

/// Wraps an inner transport with bounded exponential-backoff retries.
///
/// Retry triggers: any inner transport error, or a 503 whose body contains
/// the "no healthy upstream" marker. Everything else is delivered, 5xx
/// included.
pub struct RetryTransport<T> {
    next: T,
    shutdown: Shutdown,
}

impl<T> RetryTransport<T> {
    pub fn new(next: T, shutdown: Shutdown) -> Self {
        Self { next, shutdown }
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, TransportError> {
        let policy = RetryPolicy::from_headers(req.headers());

        let target_host = req
            .uri()
            .authority()
            .map(|a| a.to_string())
            .unwrap_or_default();
        let original_host = req
            .headers()
            .get(X_FORWARDED_HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // Buffer the body once so every attempt replays the same bytes.
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(TransportError::RequestBody)?
            .to_bytes();

        let mut signal = self.shutdown.subscribe();
        let mut last_failure = String::new();

        for attempt in 0..=policy.max_retries {
            if self.shutdown.is_triggered() {
                return Err(TransportError::Cancelled);
            }

            tracing::debug!(
                from = %original_host,
                to = %target_host,
                attempt,
                "Sending request"
            );

            match self.attempt(rebuild_request(&parts, &body)).await {
                Attempt::Done(response) => return Ok(response),
                Attempt::Retry(reason) => {
                    tracing::debug!(
                        from = %original_host,
                        to = %target_host,
                        error = %reason,
                        "Request failed, will retry"
                    );
                    metrics::record_retry(&target_host);
                    last_failure = reason;
                }
            }

            if attempt < policy.max_retries {
                tokio::select! {
                    _ = tokio::time::sleep(policy.backoff_delay(attempt)) => {}
                    _ = signal.wait() => return Err(TransportError::Cancelled),
                }
            }
        }

        tracing::error!(
            from = %original_host,
            to = %target_host,
            error = %last_failure,
            "All retry attempts failed"
        );
        Err(TransportError::RetriesExhausted {
            original_host,
            target_host,
            reason: last_failure,
        })
    }
}

impl<T: Transport> RetryTransport<T> {
    async fn attempt(&self, req: Request<Body>) -> Attempt {
        let response = match self.next.round_trip(req).await {
            Ok(response) => response,
            Err(err) => return Attempt::Retry(err.to_string()),
        };

        if response.status() != StatusCode::SERVICE_UNAVAILABLE {
            return Attempt::Done(response);
        }

        // Read the 503 body fully and replace it with a replayable buffer,
        // so the response stays deliverable if this is not the ingress
        // marker case.
        let (parts, body) = response.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => return Attempt::Retry(format!("failed to read 503 response body: {err}")),
        };

        if String::from_utf8_lossy(&bytes).contains(NO_HEALTHY_UPSTREAM) {
            Attempt::Retry(format!(
                "service is not available: status code: {}",
                StatusCode::SERVICE_UNAVAILABLE.as_u16()
            ))
        } else {
            Attempt::Done(Response::from_parts(parts, Body::from(bytes)))
        }
    }
}

fn rebuild_request(parts: &request::Parts, body: &Bytes) -> Request<Body> {
    let mut req = Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone())
        .version(parts.version)
        .body(Body::from(body.clone()))
        .expect("rebuilding a previously valid request cannot fail");
    *req.headers_mut() = parts.headers.clone();
    req
}
