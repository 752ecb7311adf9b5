//! Upstream transport subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → retry.rs (per-request policy from routing headers,
//!                 exponential backoff, "no healthy upstream" detection)
//!     → conditional.rs (HTTP/1.1 or cleartext HTTP/2 by wire version)
//!     → upstream
//! ```
//!
//! # Design Decisions
//! - The round-tripper capability is a trait so the retrier composes over
//!   any inner transport (and tests can script one)
//! - Retry decisions live entirely in this layer; the server only maps
//!   the final error to a status code
//! - Cancellation is fatal inside the retry loop: no further attempts or
//!   backoff sleeps once shutdown is triggered

pub mod conditional;
pub mod retry;

pub use conditional::ConditionalTransport;
pub use retry::RetryTransport;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use thiserror::Error;

/// Errors produced below the HTTP layer or by the retry loop.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, protocol, or timeout error from the inner client.
    #[error("upstream request failed: {0}")]
    Request(#[source] hyper_util::client::legacy::Error),

    /// The upstream accepted the connection but produced no response
    /// headers within the allowed window.
    #[error("timed out waiting for upstream response headers")]
    ResponseHeaderTimeout,

    /// The incoming request body could not be read for replay.
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),

    /// The proxy is shutting down; the request was abandoned.
    #[error("request cancelled: proxy is shutting down")]
    Cancelled,

    /// The retry budget was exhausted without a deliverable response.
    #[error("all retry attempts failed for service '{original_host}' -> '{target_host}': {reason}. Service failed to scale up or is not passing probes")]
    RetriesExhausted {
        original_host: String,
        target_host: String,
        reason: String,
    },
}

/// The round-tripper capability: one request in, one response or error out.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, TransportError>;
}
