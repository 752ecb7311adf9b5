//! Proxy data plane subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (cleartext HTTP/1.1 or h2c)
//!     → server.rs (axum serve, protocol negotiation, handler)
//!     → director.rs (routing headers → target, publish event, rewrite)
//!     → transport layer (retry + conditional, crate::transport)
//!     → response.rs (Location rewrite, header strip)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - The routing event is published strictly before the first upstream
//!   attempt, so the scale controller never learns about traffic late
//! - Director failures never publish an event and never retry
//! - Error policy at the boundary: director failure → 503, exhausted
//!   retries or transport failure → 502 with the error text

pub mod director;
pub mod headers;
pub mod path;
pub mod response;
pub mod server;

pub use director::{DirectorError, TargetSpec};
pub use server::{HttpReverseProxy, ProxyError};
