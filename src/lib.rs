//! gozero - Scale-to-Zero Reverse Proxy
//!
//! A reverse proxy that fronts cluster workloads which may be scaled down
//! to zero replicas. Clients address the proxy as an ordinary HTTP
//! endpoint and select the upstream per request via routing headers.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                  REVERSE PROXY                   │
//!                       │                                                  │
//!   Client Request      │  ┌─────────┐   ┌──────────┐   ┌───────────────┐  │
//!   ────────────────────┼─▶│ server  │──▶│ director │──▶│ retry         │  │
//!   (HTTP/1.1 or h2c)   │  │ (axum)  │   │          │   │ round-tripper │  │
//!                       │  └─────────┘   └────┬─────┘   └──────┬────────┘  │
//!                       │                     │                │           │
//!                       │                     ▼                ▼           │
//!                       │              ┌────────────┐  ┌───────────────┐   │
//!                       │              │ event      │  │ conditional   │───┼──▶ Upstream
//!                       │              │ queue      │  │ transport     │   │
//!                       │              └─────┬──────┘  │ (h1 / h2c)    │   │
//!                       │                    │         └───────────────┘   │
//!   Client Response     │  ┌──────────┐      │                             │
//!   ◀───────────────────┼──│ response │      ▼                             │
//!                       │  │ rewriter │   external scale controller        │
//!                       │  └──────────┘   (drains routing events)          │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! For every accepted request the director publishes a routing event
//! `{host, path}` onto a bounded queue before the first upstream attempt;
//! an external scale controller consumes the queue to establish or extend
//! the upstream's hot lease. The retry round-tripper keeps re-sending the
//! request with exponential backoff while the upstream is still coming up
//! ("no healthy upstream"), so the client sees nothing but latency.

// Core subsystems
pub mod config;
pub mod events;
pub mod proxy;
pub mod transport;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyOptions;
pub use events::{EventStream, RoutingEvent};
pub use lifecycle::Shutdown;
pub use proxy::HttpReverseProxy;
