//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (bootstrap only)
//!     → env.rs (typed getters, read once in main)
//!     → ProxyOptions (schema.rs, defaults applied)
//!     → validation.rs (semantic checks)
//!     → captured by HttpReverseProxy, immutable thereafter
//! ```
//!
//! # Design Decisions
//! - Options are a plain struct: unknown options are unrepresentable
//! - Every field has a default so construction with `Default` just works
//! - The environment is consulted only during bootstrap; the core never
//!   reads it after construction

pub mod env;
pub mod schema;
pub mod validation;

pub use schema::ProxyOptions;
pub use validation::ConfigError;
