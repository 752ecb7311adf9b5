//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger observed → stop accepting → drain in-flight (bounded) →
//!     close event queue
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - A single lifetime token fans out to the accept loop and the retry
//!   loops; every blocking point consults it
//! - Shutdown is cooperative and idempotent
//! - The drain window is bounded; stragglers are abandoned, not awaited

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
