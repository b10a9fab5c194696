//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint accept fails (pump):
//!     → retries.rs (classify error, decide retry / backoff / give up)
//!     → backoff.rs (exponential delay with jitter)
//! ```
//!
//! # Design Decisions
//! - A failing endpoint must never turn its pump into a busy loop
//! - Per-connection errors are cheap to retry; socket-level ones are not

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{classify_accept_error, AcceptErrorClass, AcceptRetryPolicy, RetryDecision};
