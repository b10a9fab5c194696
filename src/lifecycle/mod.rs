//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger()
//!
//! Shutdown (shutdown.rs):
//!     trigger() → every ShutdownSignal::wait() resolves
//!               → pumps exit, blocked accepts return, server drains
//! ```
//!
//! # Design Decisions
//! - Level-triggered: a late subscriber sees a signal that already fired
//! - Firing is idempotent; only the first trigger reports `true`

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
