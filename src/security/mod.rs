//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming connection:
//!     → firewall.rs (optional: drop non-loopback peers at accept time)
//!     → multi-listener → HTTP server
//!     → loopback.rs (per request: 403 for non-loopback peers)
//!     → handlers
//! ```
//!
//! # Design Decisions
//! - Fail closed: unknown peer address means reject
//! - IPv4-mapped IPv6 loopback counts as loopback

pub mod firewall;
pub mod loopback;

pub use firewall::{FirewallEndpoint, FirewallError};
pub use loopback::{is_loopback, local_only};
