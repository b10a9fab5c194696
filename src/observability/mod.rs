//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pumps, listener, server, filters produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape (optional)
//! ```

pub mod logging;
pub mod metrics;
