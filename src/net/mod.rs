//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! addresses ("[::1]:8080", "127.0.0.1:8080")
//!     → endpoint.rs (bind one socket each; release all on first failure)
//!     → pump.rs (one task per endpoint: accept → hand-off channel)
//!     → listener.rs (single accept(), close(), address reporting)
//!     → Hand off to HTTP layer
//!
//! Listener States:
//!     Open → ShuttingDown → Closed
//! ```
//!
//! # Design Decisions
//! - The hand-off channel is bounded; a slow consumer stalls pumps and the
//!   kernel backlog absorbs the rest
//! - Shutdown is a level-triggered watch, raced at every pump await point
//! - No ordering between endpoints; per-endpoint accept order is kept

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod pump;

pub use endpoint::{Endpoint, TcpEndpoint};
pub use error::ListenerError;
pub use listener::{ListenerState, MultiListener, NETWORK};
pub use pump::PumpExit;
