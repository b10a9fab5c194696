//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! MultiListener
//!     → listener.rs (axum::serve::Listener impl)
//!     → server.rs (router, middleware, graceful shutdown)
//!     → handlers (`/`, `/status`)
//! ```

pub mod listener;
pub mod server;

pub use listener::PeerAddr;
pub use server::{AppState, HttpServer, ServerError, StatusResponse};
