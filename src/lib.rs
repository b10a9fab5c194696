//! One logical listener over several bound sockets.
//!
//! Binding `[::1]:port` does not reliably serve `127.0.0.1:port` (and vice
//! versa), so a server that wants both loopback families has to open two
//! sockets. [`MultiListener`] opens them, runs one accept pump per socket, and
//! exposes a single `accept()`, a single `close()`, and a single preferred
//! address.
//!
//! ```no_run
//! # async fn demo() -> Result<(), multilistener::ListenerError> {
//! use multilistener::MultiListener;
//!
//! let listener = MultiListener::local_loopback(8129).await?;
//! println!("Serving on {}", listener.all_addresses()); // [::1]:8129,127.0.0.1:8129
//! println!("Preferred: {}", listener.local_addr());    // [::1]:8129
//!
//! let (_stream, peer) = listener.accept().await?;
//! println!("Accepted {peer}");
//! listener.close().await?;
//! # Ok(())
//! # }
//! ```

// Core
pub mod net;

// Serving layer
pub mod http;
pub mod security;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::MultiListenerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use net::{Endpoint, ListenerError, MultiListener, TcpEndpoint};
