//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → MultiListenerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; bound sockets are not hot-reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::AcceptRetryConfig;
pub use schema::ListenerConfig;
pub use schema::MultiListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ServerConfig;
pub use validation::{validate_config, ValidationError};
