//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MultiListenerConfig {
    /// Endpoints to bind and how their pumps behave.
    pub listener: ListenerConfig,

    /// HTTP serving layer.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Addresses in the host's `host:port` syntax, e.g. `"[::1]:8080"`.
    pub addresses: Vec<String>,

    /// Index into `addresses` reported by `local_addr()`.
    pub preferred_index: usize,

    /// Capacity of the channel between the pumps and `accept()`.
    /// 1 is the tightest hand-off Tokio offers.
    pub handoff_capacity: usize,

    /// Accept error handling inside each pump.
    pub retry: AcceptRetryConfig,
}

impl ListenerConfig {
    /// Dual-stack loopback on `port`, IPv6 preferred.
    pub fn local_loopback(port: u16) -> Self {
        Self {
            addresses: vec![format!("[::1]:{port}"), format!("127.0.0.1:{port}")],
            ..Self::default()
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            addresses: vec!["[::1]:8080".to_string(), "127.0.0.1:8080".to_string()],
            preferred_index: 0,
            handoff_capacity: 1,
            retry: AcceptRetryConfig::default(),
        }
    }
}

/// Retry rules for a pump whose endpoint's accept fails.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AcceptRetryConfig {
    /// First backoff delay in milliseconds.
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,

    /// Consecutive transient failures before the pump retires (0 = never).
    pub max_consecutive_failures: u32,
}

impl Default for AcceptRetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 5,
            max_delay_ms: 1000,
            max_consecutive_failures: 64,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Reject requests whose peer is not a loopback address.
    pub loopback_only: bool,

    /// Drop non-loopback peers at accept time instead of per request.
    pub filter_at_accept: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            loopback_only: true,
            filter_at_accept: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
