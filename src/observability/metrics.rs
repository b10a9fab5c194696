//! Metrics collection and exposition.
//!
//! # Metrics
//! - `multilistener_connections_accepted_total` (counter): by endpoint
//! - `multilistener_accept_errors_total` (counter): by endpoint, error class
//! - `multilistener_pumps_retired_total` (counter): pumps that gave up, by endpoint
//! - `multilistener_active_pumps` (gauge): pumps currently running
//! - `multilistener_rejected_peers_total` (counter): non-loopback peers refused, by layer
//!
//! Without [`init_metrics`] every call is a no-op.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted(endpoint: &str) {
    counter!(
        "multilistener_connections_accepted_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

pub fn record_accept_error(endpoint: &str, class: &'static str) {
    counter!(
        "multilistener_accept_errors_total",
        "endpoint" => endpoint.to_string(),
        "class" => class
    )
    .increment(1);
}

pub fn record_pump_retired(endpoint: &str) {
    counter!(
        "multilistener_pumps_retired_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

/// Track one pump coming up (`+1`) or going away (`-1`).
pub fn record_active_pumps(delta: f64) {
    gauge!("multilistener_active_pumps").increment(delta);
}

pub fn record_rejected_peer(layer: &'static str) {
    counter!("multilistener_rejected_peers_total", "layer" => layer).increment(1);
}
