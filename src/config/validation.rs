//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check addresses parse and the preferred index points at one of them
//! - Validate value ranges (capacity > 0, base delay <= max delay)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first

use std::net::SocketAddr;

use crate::config::schema::MultiListenerConfig;

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.addresses is empty")]
    NoAddresses,

    #[error("listener.addresses[{index}] = {address:?} is not a socket address")]
    InvalidAddress { index: usize, address: String },

    #[error("listener.preferred_index {index} out of range for {count} address(es)")]
    PreferredIndexOutOfRange { index: usize, count: usize },

    #[error("listener.handoff_capacity must be at least 1")]
    ZeroHandoffCapacity,

    #[error("listener.retry.base_delay_ms ({base}) exceeds max_delay_ms ({max})")]
    BackoffInverted { base: u64, max: u64 },

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed config.
pub fn validate_config(config: &MultiListenerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let listener = &config.listener;

    if listener.addresses.is_empty() {
        errors.push(ValidationError::NoAddresses);
    } else if listener.preferred_index >= listener.addresses.len() {
        errors.push(ValidationError::PreferredIndexOutOfRange {
            index: listener.preferred_index,
            count: listener.addresses.len(),
        });
    }

    for (index, address) in listener.addresses.iter().enumerate() {
        if address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                index,
                address: address.clone(),
            });
        }
    }

    if listener.handoff_capacity == 0 {
        errors.push(ValidationError::ZeroHandoffCapacity);
    }

    if listener.retry.base_delay_ms > listener.retry.max_delay_ms {
        errors.push(ValidationError::BackoffInverted {
            base: listener.retry.base_delay_ms,
            max: listener.retry.max_delay_ms,
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
