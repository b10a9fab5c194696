//! Listener error type.

use std::io;

/// Errors surfaced by endpoints and the aggregating listener.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind (invalid address or address in use).
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Failed to accept on one endpoint. Pumps retry these; they never reach `accept()`.
    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    /// The listener has been closed.
    #[error("listener closed")]
    Closed,

    /// `close()` was called on a listener that was already closed.
    #[error("listener already closed")]
    AlreadyClosed,

    /// An endpoint failed to release its socket during `close()`.
    #[error("failed to close endpoint {address}: {source}")]
    Close {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Every pump gave up while the listener was still open.
    #[error("all endpoints failed; no connections can arrive")]
    Exhausted,

    /// Construction was given no endpoints.
    #[error("at least one endpoint is required")]
    NoEndpoints,

    /// The preferred index does not name an endpoint.
    #[error("preferred index {index} out of range for {count} endpoint(s)")]
    PreferredIndex { index: usize, count: usize },
}

impl ListenerError {
    /// Whether this error just means the listener is gone.
    pub fn is_closed(&self) -> bool {
        matches!(self, ListenerError::Closed | ListenerError::AlreadyClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_error_keeps_its_cause() {
        let err = ListenerError::Accept(io::Error::new(io::ErrorKind::Other, "too many open files"));
        assert_eq!(err.to_string(), "failed to accept: too many open files");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_closed());
    }

    #[test]
    fn closed_variants() {
        assert!(ListenerError::Closed.is_closed());
        assert!(ListenerError::AlreadyClosed.is_closed());
        assert!(!ListenerError::Exhausted.is_closed());
    }
}
