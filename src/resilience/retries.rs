//! Accept retry policy.
//!
//! # Responsibilities
//! - Classify an accept error (tied to one connection, transient, or fatal)
//! - Decide how long a pump sleeps before its next accept
//! - Decide when a pump stops retrying and retires
//!
//! # Design Decisions
//! - Per-connection failures retry immediately and are not counted; each one
//!   consumed a real connection attempt, so they cannot spin
//! - Resource exhaustion (EMFILE and friends) backs off exponentially
//! - A closed or invalid socket is never retried

use std::io;
use std::time::Duration;

use crate::config::AcceptRetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// How a pump should treat a failed accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptErrorClass {
    /// The failure belongs to a single incoming connection (reset, aborted, rejected).
    Connection,
    /// The socket is fine but the host is under pressure; back off and retry.
    Transient,
    /// The socket is unusable; retrying cannot succeed.
    Fatal,
}

impl AcceptErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptErrorClass::Connection => "connection",
            AcceptErrorClass::Transient => "transient",
            AcceptErrorClass::Fatal => "fatal",
        }
    }
}

// errno values from the Linux/BSD ABI that std does not give a stable ErrorKind.
#[cfg(unix)]
mod errno {
    pub const EBADF: i32 = 9;
    pub const ENOMEM: i32 = 12;
    pub const EINVAL: i32 = 22;
    pub const ENFILE: i32 = 23;
    pub const EMFILE: i32 = 24;
    #[cfg(target_os = "linux")]
    pub const ENOTSOCK: i32 = 88;
    #[cfg(not(target_os = "linux"))]
    pub const ENOTSOCK: i32 = 38;
    #[cfg(target_os = "linux")]
    pub const ENOBUFS: i32 = 105;
    #[cfg(not(target_os = "linux"))]
    pub const ENOBUFS: i32 = 55;
}

/// Classify an error returned by an endpoint's accept.
pub fn classify_accept_error(err: &io::Error) -> AcceptErrorClass {
    #[cfg(unix)]
    if let Some(code) = err.raw_os_error() {
        match code {
            errno::EMFILE | errno::ENFILE | errno::ENOBUFS | errno::ENOMEM => {
                return AcceptErrorClass::Transient
            }
            errno::EBADF | errno::ENOTSOCK | errno::EINVAL => return AcceptErrorClass::Fatal,
            _ => {}
        }
    }

    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::PermissionDenied => AcceptErrorClass::Connection,
        io::ErrorKind::NotConnected
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::Unsupported => AcceptErrorClass::Fatal,
        _ => AcceptErrorClass::Transient,
    }
}

/// What the pump should do after a failed accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Accept again right away.
    Immediately,
    /// Sleep, then accept again.
    After(Duration),
    /// Stop pumping this endpoint.
    GiveUp,
}

/// Backoff and give-up rules for accept loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptRetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive counted failures before giving up. `None` retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl AcceptRetryPolicy {
    /// Decide the next step given the error class and the number of
    /// consecutive counted failures so far (including this one).
    pub fn decide(&self, class: AcceptErrorClass, consecutive_failures: u32) -> RetryDecision {
        match class {
            AcceptErrorClass::Fatal => RetryDecision::GiveUp,
            AcceptErrorClass::Connection => RetryDecision::Immediately,
            AcceptErrorClass::Transient => match self.max_consecutive_failures {
                Some(limit) if consecutive_failures > limit => RetryDecision::GiveUp,
                _ => RetryDecision::After(calculate_backoff(
                    consecutive_failures,
                    self.base_delay,
                    self.max_delay,
                )),
            },
        }
    }
}

impl Default for AcceptRetryPolicy {
    fn default() -> Self {
        Self::from(&AcceptRetryConfig::default())
    }
}

impl From<&AcceptRetryConfig> for AcceptRetryPolicy {
    fn from(config: &AcceptRetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_consecutive_failures: match config.max_consecutive_failures {
                0 => None,
                n => Some(n),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_kind() {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(classify_accept_error(&reset), AcceptErrorClass::Connection);

        let closed = io::Error::new(io::ErrorKind::NotConnected, "endpoint closed");
        assert_eq!(classify_accept_error(&closed), AcceptErrorClass::Fatal);

        let other = io::Error::new(io::ErrorKind::Other, "hiccup");
        assert_eq!(classify_accept_error(&other), AcceptErrorClass::Transient);
    }

    #[cfg(unix)]
    #[test]
    fn classifies_by_errno() {
        let emfile = io::Error::from_raw_os_error(errno::EMFILE);
        assert_eq!(classify_accept_error(&emfile), AcceptErrorClass::Transient);

        let ebadf = io::Error::from_raw_os_error(errno::EBADF);
        assert_eq!(classify_accept_error(&ebadf), AcceptErrorClass::Fatal);
    }

    #[test]
    fn gives_up_after_limit() {
        let policy = AcceptRetryPolicy {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(50),
            max_consecutive_failures: Some(3),
        };

        assert!(matches!(
            policy.decide(AcceptErrorClass::Transient, 3),
            RetryDecision::After(_)
        ));
        assert_eq!(policy.decide(AcceptErrorClass::Transient, 4), RetryDecision::GiveUp);
        assert_eq!(policy.decide(AcceptErrorClass::Fatal, 1), RetryDecision::GiveUp);
        assert_eq!(
            policy.decide(AcceptErrorClass::Connection, 100),
            RetryDecision::Immediately
        );
    }

    #[test]
    fn zero_limit_means_unbounded() {
        let config = AcceptRetryConfig {
            max_consecutive_failures: 0,
            ..AcceptRetryConfig::default()
        };
        let policy = AcceptRetryPolicy::from(&config);
        assert_eq!(policy.max_consecutive_failures, None);
        assert!(matches!(
            policy.decide(AcceptErrorClass::Transient, 10_000),
            RetryDecision::After(_)
        ));
    }
}
