//! Accept-time loopback filter.
//!
//! [`FirewallEndpoint`] wraps any endpoint and turns connections from
//! non-loopback peers into `PermissionDenied` errors after closing them. A pump
//! classifies those as per-connection failures and keeps going.

use std::io;
use std::net::SocketAddr;

use crate::net::Endpoint;
use crate::observability::metrics;
use crate::security::loopback::is_loopback;

/// Why a connection was refused at accept time.
#[derive(Debug, thiserror::Error)]
pub enum FirewallError {
    #[error("blocked remote addr {0}")]
    Blocked(SocketAddr),
}

impl From<FirewallError> for io::Error {
    fn from(err: FirewallError) -> Self {
        io::Error::new(io::ErrorKind::PermissionDenied, err)
    }
}

/// Endpoint that only lets loopback peers through.
#[derive(Debug)]
pub struct FirewallEndpoint<E> {
    inner: E,
}

impl<E: Endpoint> FirewallEndpoint<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

impl<E: Endpoint> Endpoint for FirewallEndpoint<E> {
    type Conn = E::Conn;

    async fn accept(&self) -> io::Result<(E::Conn, SocketAddr)> {
        let (conn, peer_addr) = self.inner.accept().await?;
        if is_loopback(peer_addr.ip()) {
            return Ok((conn, peer_addr));
        }

        drop(conn);
        tracing::warn!(peer_addr = %peer_addr, "Blocked non-loopback connection");
        metrics::record_rejected_peer("accept");
        Err(FirewallError::Blocked(peer_addr).into())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    fn close(&self) -> io::Result<()> {
        self.inner.close()
    }
}
