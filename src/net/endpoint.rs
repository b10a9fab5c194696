//! Endpoints: one bound listening socket each.
//!
//! # Responsibilities
//! - Define the accept/close/address capability a pump drives
//! - Bind TCP sockets from `host:port` strings
//! - Release everything already bound when a later bind fails

use std::future::Future;
use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::lifecycle::Shutdown;
use crate::net::error::ListenerError;

/// One bound socket for one address.
///
/// `accept` must be cancel-safe: pumps race it against shutdown and drop the
/// future when shutdown wins. Once `close` has been called, `accept` must
/// resolve promptly with an error instead of blocking.
pub trait Endpoint: Send + Sync + 'static {
    /// The accepted transport session.
    type Conn: Send + 'static;

    /// Wait for the next connection and its peer address.
    fn accept(&self) -> impl Future<Output = io::Result<(Self::Conn, SocketAddr)>> + Send;

    /// Address the socket is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Stop accepting. The socket itself is released when the endpoint is dropped.
    fn close(&self) -> io::Result<()>;
}

/// TCP endpoint over a Tokio listener.
#[derive(Debug)]
pub struct TcpEndpoint {
    inner: TcpListener,
    local_addr: SocketAddr,
    closed: Shutdown,
}

impl TcpEndpoint {
    /// Bind to `address`, e.g. `"[::1]:8080"` or `"127.0.0.1:0"`.
    pub async fn bind(address: &str) -> Result<Self, ListenerError> {
        let addr: SocketAddr = address.parse().map_err(|e| ListenerError::Bind {
            address: address.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidInput, e),
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind {
                address: address.to_string(),
                source,
            })?;

        let endpoint = Self::new(listener).map_err(|source| ListenerError::Bind {
            address: address.to_string(),
            source,
        })?;

        tracing::info!(address = %endpoint.local_addr, "Endpoint bound");
        Ok(endpoint)
    }

    /// Bind every address in order. On the first failure the endpoints bound
    /// so far are closed and dropped before the error is returned.
    pub async fn bind_all<S: AsRef<str>>(addresses: &[S]) -> Result<Vec<Self>, ListenerError> {
        let mut endpoints = Vec::with_capacity(addresses.len());
        for address in addresses {
            match Self::bind(address.as_ref()).await {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(e) => {
                    tracing::warn!(
                        address = address.as_ref(),
                        error = %e,
                        released = endpoints.len(),
                        "Bind failed, releasing endpoints already bound"
                    );
                    release(endpoints);
                    return Err(e);
                }
            }
        }
        Ok(endpoints)
    }

    /// Bind `[::1]:port` then `127.0.0.1:port`. With port 0 the IPv4 socket
    /// takes the port the kernel gave the IPv6 one.
    pub async fn bind_loopback_pair(port: u16) -> Result<Vec<Self>, ListenerError> {
        let v6 = Self::bind(&format!("[::1]:{port}")).await?;
        let v4 = match Self::bind(&format!("127.0.0.1:{}", v6.local_addr.port())).await {
            Ok(v4) => v4,
            Err(e) => {
                release(vec![v6]);
                return Err(e);
            }
        };
        Ok(vec![v6, v4])
    }

    /// Wrap an already-bound Tokio listener.
    pub fn new(listener: TcpListener) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self {
            inner: listener,
            local_addr,
            closed: Shutdown::new(),
        })
    }

    /// Wrap a std listener configured elsewhere (socket options, inherited fd).
    pub fn from_std(listener: std::net::TcpListener) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        Self::new(TcpListener::from_std(listener)?)
    }
}

impl Endpoint for TcpEndpoint {
    type Conn = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let mut closed = self.closed.subscribe();
        tokio::select! {
            biased;
            _ = closed.wait() => Err(io::Error::new(io::ErrorKind::NotConnected, "endpoint closed")),
            accepted = self.inner.accept() => accepted,
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local_addr)
    }

    fn close(&self) -> io::Result<()> {
        if self.closed.trigger() {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "endpoint already closed"))
        }
    }
}

/// Close and drop a batch of endpoints, logging failures.
pub(crate) fn release<E: Endpoint>(endpoints: Vec<E>) {
    for endpoint in endpoints {
        if let Err(e) = endpoint.close() {
            tracing::warn!(error = %e, "Failed to close endpoint during release");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn bind_rejects_garbage() {
        let err = TcpEndpoint::bind("not-an-address").await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { ref address, .. } if address == "not-an-address"));
    }

    #[tokio::test]
    async fn accepts_and_reports_address() {
        let endpoint = TcpEndpoint::bind("127.0.0.1:0").await.unwrap();
        let addr = endpoint.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let client = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (_stream, peer) = endpoint.accept().await.unwrap();
        assert!(peer.ip().is_loopback());
        client.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn close_unblocks_accept() {
        let endpoint = std::sync::Arc::new(TcpEndpoint::bind("127.0.0.1:0").await.unwrap());
        let waiting = {
            let endpoint = endpoint.clone();
            tokio::spawn(async move { endpoint.accept().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        endpoint.close().unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("accept should return after close")
            .unwrap();
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotConnected);

        // Accept on an already-closed endpoint fails straight away.
        let again = tokio::time::timeout(Duration::from_millis(100), endpoint.accept())
            .await
            .expect("closed endpoint must not block");
        assert!(again.is_err());
        assert!(endpoint.close().is_err());
    }

    #[tokio::test]
    async fn bind_all_releases_on_failure() {
        let taken = TcpEndpoint::bind("127.0.0.1:0").await.unwrap();
        let taken_addr = taken.local_addr().unwrap().to_string();

        // Reserve a free port for the first entry, then let it go.
        let probe = TcpEndpoint::bind("127.0.0.1:0").await.unwrap();
        let first = probe.local_addr().unwrap().to_string();
        drop(probe);

        let err = TcpEndpoint::bind_all(&[first.clone(), taken_addr.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, ListenerError::Bind { ref address, .. } if *address == taken_addr));

        // The first socket was released, so its address can be bound again.
        TcpEndpoint::bind(&first).await.unwrap();
    }

    #[tokio::test]
    async fn wraps_std_listener() {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        let endpoint = TcpEndpoint::from_std(std_listener).unwrap();
        assert_eq!(endpoint.local_addr().unwrap(), addr);
    }
}
