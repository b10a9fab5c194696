//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use multilistener::lifecycle::Shutdown;
use multilistener::Endpoint;
use tokio::sync::{mpsc, Mutex};

/// Stand-in for an accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockConn {
    pub id: u32,
    pub peer: SocketAddr,
}

/// Endpoint fed by a [`MockHandle`]: every injected item is one accept result.
pub struct MockEndpoint {
    addr: SocketAddr,
    rx: Mutex<mpsc::UnboundedReceiver<io::Result<MockConn>>>,
    closed: Shutdown,
    close_calls: Arc<AtomicUsize>,
    fail_close: bool,
}

/// Test-side controls for a [`MockEndpoint`].
#[derive(Clone)]
pub struct MockHandle {
    tx: mpsc::UnboundedSender<io::Result<MockConn>>,
    close_calls: Arc<AtomicUsize>,
}

impl MockEndpoint {
    pub fn new(addr: &str) -> (Self, MockHandle) {
        Self::build(addr, false)
    }

    /// Endpoint whose `close` reports an error.
    pub fn failing_close(addr: &str) -> (Self, MockHandle) {
        Self::build(addr, true)
    }

    fn build(addr: &str, fail_close: bool) -> (Self, MockHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let close_calls = Arc::new(AtomicUsize::new(0));
        let endpoint = Self {
            addr: addr.parse().unwrap(),
            rx: Mutex::new(rx),
            closed: Shutdown::new(),
            close_calls: close_calls.clone(),
            fail_close,
        };
        (endpoint, MockHandle { tx, close_calls })
    }
}

impl MockHandle {
    pub fn connect(&self, id: u32, peer: &str) {
        let _ = self.tx.send(Ok(MockConn {
            id,
            peer: peer.parse().unwrap(),
        }));
    }

    pub fn fail(&self, kind: io::ErrorKind) {
        let _ = self.tx.send(Err(io::Error::new(kind, "injected")));
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl Endpoint for MockEndpoint {
    type Conn = MockConn;

    async fn accept(&self) -> io::Result<(MockConn, SocketAddr)> {
        let mut closed = self.closed.subscribe();
        let mut rx = tokio::select! {
            biased;
            _ = closed.wait() => return Err(io::Error::new(io::ErrorKind::NotConnected, "closed")),
            rx = self.rx.lock() => rx,
        };
        tokio::select! {
            biased;
            _ = closed.wait() => Err(io::Error::new(io::ErrorKind::NotConnected, "closed")),
            next = rx.recv() => match next {
                Some(Ok(conn)) => {
                    let peer = conn.peer;
                    Ok((conn, peer))
                }
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            },
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.addr)
    }

    fn close(&self) -> io::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.trigger();
        if self.fail_close {
            Err(io::Error::new(io::ErrorKind::Other, "close failed"))
        } else {
            Ok(())
        }
    }
}

/// Whether this host can bind the IPv6 loopback.
pub fn ipv6_available() -> bool {
    std::net::TcpListener::bind("[::1]:0").is_ok()
}
