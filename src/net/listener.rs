//! One logical listener over several bound endpoints.
//!
//! # Responsibilities
//! - Spawn one pump per endpoint and fan them into a single accept stream
//! - Report a preferred address plus a diagnostic list of all of them
//! - Close exactly once: signal, close endpoints, join pumps, drain channel
//!
//! # State Machine
//! ```text
//! Open ──close()──▶ ShuttingDown ──pumps joined, channel drained──▶ Closed
//!   │                      │
//!   └─ accept() serves     └─ accept() → Closed, close() → AlreadyClosed
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use crate::config::ListenerConfig;
use crate::lifecycle::Shutdown;
use crate::net::endpoint::{release, Endpoint, TcpEndpoint};
use crate::net::error::ListenerError;
use crate::net::pump::{Handoff, Pump, PumpExit};
use crate::resilience::AcceptRetryPolicy;

/// Tag returned by [`MultiListener::network`]. Not a real protocol name.
pub const NETWORK: &str = "tcp+multi";

const OPEN: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const CLOSED: u8 = 2;

/// Lifecycle state of a [`MultiListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Open,
    ShuttingDown,
    Closed,
}

/// Several endpoints exposed as one listener.
///
/// Cloning gives another handle to the same listener. Connections from every
/// endpoint arrive through [`accept`](Self::accept) in whatever order the pumps
/// deliver them; each connection goes to exactly one caller.
///
/// Dropping the last handle without calling [`close`](Self::close) still stops
/// the pumps, but nothing waits for them.
pub struct MultiListener<E: Endpoint = TcpEndpoint> {
    inner: Arc<Inner<E>>,
}

struct Inner<E: Endpoint> {
    /// Taken by `close()`; dropping them after the pumps exit frees the sockets.
    endpoints: Mutex<Vec<Arc<E>>>,
    /// Cached at construction so reporting works after close.
    addresses: Vec<SocketAddr>,
    preferred: usize,
    incoming: AsyncMutex<mpsc::Receiver<Handoff<E::Conn>>>,
    shutdown: Shutdown,
    state: AtomicU8,
    pumps: Mutex<Vec<JoinHandle<PumpExit>>>,
}

impl<E: Endpoint> Clone for MultiListener<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl MultiListener<TcpEndpoint> {
    /// Bind every address in order with default settings.
    ///
    /// Addresses use the host's `host:port` syntax, e.g. `"[::1]:8080"` and
    /// `"127.0.0.1:8080"`. The first one is preferred.
    pub async fn bind<S: AsRef<str>>(addresses: &[S]) -> Result<Self, ListenerError> {
        let config = ListenerConfig {
            addresses: addresses.iter().map(|a| a.as_ref().to_string()).collect(),
            ..ListenerConfig::default()
        };
        Self::from_config(&config).await
    }

    /// Bind `config.addresses` and apply the rest of `config`.
    ///
    /// No partially-open listener is ever returned: if any bind fails, the
    /// endpoints already bound are released first.
    pub async fn from_config(config: &ListenerConfig) -> Result<Self, ListenerError> {
        if config.addresses.is_empty() {
            return Err(ListenerError::NoEndpoints);
        }
        let endpoints = TcpEndpoint::bind_all(&config.addresses).await?;
        Self::from_endpoints(endpoints, config)
    }

    /// IPv6 loopback (preferred) and IPv4 loopback on the same port.
    ///
    /// With port 0 the IPv4 socket reuses whatever port the IPv6 one received.
    pub async fn local_loopback(port: u16) -> Result<Self, ListenerError> {
        Self::local_loopback_with(port, &ListenerConfig::local_loopback(port)).await
    }

    /// [`local_loopback`](Self::local_loopback) with the pump and hand-off
    /// settings of `config`; its `addresses` are ignored.
    pub async fn local_loopback_with(port: u16, config: &ListenerConfig) -> Result<Self, ListenerError> {
        let endpoints = TcpEndpoint::bind_loopback_pair(port).await?;
        Self::from_endpoints(endpoints, config)
    }
}

impl<E: Endpoint> MultiListener<E> {
    /// Wrap endpoints that are already bound. Spawns the pumps, so this must
    /// run inside a Tokio runtime.
    ///
    /// Only `preferred_index`, `handoff_capacity` and `retry` are read from
    /// `config`. On error every endpoint passed in is closed.
    pub fn from_endpoints(endpoints: Vec<E>, config: &ListenerConfig) -> Result<Self, ListenerError> {
        if endpoints.is_empty() {
            return Err(ListenerError::NoEndpoints);
        }
        if config.preferred_index >= endpoints.len() {
            let count = endpoints.len();
            release(endpoints);
            return Err(ListenerError::PreferredIndex {
                index: config.preferred_index,
                count,
            });
        }

        let mut addresses = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            match endpoint.local_addr() {
                Ok(addr) => addresses.push(addr),
                Err(source) => {
                    let address = format!("endpoint #{}", addresses.len());
                    release(endpoints);
                    return Err(ListenerError::Bind { address, source });
                }
            }
        }

        let (tx, rx) = mpsc::channel(config.handoff_capacity.max(1));
        let shutdown = Shutdown::new();
        let policy = AcceptRetryPolicy::from(&config.retry);

        let endpoints: Vec<Arc<E>> = endpoints.into_iter().map(Arc::new).collect();
        let pumps = endpoints
            .iter()
            .zip(&addresses)
            .map(|(endpoint, addr)| {
                let pump = Pump::new(
                    Arc::clone(endpoint),
                    *addr,
                    tx.clone(),
                    shutdown.subscribe(),
                    policy,
                );
                tokio::spawn(pump.run())
            })
            .collect();
        // Only pumps hold senders: once all of them retire, recv() yields None.
        drop(tx);

        let listener = Self {
            inner: Arc::new(Inner {
                endpoints: Mutex::new(endpoints),
                addresses,
                preferred: config.preferred_index,
                incoming: AsyncMutex::new(rx),
                shutdown,
                state: AtomicU8::new(OPEN),
                pumps: Mutex::new(pumps),
            }),
        };

        tracing::info!(
            addresses = %listener.all_addresses(),
            preferred = %listener.local_addr(),
            "Multi-listener open"
        );
        Ok(listener)
    }

    /// Wait for the next connection from any endpoint.
    ///
    /// Returns [`ListenerError::Closed`] once close has begun, and
    /// [`ListenerError::Exhausted`] if every pump gave up while still open.
    pub async fn accept(&self) -> Result<(E::Conn, SocketAddr), ListenerError> {
        let mut signal = self.inner.shutdown.subscribe();
        if signal.is_triggered() {
            return Err(ListenerError::Closed);
        }

        let mut incoming = tokio::select! {
            biased;
            _ = signal.wait() => return Err(ListenerError::Closed),
            guard = self.inner.incoming.lock() => guard,
        };

        tokio::select! {
            biased;
            _ = signal.wait() => Err(ListenerError::Closed),
            next = incoming.recv() => match next {
                Some(accepted) => Ok(accepted),
                None if signal.is_triggered() => Err(ListenerError::Closed),
                None => Err(ListenerError::Exhausted),
            },
        }
    }

    /// Close the listener.
    ///
    /// The first call fires the shutdown signal, closes every endpoint (all of
    /// them are attempted; the first failure is returned), waits for every pump
    /// to exit, then drains and closes the channel. Later calls return
    /// [`ListenerError::AlreadyClosed`] and do nothing else.
    pub async fn close(&self) -> Result<(), ListenerError> {
        if self
            .inner
            .state
            .compare_exchange(OPEN, SHUTTING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ListenerError::AlreadyClosed);
        }

        tracing::info!(addresses = %self.all_addresses(), "Closing multi-listener");
        self.inner.shutdown.trigger();

        let endpoints = take(&self.inner.endpoints);
        let mut first_error = None;
        for (endpoint, addr) in endpoints.iter().zip(&self.inner.addresses) {
            if let Err(source) = endpoint.close() {
                tracing::warn!(endpoint = %addr, error = %source, "Failed to close endpoint");
                first_error.get_or_insert(ListenerError::Close {
                    address: addr.to_string(),
                    source,
                });
            }
        }

        for pump in take(&self.inner.pumps) {
            match pump.await {
                Ok(exit) => tracing::trace!(exit = ?exit, "Pump joined"),
                Err(e) => tracing::warn!(error = %e, "Pump task failed"),
            }
        }
        // Pumps held the only other references; this frees the sockets.
        drop(endpoints);

        let mut incoming = self.inner.incoming.lock().await;
        incoming.close();
        let mut discarded = 0usize;
        while incoming.try_recv().is_ok() {
            discarded += 1;
        }
        drop(incoming);

        self.inner.state.store(CLOSED, Ordering::Release);
        tracing::info!(discarded, "Multi-listener closed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Resolve once close has begun on any handle.
    pub async fn closed(&self) {
        self.inner.shutdown.subscribe().wait().await;
    }

    /// Address of the preferred endpoint.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.addresses[self.inner.preferred]
    }

    /// Every endpoint's address, in construction order.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.inner.addresses
    }

    /// Comma-joined addresses for logs. Not a dialable address; use
    /// [`local_addr`](Self::local_addr) for that.
    pub fn all_addresses(&self) -> String {
        self.to_string()
    }

    /// Descriptive network tag, see [`NETWORK`].
    pub fn network(&self) -> &'static str {
        NETWORK
    }

    pub fn state(&self) -> ListenerState {
        match self.inner.state.load(Ordering::Acquire) {
            OPEN => ListenerState::Open,
            SHUTTING_DOWN => ListenerState::ShuttingDown,
            _ => ListenerState::Closed,
        }
    }

    /// True once close has begun.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_triggered()
    }
}

fn take<T>(slot: &Mutex<Vec<T>>) -> Vec<T> {
    match slot.lock() {
        Ok(mut guard) => std::mem::take(&mut *guard),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    }
}

impl<E: Endpoint> fmt::Display for MultiListener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, addr) in self.inner.addresses.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{addr}")?;
        }
        Ok(())
    }
}

impl<E: Endpoint> fmt::Debug for MultiListener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiListener")
            .field("addresses", &self.inner.addresses)
            .field("preferred", &self.inner.preferred)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn fans_in_two_ipv4_endpoints() {
        let listener = MultiListener::bind(&["127.0.0.1:0", "127.0.0.1:0"]).await.unwrap();
        let [a, b] = [listener.addresses()[0], listener.addresses()[1]];
        assert_ne!(a.port(), b.port());

        let _ca = TcpStream::connect(a).await.unwrap();
        let _cb = TcpStream::connect(b).await.unwrap();

        let (first, _) = listener.accept().await.unwrap();
        let (second, _) = listener.accept().await.unwrap();
        let mut locals = vec![first.local_addr().unwrap(), second.local_addr().unwrap()];
        locals.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(locals, expected);

        listener.close().await.unwrap();
        assert!(matches!(listener.accept().await, Err(ListenerError::Closed)));
    }

    #[tokio::test]
    async fn reports_addresses_in_order() {
        let listener = MultiListener::bind(&["127.0.0.1:0", "127.0.0.1:0"]).await.unwrap();
        let addrs = listener.addresses().to_vec();
        assert_eq!(listener.local_addr(), addrs[0]);
        assert_eq!(listener.all_addresses(), format!("{},{}", addrs[0], addrs[1]));
        assert_eq!(listener.network(), "tcp+multi");
        listener.close().await.unwrap();

        // Reporting survives close.
        assert_eq!(listener.local_addr(), addrs[0]);
    }

    #[tokio::test]
    async fn preferred_index_is_explicit() {
        let config = ListenerConfig {
            addresses: vec!["127.0.0.1:0".into(), "127.0.0.1:0".into()],
            preferred_index: 1,
            ..ListenerConfig::default()
        };
        let listener = MultiListener::from_config(&config).await.unwrap();
        assert_eq!(listener.local_addr(), listener.addresses()[1]);
        listener.close().await.unwrap();
    }

    #[tokio::test]
    async fn preferred_index_out_of_range_releases_endpoints() {
        let endpoint = TcpEndpoint::bind("127.0.0.1:0").await.unwrap();
        let addr = endpoint.local_addr().unwrap();
        let config = ListenerConfig {
            preferred_index: 3,
            ..ListenerConfig::default()
        };

        let err = MultiListener::from_endpoints(vec![endpoint], &config).unwrap_err();
        assert!(matches!(err, ListenerError::PreferredIndex { index: 3, count: 1 }));
        TcpEndpoint::bind(&addr.to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn empty_address_list_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            MultiListener::bind(&empty).await,
            Err(ListenerError::NoEndpoints)
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let listener = MultiListener::bind(&["127.0.0.1:0"]).await.unwrap();
        assert_eq!(listener.state(), ListenerState::Open);

        listener.close().await.unwrap();
        assert_eq!(listener.state(), ListenerState::Closed);
        assert!(matches!(listener.close().await, Err(ListenerError::AlreadyClosed)));
        assert_eq!(listener.state(), ListenerState::Closed);
    }

    #[tokio::test]
    async fn close_releases_sockets() {
        let listener = MultiListener::bind(&["127.0.0.1:0"]).await.unwrap();
        let addr = listener.local_addr();
        listener.close().await.unwrap();

        TcpEndpoint::bind(&addr.to_string())
            .await
            .expect("socket should be free after close");
    }

    #[tokio::test]
    async fn close_wakes_blocked_accept() {
        let listener = MultiListener::bind(&["127.0.0.1:0"]).await.unwrap();
        let waiting = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.accept().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        listener.close().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("accept should return")
            .unwrap();
        assert!(matches!(result, Err(ListenerError::Closed)));
    }

    #[tokio::test]
    async fn concurrent_close_closes_once() {
        let listener = MultiListener::bind(&["127.0.0.1:0", "127.0.0.1:0"]).await.unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let listener = listener.clone();
                tokio::spawn(async move { listener.close().await })
            })
            .collect();

        let mut ok = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(ListenerError::AlreadyClosed) => already += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, already), (1, 7));
    }

    #[tokio::test]
    async fn close_joins_pump_stalled_on_handoff() {
        let listener = MultiListener::bind(&["127.0.0.1:0"]).await.unwrap();
        let addr = listener.local_addr();

        // Nobody accepts: one connection fills the channel, the next stalls the pump.
        let _c1 = TcpStream::connect(addr).await.unwrap();
        let _c2 = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        tokio::time::timeout(Duration::from_secs(2), listener.close())
            .await
            .expect("close must not hang on a stalled pump")
            .unwrap();
    }
}
