//! Accept pump: drains one endpoint into the shared hand-off channel.
//!
//! # Responsibilities
//! - Loop on the endpoint's accept for the endpoint's whole lifetime
//! - Hand each connection to the shared channel (blocking = back-pressure)
//! - Classify accept errors and back off instead of spinning
//! - Exit promptly on shutdown, whether blocked in accept, send, or backoff

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::lifecycle::ShutdownSignal;
use crate::net::endpoint::Endpoint;
use crate::net::error::ListenerError;
use crate::observability::metrics;
use crate::resilience::{classify_accept_error, AcceptErrorClass, AcceptRetryPolicy, RetryDecision};

/// A connection plus the peer it came from.
pub(crate) type Handoff<C> = (C, SocketAddr);

/// Why a pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The shutdown signal fired.
    Shutdown,
    /// The endpoint kept failing and the retry policy gave up.
    Retired,
    /// The receiving side of the channel is gone.
    ReceiverDropped,
}

pub(crate) struct Pump<E: Endpoint> {
    endpoint: Arc<E>,
    label: String,
    tx: mpsc::Sender<Handoff<E::Conn>>,
    shutdown: ShutdownSignal,
    policy: AcceptRetryPolicy,
}

impl<E: Endpoint> Pump<E> {
    pub(crate) fn new(
        endpoint: Arc<E>,
        address: SocketAddr,
        tx: mpsc::Sender<Handoff<E::Conn>>,
        shutdown: ShutdownSignal,
        policy: AcceptRetryPolicy,
    ) -> Self {
        Self {
            endpoint,
            label: address.to_string(),
            tx,
            shutdown,
            policy,
        }
    }

    /// Run until shutdown, retirement, or the receiver going away.
    pub(crate) async fn run(mut self) -> PumpExit {
        let _guard = PumpGuard::new(self.label.clone());
        let exit = self.pump().await;
        tracing::debug!(endpoint = %self.label, exit = ?exit, "Pump stopped");
        exit
    }

    async fn pump(&mut self) -> PumpExit {
        let mut failures: u32 = 0;

        loop {
            let accepted = tokio::select! {
                biased;
                _ = self.shutdown.wait() => return PumpExit::Shutdown,
                accepted = self.endpoint.accept() => accepted,
            };

            match accepted {
                Ok((conn, peer_addr)) => {
                    failures = 0;
                    tracing::debug!(endpoint = %self.label, peer_addr = %peer_addr, "Connection accepted");
                    metrics::record_connection_accepted(&self.label);

                    // Racing the send keeps a pump stalled on back-pressure from
                    // outliving close(); the connection is dropped with the future.
                    tokio::select! {
                        biased;
                        _ = self.shutdown.wait() => return PumpExit::Shutdown,
                        sent = self.tx.send((conn, peer_addr)) => {
                            if sent.is_err() {
                                return PumpExit::ReceiverDropped;
                            }
                        }
                    }
                }
                Err(err) => {
                    if self.shutdown.is_triggered() {
                        return PumpExit::Shutdown;
                    }

                    let class = classify_accept_error(&err);
                    metrics::record_accept_error(&self.label, class.as_str());
                    let err = ListenerError::Accept(err);
                    if class != AcceptErrorClass::Connection {
                        failures = failures.saturating_add(1);
                    }

                    match self.policy.decide(class, failures) {
                        RetryDecision::Immediately => {
                            tracing::debug!(endpoint = %self.label, error = %err, "Connection failed during accept");
                            // A stream of rejected peers must not monopolize the worker.
                            tokio::task::yield_now().await;
                        }
                        RetryDecision::After(delay) => {
                            tracing::warn!(
                                endpoint = %self.label,
                                error = %err,
                                attempt = failures,
                                delay = ?delay,
                                "Accept failed, backing off"
                            );
                            tokio::select! {
                                biased;
                                _ = self.shutdown.wait() => return PumpExit::Shutdown,
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                        RetryDecision::GiveUp => {
                            tracing::error!(
                                endpoint = %self.label,
                                error = %err,
                                class = class.as_str(),
                                attempts = failures,
                                "Endpoint keeps failing, retiring its pump"
                            );
                            metrics::record_pump_retired(&self.label);
                            return PumpExit::Retired;
                        }
                    }
                }
            }
        }
    }
}

/// Keeps the active-pump gauge honest on every exit path, panics included.
struct PumpGuard {
    label: String,
}

impl PumpGuard {
    fn new(label: String) -> Self {
        metrics::record_active_pumps(1.0);
        tracing::debug!(endpoint = %label, "Pump started");
        Self { label }
    }
}

impl Drop for PumpGuard {
    fn drop(&mut self) {
        metrics::record_active_pumps(-1.0);
        tracing::trace!(endpoint = %self.label, "Pump guard released");
    }
}
