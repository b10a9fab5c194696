//! Lets `axum::serve` drive a [`MultiListener`] directly.

use std::io;
use std::net::SocketAddr;

use axum::extract::connect_info::Connected;
use axum::serve::IncomingStream;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::net::{Endpoint, ListenerError, MultiListener};

/// Peer address of a connection served from a [`MultiListener`].
///
/// Serve with `into_make_service_with_connect_info::<PeerAddr>()` and extract
/// it as `ConnectInfo<PeerAddr>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

impl<E> Connected<IncomingStream<'_, MultiListener<E>>> for PeerAddr
where
    E: Endpoint,
    E::Conn: AsyncRead + AsyncWrite + Unpin,
{
    fn connect_info(stream: IncomingStream<'_, MultiListener<E>>) -> Self {
        PeerAddr(*stream.remote_addr())
    }
}

impl<E> axum::serve::Listener for MultiListener<E>
where
    E: Endpoint,
    E::Conn: AsyncRead + AsyncWrite + Unpin,
{
    type Io = E::Conn;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match MultiListener::accept(self).await {
            Ok(accepted) => accepted,
            Err(ListenerError::Exhausted) => {
                tracing::error!(addresses = %self, "Every endpoint failed, closing listener");
                // Fires `closed()`, which the server treats as a shutdown request.
                match self.close().await {
                    Err(e) if !e.is_closed() => {
                        tracing::warn!(error = %e, "Listener close reported an error")
                    }
                    _ => {}
                }
                std::future::pending().await
            }
            Err(e) => {
                // axum has no way to end the accept loop from here; graceful
                // shutdown (wired to `closed()`) stops the server instead.
                tracing::debug!(error = %e, "Listener stopped yielding connections");
                std::future::pending().await
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(MultiListener::local_addr(self))
    }
}
