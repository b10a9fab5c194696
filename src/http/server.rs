//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router and wire middleware (request ID, tracing,
//!   timeout, loopback filter)
//! - Serve it on a multi-listener until shutdown or listener close
//! - Close the listener on the way out so every pump is joined

use std::net::SocketAddr;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, middleware, routing::get, Json, Router};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::listener::PeerAddr;
use crate::lifecycle::ShutdownSignal;
use crate::net::{Endpoint, ListenerError, MultiListener};
use crate::security::local_only;

/// Errors from running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub preferred: SocketAddr,
    pub addresses: Vec<SocketAddr>,
    pub network: &'static str,
}

impl AppState {
    pub fn from_listener<E: Endpoint>(listener: &MultiListener<E>) -> Self {
        Self {
            preferred: listener.local_addr(),
            addresses: listener.addresses().to_vec(),
            network: listener.network(),
        }
    }
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub preferred: String,
    pub addresses: Vec<String>,
    pub network: &'static str,
}

/// HTTP server over a multi-listener.
pub struct HttpServer {
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/", get(root_handler))
            .route("/status", get(status_handler))
            .with_state(state);

        let router = if config.loopback_only {
            router.layer(middleware::from_fn(local_only))
        } else {
            router
        };

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(request_timeout(config))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// Serve until `shutdown` fires or the listener is closed elsewhere, then
    /// close the listener.
    ///
    /// A listener that is already closed is refused up front rather than
    /// served forever with no connections.
    pub async fn run<E>(
        self,
        listener: MultiListener<E>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ServerError>
    where
        E: Endpoint,
        E::Conn: AsyncRead + AsyncWrite + Unpin,
    {
        if listener.is_closed() {
            return Err(ListenerError::Closed.into());
        }

        tracing::info!(
            addresses = %listener.all_addresses(),
            preferred = %listener.local_addr(),
            network = listener.network(),
            "HTTP server starting"
        );

        let app = Self::build_router(&self.config, AppState::from_listener(&listener))
            .into_make_service_with_connect_info::<PeerAddr>();

        let watcher = listener.clone();
        let stop = async move {
            tokio::select! {
                _ = shutdown.wait() => {},
                _ = watcher.closed() => {},
            }
        };

        let served = axum::serve(listener.clone(), app)
            .with_graceful_shutdown(stop)
            .await;

        match listener.close().await {
            Err(e) if !e.is_closed() => {
                tracing::warn!(error = %e, "Listener close reported an error")
            }
            _ => {}
        }

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Requests running past the configured limit get `408 Request Timeout`.
fn request_timeout(config: &ServerConfig) -> TimeoutLayer {
    TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.request_timeout_secs),
    )
}

async fn root_handler(State(state): State<AppState>) -> String {
    format!("Hello from {}!\n", state.preferred)
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        preferred: state.preferred.to_string(),
        addresses: state.addresses.iter().map(ToString::to_string).collect(),
        network: state.network,
    })
}
