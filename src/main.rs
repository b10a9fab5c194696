//! Serve HTTP on several sockets at once (dual-stack loopback by default).
//!
//! ```text
//! multilistener                       # [::1]:8080 and 127.0.0.1:8080
//! multilistener --port 9000           # same, on 9000
//! multilistener -a 127.0.0.1:9000 -a 127.0.0.1:9001
//! multilistener --config multilistener.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use multilistener::config::{load_config, ListenerConfig, MultiListenerConfig};
use multilistener::lifecycle::{signals, Shutdown};
use multilistener::net::{MultiListener, TcpEndpoint};
use multilistener::observability::{logging, metrics};
use multilistener::security::FirewallEndpoint;
use multilistener::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "multilistener")]
#[command(about = "Serve HTTP on IPv6 and IPv4 loopback through one listener", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen on [::1]:PORT and 127.0.0.1:PORT (overrides configured addresses).
    #[arg(short, long, conflicts_with = "address")]
    port: Option<u16>,

    /// Address to listen on; repeat for more. The first one is preferred.
    #[arg(short, long)]
    address: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MultiListenerConfig::default(),
    };
    if let Some(port) = cli.port {
        config.listener.addresses = ListenerConfig::local_loopback(port).addresses;
        config.listener.preferred_index = 0;
    } else if !cli.address.is_empty() {
        config.listener.addresses = cli.address.clone();
        config.listener.preferred_index = 0;
    }

    logging::init(&config.observability);
    tracing::info!("multilistener v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        addresses = ?config.listener.addresses,
        preferred_index = config.listener.preferred_index,
        loopback_only = config.server.loopback_only,
        filter_at_accept = config.server.filter_at_accept,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_handler(shutdown.clone());

    let endpoints = match cli.port {
        Some(port) => TcpEndpoint::bind_loopback_pair(port).await?,
        None => TcpEndpoint::bind_all(&config.listener.addresses).await?,
    };

    let server = HttpServer::new(config.server.clone());
    if config.server.filter_at_accept {
        let endpoints = endpoints.into_iter().map(FirewallEndpoint::new).collect();
        let listener = MultiListener::from_endpoints(endpoints, &config.listener)?;
        server.run(listener, shutdown.subscribe()).await?;
    } else {
        let listener = MultiListener::from_endpoints(endpoints, &config.listener)?;
        server.run(listener, shutdown.subscribe()).await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
