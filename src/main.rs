//! Entry point for the zipstream server.
//!
//! Reads configuration from flags and environment, sets up logging and
//! serves until SIGINT or SIGTERM.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use zipstream::io::S3Client;
use zipstream::server::{self, AppState, DirectStore, RouterConfig, S3Connector, StoreResolver};
use zipstream::{Cli, LinkRegistry};

/// Application entry point.
///
/// Parses configuration, initializes logging, builds the shared state and
/// serves until a shutdown signal arrives.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let direct = match cli.direct_store() {
        Some(config) => {
            let client = S3Client::new(&config).context("failed to set up the direct S3 client")?;
            info!(
                endpoint = %config.credentials.endpoint,
                bucket = %config.credentials.bucket,
                "using direct S3 client for all requests"
            );
            Some(DirectStore {
                store: Arc::new(client),
                bucket: config.credentials.bucket,
            })
        }
        None => None,
    };

    let state = AppState {
        links: LinkRegistry::new(cli.link_ttl()),
        stores: StoreResolver::new(direct, Arc::new(S3Connector)),
    };

    let auth = cli.basic_auth();
    if auth.is_some() {
        info!("basic auth enabled for manifest endpoints");
    }
    let config = RouterConfig {
        auth,
        read_timeout: Some(cli.read_timeout()),
    };

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, cli.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(port = cli.port, link_ttl_secs = cli.link_ttl, "Server starting");

    axum::serve(listener, server::router(state, config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

/// Resolve once SIGINT (ctrl-c) or, on Unix, SIGTERM is received.
///
/// If a signal handler cannot be installed that signal is ignored and the
/// other one still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutting down");
}
