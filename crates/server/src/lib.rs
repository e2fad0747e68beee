//! Server crate for the movies service.
//!
//! This crate contains the aggregator that combines the movie-info and
//! reviews upstreams, and the HTTP surface that exposes it.

pub mod aggregator;
pub mod config;
pub mod replay;
pub mod routes;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

pub use aggregator::MovieAggregator;
pub use config::{AppConfig, ConfigError};
pub use replay::{ReplayLog, Subscription};
pub use routes::{create_router, ApiError, AppState};

/// Serve the movies API on `addr` until Ctrl-C.
pub async fn run_server(addr: SocketAddr, config: &AppConfig) -> Result<()> {
    let aggregator = MovieAggregator::from_config(config)?;
    let app = create_router(AppState::new(aggregator));

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Movies service listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Movies service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
