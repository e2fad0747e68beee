//! Movies service binary.
//!
//! Serves `GET /v1/movies/:id`, aggregating the movie-info and reviews
//! upstreams configured by flags or environment variables.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use server::AppConfig;

#[derive(Parser)]
#[command(name = "movies-service")]
#[command(about = "Aggregates movie metadata and reviews", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8082")]
    bind: SocketAddr,

    #[command(flatten)]
    config: AppConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,server=debug,rest_client=debug")
            }),
        )
        .init();

    let cli = Cli::parse();
    info!("Starting movies service");

    server::run_server(cli.bind, &cli.config).await
}
