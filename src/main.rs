use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use newswire::config::Config;
use newswire::server::{create_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "newswire", about = "Merged news digest and stock quote service")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = "newswire.toml")]
    config: PathBuf,

    /// Listen address, overriding the config file
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newswire=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config).context("Failed to load configuration")?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", config.listen))?;

    let state = AppState::new(config).context("Failed to build HTTP client")?;
    let app = create_router(state);

    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down");
}
