use anyhow::Context;
use relief_runner::{server, TerrainConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug)]
struct Config {
    listen_addr: SocketAddr,
    terrain: TerrainConfig,
}

impl Config {
    /// Parses configuration from environment variables.
    fn from_env() -> anyhow::Result<Self> {
        let terrain = match std::env::var("RELIEF_CONFIG") {
            Ok(path) => TerrainConfig::from_yaml_file(&path)
                .with_context(|| format!("Failed to load RELIEF_CONFIG {}", path))?,
            Err(_) => TerrainConfig::default(),
        };
        terrain.validate().context("Invalid base configuration")?;

        Ok(Self {
            listen_addr: std::env::var("RELIEF_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".into())
                .parse()
                .context("Failed to parse RELIEF_LISTEN_ADDR")?,
            terrain,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(config = ?config, "Loaded configuration");

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "Terrain server listening");

    let router = server::router(Arc::new(config.terrain));
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
