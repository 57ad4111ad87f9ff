use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wechat_station::{processors, server, Config, Station};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wechat_station=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Station: {}", config.station.id);
    info!("  API: {}", config.api.base_url);

    let mut station = Station::from_config(&config.station, &config.api)
        .context("Failed to create station")?;
    station.add_processor(processors::echo_text());
    station.add_processor(processors::click());

    let app = server::router(Arc::new(station));

    let listener = tokio::net::TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.listen))?;

    info!(
        "Listening on {} (webhook path /v0/{})",
        config.server.listen, config.station.id
    );
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
