//! Herald Stream server binary.
//!
//! Entry point for the WebSocket delivery server.

use herald_stream::{Hub, Server, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,herald_stream=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env()?;

    tracing::info!(
        "Starting Herald stream server on {} (ping every {:?}, pong wait {:?})",
        config.bind_address(),
        config.hub.ping_period,
        config.hub.pong_wait
    );

    let hub = Hub::new(config.hub)?;
    let server = Server::new(config, hub);
    server.run().await?;

    tracing::info!("Herald stream server stopped");
    Ok(())
}
