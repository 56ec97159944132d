//! # Stridewatch Server
//!
//! Realtime motion stream server with fall detection and cadence reports.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! stridewatch
//!
//! # Run with a config file (searched at ./stridewatch.toml,
//! # /etc/stridewatch/stridewatch.toml, ~/.config/stridewatch/stridewatch.toml)
//! stridewatch
//!
//! # Run with environment variables
//! STRIDE_PORT=8080 STRIDE_HOST=0.0.0.0 stridewatch
//! ```

mod config;
mod handlers;
mod history;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stride=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Stridewatch server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
