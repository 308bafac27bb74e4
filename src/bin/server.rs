//! mycelia HTTP server binary.
//!
//! Serves the built-in resources as MCP tools on `/mcp` and as REST calls
//! on `/api/resource/:code`.
//!
//! # Environment Variables
//!
//! - `MYCELIA_CONFIG`: YAML configuration path (default: `mycelia.yaml`)
//! - `PORT`: HTTP port, overriding the configured bind address
//! - `RUST_LOG`: tracing filter (default: `info,mycelia=debug`)
//!
//! # Usage
//!
//! ```bash
//! MYCELIA_CONFIG=gateway.yaml cargo run --bin server
//! ```

use mycelia::config::GatewayConfig;
use mycelia::server::{app_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mycelia=debug".into()),
        )
        .init();

    let config = GatewayConfig::from_env()?;
    let state = AppState::from_config(&config);
    let app = app_router(state.clone());

    tracing::info!("mycelia {} starting on {}", mycelia::VERSION, config.bind);
    tracing::info!("Principals: {}", config.principals.len());
    tracing::info!("Resources: {}", state.resources.codes().join(", "));
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health              liveness probe");
    tracing::info!("  POST /mcp                 MCP JSON-RPC (GET: event stream, DELETE: end session)");
    tracing::info!("  POST /api/resource/:code  direct resource call");

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("mycelia stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
