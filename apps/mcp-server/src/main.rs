//! MCP server entry point, served over stdio.

use anyhow::Context;
use ferrum_mcp::{config::Config, logging, state::AppState, tools::FerrumTools};
use rmcp::{transport::stdio, ServiceExt};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        vsac = %config.vsac.base_url,
        cache_capacity = ?config.cache.max_entries,
        "Starting ferrum MCP server"
    );

    let state = AppState::from_config(&config).context("Failed to initialize application state")?;
    let server = FerrumTools::new(Arc::new(state));

    let running = server
        .serve(stdio())
        .await
        .context("Failed to start MCP stdio transport")?;
    tracing::info!("Ready, waiting for requests on stdio");

    running.waiting().await?;
    tracing::info!("Server shutdown complete");
    Ok(())
}
