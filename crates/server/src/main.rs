//! mcp-osm server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use osmgeo_client::OverpassClient;
use osmgeo_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Arc::new(AppConfig::load().context("failed to load configuration")?);
    let client = OverpassClient::from_config(&config).context("failed to build Overpass client")?;

    let cache = Arc::clone(client.cache());
    cache.start();

    tracing::info!(endpoints = config.endpoints.len(), "Starting mcp-osm server on stdio transport");

    let handler = handler::McpOsmServer::new(client, config);
    let server = serve_server(handler, stdio()).await?;

    tokio::select! {
        result = server.waiting() => {
            let reason = result?;
            tracing::info!(?reason, "mcp-osm server stopped");
        }
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupt received, shutting down"),
    }

    cache.destroy().await;

    Ok(())
}
