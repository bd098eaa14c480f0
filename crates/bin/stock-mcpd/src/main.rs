//! Daemon entry point for the stock MCP server.
//!
//! Loads configuration from the command line and environment, builds the tool
//! dispatcher over the Yahoo Finance provider, and serves MCP over streamable
//! HTTP (and optionally stdio) next to the auxiliary HTTP API.

mod config;
mod dispatcher;

use std::sync::Arc;

use stock_api::{ApiServer, ApiServerConfig};
use stock_mcp::server::{McpHttpServerConfig, serve_stdio, serve_streamable_http};
use tokio::task::JoinSet;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::StockConfig;
use crate::dispatcher::build_dispatcher;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // stdout belongs to the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = StockConfig::from_args()?;
    let dispatcher = Arc::new(build_dispatcher(&config)?);
    let sweeper = dispatcher.cache().spawn_sweeper(config.sweep_interval);
    info!(provider = dispatcher.provider_id(), "stock-mcpd starting");

    let mut servers: JoinSet<Result<(), BoxError>> = JoinSet::new();
    if config.mcp_serve {
        let mcp_config = McpHttpServerConfig::new(config.mcp_addr)
            .with_stateful_mode(config.mcp_stateful);
        servers.spawn(serve_streamable_http(dispatcher.clone(), mcp_config));
    }
    if config.api_serve {
        let api_config = ApiServerConfig::new(config.api_addr)
            .with_max_body_bytes(config.api_max_body_bytes);
        servers.spawn(ApiServer::new(dispatcher.clone(), api_config).serve());
    }
    if config.enable_stdio {
        servers.spawn(serve_stdio(dispatcher.clone()));
    }

    // The first server to stop (or Ctrl+C) shuts the daemon down.
    let outcome = tokio::select! {
        joined = servers.join_next() => match joined {
            Some(Ok(result)) => result,
            Some(Err(err)) => Err(err.into()),
            None => Ok(()),
        },
        signal = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            signal.map_err(BoxError::from)
        }
    };

    sweeper.abort();
    servers.abort_all();
    if let Err(err) = &outcome {
        error!("stock-mcpd stopped: {err}");
    }
    outcome
}
