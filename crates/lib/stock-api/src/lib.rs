//! Auxiliary HTTP API for stock-mcp.
//!
//! Exposes the same tool dispatcher as the MCP surface over plain JSON
//! routes, plus cache inspection for operators.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::{Map, Value};
use stock_core::cache::CacheStats;
use stock_core::registry::ToolSpec;
use stock_core::router::ToolDispatcher;
use stock_schema::ToolResult;
use stock_schema::schema::{
    ERROR_INVALID_ARGUMENT,
    ERROR_NOT_FOUND,
    ERROR_UNKNOWN_TOOL,
    ERROR_UPSTREAM_SCHEMA,
    ERROR_UPSTREAM_UNAVAILABLE,
};
use tracing::info;

pub const DEFAULT_API_PORT: u16 = 8001;

/// Configuration for the auxiliary HTTP server.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub addr: SocketAddr,
    pub max_body_bytes: usize,
}

impl ApiServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            max_body_bytes: 64 * 1024,
        }
    }

    #[must_use]
    pub const fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_API_PORT)))
    }
}

/// HTTP API server wrapper.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub const fn new(dispatcher: Arc<ToolDispatcher>, config: ApiServerConfig) -> Self {
        Self {
            config,
            state: AppState { dispatcher },
        }
    }

    /// Runs the HTTP server until shutdown.
    ///
    /// # Errors
    /// Returns any listener or server error.
    pub async fn serve(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let app = build_router(self.state, self.config.max_body_bytes);

        info!("stock-api listening on {addr}");
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<ToolDispatcher>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse { error: self.message });
        (self.status, payload).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ClearedResponse {
    cleared: usize,
}

fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/tools/:name", axum::routing::post(call_tool))
        .route("/cache", get(cache_stats).delete(clear_cache))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_tools(State(state): State<AppState>) -> Json<Vec<&'static ToolSpec>> {
    Json(state.dispatcher.registry().iter().collect())
}

async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<ToolResult>), ApiError> {
    let arguments = parse_arguments(&body)?;
    let result = state.dispatcher.dispatch(&name, &arguments).await;
    Ok((status_for(&result), Json(result)))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.dispatcher.cache().stats().await)
}

async fn clear_cache(State(state): State<AppState>) -> Json<ClearedResponse> {
    let cleared = state.dispatcher.cache().clear().await;
    info!(cleared, "cache flushed over HTTP");
    Json(ClearedResponse { cleared })
}

/// An empty body is a call with no arguments.
fn parse_arguments(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(arguments)) => Ok(arguments),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(_) => Err(ApiError::bad_request("tool arguments must be a JSON object")),
        Err(err) => Err(ApiError::bad_request(format!("invalid JSON body: {err}"))),
    }
}

fn status_for(result: &ToolResult) -> StatusCode {
    let Some(error) = result.error() else {
        return StatusCode::OK;
    };
    match error.code.as_str() {
        ERROR_INVALID_ARGUMENT => StatusCode::BAD_REQUEST,
        ERROR_UNKNOWN_TOOL | ERROR_NOT_FOUND => StatusCode::NOT_FOUND,
        ERROR_UPSTREAM_SCHEMA => StatusCode::BAD_GATEWAY,
        ERROR_UPSTREAM_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
