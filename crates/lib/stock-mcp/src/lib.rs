//! MCP server implementation for stock-mcp.
//!
//! This crate wires the tool dispatcher into rmcp tool handlers and exposes
//! the MCP-facing surface over stdio and streamable HTTP.

mod helpers;
mod tools;
pub mod server;

use std::sync::Arc;

use rmcp::{
    ErrorData,
    RoleServer,
    ServerHandler,
    handler::server::tool::{ToolCallContext, ToolRouter},
    service::RequestContext,
    tool,
    tool_router,
};
use rmcp::model::{
    CallToolRequestParams,
    CallToolResult,
    Content,
    JsonObject,
    ListToolsResult,
    PaginatedRequestParams,
    ServerCapabilities,
    ServerInfo,
};
use stock_core::router::ToolDispatcher;
use tracing::debug;

const SERVER_INSTRUCTIONS: &str = r"stock-mcp provides normalized financial market data for ticker symbols.

Tools:
- `ticker_info`: company profile and latest price.
- `financial_statement`: income, balance sheet and cash flow line items (`period` annual or quarterly).
- `market_data`: OHLCV bars for a `range` (1d..max) or an explicit `start`/`end` window, at an `interval`.
- `analyst_recommendations`, `price_targets`, `analyst_revisions`: analyst coverage.
- `corporate_actions`: dividends and splits, oldest first.
- `earnings_calendar`: next earnings dates, consensus estimates and dividend dates.
- `news`: recent articles mentioning a ticker, newest first (`limit` 1-50).
- `sector_top`: top companies, ETFs or mutual funds of a `sector` (no symbol; `category` companies, etfs or mutual-funds).

Notes:
- Symbols are case-insensitive and use the upstream form, e.g. `VOD.L`, `^GSPC`, `EURUSD=X`, `BRK-B`.
- Money is `{ amount, currency }` in major units; pence quotes are converted to pounds.
- Price bars are adjusted for splits and dividends when the upstream supplies an adjusted close.
- Fields the upstream did not supply are the string `unavailable`, never omitted or zero.
- Failures come back as a tool error with `code`, `message`, optional `field` and `retryable`.
  Retry only when `retryable` is true.
- Results are cached briefly; repeating a call is cheap.
- Use `help` and `list_tools` for argument details. `health` returns `ok`.";

/// MCP server wrapper around the tool dispatcher and tool routers.
#[derive(Clone)]
pub struct StockMcp {
    tool_router: ToolRouter<Self>,
    dispatcher: Arc<ToolDispatcher>,
}

impl StockMcp {
    /// Creates a new server owning the dispatcher.
    #[must_use]
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self::with_dispatcher(Arc::new(dispatcher))
    }

    /// Creates a new server using a shared dispatcher handle.
    #[must_use]
    pub fn with_dispatcher(dispatcher: Arc<ToolDispatcher>) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_context()
            + tools::data::data_router(dispatcher.registry());
        Self {
            tool_router,
            dispatcher,
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Runs a data tool by name and converts its result for the MCP wire.
    ///
    /// Unknown names and bad arguments come back as in-band tool errors.
    pub(crate) async fn dispatch_tool(
        &self,
        tool_name: &str,
        arguments: JsonObject,
    ) -> Result<CallToolResult, ErrorData> {
        debug!(tool = tool_name, "mcp tool call");
        let result = self.dispatcher.dispatch(tool_name, &arguments).await;
        helpers::call_result(result)
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl StockMcp {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

impl ServerHandler for StockMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        if self.tool_router.has_route(&request.name) {
            return self
                .tool_router
                .call(ToolCallContext::new(self, request, context))
                .await;
        }
        self.dispatch_tool(&request.name, request.arguments.unwrap_or_default())
            .await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(self.tool_router.list_all()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use stock_core::cache::{ResultCache, TtlPolicy};
    use stock_core::clock::{Clock, ManualClock};
    use stock_core::provider::memory::InMemoryProvider;
    use stock_core::provider::{ProviderAdapter, ProviderRecord};

    fn server(provider: InMemoryProvider) -> StockMcp {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let adapter = ProviderAdapter::new(Arc::new(provider), clock.clone());
        let cache = ResultCache::new(TtlPolicy::default(), clock.clone());
        StockMcp::new(ToolDispatcher::new(adapter, cache, clock))
    }

    fn arguments(value: Value) -> JsonObject {
        value.as_object().cloned().expect("arguments are an object")
    }

    fn body(result: &CallToolResult) -> Value {
        let text = result
            .content
            .first()
            .and_then(|content| content.as_text())
            .map(|text| text.text.clone())
            .expect("text content");
        serde_json::from_str(&text).expect("json content")
    }

    fn acme() -> InMemoryProvider {
        let profile = json!({ "name": "Acme Corp", "currency": "USD", "price": 12.5 });
        InMemoryProvider::new().with_record(
            "ACME",
            ProviderRecord::Profile(profile.as_object().cloned().expect("object")),
        )
    }

    #[test]
    fn every_registered_tool_is_routed() {
        let mcp = server(InMemoryProvider::new());
        for spec in mcp.dispatcher().registry().iter() {
            assert!(
                mcp.tool_router.has_route(spec.name),
                "missing MCP route for {}",
                spec.name
            );
        }
        for name in ["health", "help", "list_tools"] {
            assert!(mcp.tool_router.has_route(name), "missing MCP route for {name}");
        }
    }

    #[tokio::test]
    async fn success_carries_the_payload() {
        let mcp = server(acme());
        let result = mcp
            .dispatch_tool("ticker_info", arguments(json!({ "symbol": "acme" })))
            .await
            .expect("tool call");

        assert_ne!(result.is_error, Some(true));
        let payload = body(&result);
        assert_eq!(payload["symbol"], "ACME");
        assert_eq!(payload["price"], json!({ "amount": 12.5, "currency": "USD" }));
    }

    #[tokio::test]
    async fn failures_are_in_band_tool_errors() {
        let mcp = server(InMemoryProvider::new());
        let result = mcp
            .dispatch_tool(
                "market_data",
                arguments(json!({ "symbol": "ACME", "interval": "7m" })),
            )
            .await
            .expect("tool call");

        assert_eq!(result.is_error, Some(true));
        let error = body(&result);
        assert_eq!(error["code"], "invalid_argument");
        assert_eq!(error["field"], "interval");
        assert_eq!(error["retryable"], false);
    }
}
