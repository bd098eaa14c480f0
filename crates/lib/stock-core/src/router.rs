//! Tool dispatcher: validate, check the cache, fetch, normalize.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};
use stock_schema::{ToolRequest, ToolResult};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, ResultCache};
use crate::clock::Clock;
use crate::errors::{ProviderError, ToolError};
use crate::normalize::normalize;
use crate::provider::{FetchRequest, ProviderAdapter};
use crate::registry::ToolRegistry;

/// Routes tool calls through validation, the result cache and the provider.
///
/// Every failure is returned as a structured [`ToolResult`]; `dispatch` never
/// fails past its boundary.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    cache: ResultCache,
    adapter: Arc<ProviderAdapter>,
    clock: Arc<dyn Clock>,
}

impl ToolDispatcher {
    pub fn new(adapter: ProviderAdapter, cache: ResultCache, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: ToolRegistry::builtin(),
            cache,
            adapter: Arc::new(adapter),
            clock,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn cache(&self) -> &ResultCache {
        &self.cache
    }

    #[must_use]
    pub fn provider_id(&self) -> &'static str {
        self.adapter.provider_id()
    }

    pub async fn dispatch_request(&self, request: &ToolRequest) -> ToolResult {
        self.dispatch(&request.tool_name, &request.arguments).await
    }

    pub async fn dispatch(&self, tool_name: &str, arguments: &Map<String, Value>) -> ToolResult {
        let request_id = Uuid::new_v4();
        let span = info_span!("tool_call", %request_id, tool = tool_name);
        self.dispatch_inner(tool_name, arguments)
            .instrument(span)
            .await
    }

    async fn dispatch_inner(&self, tool_name: &str, arguments: &Map<String, Value>) -> ToolResult {
        let today = self.clock.now().date_naive();
        let call = match self.registry.resolve(tool_name, arguments, today) {
            Ok(call) => call,
            Err(err) => {
                info!(code = err.code(), "rejected tool call: {err}");
                return err.to_result();
            }
        };

        let key = CacheKey::new(call.spec.name, call.args.cache_fragment());
        let ttl = self.cache.policy().ttl_for(call.spec.kind);
        let adapter = self.adapter.clone();
        let request = call.request;

        let started = Instant::now();
        let result = self
            .cache
            .get_or_compute(key, ttl, move || fetch_and_normalize(adapter, request))
            .await;
        debug!(
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            success = result.is_success(),
            "tool call finished"
        );
        result
    }
}

async fn fetch_and_normalize(adapter: Arc<ProviderAdapter>, request: FetchRequest) -> ToolResult {
    let outcome = match adapter.fetch(&request).await {
        Ok(record) => normalize(&request, &record),
        Err(err) => Err(err),
    };
    match outcome {
        Ok(payload) => ToolResult::success(payload),
        Err(err) => {
            log_failure(&request, &err);
            ToolError::from(err).to_result()
        }
    }
}

fn log_failure(request: &FetchRequest, err: &ProviderError) {
    let kind = request.kind();
    let subject = request.subject();
    match err {
        ProviderError::Schema(_) => error!(%kind, subject, "upstream contract drift: {err}"),
        ProviderError::Unavailable(_) => warn!(%kind, subject, "upstream unavailable: {err}"),
        ProviderError::NotFound(_) => info!(%kind, subject, "{err}"),
    }
}
