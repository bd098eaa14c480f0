use std::sync::Arc;

use stock_core::cache::ResultCache;
use stock_core::clock::{Clock, SystemClock};
use stock_core::errors::ProviderError;
use stock_core::provider::ProviderAdapter;
use stock_core::provider::yahoo::YahooProvider;
use stock_core::router::ToolDispatcher;

use crate::config::StockConfig;

pub fn build_dispatcher(config: &StockConfig) -> Result<ToolDispatcher, ProviderError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider = YahooProvider::new(config.yahoo.clone())?;
    let adapter = ProviderAdapter::new(Arc::new(provider), clock.clone())
        .with_retry(config.retry)
        .with_request_timeout(config.request_timeout);
    let cache = ResultCache::new(config.ttl.clone(), clock.clone());
    Ok(ToolDispatcher::new(adapter, cache, clock))
}
