use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::clock::Clock;
use crate::errors::ProviderError;
use crate::retry::RetryPolicy;

use super::{FetchRequest, MarketDataProvider, ProviderRecord};

/// Wraps a provider with the retry policy and a per-attempt timeout.
#[derive(Clone)]
pub struct ProviderAdapter {
    provider: Arc<dyn MarketDataProvider>,
    retry: RetryPolicy,
    request_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl ProviderAdapter {
    #[must_use]
    pub fn new(provider: Arc<dyn MarketDataProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
            clock,
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn provider_id(&self) -> &'static str {
        self.provider.id()
    }

    /// Fetches the raw record for a request, retrying transient failures.
    ///
    /// # Errors
    /// Returns `NotFound` and `Schema` failures immediately and `Unavailable`
    /// once the retry budget is exhausted. A timed out attempt counts as
    /// `Unavailable`.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<ProviderRecord, ProviderError> {
        let provider = self.provider.id();
        self.retry
            .run(self.clock.as_ref(), |attempt| async move {
                debug!(
                    provider,
                    attempt,
                    kind = %request.kind(),
                    subject = request.subject(),
                    "fetching from provider"
                );
                tokio::time::timeout(self.request_timeout, self.provider.fetch(request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(ProviderError::Unavailable(format!(
                            "{provider} did not respond within {:?}",
                            self.request_timeout
                        )))
                    })
            })
            .await
    }
}
