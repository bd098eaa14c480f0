//! Yahoo Finance provider.
//!
//! Profile, analyst and calendar data come from the `quoteSummary` endpoint
//! and statements from `fundamentals-timeseries`; both, like the sector
//! endpoint, require a session cookie and crumb. Price history, dividend and
//! split events come from the unauthenticated `chart` endpoint and news from
//! `search`.

mod chart;
mod discovery;
mod summary;
mod timeseries;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use stock_schema::schema::StatementPeriod;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::errors::ProviderError;

use super::{HistoryWindow, MarketDataProvider, RawObject, RawSeries};

pub const DEFAULT_QUERY_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_COOKIE_URL: &str = "https://fc.yahoo.com";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// A rejected crumb is refreshed once per call before giving up.
const AUTH_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YahooConfig {
    /// Base URL for the `query1` API host.
    pub query_url: String,
    /// URL that issues the session cookie used to obtain a crumb.
    pub cookie_url: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            query_url: DEFAULT_QUERY_URL.to_string(),
            cookie_url: DEFAULT_COOKIE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Crumb {
    cookie: String,
    value: String,
}

/// Response envelope shared by `quoteSummary`, `chart` and `timeseries`: one
/// named section holding either a result list or an error.
type Envelope = HashMap<String, Section>;

#[derive(Debug, Deserialize)]
struct Section {
    #[serde(default)]
    result: Option<Vec<RawObject>>,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl Section {
    fn into_first(self, symbol: &str) -> Result<RawObject, ProviderError> {
        self.into_results(symbol)?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(format!("symbol not found: {symbol}")))
    }

    fn into_results(self, symbol: &str) -> Result<Vec<RawObject>, ProviderError> {
        if let Some(error) = self.error {
            return Err(error.into_provider_error(symbol));
        }
        match self.result {
            Some(items) if !items.is_empty() => Ok(items),
            _ => Err(ProviderError::NotFound(format!("symbol not found: {symbol}"))),
        }
    }
}

impl UpstreamError {
    fn into_provider_error(self, symbol: &str) -> ProviderError {
        let description = self
            .description
            .unwrap_or_else(|| "no description".to_string());
        match self.code.as_deref() {
            Some("Not Found" | "Bad Request") | None => {
                ProviderError::NotFound(format!("{symbol}: {description}"))
            }
            Some(code) => ProviderError::Unavailable(format!("{code}: {description}")),
        }
    }
}

pub struct YahooProvider {
    client: Client,
    config: YahooConfig,
    crumb: RwLock<Option<Crumb>>,
}

impl YahooProvider {
    /// # Errors
    /// Returns `Unavailable` when the HTTP client cannot be constructed.
    pub fn new(config: YahooConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| ProviderError::Unavailable(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            config,
            crumb: RwLock::new(None),
        })
    }

    async fn crumb(&self) -> Result<Crumb, ProviderError> {
        if let Some(crumb) = self.crumb.read().await.as_ref() {
            return Ok(crumb.clone());
        }
        let mut slot = self.crumb.write().await;
        if let Some(crumb) = slot.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.fetch_crumb().await?;
        *slot = Some(crumb.clone());
        Ok(crumb)
    }

    async fn fetch_crumb(&self) -> Result<Crumb, ProviderError> {
        let response = self
            .client
            .get(&self.config.cookie_url)
            .send()
            .await
            .map_err(transport)?;
        let cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .collect::<Vec<_>>()
            .join("; ");
        if cookie.is_empty() {
            return Err(ProviderError::Unavailable(
                "yahoo did not issue a session cookie".to_string(),
            ));
        }

        let response = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.config.query_url))
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!(
                "crumb request failed with {status}"
            )));
        }
        let value = response.text().await.map_err(transport)?.trim().to_string();
        if value.is_empty() || value.contains('<') {
            return Err(ProviderError::Unavailable(
                "yahoo returned an invalid crumb".to_string(),
            ));
        }

        debug!("obtained yahoo session crumb");
        Ok(Crumb { cookie, value })
    }

    /// GET with the session cookie and crumb, refreshing a rejected crumb.
    async fn authenticated<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
        subject: &str,
    ) -> Result<T, ProviderError> {
        for _ in 0..AUTH_ATTEMPTS {
            let crumb = self.crumb().await?;
            let response = self
                .client
                .get(url)
                .query(params)
                .query(&[("crumb", crumb.value.as_str())])
                .header(header::COOKIE, &crumb.cookie)
                .send()
                .await
                .map_err(transport)?;
            if response.status() == StatusCode::UNAUTHORIZED {
                warn!(subject, "yahoo rejected the session crumb; refreshing");
                *self.crumb.write().await = None;
                continue;
            }
            return read_json(response, subject).await;
        }
        Err(ProviderError::Unavailable(
            "yahoo rejected the session crumb".to_string(),
        ))
    }

    async fn quote_summary(
        &self,
        symbol: &str,
        modules: &[&str],
    ) -> Result<RawObject, ProviderError> {
        let url = format!("{}/v10/finance/quoteSummary/{symbol}", self.config.query_url);
        let params = [("modules", modules.join(","))];
        let envelope = self.authenticated(&url, &params, symbol).await?;
        section(envelope, "quoteSummary", symbol)
    }

    async fn chart(
        &self,
        symbol: &str,
        params: &[(&str, String)],
    ) -> Result<RawObject, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v8/finance/chart/{symbol}", self.config.query_url))
            .query(params)
            .send()
            .await
            .map_err(transport)?;
        section(read_json(response, symbol).await?, "chart", symbol)
    }
}

fn transport(err: reqwest::Error) -> ProviderError {
    ProviderError::Unavailable(format!("request to yahoo failed: {err}"))
}

async fn read_json<T: DeserializeOwned>(response: Response, symbol: &str) -> Result<T, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|err| {
            if err.is_decode() {
                ProviderError::Schema(format!("failed to decode yahoo response: {err}"))
            } else {
                transport(err)
            }
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, symbol, &body))
}

fn status_error(status: StatusCode, symbol: &str, body: &str) -> ProviderError {
    let description = serde_json::from_str::<Envelope>(body)
        .ok()
        .and_then(|envelope| {
            envelope
                .into_values()
                .find_map(|section| section.error.and_then(|error| error.description))
        })
        .unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::REQUEST_TIMEOUT
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN => {
            ProviderError::Unavailable(format!("yahoo returned {status}: {description}"))
        }
        status if status.is_server_error() => {
            ProviderError::Unavailable(format!("yahoo returned {status}: {description}"))
        }
        _ => ProviderError::NotFound(format!("{symbol}: {description}")),
    }
}

fn take_section(envelope: &mut Envelope, name: &str) -> Result<Section, ProviderError> {
    envelope
        .remove(name)
        .ok_or_else(|| ProviderError::Schema(format!("yahoo response has no `{name}` section")))
}

fn section(mut envelope: Envelope, name: &str, symbol: &str) -> Result<RawObject, ProviderError> {
    take_section(&mut envelope, name)?.into_first(symbol)
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        "YAHOO"
    }

    async fn profile(&self, symbol: &str) -> Result<RawObject, ProviderError> {
        let result = self.quote_summary(symbol, summary::PROFILE_MODULES).await?;
        Ok(summary::merged(&result, summary::PROFILE_MODULES))
    }

    async fn statements(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<RawSeries, ProviderError> {
        let url = format!(
            "{}/ws/fundamentals-timeseries/v1/finance/timeseries/{symbol}",
            self.config.query_url
        );
        let params = timeseries::statement_params(symbol, period, Utc::now().timestamp());
        let mut envelope: Envelope = self.authenticated(&url, &params, symbol).await?;
        let results = take_section(&mut envelope, "timeseries")?.into_results(symbol)?;
        timeseries::statement_series(&results, period)
    }

    async fn history(
        &self,
        symbol: &str,
        window: &HistoryWindow,
        interval: &str,
    ) -> Result<RawSeries, ProviderError> {
        let result = self.chart(symbol, &chart::window_params(window, interval)).await?;
        Ok(chart::price_series(&result))
    }

    async fn recommendations(&self, symbol: &str) -> Result<Vec<RawObject>, ProviderError> {
        let result = self
            .quote_summary(symbol, &[summary::RECOMMENDATION_MODULE])
            .await?;
        summary::module_rows(&result, summary::RECOMMENDATION_MODULE, "trend")
    }

    async fn price_targets(&self, symbol: &str) -> Result<RawObject, ProviderError> {
        let result = self
            .quote_summary(symbol, &[summary::FINANCIAL_DATA_MODULE])
            .await?;
        summary::module_object(&result, summary::FINANCIAL_DATA_MODULE)
    }

    async fn revisions(&self, symbol: &str) -> Result<Vec<RawObject>, ProviderError> {
        let result = self
            .quote_summary(symbol, &[summary::REVISION_MODULE])
            .await?;
        summary::module_rows(&result, summary::REVISION_MODULE, "history")
    }

    async fn corporate_actions(&self, symbol: &str) -> Result<RawSeries, ProviderError> {
        let result = self.chart(symbol, &chart::event_params()).await?;
        Ok(chart::action_series(&result))
    }

    async fn calendar(&self, symbol: &str) -> Result<RawObject, ProviderError> {
        let result = self
            .quote_summary(symbol, &[summary::CALENDAR_MODULE])
            .await?;
        summary::module_object(&result, summary::CALENDAR_MODULE)
    }

    async fn news(&self, symbol: &str) -> Result<Vec<RawObject>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/finance/search", self.config.query_url))
            .query(&discovery::news_params(symbol))
            .send()
            .await
            .map_err(transport)?;
        let body: RawObject = read_json(response, symbol).await?;
        discovery::news_rows(&body)
    }

    async fn sector(&self, sector: &str) -> Result<RawObject, ProviderError> {
        let url = format!("{}/v1/finance/sectors/{sector}", self.config.query_url);
        let params = [
            ("formatted", "true".to_string()),
            ("withReturns", "false".to_string()),
        ];
        let body: RawObject = self.authenticated(&url, &params, sector).await?;
        discovery::sector_overview(body, sector)
    }
}
