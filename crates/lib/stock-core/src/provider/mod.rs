//! Market data provider boundary.
//!
//! A provider exposes one operation per data kind and returns raw,
//! provider-shaped records. [`ProviderRecord`] tags each record with its kind
//! so the normalizer can pick the matching mapping; raw shapes never travel
//! past the normalizer.

mod adapter;
pub mod memory;
pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use stock_schema::schema::{DataKind, SectorCategory, StatementPeriod};

use crate::errors::ProviderError;

pub use adapter::ProviderAdapter;

/// Provider-shaped JSON object.
pub type RawObject = Map<String, Value>;

/// Provider-shaped table: shared metadata plus one object per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    pub meta: RawObject,
    pub rows: Vec<RawObject>,
}

impl RawSeries {
    #[must_use]
    pub const fn new(meta: RawObject, rows: Vec<RawObject>) -> Self {
        Self { meta, rows }
    }
}

/// Raw record returned by a provider, tagged by data kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderRecord {
    Profile(RawObject),
    Statement(RawSeries),
    History(RawSeries),
    Recommendations(Vec<RawObject>),
    PriceTargets(RawObject),
    Revisions(Vec<RawObject>),
    CorporateActions(RawSeries),
    Calendar(RawObject),
    News(Vec<RawObject>),
    Sector(RawObject),
}

impl ProviderRecord {
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::Profile(_) => DataKind::Profile,
            Self::Statement(_) => DataKind::Statement,
            Self::History(_) => DataKind::History,
            Self::Recommendations(_) => DataKind::Recommendations,
            Self::PriceTargets(_) => DataKind::PriceTargets,
            Self::Revisions(_) => DataKind::Revisions,
            Self::CorporateActions(_) => DataKind::CorporateActions,
            Self::Calendar(_) => DataKind::Calendar,
            Self::News(_) => DataKind::News,
            Self::Sector(_) => DataKind::SectorTop,
        }
    }
}

/// Time window for price history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HistoryWindow {
    /// Provider range keyword such as `5y` or `ytd`.
    Range(String),
    /// Inclusive calendar dates.
    Dates { start: NaiveDate, end: NaiveDate },
}

/// Typed, canonical request for one kind of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    Profile { symbol: String },
    Statement { symbol: String, period: StatementPeriod },
    History { symbol: String, window: HistoryWindow, interval: String },
    Recommendations { symbol: String },
    PriceTargets { symbol: String },
    Revisions { symbol: String, limit: usize },
    CorporateActions { symbol: String },
    Calendar { symbol: String },
    News { symbol: String, limit: usize },
    SectorTop { sector: String, category: SectorCategory },
}

impl FetchRequest {
    #[must_use]
    pub const fn kind(&self) -> DataKind {
        match self {
            Self::Profile { .. } => DataKind::Profile,
            Self::Statement { .. } => DataKind::Statement,
            Self::History { .. } => DataKind::History,
            Self::Recommendations { .. } => DataKind::Recommendations,
            Self::PriceTargets { .. } => DataKind::PriceTargets,
            Self::Revisions { .. } => DataKind::Revisions,
            Self::CorporateActions { .. } => DataKind::CorporateActions,
            Self::Calendar { .. } => DataKind::Calendar,
            Self::News { .. } => DataKind::News,
            Self::SectorTop { .. } => DataKind::SectorTop,
        }
    }

    /// The ticker symbol, or the sector key for sector requests.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::Profile { symbol }
            | Self::Statement { symbol, .. }
            | Self::History { symbol, .. }
            | Self::Recommendations { symbol }
            | Self::PriceTargets { symbol }
            | Self::Revisions { symbol, .. }
            | Self::CorporateActions { symbol }
            | Self::Calendar { symbol }
            | Self::News { symbol, .. } => symbol,
            Self::SectorTop { sector, .. } => sector,
        }
    }
}

/// Trait for market data sources.
///
/// Each operation performs one (or a small bounded number of) upstream calls
/// and either returns provider-shaped data or fails with a typed
/// [`ProviderError`]. Retries and timeouts are applied by
/// [`ProviderAdapter`], not by implementations.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Stable identifier used in logs, e.g. `"YAHOO"`.
    fn id(&self) -> &'static str;

    async fn profile(&self, symbol: &str) -> Result<RawObject, ProviderError>;

    async fn statements(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<RawSeries, ProviderError>;

    async fn history(
        &self,
        symbol: &str,
        window: &HistoryWindow,
        interval: &str,
    ) -> Result<RawSeries, ProviderError>;

    async fn recommendations(&self, symbol: &str) -> Result<Vec<RawObject>, ProviderError>;

    async fn price_targets(&self, symbol: &str) -> Result<RawObject, ProviderError>;

    async fn revisions(&self, symbol: &str) -> Result<Vec<RawObject>, ProviderError>;

    async fn corporate_actions(&self, symbol: &str) -> Result<RawSeries, ProviderError>;

    async fn calendar(&self, symbol: &str) -> Result<RawObject, ProviderError>;

    /// Recent articles for a symbol; an empty list is a valid answer.
    async fn news(&self, symbol: &str) -> Result<Vec<RawObject>, ProviderError>;

    /// Overview of one sector including its top holdings lists.
    async fn sector(&self, sector: &str) -> Result<RawObject, ProviderError>;

    /// Dispatches a typed request to the matching operation and tags the result.
    async fn fetch(&self, request: &FetchRequest) -> Result<ProviderRecord, ProviderError> {
        match request {
            FetchRequest::Profile { symbol } => {
                self.profile(symbol).await.map(ProviderRecord::Profile)
            }
            FetchRequest::Statement { symbol, period } => self
                .statements(symbol, *period)
                .await
                .map(ProviderRecord::Statement),
            FetchRequest::History {
                symbol,
                window,
                interval,
            } => self
                .history(symbol, window, interval)
                .await
                .map(ProviderRecord::History),
            FetchRequest::Recommendations { symbol } => self
                .recommendations(symbol)
                .await
                .map(ProviderRecord::Recommendations),
            FetchRequest::PriceTargets { symbol } => self
                .price_targets(symbol)
                .await
                .map(ProviderRecord::PriceTargets),
            FetchRequest::Revisions { symbol, .. } => {
                self.revisions(symbol).await.map(ProviderRecord::Revisions)
            }
            FetchRequest::CorporateActions { symbol } => self
                .corporate_actions(symbol)
                .await
                .map(ProviderRecord::CorporateActions),
            FetchRequest::Calendar { symbol } => {
                self.calendar(symbol).await.map(ProviderRecord::Calendar)
            }
            FetchRequest::News { symbol, .. } => {
                self.news(symbol).await.map(ProviderRecord::News)
            }
            FetchRequest::SectorTop { sector, .. } => {
                self.sector(sector).await.map(ProviderRecord::Sector)
            }
        }
    }
}
