//! In-memory provider serving preloaded records.
//!
//! Used by tests and offline runs. Failures can be scripted per
//! (kind, symbol) and are returned before the stored record; every call is
//! counted per data kind. Statements are stored per reporting period.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use stock_schema::schema::{DataKind, StatementPeriod};

use crate::errors::ProviderError;

use super::{HistoryWindow, MarketDataProvider, ProviderRecord, RawObject, RawSeries};

type FailureKey = (DataKind, String);
type RecordKey = (DataKind, String, Option<StatementPeriod>);

#[derive(Default)]
struct MemoryState {
    records: HashMap<RecordKey, ProviderRecord>,
    failures: HashMap<FailureKey, VecDeque<ProviderError>>,
    calls: HashMap<DataKind, usize>,
}

#[derive(Default)]
pub struct InMemoryProvider {
    state: Mutex<MemoryState>,
    latency: Option<Duration>,
}

impl InMemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record under its own kind for the given symbol.
    ///
    /// Statement records are served for the annual period; use
    /// [`Self::with_statement`] for quarterly data.
    #[must_use]
    pub fn with_record(self, symbol: &str, record: ProviderRecord) -> Self {
        let period = (record.kind() == DataKind::Statement).then_some(StatementPeriod::Annual);
        self.store(symbol, period, record)
    }

    #[must_use]
    pub fn with_statement(self, symbol: &str, period: StatementPeriod, series: RawSeries) -> Self {
        self.store(symbol, Some(period), ProviderRecord::Statement(series))
    }

    fn store(
        mut self,
        subject: &str,
        period: Option<StatementPeriod>,
        record: ProviderRecord,
    ) -> Self {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state
            .records
            .insert((record.kind(), subject.to_string(), period), record);
        self
    }

    /// Queues failures returned, in order, before the stored record is served.
    #[must_use]
    pub fn with_failures(
        mut self,
        kind: DataKind,
        symbol: &str,
        failures: Vec<ProviderError>,
    ) -> Self {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state
            .failures
            .entry((kind, symbol.to_string()))
            .or_default()
            .extend(failures);
        self
    }

    /// Delays every call, simulating upstream latency.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of upstream calls received for a kind.
    pub fn calls(&self, kind: DataKind) -> usize {
        self.lock().calls.get(&kind).copied().unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn serve(&self, kind: DataKind, symbol: &str) -> Result<ProviderRecord, ProviderError> {
        self.serve_period(kind, symbol, None).await
    }

    async fn serve_period(
        &self,
        kind: DataKind,
        symbol: &str,
        period: Option<StatementPeriod>,
    ) -> Result<ProviderRecord, ProviderError> {
        let scripted = {
            let mut state = self.lock();
            *state.calls.entry(kind).or_default() += 1;
            state
                .failures
                .get_mut(&(kind, symbol.to_string()))
                .and_then(VecDeque::pop_front)
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = scripted {
            return Err(err);
        }

        let subject = if kind == DataKind::SectorTop { "sector" } else { "symbol" };
        self.lock()
            .records
            .get(&(kind, symbol.to_string(), period))
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("{subject} not found: {symbol}")))
    }
}

fn mismatch(expected: DataKind, record: &ProviderRecord) -> ProviderError {
    ProviderError::Schema(format!(
        "stored {} record where {expected} was expected",
        record.kind()
    ))
}

#[async_trait]
impl MarketDataProvider for InMemoryProvider {
    fn id(&self) -> &'static str {
        "MEMORY"
    }

    async fn profile(&self, symbol: &str) -> Result<RawObject, ProviderError> {
        match self.serve(DataKind::Profile, symbol).await? {
            ProviderRecord::Profile(raw) => Ok(raw),
            other => Err(mismatch(DataKind::Profile, &other)),
        }
    }

    async fn statements(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<RawSeries, ProviderError> {
        match self
            .serve_period(DataKind::Statement, symbol, Some(period))
            .await?
        {
            ProviderRecord::Statement(series) => Ok(series),
            other => Err(mismatch(DataKind::Statement, &other)),
        }
    }

    async fn history(
        &self,
        symbol: &str,
        _window: &HistoryWindow,
        _interval: &str,
    ) -> Result<RawSeries, ProviderError> {
        match self.serve(DataKind::History, symbol).await? {
            ProviderRecord::History(series) => Ok(series),
            other => Err(mismatch(DataKind::History, &other)),
        }
    }

    async fn recommendations(&self, symbol: &str) -> Result<Vec<RawObject>, ProviderError> {
        match self.serve(DataKind::Recommendations, symbol).await? {
            ProviderRecord::Recommendations(rows) => Ok(rows),
            other => Err(mismatch(DataKind::Recommendations, &other)),
        }
    }

    async fn price_targets(&self, symbol: &str) -> Result<RawObject, ProviderError> {
        match self.serve(DataKind::PriceTargets, symbol).await? {
            ProviderRecord::PriceTargets(raw) => Ok(raw),
            other => Err(mismatch(DataKind::PriceTargets, &other)),
        }
    }

    async fn revisions(&self, symbol: &str) -> Result<Vec<RawObject>, ProviderError> {
        match self.serve(DataKind::Revisions, symbol).await? {
            ProviderRecord::Revisions(rows) => Ok(rows),
            other => Err(mismatch(DataKind::Revisions, &other)),
        }
    }

    async fn corporate_actions(&self, symbol: &str) -> Result<RawSeries, ProviderError> {
        match self.serve(DataKind::CorporateActions, symbol).await? {
            ProviderRecord::CorporateActions(series) => Ok(series),
            other => Err(mismatch(DataKind::CorporateActions, &other)),
        }
    }

    async fn calendar(&self, symbol: &str) -> Result<RawObject, ProviderError> {
        match self.serve(DataKind::Calendar, symbol).await? {
            ProviderRecord::Calendar(raw) => Ok(raw),
            other => Err(mismatch(DataKind::Calendar, &other)),
        }
    }

    async fn news(&self, symbol: &str) -> Result<Vec<RawObject>, ProviderError> {
        match self.serve(DataKind::News, symbol).await? {
            ProviderRecord::News(rows) => Ok(rows),
            other => Err(mismatch(DataKind::News, &other)),
        }
    }

    async fn sector(&self, sector: &str) -> Result<RawObject, ProviderError> {
        match self.serve(DataKind::SectorTop, sector).await? {
            ProviderRecord::Sector(raw) => Ok(raw),
            other => Err(mismatch(DataKind::SectorTop, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn series(period_end: &str) -> RawSeries {
        let row = json!({ "asOfDate": period_end, "TotalRevenue": 1 });
        RawSeries::new(
            RawObject::new(),
            vec![row.as_object().cloned().expect("row is an object")],
        )
    }

    #[tokio::test]
    async fn statements_are_served_per_period() {
        let provider = InMemoryProvider::new()
            .with_record("ACME", ProviderRecord::Statement(series("2023-12-31")))
            .with_statement("ACME", StatementPeriod::Quarterly, series("2024-06-30"));

        let annual = provider
            .statements("ACME", StatementPeriod::Annual)
            .await
            .expect("annual statements");
        let quarterly = provider
            .statements("ACME", StatementPeriod::Quarterly)
            .await
            .expect("quarterly statements");

        assert_eq!(annual, series("2023-12-31"));
        assert_eq!(quarterly, series("2024-06-30"));
        assert_eq!(provider.calls(DataKind::Statement), 2);
    }

    #[tokio::test]
    async fn missing_period_is_not_found() {
        let provider =
            InMemoryProvider::new().with_record("ACME", ProviderRecord::Statement(series("2023-12-31")));
        let err = provider
            .statements("ACME", StatementPeriod::Quarterly)
            .await
            .expect_err("no quarterly data");
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_sector_names_the_sector() {
        let err = InMemoryProvider::new()
            .sector("energy")
            .await
            .expect_err("no sector data");
        assert_eq!(err, ProviderError::NotFound("sector not found: energy".to_string()));
    }
}
