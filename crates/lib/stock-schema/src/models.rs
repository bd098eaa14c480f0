use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::schema::{SectorCategory, StatementPeriod, UNAVAILABLE};

/// A field value that the upstream may not have supplied.
///
/// `Unavailable` serializes as the string `"unavailable"` so gaps stay visible
/// to the caller instead of silently disappearing from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Available(T),
    Unavailable,
}

impl<T> Field<T> {
    #[must_use]
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Unavailable, Self::Available)
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        Self::from_option(value)
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Available(value) => value.serialize(serializer),
            Self::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

/// Monetary amount with an upper-case ISO-4217 currency code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    #[must_use]
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// Inbound tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolRequest {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolRequest {
    #[must_use]
    pub fn new(tool_name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Structured error returned in place of a payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub retryable: bool,
}

/// Outcome of a tool call. Exactly one of payload or error is carried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { payload: Value },
    Error { error: ErrorBody },
}

impl ToolResult {
    #[must_use]
    pub const fn success(payload: Value) -> Self {
        Self::Success { payload }
    }

    #[must_use]
    pub const fn failure(error: ErrorBody) -> Self {
        Self::Error { error }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Error { .. } => None,
        }
    }

    #[must_use]
    pub const fn error(&self) -> Option<&ErrorBody> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error } => Some(error),
        }
    }
}

/// Normalized `ticker_info` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TickerInfo {
    pub symbol: String,
    pub name: Field<String>,
    pub currency: Field<String>,
    pub price: Field<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employees: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_pe: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_pe: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifty_two_week_high: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifty_two_week_low: Option<Money>,
}

impl TickerInfo {
    #[must_use]
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: Field::Unavailable,
            currency: Field::Unavailable,
            price: Field::Unavailable,
            exchange: None,
            quote_type: None,
            sector: None,
            industry: None,
            country: None,
            website: None,
            summary: None,
            employees: None,
            market_cap: None,
            trailing_pe: None,
            forward_pe: None,
            dividend_yield: None,
            fifty_two_week_high: None,
            fifty_two_week_low: None,
        }
    }
}

/// Normalized `financial_statement` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinancialStatement {
    pub symbol: String,
    pub period: StatementPeriod,
    pub currency: Field<String>,
    pub statements: Vec<StatementEntry>,
}

/// One reporting period of a financial statement.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatementEntry {
    pub period_end: String,
    pub line_items: BTreeMap<String, Field<Decimal>>,
}

/// Normalized `market_data` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceHistory {
    pub symbol: String,
    pub currency: Field<String>,
    pub interval: String,
    pub bars: Vec<PriceBar>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceBar {
    pub timestamp: String,
    pub open: Field<Decimal>,
    pub high: Field<Decimal>,
    pub low: Field<Decimal>,
    pub close: Field<Decimal>,
    pub volume: Field<u64>,
}

/// Normalized `analyst_recommendations` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationTrend {
    pub symbol: String,
    pub trend: Vec<RecommendationPeriod>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationPeriod {
    pub period: String,
    pub strong_buy: Field<u32>,
    pub buy: Field<u32>,
    pub hold: Field<u32>,
    pub sell: Field<u32>,
    pub strong_sell: Field<u32>,
}

/// Normalized `price_targets` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceTargets {
    pub symbol: String,
    pub currency: Field<String>,
    pub current: Field<Money>,
    pub high: Field<Money>,
    pub low: Field<Money>,
    pub mean: Field<Money>,
    pub median: Field<Money>,
    pub analyst_count: Field<u32>,
}

/// Normalized `analyst_revisions` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalystRevisions {
    pub symbol: String,
    pub revisions: Vec<Revision>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Revision {
    pub date: String,
    pub firm: Field<String>,
    pub to_grade: Field<String>,
    pub from_grade: Field<String>,
    pub action: Field<String>,
}

/// Normalized `corporate_actions` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorporateActions {
    pub symbol: String,
    pub currency: Field<String>,
    pub actions: Vec<CorporateAction>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Dividend,
    Split,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorporateAction {
    pub date: String,
    pub kind: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Field<Money>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<Field<String>>,
}

/// Normalized `earnings_calendar` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EarningsCalendar {
    pub symbol: String,
    pub earnings_dates: Vec<String>,
    pub earnings_estimate: Estimate,
    pub revenue_estimate: Estimate,
    pub ex_dividend_date: Field<String>,
    pub dividend_date: Field<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Estimate {
    pub average: Field<Decimal>,
    pub low: Field<Decimal>,
    pub high: Field<Decimal>,
}

impl Estimate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.average.is_available() && !self.low.is_available() && !self.high.is_available()
    }
}

/// Normalized `news` payload, newest article first.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsFeed {
    pub symbol: String,
    pub articles: Vec<NewsArticle>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsArticle {
    pub title: String,
    pub publisher: Field<String>,
    pub link: Field<String>,
    pub published_at: Field<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_tickers: Vec<String>,
}

/// Normalized `sector_top` payload.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SectorTop {
    pub sector: String,
    pub category: SectorCategory,
    pub entries: Vec<SectorEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SectorEntry {
    pub symbol: String,
    pub name: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_weight: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn unavailable_field_serializes_as_marker() {
        let entry = StatementEntry {
            period_end: "2024-09-28".to_string(),
            line_items: BTreeMap::from([
                ("net_income".to_string(), Field::Available(dec!(12.5))),
                ("ebit".to_string(), Field::Unavailable),
            ]),
        };
        let value = serde_json::to_value(entry).expect("serialize entry");
        assert_eq!(
            value,
            json!({
                "period_end": "2024-09-28",
                "line_items": { "ebit": "unavailable", "net_income": 12.5 }
            })
        );
    }

    #[test]
    fn tool_result_is_tagged_by_status() {
        let ok = ToolResult::success(json!({ "symbol": "ACME" }));
        assert_eq!(
            serde_json::to_value(&ok).expect("serialize success"),
            json!({ "status": "success", "payload": { "symbol": "ACME" } })
        );

        let err = ToolResult::failure(ErrorBody {
            code: "not_found".to_string(),
            message: "symbol not found: ZZZZ".to_string(),
            field: None,
            retryable: false,
        });
        let value = serde_json::to_value(&err).expect("serialize error");
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "not_found");
        assert!(value.get("payload").is_none());
        assert!(value["error"].get("field").is_none());
    }

    #[test]
    fn ticker_info_omits_absent_profile_attributes() {
        let mut info = TickerInfo::new("ACME");
        info.name = Field::Available("Acme Corp".to_string());
        let value = serde_json::to_value(info).expect("serialize info");
        assert_eq!(
            value,
            json!({
                "symbol": "ACME",
                "name": "Acme Corp",
                "currency": "unavailable",
                "price": "unavailable"
            })
        );
    }
}
