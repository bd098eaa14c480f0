use std::fmt;

use serde::{Deserialize, Serialize};

pub const TOOL_TICKER_INFO: &str = "ticker_info";
pub const TOOL_FINANCIAL_STATEMENT: &str = "financial_statement";
pub const TOOL_MARKET_DATA: &str = "market_data";
pub const TOOL_ANALYST_RECOMMENDATIONS: &str = "analyst_recommendations";
pub const TOOL_PRICE_TARGETS: &str = "price_targets";
pub const TOOL_ANALYST_REVISIONS: &str = "analyst_revisions";
pub const TOOL_CORPORATE_ACTIONS: &str = "corporate_actions";
pub const TOOL_EARNINGS_CALENDAR: &str = "earnings_calendar";
pub const TOOL_NEWS: &str = "news";
pub const TOOL_SECTOR_TOP: &str = "sector_top";

pub const ARG_SYMBOL: &str = "symbol";
pub const ARG_PERIOD: &str = "period";
pub const ARG_RANGE: &str = "range";
pub const ARG_INTERVAL: &str = "interval";
pub const ARG_START: &str = "start";
pub const ARG_END: &str = "end";
pub const ARG_LIMIT: &str = "limit";
pub const ARG_SECTOR: &str = "sector";
pub const ARG_CATEGORY: &str = "category";

/// Marker emitted in place of a field the upstream did not supply.
pub const UNAVAILABLE: &str = "unavailable";

pub const ERROR_INVALID_ARGUMENT: &str = "invalid_argument";
pub const ERROR_UNKNOWN_TOOL: &str = "unknown_tool";
pub const ERROR_NOT_FOUND: &str = "not_found";
pub const ERROR_UPSTREAM_UNAVAILABLE: &str = "upstream_unavailable";
pub const ERROR_UPSTREAM_SCHEMA: &str = "upstream_schema";

pub const PERIOD_ANNUAL: &str = "annual";
pub const PERIOD_QUARTERLY: &str = "quarterly";

pub const HISTORY_RANGES: &[&str] = &[
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];
pub const HISTORY_INTERVALS: &[&str] = &[
    "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
];
pub const DEFAULT_HISTORY_RANGE: &str = "5y";
pub const DEFAULT_HISTORY_INTERVAL: &str = "1d";

/// Upstream sector keys accepted by `sector_top`.
pub const SECTORS: &[&str] = &[
    "basic-materials",
    "communication-services",
    "consumer-cyclical",
    "consumer-defensive",
    "energy",
    "financial-services",
    "healthcare",
    "industrials",
    "real-estate",
    "technology",
    "utilities",
];
pub const SECTOR_CATEGORIES: &[&str] = &["companies", "etfs", "mutual-funds"];

/// Line items reported for every statement period, in output order.
pub const STATEMENT_LINE_ITEMS: &[&str] = &[
    // income statement
    "total_revenue",
    "cost_of_revenue",
    "gross_profit",
    "research_development",
    "operating_income",
    "interest_expense",
    "income_before_tax",
    "income_tax_expense",
    "net_income",
    "ebit",
    // balance sheet
    "cash",
    "short_term_investments",
    "total_current_assets",
    "total_assets",
    "total_current_liabilities",
    "long_term_debt",
    "total_liabilities",
    "stockholders_equity",
    // cash flow
    "operating_cash_flow",
    "capital_expenditures",
    "investing_cash_flow",
    "financing_cash_flow",
    "dividends_paid",
    "free_cash_flow",
];

/// Kind of market data a tool retrieves; drives provider dispatch and cache TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Profile,
    Statement,
    History,
    Recommendations,
    PriceTargets,
    Revisions,
    CorporateActions,
    Calendar,
    News,
    SectorTop,
}

impl DataKind {
    pub const ALL: [Self; 10] = [
        Self::Profile,
        Self::Statement,
        Self::History,
        Self::Recommendations,
        Self::PriceTargets,
        Self::Revisions,
        Self::CorporateActions,
        Self::Calendar,
        Self::News,
        Self::SectorTop,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Statement => "statement",
            Self::History => "history",
            Self::Recommendations => "recommendations",
            Self::PriceTargets => "price_targets",
            Self::Revisions => "revisions",
            Self::CorporateActions => "corporate_actions",
            Self::Calendar => "calendar",
            Self::News => "news",
            Self::SectorTop => "sector_top",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting period of a financial statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementPeriod {
    Annual,
    Quarterly,
}

impl StatementPeriod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Annual => PERIOD_ANNUAL,
            Self::Quarterly => PERIOD_QUARTERLY,
        }
    }

    /// Parses a period name, accepting common aliases.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "annual" | "yearly" | "year" | "fy" => Some(Self::Annual),
            "quarterly" | "quarter" | "q" => Some(Self::Quarterly),
            _ => None,
        }
    }
}

impl fmt::Display for StatementPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which top-holdings list of a sector to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectorCategory {
    Companies,
    Etfs,
    MutualFunds,
}

impl SectorCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Companies => "companies",
            Self::Etfs => "etfs",
            Self::MutualFunds => "mutual-funds",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "companies" | "company" | "stocks" => Some(Self::Companies),
            "etfs" | "etf" => Some(Self::Etfs),
            "mutual-funds" | "mutual-fund" | "funds" => Some(Self::MutualFunds),
            _ => None,
        }
    }
}

impl fmt::Display for SectorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
