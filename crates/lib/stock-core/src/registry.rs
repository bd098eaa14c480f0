//! Tool registry: the fixed tool table and argument validation.
//!
//! Validation turns loosely typed caller arguments into [`CanonicalArgs`]:
//! upper-cased symbols, lower-cased enums, ISO dates and filled-in defaults.
//! The canonical form doubles as the cache key, so equivalent requests share
//! one cache entry.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use stock_schema::schema::{
    ARG_CATEGORY,
    ARG_END,
    ARG_INTERVAL,
    ARG_LIMIT,
    ARG_PERIOD,
    ARG_RANGE,
    ARG_SECTOR,
    ARG_START,
    ARG_SYMBOL,
    DEFAULT_HISTORY_INTERVAL,
    DEFAULT_HISTORY_RANGE,
    DataKind,
    HISTORY_INTERVALS,
    HISTORY_RANGES,
    PERIOD_ANNUAL,
    SECTOR_CATEGORIES,
    SECTORS,
    SectorCategory,
    StatementPeriod,
    TOOL_ANALYST_RECOMMENDATIONS,
    TOOL_ANALYST_REVISIONS,
    TOOL_CORPORATE_ACTIONS,
    TOOL_EARNINGS_CALENDAR,
    TOOL_FINANCIAL_STATEMENT,
    TOOL_MARKET_DATA,
    TOOL_NEWS,
    TOOL_PRICE_TARGETS,
    TOOL_SECTOR_TOP,
    TOOL_TICKER_INFO,
};

use crate::errors::ToolError;
use crate::provider::{FetchRequest, HistoryWindow};

const MAX_SYMBOL_LEN: usize = 20;
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

/// Accepted value shape for one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArgKind {
    Symbol,
    Period,
    Choice { options: &'static [&'static str] },
    Date,
    Integer { min: i64, max: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArgSpec {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: ArgKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<&'static str>,
    pub description: &'static str,
}

/// Registered tool: stable name, data kind and argument schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub kind: DataKind,
    pub description: &'static str,
    pub args: &'static [ArgSpec],
}

const SYMBOL: ArgSpec = ArgSpec {
    name: ARG_SYMBOL,
    kind: ArgKind::Symbol,
    required: true,
    default: None,
    description: "Ticker symbol, e.g. AAPL, VOD.L, ^GSPC or EURUSD=X.",
};

const SYMBOL_ONLY: &[ArgSpec] = &[SYMBOL];

const STATEMENT_ARGS: &[ArgSpec] = &[
    SYMBOL,
    ArgSpec {
        name: ARG_PERIOD,
        kind: ArgKind::Period,
        required: false,
        default: Some(PERIOD_ANNUAL),
        description: "Reporting period: annual or quarterly.",
    },
];

const MARKET_DATA_ARGS: &[ArgSpec] = &[
    SYMBOL,
    ArgSpec {
        name: ARG_RANGE,
        kind: ArgKind::Choice {
            options: HISTORY_RANGES,
        },
        required: false,
        default: Some(DEFAULT_HISTORY_RANGE),
        description: "Lookback window; ignored when `start` is given.",
    },
    ArgSpec {
        name: ARG_INTERVAL,
        kind: ArgKind::Choice {
            options: HISTORY_INTERVALS,
        },
        required: false,
        default: Some(DEFAULT_HISTORY_INTERVAL),
        description: "Bar interval.",
    },
    ArgSpec {
        name: ARG_START,
        kind: ArgKind::Date,
        required: false,
        default: None,
        description: "First day (YYYY-MM-DD) of an explicit window.",
    },
    ArgSpec {
        name: ARG_END,
        kind: ArgKind::Date,
        required: false,
        default: None,
        description: "Last day (YYYY-MM-DD) of an explicit window; defaults to today.",
    },
];

const REVISION_ARGS: &[ArgSpec] = &[
    SYMBOL,
    ArgSpec {
        name: ARG_LIMIT,
        kind: ArgKind::Integer { min: 1, max: 500 },
        required: false,
        default: Some("50"),
        description: "Maximum number of revisions to return, newest first.",
    },
];

const NEWS_ARGS: &[ArgSpec] = &[
    SYMBOL,
    ArgSpec {
        name: ARG_LIMIT,
        kind: ArgKind::Integer { min: 1, max: 50 },
        required: false,
        default: Some("10"),
        description: "Maximum number of articles to return, newest first.",
    },
];

const SECTOR_ARGS: &[ArgSpec] = &[
    ArgSpec {
        name: ARG_SECTOR,
        kind: ArgKind::Choice { options: SECTORS },
        required: true,
        default: None,
        description: "Sector key, e.g. technology or real-estate.",
    },
    ArgSpec {
        name: ARG_CATEGORY,
        kind: ArgKind::Choice {
            options: SECTOR_CATEGORIES,
        },
        required: false,
        default: Some("companies"),
        description: "Which top list to report: companies, etfs or mutual-funds.",
    },
];

const BUILTIN_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: TOOL_TICKER_INFO,
        kind: DataKind::Profile,
        description: "Company profile and latest price for a ticker.",
        args: SYMBOL_ONLY,
    },
    ToolSpec {
        name: TOOL_FINANCIAL_STATEMENT,
        kind: DataKind::Statement,
        description: "Income statement, balance sheet and cash flow line items, newest period first.",
        args: STATEMENT_ARGS,
    },
    ToolSpec {
        name: TOOL_MARKET_DATA,
        kind: DataKind::History,
        description: "OHLCV price bars for a range or an explicit date window.",
        args: MARKET_DATA_ARGS,
    },
    ToolSpec {
        name: TOOL_ANALYST_RECOMMENDATIONS,
        kind: DataKind::Recommendations,
        description: "Monthly counts of analyst buy/hold/sell recommendations.",
        args: SYMBOL_ONLY,
    },
    ToolSpec {
        name: TOOL_PRICE_TARGETS,
        kind: DataKind::PriceTargets,
        description: "Analyst price targets (high, low, mean, median) and current price.",
        args: SYMBOL_ONLY,
    },
    ToolSpec {
        name: TOOL_ANALYST_REVISIONS,
        kind: DataKind::Revisions,
        description: "Analyst upgrades and downgrades, newest first.",
        args: REVISION_ARGS,
    },
    ToolSpec {
        name: TOOL_CORPORATE_ACTIONS,
        kind: DataKind::CorporateActions,
        description: "Dividend and stock split history, oldest first.",
        args: SYMBOL_ONLY,
    },
    ToolSpec {
        name: TOOL_EARNINGS_CALENDAR,
        kind: DataKind::Calendar,
        description: "Upcoming earnings dates, consensus estimates and dividend dates.",
        args: SYMBOL_ONLY,
    },
    ToolSpec {
        name: TOOL_NEWS,
        kind: DataKind::News,
        description: "Recent news articles mentioning a ticker, newest first.",
        args: NEWS_ARGS,
    },
    ToolSpec {
        name: TOOL_SECTOR_TOP,
        kind: DataKind::SectorTop,
        description: "Top companies, ETFs or mutual funds of a market sector.",
        args: SECTOR_ARGS,
    },
];

/// Validated arguments in canonical form, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalArgs(BTreeMap<&'static str, String>);

impl CanonicalArgs {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    fn require(&self, name: &'static str) -> Result<&str, ToolError> {
        self.get(name)
            .ok_or_else(|| ToolError::invalid_argument(name, "is required"))
    }

    /// Stable `name=value&…` rendering used in cache keys.
    #[must_use]
    pub fn cache_fragment(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A tool call that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    pub spec: &'static ToolSpec,
    pub args: CanonicalArgs,
    pub request: FetchRequest,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolRegistry {
    tools: &'static [ToolSpec],
}

impl ToolRegistry {
    #[must_use]
    pub const fn builtin() -> Self {
        Self {
            tools: BUILTIN_TOOLS,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static ToolSpec> {
        self.tools.iter()
    }

    /// # Errors
    /// Returns `UnknownTool` when no tool has this name.
    pub fn get(&self, name: &str) -> Result<&'static ToolSpec, ToolError> {
        self.tools
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Looks up the tool and validates its arguments.
    ///
    /// `today` fills in a missing `end` date.
    ///
    /// # Errors
    /// Returns `UnknownTool` or `InvalidArgument` naming the offending field.
    pub fn resolve(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
        today: NaiveDate,
    ) -> Result<ResolvedCall, ToolError> {
        let spec = self.get(name)?;
        let args = spec.validate(arguments, today)?;
        let request = spec.fetch_request(&args)?;
        Ok(ResolvedCall {
            spec,
            args,
            request,
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolSpec {
    /// # Errors
    /// Returns `InvalidArgument` for unknown, missing or malformed arguments.
    pub fn validate(
        &self,
        arguments: &Map<String, Value>,
        today: NaiveDate,
    ) -> Result<CanonicalArgs, ToolError> {
        if let Some(unknown) = arguments
            .keys()
            .find(|key| !self.args.iter().any(|arg| arg.name == key.as_str()))
        {
            return Err(ToolError::invalid_argument(
                unknown.as_str(),
                format!("is not an argument of `{}`", self.name),
            ));
        }

        let mut canonical = BTreeMap::new();
        for arg in self.args {
            let supplied = match arguments.get(arg.name) {
                None | Some(Value::Null) => None,
                Some(value) => scalar_text(arg.name, value)?,
            };
            let text = match (supplied, arg.default) {
                (Some(text), _) => text,
                (None, Some(default)) => default.to_string(),
                (None, None) if arg.required => {
                    return Err(ToolError::invalid_argument(arg.name, "is required"));
                }
                (None, None) => continue,
            };
            let value = canonicalize(arg.kind, &text)
                .map_err(|message| ToolError::invalid_argument(arg.name, message))?;
            canonical.insert(arg.name, value);
        }

        if self.args.iter().any(|arg| arg.name == ARG_START) {
            apply_date_window(&mut canonical, today)?;
        }
        Ok(CanonicalArgs(canonical))
    }

    /// Builds the typed provider request from validated arguments.
    ///
    /// # Errors
    /// Returns `InvalidArgument` when a required canonical value is missing.
    pub fn fetch_request(&self, args: &CanonicalArgs) -> Result<FetchRequest, ToolError> {
        let symbol = || args.require(ARG_SYMBOL).map(str::to_string);
        let request = match self.kind {
            DataKind::Profile => FetchRequest::Profile { symbol: symbol()? },
            DataKind::Statement => {
                let period = StatementPeriod::parse(args.require(ARG_PERIOD)?)
                    .ok_or_else(|| {
                        ToolError::invalid_argument(ARG_PERIOD, "must be annual or quarterly")
                    })?;
                FetchRequest::Statement {
                    symbol: symbol()?,
                    period,
                }
            }
            DataKind::History => {
                let window = match (args.get(ARG_START), args.get(ARG_END)) {
                    (Some(start), Some(end)) => HistoryWindow::Dates {
                        start: parse_date(start)
                            .map_err(|message| ToolError::invalid_argument(ARG_START, message))?,
                        end: parse_date(end)
                            .map_err(|message| ToolError::invalid_argument(ARG_END, message))?,
                    },
                    _ => HistoryWindow::Range(args.require(ARG_RANGE)?.to_string()),
                };
                FetchRequest::History {
                    symbol: symbol()?,
                    window,
                    interval: args.require(ARG_INTERVAL)?.to_string(),
                }
            }
            DataKind::Recommendations => FetchRequest::Recommendations { symbol: symbol()? },
            DataKind::PriceTargets => FetchRequest::PriceTargets { symbol: symbol()? },
            DataKind::Revisions => FetchRequest::Revisions {
                symbol: symbol()?,
                limit: limit(args)?,
            },
            DataKind::CorporateActions => FetchRequest::CorporateActions { symbol: symbol()? },
            DataKind::Calendar => FetchRequest::Calendar { symbol: symbol()? },
            DataKind::News => FetchRequest::News {
                symbol: symbol()?,
                limit: limit(args)?,
            },
            DataKind::SectorTop => {
                let category = SectorCategory::parse(args.require(ARG_CATEGORY)?)
                    .ok_or_else(|| {
                        ToolError::invalid_argument(
                            ARG_CATEGORY,
                            format!("must be one of {}", SECTOR_CATEGORIES.join(", ")),
                        )
                    })?;
                FetchRequest::SectorTop {
                    sector: args.require(ARG_SECTOR)?.to_string(),
                    category,
                }
            }
        };
        Ok(request)
    }
}

fn limit(args: &CanonicalArgs) -> Result<usize, ToolError> {
    args.require(ARG_LIMIT)?
        .parse::<usize>()
        .map_err(|_| ToolError::invalid_argument(ARG_LIMIT, "must be an integer"))
}

fn scalar_text(name: &str, value: &Value) -> Result<Option<String>, ToolError> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Null => Ok(None),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => {
            Err(ToolError::invalid_argument(name, "must be a string or number"))
        }
    }
}

fn canonicalize(kind: ArgKind, text: &str) -> Result<String, String> {
    match kind {
        ArgKind::Symbol => canonical_symbol(text),
        ArgKind::Period => StatementPeriod::parse(text)
            .map(|period| period.as_str().to_string())
            .ok_or_else(|| "must be annual or quarterly".to_string()),
        ArgKind::Choice { options } => {
            let lowered = text.to_ascii_lowercase().replace(['_', ' '], "-");
            if options.contains(&lowered.as_str()) {
                Ok(lowered)
            } else {
                Err(format!("must be one of {}", options.join(", ")))
            }
        }
        ArgKind::Date => parse_date(text).map(|date| date.format("%Y-%m-%d").to_string()),
        ArgKind::Integer { min, max } => {
            let value = text
                .parse::<i64>()
                .map_err(|_| "must be an integer".to_string())?;
            if (min..=max).contains(&value) {
                Ok(value.to_string())
            } else {
                Err(format!("must be between {min} and {max}"))
            }
        }
    }
}

fn canonical_symbol(text: &str) -> Result<String, String> {
    let symbol = text.trim().to_ascii_uppercase();
    let valid_chars = symbol.chars().all(|c| {
        c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '^' | '=')
    });
    if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN || !valid_chars {
        return Err(format!(
            "must be 1-{MAX_SYMBOL_LEN} characters of A-Z, 0-9, '.', '-', '^' or '='"
        ));
    }
    Ok(symbol)
}

fn parse_date(text: &str) -> Result<NaiveDate, String> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|parsed| parsed.date_naive())
        })
        .ok_or_else(|| "must be a date in YYYY-MM-DD form".to_string())
}

/// `start` overrides `range`; `end` needs `start` and defaults to today.
fn apply_date_window(
    canonical: &mut BTreeMap<&'static str, String>,
    today: NaiveDate,
) -> Result<(), ToolError> {
    let Some(start) = canonical.get(ARG_START).cloned() else {
        if canonical.contains_key(ARG_END) {
            return Err(ToolError::invalid_argument(
                ARG_START,
                "is required when `end` is given",
            ));
        }
        return Ok(());
    };

    let end = canonical
        .entry(ARG_END)
        .or_insert_with(|| today.format("%Y-%m-%d").to_string())
        .clone();
    // Both values are canonical ISO dates, so string order is date order.
    if start > end {
        return Err(ToolError::invalid_argument(
            ARG_START,
            format!("must not be after `end` ({end})"),
        ));
    }
    canonical.remove(ARG_RANGE);
    Ok(())
}
