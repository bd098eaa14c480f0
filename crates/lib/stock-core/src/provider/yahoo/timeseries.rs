use std::collections::BTreeMap;

use serde_json::Value;
use stock_schema::schema::StatementPeriod;

use crate::errors::ProviderError;
use crate::provider::{RawObject, RawSeries};

// 2016-01-01 UTC
const FIRST_PERIOD_EPOCH: i64 = 1_451_606_400;

/// Timeseries type names requested for every statement, without the
/// `annual`/`quarterly` prefix.
const STATEMENT_TYPES: &[&str] = &[
    // income statement
    "TotalRevenue",
    "OperatingRevenue",
    "CostOfRevenue",
    "GrossProfit",
    "ResearchAndDevelopment",
    "OperatingIncome",
    "InterestExpense",
    "PretaxIncome",
    "TaxProvision",
    "NetIncome",
    "NetIncomeCommonStockholders",
    "EBIT",
    // balance sheet
    "CashAndCashEquivalents",
    "OtherShortTermInvestments",
    "CurrentAssets",
    "TotalAssets",
    "CurrentLiabilities",
    "LongTermDebt",
    "TotalLiabilitiesNetMinorityInterest",
    "StockholdersEquity",
    // cash flow
    "OperatingCashFlow",
    "CapitalExpenditure",
    "InvestingCashFlow",
    "FinancingCashFlow",
    "CashDividendsPaid",
    "FreeCashFlow",
];

const fn prefix(period: StatementPeriod) -> &'static str {
    match period {
        StatementPeriod::Annual => "annual",
        StatementPeriod::Quarterly => "quarterly",
    }
}

pub(super) fn statement_params(
    symbol: &str,
    period: StatementPeriod,
    now_epoch: i64,
) -> Vec<(&'static str, String)> {
    let types = STATEMENT_TYPES
        .iter()
        .map(|name| format!("{}{name}", prefix(period)))
        .collect::<Vec<_>>()
        .join(",");
    vec![
        ("symbol", symbol.to_string()),
        ("type", types),
        ("period1", FIRST_PERIOD_EPOCH.to_string()),
        ("period2", now_epoch.to_string()),
    ]
}

/// Pivots one result per timeseries type into one row per `asOfDate`.
///
/// Row keys are the type names without their period prefix. The first
/// reported currency is kept as `financialCurrency` in the series metadata.
///
/// # Errors
/// Returns `Schema` when a result has no type name or its values are not a list.
pub(super) fn statement_series(
    results: &[RawObject],
    period: StatementPeriod,
) -> Result<RawSeries, ProviderError> {
    let mut rows: BTreeMap<String, RawObject> = BTreeMap::new();
    let mut currency: Option<Value> = None;

    for result in results {
        let type_name = result
            .get("meta")
            .and_then(|meta| meta.get("type"))
            .and_then(|types| types.get(0))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProviderError::Schema("yahoo timeseries result has no type".to_string())
            })?;
        let points = match result.get(type_name) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(points)) => points,
            Some(_) => {
                return Err(ProviderError::Schema(format!(
                    "yahoo timeseries {type_name} is not a list"
                )));
            }
        };
        let item = type_name
            .strip_prefix(prefix(period))
            .unwrap_or(type_name);

        for point in points.iter().filter_map(Value::as_object) {
            let (Some(as_of), Some(value)) = (
                point.get("asOfDate").and_then(Value::as_str),
                point.get("reportedValue"),
            ) else {
                continue;
            };
            if currency.is_none() {
                currency = point.get("currencyCode").filter(|code| code.is_string()).cloned();
            }
            let row = rows.entry(as_of.to_string()).or_insert_with(|| {
                let mut row = RawObject::new();
                row.insert("asOfDate".to_string(), Value::String(as_of.to_string()));
                row
            });
            row.insert(item.to_string(), value.clone());
        }
    }

    let mut meta = RawObject::new();
    if let Some(code) = currency {
        meta.insert("financialCurrency".to_string(), code);
    }
    Ok(RawSeries::new(meta, rows.into_values().collect()))
}
