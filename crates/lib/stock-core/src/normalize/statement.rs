use std::collections::BTreeMap;

use stock_schema::schema::{STATEMENT_LINE_ITEMS, StatementPeriod};
use stock_schema::{FinancialStatement, Field, StatementEntry};

use crate::errors::ProviderError;
use crate::provider::{RawObject, RawSeries};

use super::values;

const PERIOD_END_KEYS: &[&str] = &["asOfDate", "endDate", "period", "date"];
const CURRENCY_KEYS: &[&str] = &["financialCurrency", "currency"];

/// Upstream spellings per catalogue item: fundamentals-timeseries type names
/// first, then the title-case labels of statement exports, then camelCase.
fn aliases(item: &str) -> &'static [&'static str] {
    match item {
        "total_revenue" => &["TotalRevenue", "OperatingRevenue", "Total Revenue", "totalRevenue"],
        "cost_of_revenue" => &["CostOfRevenue", "Cost Of Revenue", "costOfRevenue"],
        "gross_profit" => &["GrossProfit", "Gross Profit", "grossProfit"],
        "research_development" => &[
            "ResearchAndDevelopment",
            "Research And Development",
            "researchDevelopment",
        ],
        "operating_income" => &["OperatingIncome", "Operating Income", "operatingIncome"],
        "interest_expense" => &["InterestExpense", "Interest Expense", "interestExpense"],
        "income_before_tax" => &["PretaxIncome", "Pretax Income", "incomeBeforeTax"],
        "income_tax_expense" => &["TaxProvision", "Tax Provision", "incomeTaxExpense"],
        "net_income" => &[
            "NetIncome",
            "NetIncomeCommonStockholders",
            "Net Income",
            "netIncome",
        ],
        "ebit" => &["EBIT", "ebit"],
        "cash" => &[
            "CashAndCashEquivalents",
            "Cash And Cash Equivalents",
            "cash",
        ],
        "short_term_investments" => &[
            "OtherShortTermInvestments",
            "Other Short Term Investments",
            "shortTermInvestments",
        ],
        "total_current_assets" => &["CurrentAssets", "Current Assets", "totalCurrentAssets"],
        "total_assets" => &["TotalAssets", "Total Assets", "totalAssets"],
        "total_current_liabilities" => &[
            "CurrentLiabilities",
            "Current Liabilities",
            "totalCurrentLiabilities",
        ],
        "long_term_debt" => &["LongTermDebt", "Long Term Debt", "longTermDebt"],
        "total_liabilities" => &[
            "TotalLiabilitiesNetMinorityInterest",
            "Total Liabilities Net Minority Interest",
            "totalLiabilities",
        ],
        "stockholders_equity" => &[
            "StockholdersEquity",
            "Stockholders Equity",
            "stockholdersEquity",
        ],
        "operating_cash_flow" => &[
            "OperatingCashFlow",
            "Operating Cash Flow",
            "operatingCashflow",
        ],
        "capital_expenditures" => &[
            "CapitalExpenditure",
            "Capital Expenditure",
            "capitalExpenditures",
        ],
        "investing_cash_flow" => &["InvestingCashFlow", "Investing Cash Flow"],
        "financing_cash_flow" => &["FinancingCashFlow", "Financing Cash Flow"],
        "dividends_paid" => &["CashDividendsPaid", "Cash Dividends Paid", "dividendsPaid"],
        "free_cash_flow" => &["FreeCashFlow", "Free Cash Flow", "freeCashFlow"],
        _ => &[],
    }
}

pub fn financial_statement(
    symbol: &str,
    period: StatementPeriod,
    series: &RawSeries,
) -> Result<FinancialStatement, ProviderError> {
    let unit = values::currency(&series.meta, CURRENCY_KEYS)
        .or_else(|| series.rows.iter().find_map(|row| values::currency(row, CURRENCY_KEYS)));

    let mut statements: Vec<StatementEntry> = Vec::with_capacity(series.rows.len());
    for row in &series.rows {
        let Some(period_end) = values::date(row, PERIOD_END_KEYS) else {
            continue;
        };
        let period_end = values::iso_date(period_end);
        if statements.iter().any(|entry| entry.period_end == period_end) {
            continue;
        }
        let line_items = line_items(row, unit.as_ref());
        if line_items.values().any(Field::is_available) {
            statements.push(StatementEntry {
                period_end,
                line_items,
            });
        }
    }

    if statements.is_empty() {
        return Err(ProviderError::NotFound(format!(
            "no {period} statements for {symbol}"
        )));
    }
    statements.sort_by(|a, b| b.period_end.cmp(&a.period_end));

    Ok(FinancialStatement {
        symbol: symbol.to_string(),
        period,
        currency: Field::from_option(unit.map(|unit| unit.code)),
        statements,
    })
}

fn line_items(
    row: &RawObject,
    unit: Option<&values::CurrencyUnit>,
) -> BTreeMap<String, Field<rust_decimal::Decimal>> {
    STATEMENT_LINE_ITEMS
        .iter()
        .map(|item| {
            let value = values::decimal(row, aliases(item))
                .map(|amount| unit.map_or(amount, |unit| unit.convert(amount)));
            ((*item).to_string(), Field::from_option(value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};

    fn object(value: Value) -> RawObject {
        value.as_object().cloned().expect("test value is an object")
    }

    #[test]
    fn every_catalogue_item_has_aliases() {
        for item in STATEMENT_LINE_ITEMS {
            assert!(!aliases(item).is_empty(), "{item} has no aliases");
        }
    }

    #[test]
    fn missing_line_item_is_marked_unavailable() {
        let series = RawSeries::new(
            object(json!({ "financialCurrency": "USD" })),
            vec![
                object(json!({
                    "endDate": { "raw": 1_695_945_600, "fmt": "2023-09-29" },
                    "totalRevenue": { "raw": 383_285_000_000_i64 },
                })),
                object(json!({
                    "endDate": "2024-09-28",
                    "totalRevenue": 391_035_000_000_i64,
                    "netIncome": "93736000000",
                })),
            ],
        );

        let statement = financial_statement("AAPL", StatementPeriod::Annual, &series)
            .expect("statement maps");

        assert_eq!(statement.currency, Field::Available("USD".to_string()));
        let periods: Vec<&str> = statement
            .statements
            .iter()
            .map(|entry| entry.period_end.as_str())
            .collect();
        assert_eq!(periods, vec!["2024-09-28", "2023-09-29"]);

        let latest = &statement.statements[0].line_items;
        assert_eq!(latest["total_revenue"], Field::Available(dec!(391035000000)));
        assert_eq!(latest["net_income"], Field::Available(dec!(93736000000)));
        assert_eq!(latest["ebit"], Field::Unavailable);
        assert_eq!(latest.len(), STATEMENT_LINE_ITEMS.len());
    }

    #[test]
    fn title_case_labels_are_accepted() {
        let series = RawSeries::new(
            RawObject::new(),
            vec![object(json!({
                "asOfDate": "2024-06-30",
                "Total Revenue": 85_777_000_000_i64,
                "Free Cash Flow": 26_707_000_000_i64,
            }))],
        );
        let statement = financial_statement("AAPL", StatementPeriod::Quarterly, &series)
            .expect("statement maps");
        let items = &statement.statements[0].line_items;
        assert_eq!(items["free_cash_flow"], Field::Available(dec!(26707000000)));
        assert_eq!(statement.currency, Field::Unavailable);
    }

    #[test]
    fn timeseries_type_names_are_accepted() {
        let series = RawSeries::new(
            object(json!({ "financialCurrency": "USD" })),
            vec![object(json!({
                "asOfDate": "2024-09-30",
                "TotalRevenue": 391_035_000_000_i64,
                "TotalLiabilitiesNetMinorityInterest": 308_030_000_000_i64,
                "CashDividendsPaid": -15_234_000_000_i64,
            }))],
        );
        let statement = financial_statement("AAPL", StatementPeriod::Annual, &series)
            .expect("statement maps");
        let items = &statement.statements[0].line_items;
        assert_eq!(items["total_revenue"], Field::Available(dec!(391035000000)));
        assert_eq!(items["total_liabilities"], Field::Available(dec!(308030000000)));
        assert_eq!(items["dividends_paid"], Field::Available(dec!(-15234000000)));
    }

    #[test]
    fn rows_without_values_are_not_found() {
        let series = RawSeries::new(
            RawObject::new(),
            vec![object(json!({ "endDate": "2024-09-28", "maxAge": 1 }))],
        );
        let err = financial_statement("ZZZZ", StatementPeriod::Annual, &series)
            .expect_err("empty statement");
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
