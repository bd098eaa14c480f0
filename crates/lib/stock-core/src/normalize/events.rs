use rust_decimal::Decimal;
use serde_json::Value;
use stock_schema::{
    ActionKind,
    CorporateAction,
    CorporateActions,
    EarningsCalendar,
    Estimate,
    Field,
    Money,
};

use crate::errors::ProviderError;
use crate::provider::{RawObject, RawSeries};

use super::values::{self, CurrencyUnit};

const DATE_KEYS: &[&str] = &["date", "Date", "timestamp"];
const CURRENCY_KEYS: &[&str] = &["currency", "financialCurrency"];
const DIVIDEND_KEYS: &[&str] = &["amount", "Dividends", "dividend"];
const SPLIT_FACTOR_KEYS: &[&str] = &["Stock Splits", "splitFactor"];

/// Maps dividend and split events, oldest first.
///
/// An instrument that never paid a dividend or split yields an empty list,
/// which is a valid result rather than a missing instrument.
pub fn corporate_actions(symbol: &str, series: &RawSeries) -> CorporateActions {
    let unit = values::currency(&series.meta, CURRENCY_KEYS);

    let mut actions: Vec<(i64, CorporateAction)> = Vec::new();
    for row in &series.rows {
        let Some(timestamp) = values::timestamp(row, DATE_KEYS) else {
            continue;
        };
        let date = values::iso_date(timestamp.date_naive());
        let epoch = timestamp.timestamp();

        if let Some(ratio) = split_ratio(row) {
            actions.push((
                epoch,
                CorporateAction {
                    date: date.clone(),
                    kind: ActionKind::Split,
                    amount: None,
                    ratio: Some(ratio),
                },
            ));
        }
        if let Some(amount) = positive(values::decimal(row, DIVIDEND_KEYS)) {
            actions.push((
                epoch,
                CorporateAction {
                    date,
                    kind: ActionKind::Dividend,
                    amount: Some(dividend_amount(amount, unit.as_ref())),
                    ratio: None,
                },
            ));
        }
    }
    actions.sort_by_key(|(epoch, _)| *epoch);

    CorporateActions {
        symbol: symbol.to_string(),
        currency: Field::from_option(unit.map(|unit| unit.code)),
        actions: actions.into_iter().map(|(_, action)| action).collect(),
    }
}

fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|amount| amount.is_sign_positive() && !amount.is_zero())
}

fn dividend_amount(amount: Decimal, unit: Option<&CurrencyUnit>) -> Field<Money> {
    Field::from_option(unit.map(|unit| Money::new(unit.convert(amount), &unit.code)))
}

/// Split ratio as `new:old`, or `None` when the row is not a split.
///
/// A row that is recognizably a split but whose ratio cannot be read yields
/// an unavailable ratio.
fn split_ratio(row: &RawObject) -> Option<Field<String>> {
    let numerator = positive(values::decimal(row, &["numerator"]));
    let denominator = positive(values::decimal(row, &["denominator"]));
    if let (Some(numerator), Some(denominator)) = (numerator, denominator) {
        return Some(Field::Available(format!("{numerator}:{denominator}")));
    }
    if let Some(text) = values::text(row, &["splitRatio"]) {
        let ratio = text.replace('/', ":");
        let valid = ratio
            .split_once(':')
            .is_some_and(|(new, old)| !new.trim().is_empty() && !old.trim().is_empty());
        return Some(if valid {
            Field::Available(ratio)
        } else {
            Field::Unavailable
        });
    }
    if let Some(factor) = positive(values::decimal(row, SPLIT_FACTOR_KEYS)) {
        return Some(Field::Available(format!("{factor}:1")));
    }
    (numerator.is_some() || denominator.is_some()).then_some(Field::Unavailable)
}

/// Maps upcoming earnings and dividend dates with consensus estimates.
pub fn earnings_calendar(
    symbol: &str,
    raw: &RawObject,
) -> Result<EarningsCalendar, ProviderError> {
    let earnings = match raw.get("earnings") {
        Some(Value::Object(earnings)) => earnings,
        _ => raw,
    };

    let earnings_dates = earnings_dates(earnings);
    let earnings_estimate = Estimate {
        average: values::decimal(earnings, &["earningsAverage", "Earnings Average"]).into(),
        low: values::decimal(earnings, &["earningsLow", "Earnings Low"]).into(),
        high: values::decimal(earnings, &["earningsHigh", "Earnings High"]).into(),
    };
    let revenue_estimate = Estimate {
        average: values::decimal(earnings, &["revenueAverage", "Revenue Average"]).into(),
        low: values::decimal(earnings, &["revenueLow", "Revenue Low"]).into(),
        high: values::decimal(earnings, &["revenueHigh", "Revenue High"]).into(),
    };
    let ex_dividend_date = Field::from_option(
        values::date(raw, &["exDividendDate", "Ex-Dividend Date"]).map(values::iso_date),
    );
    let dividend_date = Field::from_option(
        values::date(raw, &["dividendDate", "Dividend Date"]).map(values::iso_date),
    );

    if earnings_dates.is_empty()
        && earnings_estimate.is_empty()
        && revenue_estimate.is_empty()
        && !ex_dividend_date.is_available()
        && !dividend_date.is_available()
    {
        return Err(ProviderError::NotFound(format!(
            "no calendar events for {symbol}"
        )));
    }

    Ok(EarningsCalendar {
        symbol: symbol.to_string(),
        earnings_dates,
        earnings_estimate,
        revenue_estimate,
        ex_dividend_date,
        dividend_date,
    })
}

fn earnings_dates(earnings: &RawObject) -> Vec<String> {
    let mut dates: Vec<String> = match values::lookup(earnings, &["earningsDate", "Earnings Date"]) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(values::date_value)
            .map(values::iso_date)
            .collect(),
        Some(single) => values::date_value(single)
            .map(values::iso_date)
            .into_iter()
            .collect(),
        None => Vec::new(),
    };
    dates.sort();
    dates.dedup();
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn object(value: Value) -> RawObject {
        value.as_object().cloned().expect("test value is an object")
    }

    #[test]
    fn splits_and_dividends_are_ordered_oldest_first() {
        let series = RawSeries::new(
            object(json!({ "currency": "USD" })),
            vec![
                object(json!({ "date": 1_723_161_600, "amount": 0.25 })),
                object(json!({ "date": 1_598_832_000, "numerator": 4, "denominator": 1, "splitRatio": "4:1" })),
                object(json!({ "Date": "2024-05-10", "Dividends": 0.25, "Stock Splits": 0.0 })),
            ],
        );

        let actions = corporate_actions("AAPL", &series);

        let kinds: Vec<ActionKind> = actions.actions.iter().map(|action| action.kind).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Split, ActionKind::Dividend, ActionKind::Dividend]
        );
        assert_eq!(actions.actions[0].date, "2020-08-31");
        assert_eq!(
            actions.actions[0].ratio,
            Some(Field::Available("4:1".to_string()))
        );
        assert_eq!(
            actions.actions[2].amount,
            Some(Field::Available(Money::new(dec!(0.25), "USD")))
        );
    }

    #[test]
    fn no_events_is_an_empty_success() {
        let series = RawSeries::new(object(json!({ "currency": "USD" })), Vec::new());
        let actions = corporate_actions("BRK-A", &series);
        assert!(actions.actions.is_empty());
        assert_eq!(actions.currency, Field::Available("USD".to_string()));
    }

    #[test]
    fn calendar_reads_nested_earnings() {
        let raw = object(json!({
            "earnings": {
                "earningsDate": [{ "raw": 1_738_281_600, "fmt": "2025-01-31" }],
                "earningsAverage": { "raw": 2.35 },
                "revenueAverage": 124_126_000_000_i64,
            },
            "exDividendDate": { "raw": 1_731_283_200 },
        }));
        let calendar = earnings_calendar("AAPL", &raw).expect("calendar maps");
        assert_eq!(calendar.earnings_dates, vec!["2025-01-31".to_string()]);
        assert_eq!(calendar.earnings_estimate.average, Field::Available(dec!(2.35)));
        assert_eq!(calendar.earnings_estimate.low, Field::Unavailable);
        assert_eq!(calendar.ex_dividend_date, Field::Available("2024-11-11".to_string()));
        assert_eq!(calendar.dividend_date, Field::Unavailable);
    }

    #[test]
    fn empty_calendar_is_not_found() {
        let raw = object(json!({ "maxAge": 1, "earnings": {} }));
        let err = earnings_calendar("ZZZZ", &raw).expect_err("empty calendar");
        assert!(matches!(err, ProviderError::NotFound(_)));
    }
}
