use rust_decimal::Decimal;
use stock_schema::{Field, PriceBar, PriceHistory};

use crate::errors::ProviderError;
use crate::provider::{RawObject, RawSeries};

use super::values;

const TIMESTAMP_KEYS: &[&str] = &["timestamp", "date", "Date", "Datetime"];
const CURRENCY_KEYS: &[&str] = &["currency", "financialCurrency"];
const CLOSE_KEYS: &[&str] = &["close", "Close"];
const ADJ_CLOSE_KEYS: &[&str] = &["adjclose", "Adj Close"];
const ADJUSTED_SCALE: u32 = 6;

/// Maps a price series into [`PriceHistory`], oldest bar first.
///
/// Bars without a timestamp or without any OHLC value are dropped; prices
/// quoted in minor units are converted to the major currency. When a row
/// carries an adjusted close, its OHLC values are scaled by the
/// adjusted/raw close ratio so splits and dividends do not show up as jumps.
pub fn price_history(
    symbol: &str,
    interval: &str,
    series: &RawSeries,
) -> Result<PriceHistory, ProviderError> {
    let unit = values::currency(&series.meta, CURRENCY_KEYS);
    let price = |row: &RawObject, keys: &[&str], factor: Option<Decimal>| {
        Field::from_option(values::decimal(row, keys).map(|amount| {
            let amount = factor.map_or(amount, |factor| adjusted(amount, factor));
            unit.as_ref().map_or(amount, |unit| unit.convert(amount))
        }))
    };

    let mut bars: Vec<(i64, PriceBar)> = series
        .rows
        .iter()
        .filter_map(|row| {
            let timestamp = values::timestamp(row, TIMESTAMP_KEYS)?;
            let factor = adjustment(row);
            let close = match factor {
                Some(_) => price(row, ADJ_CLOSE_KEYS, None),
                None => price(row, &["close", "Close", "adjclose", "Adj Close"], None),
            };
            let bar = PriceBar {
                timestamp: values::iso_timestamp(timestamp),
                open: price(row, &["open", "Open"], factor),
                high: price(row, &["high", "High"], factor),
                low: price(row, &["low", "Low"], factor),
                close,
                volume: Field::from_option(values::unsigned(row, &["volume", "Volume"])),
            };
            let has_prices = bar.open.is_available()
                || bar.high.is_available()
                || bar.low.is_available()
                || bar.close.is_available();
            has_prices.then_some((timestamp.timestamp(), bar))
        })
        .collect();

    if bars.is_empty() {
        return Err(ProviderError::NotFound(format!(
            "no price history for {symbol}"
        )));
    }
    bars.sort_by_key(|(epoch, _)| *epoch);
    bars.dedup_by_key(|(epoch, _)| *epoch);

    Ok(PriceHistory {
        symbol: symbol.to_string(),
        currency: Field::from_option(unit.map(|unit| unit.code)),
        interval: interval.to_string(),
        bars: bars.into_iter().map(|(_, bar)| bar).collect(),
    })
}

/// Adjusted/raw close ratio, when both are present and differ.
fn adjustment(row: &RawObject) -> Option<Decimal> {
    let close = values::decimal(row, CLOSE_KEYS)?;
    let adjusted_close = values::decimal(row, ADJ_CLOSE_KEYS)?;
    if close.is_zero() || close == adjusted_close {
        return None;
    }
    adjusted_close.checked_div(close)
}

fn adjusted(amount: Decimal, factor: Decimal) -> Decimal {
    amount
        .checked_mul(factor)
        .map_or(amount, |scaled| scaled.round_dp(ADJUSTED_SCALE).normalize())
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
    fn sorts_bars_and_drops_empty_rows() {
        let series = RawSeries::new(
            object(json!({ "currency": "USD" })),
            vec![
                object(json!({
                    "timestamp": 1_727_740_800,
                    "open": 229.52, "high": 229.65, "low": 223.74, "close": 225.0,
                    "volume": 54_146_000
                })),
                object(json!({ "timestamp": 1_727_654_400, "open": null, "close": null })),
                object(json!({
                    "timestamp": 1_727_481_600,
                    "open": 228.46, "close": 227.79, "volume": null
                })),
            ],
        );

        let history = price_history("AAPL", "1d", &series).expect("history maps");

        assert_eq!(history.bars.len(), 2);
        assert_eq!(history.bars[0].timestamp, "2024-09-28T00:00:00Z");
        assert_eq!(history.bars[0].high, Field::Unavailable);
        assert_eq!(history.bars[0].volume, Field::Unavailable);
        assert_eq!(history.bars[1].close, Field::Available(dec!(225)));
        assert_eq!(history.bars[1].volume, Field::Available(54_146_000));
        assert_eq!(history.interval, "1d");
    }

    #[test]
    fn no_bars_is_not_found() {
        let series = RawSeries::new(RawObject::new(), Vec::new());
        let err = price_history("ZZZZ", "1d", &series).expect_err("no bars");
        assert!(matches!(err, ProviderError::NotFound(_)));
    }

    #[test]
    fn prices_before_a_split_are_adjusted() {
        let series = RawSeries::new(
            object(json!({ "currency": "USD" })),
            vec![
                object(json!({
                    "timestamp": 1_717_977_600,
                    "open": 396.0, "high": 404.0, "low": 392.0, "close": 400.0,
                    "adjclose": 100.0, "volume": 1_000
                })),
                object(json!({
                    "timestamp": 1_718_064_000,
                    "open": 100.5, "high": 102.0, "low": 99.5, "close": 101.0,
                    "adjclose": 101.0, "volume": 4_000
                })),
            ],
        );

        let history = price_history("ACME", "1d", &series).expect("history maps");

        let before = &history.bars[0];
        assert_eq!(before.open, Field::Available(dec!(99)));
        assert_eq!(before.high, Field::Available(dec!(101)));
        assert_eq!(before.low, Field::Available(dec!(98)));
        assert_eq!(before.close, Field::Available(dec!(100)));
        assert_eq!(before.volume, Field::Available(1_000));

        let after = &history.bars[1];
        assert_eq!(after.open, Field::Available(dec!(100.5)));
        assert_eq!(after.close, Field::Available(dec!(101)));
    }

    #[test]
    fn adjusted_close_stands_in_for_a_missing_close() {
        let series = RawSeries::new(
            RawObject::new(),
            vec![object(json!({ "timestamp": 1_718_064_000, "adjclose": 55.25 }))],
        );
        let history = price_history("ACME", "1d", &series).expect("history maps");
        assert_eq!(history.bars[0].close, Field::Available(dec!(55.25)));
        assert_eq!(history.bars[0].open, Field::Unavailable);
    }
}
