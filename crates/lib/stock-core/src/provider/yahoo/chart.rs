use chrono::NaiveDate;
use serde_json::Value;

use crate::provider::{HistoryWindow, RawObject, RawSeries};

const QUOTE_COLUMNS: &[&str] = &["open", "high", "low", "close", "volume"];

pub(super) fn window_params(window: &HistoryWindow, interval: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("interval", interval.to_string()),
        ("includePrePost", "false".to_string()),
        ("includeAdjustedClose", "true".to_string()),
    ];
    match window {
        HistoryWindow::Range(range) => params.push(("range", range.clone())),
        HistoryWindow::Dates { start, end } => {
            // period2 is exclusive, so the end date is pushed to the next midnight.
            let after_end = end.succ_opt().unwrap_or(*end);
            params.push(("period1", epoch_seconds(*start).to_string()));
            params.push(("period2", epoch_seconds(after_end).to_string()));
        }
    }
    params
}

pub(super) fn event_params() -> Vec<(&'static str, String)> {
    vec![
        ("range", "max".to_string()),
        ("interval", "3mo".to_string()),
        ("events", "div,split".to_string()),
    ]
}

fn epoch_seconds(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map_or(0, |midnight| midnight.and_utc().timestamp())
}

fn meta(result: &RawObject) -> RawObject {
    result
        .get("meta")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn indicator<'a>(result: &'a RawObject, name: &str) -> Option<&'a RawObject> {
    result
        .get("indicators")
        .and_then(|indicators| indicators.get(name))
        .and_then(|values| values.get(0))
        .and_then(Value::as_object)
}

/// Pivots the columnar `indicators.quote` arrays into one row per timestamp.
///
/// `indicators.adjclose`, when present, lands in an `adjclose` column.
pub(super) fn price_series(result: &RawObject) -> RawSeries {
    let timestamps = result
        .get("timestamp")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let quote = indicator(result, "quote");
    let adjclose = indicator(result, "adjclose")
        .and_then(|adjclose| adjclose.get("adjclose"))
        .and_then(Value::as_array);

    let rows = timestamps
        .iter()
        .enumerate()
        .map(|(index, timestamp)| {
            let mut row = RawObject::new();
            row.insert("timestamp".to_string(), timestamp.clone());
            for column in QUOTE_COLUMNS {
                let cell = quote
                    .and_then(|quote| quote.get(*column))
                    .and_then(|values| values.get(index));
                if let Some(cell) = cell {
                    row.insert((*column).to_string(), cell.clone());
                }
            }
            if let Some(cell) = adjclose.and_then(|values| values.get(index)) {
                row.insert("adjclose".to_string(), cell.clone());
            }
            row
        })
        .collect();

    RawSeries::new(meta(result), rows)
}

/// Flattens `events.dividends` and `events.splits` into event rows.
pub(super) fn action_series(result: &RawObject) -> RawSeries {
    let events = result.get("events").and_then(Value::as_object);
    let rows = ["dividends", "splits"]
        .iter()
        .filter_map(|kind| events.and_then(|events| events.get(*kind)).and_then(Value::as_object))
        .flat_map(|by_date| by_date.values())
        .filter_map(Value::as_object)
        .cloned()
        .collect();

    RawSeries::new(meta(result), rows)
}
