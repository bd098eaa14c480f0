//! Tolerant readers for provider-shaped values.
//!
//! Upstream payloads disagree on key names and wrap numbers in different ways
//! (`12.5`, `"12.5"`, `{"raw": 12.5, "fmt": "12.50"}`). These helpers accept
//! every known shape and return `None` for anything unusable.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;

use crate::provider::RawObject;

// Values above this are epoch milliseconds rather than seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Currency resolved from a provider code, with the divisor that converts
/// minor-unit quotes (pence, cents) into the major currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyUnit {
    pub code: String,
    pub divisor: Decimal,
}

impl CurrencyUnit {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let minor = match trimmed {
            "GBp" | "GBX" | "GBx" => Some("GBP"),
            "ZAc" | "ZAC" => Some("ZAR"),
            "ILA" | "ILa" => Some("ILS"),
            _ => None,
        };
        if let Some(code) = minor {
            return Some(Self {
                code: code.to_string(),
                divisor: Decimal::ONE_HUNDRED,
            });
        }
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Some(Self {
                code: trimmed.to_ascii_uppercase(),
                divisor: Decimal::ONE,
            });
        }
        None
    }

    #[must_use]
    pub fn convert(&self, amount: Decimal) -> Decimal {
        if self.divisor == Decimal::ONE {
            amount
        } else {
            (amount / self.divisor).normalize()
        }
    }
}

/// Returns the first present, non-null value among `keys`.
pub fn lookup<'a>(raw: &'a RawObject, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| !is_blank(value))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Unwraps the `{"raw": …}` envelope used by some endpoints.
pub fn unwrap_raw(value: &Value) -> &Value {
    match value {
        Value::Object(map) => map.get("raw").unwrap_or(value),
        _ => value,
    }
}

pub fn decimal_value(value: &Value) -> Option<Decimal> {
    let parsed = match unwrap_raw(value) {
        Value::Number(number) => number
            .as_i64()
            .map(Decimal::from)
            .or_else(|| number.as_u64().map(Decimal::from))
            .or_else(|| number.as_f64().and_then(Decimal::from_f64)),
        Value::String(text) => {
            let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
            Decimal::from_str(&cleaned)
                .or_else(|_| Decimal::from_scientific(&cleaned))
                .ok()
        }
        _ => None,
    };
    parsed.map(|value| value.normalize())
}

pub fn decimal(raw: &RawObject, keys: &[&str]) -> Option<Decimal> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find_map(decimal_value)
}

pub fn unsigned(raw: &RawObject, keys: &[&str]) -> Option<u64> {
    decimal(raw, keys)
        .filter(|value| !value.is_sign_negative())
        .and_then(|value| u64::try_from(value.trunc()).ok())
}

pub fn count(raw: &RawObject, keys: &[&str]) -> Option<u32> {
    unsigned(raw, keys).and_then(|value| u32::try_from(value).ok())
}

pub fn text(raw: &RawObject, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find_map(|value| match unwrap_raw(value) {
            Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            _ => None,
        })
}

pub fn currency(raw: &RawObject, keys: &[&str]) -> Option<CurrencyUnit> {
    text(raw, keys).and_then(|code| CurrencyUnit::parse(&code))
}

pub fn timestamp_value(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => map
            .get("raw")
            .and_then(timestamp_value)
            .or_else(|| map.get("fmt").and_then(timestamp_value)),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(truncate_f64))
            .and_then(epoch_to_datetime),
        Value::String(text) => parse_timestamp_text(text),
        _ => None,
    }
}

pub fn timestamp(raw: &RawObject, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find_map(timestamp_value)
}

pub fn date_value(value: &Value) -> Option<NaiveDate> {
    timestamp_value(value).map(|ts| ts.date_naive())
}

pub fn date(raw: &RawObject, keys: &[&str]) -> Option<NaiveDate> {
    timestamp(raw, keys).map(|ts| ts.date_naive())
}

#[must_use]
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[must_use]
pub fn iso_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[allow(clippy::cast_possible_truncation)]
fn truncate_f64(value: f64) -> i64 {
    value as i64
}

fn epoch_to_datetime(epoch: i64) -> Option<DateTime<Utc>> {
    if epoch.abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(epoch)
    } else {
        DateTime::from_timestamp(epoch, 0)
    }
}

fn parse_timestamp_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc());
    }
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
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
    fn decimals_accept_every_wrapper() {
        let raw = object(json!({
            "plain": 12.5,
            "wrapped": { "raw": 391_035_000_000_i64, "fmt": "391.04B" },
            "text": "1,234.50",
            "empty": {},
        }));
        assert_eq!(decimal(&raw, &["plain"]), Some(dec!(12.5)));
        assert_eq!(decimal(&raw, &["wrapped"]), Some(dec!(391035000000)));
        assert_eq!(decimal(&raw, &["text"]), Some(dec!(1234.5)));
        assert_eq!(decimal(&raw, &["empty", "plain"]), Some(dec!(12.5)));
        assert_eq!(decimal(&raw, &["missing"]), None);
    }

    #[test]
    fn minor_unit_currencies_convert_to_major() {
        let pence = CurrencyUnit::parse("GBp").expect("pence is known");
        assert_eq!(pence.code, "GBP");
        assert_eq!(pence.convert(dec!(1250)), dec!(12.5));

        let usd = CurrencyUnit::parse("usd").expect("lower case code");
        assert_eq!(usd.code, "USD");
        assert_eq!(usd.convert(dec!(3.1)), dec!(3.1));

        assert!(CurrencyUnit::parse("dollars").is_none());
    }

    #[test]
    fn dates_accept_epochs_and_text() {
        let raw = object(json!({
            "seconds": 1_727_481_600,
            "millis": 1_727_481_600_000_i64,
            "wrapped": { "raw": 1_727_481_600, "fmt": "2024-09-28" },
            "fmt_only": { "fmt": "2024-09-28" },
            "text": "2024-09-28",
            "rfc": "2024-09-28T00:00:00+00:00",
        }));
        for key in ["seconds", "millis", "wrapped", "fmt_only", "text", "rfc"] {
            let parsed = date(&raw, &[key]).map(iso_date);
            assert_eq!(parsed.as_deref(), Some("2024-09-28"), "key {key}");
        }
    }

    #[test]
    fn blank_text_is_skipped() {
        let raw = object(json!({ "longName": "  ", "shortName": "Acme" }));
        assert_eq!(text(&raw, &["longName", "shortName"]).as_deref(), Some("Acme"));
    }
}
