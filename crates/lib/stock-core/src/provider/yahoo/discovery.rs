use serde_json::Value;

use crate::errors::ProviderError;
use crate::provider::RawObject;

// Fetch the most the `news` tool can return; the limit is applied downstream.
const NEWS_COUNT: usize = 50;

pub(super) fn news_params(symbol: &str) -> Vec<(&'static str, String)> {
    vec![
        ("q", symbol.to_string()),
        ("quotesCount", "0".to_string()),
        ("newsCount", NEWS_COUNT.to_string()),
        ("enableFuzzyQuery", "false".to_string()),
    ]
}

/// Article objects from a search response. A missing or null list is empty.
///
/// # Errors
/// Returns `Schema` when `news` is present but not a list.
pub(super) fn news_rows(response: &RawObject) -> Result<Vec<RawObject>, ProviderError> {
    match response.get("news") {
        Some(Value::Array(items)) => Ok(items.iter().filter_map(Value::as_object).cloned().collect()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(ProviderError::Schema(
            "yahoo search field news is not a list".to_string(),
        )),
    }
}

/// The `data` object of a sector response.
///
/// # Errors
/// Returns `NotFound` for a null or missing `data` and `Schema` for any
/// other non-object.
pub(super) fn sector_overview(response: RawObject, sector: &str) -> Result<RawObject, ProviderError> {
    match response.get("data") {
        Some(Value::Object(data)) => Ok(data.clone()),
        Some(Value::Null) | None => Err(ProviderError::NotFound(format!(
            "sector not found: {sector}"
        ))),
        Some(_) => Err(ProviderError::Schema(
            "yahoo sector field data is not an object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> RawObject {
        value.as_object().cloned().expect("test value is an object")
    }

    #[test]
    fn search_without_news_is_empty() {
        let rows = news_rows(&object(json!({ "quotes": [], "news": [] }))).expect("empty list");
        assert!(rows.is_empty());
        let rows = news_rows(&object(json!({ "quotes": [] }))).expect("no list");
        assert!(rows.is_empty());
    }

    #[test]
    fn news_rows_skip_non_objects() {
        let response = object(json!({ "news": [
            { "uuid": "a", "title": "Acme beats estimates" },
            "stray",
        ]}));
        let rows = news_rows(&response).expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "Acme beats estimates");
    }

    #[test]
    fn malformed_news_is_schema_error() {
        let err = news_rows(&object(json!({ "news": { "title": "x" } }))).expect_err("not a list");
        assert!(matches!(err, ProviderError::Schema(_)));
    }

    #[test]
    fn sector_overview_unwraps_data() {
        let response = object(json!({ "data": {
            "name": "Energy",
            "topCompanies": [{ "symbol": "XOM", "name": "Exxon Mobil Corporation" }]
        }}));
        let data = sector_overview(response, "energy").expect("sector data");
        assert_eq!(data["name"], "Energy");

        let err = sector_overview(object(json!({ "data": null })), "energy").expect_err("no data");
        assert_eq!(err, ProviderError::NotFound("sector not found: energy".to_string()));
    }
}
