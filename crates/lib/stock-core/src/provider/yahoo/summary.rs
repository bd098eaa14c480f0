use serde_json::Value;

use crate::errors::ProviderError;
use crate::provider::RawObject;

pub(super) const PROFILE_MODULES: &[&str] = &[
    "price",
    "summaryProfile",
    "summaryDetail",
    "financialData",
    "defaultKeyStatistics",
    "quoteType",
];
pub(super) const FINANCIAL_DATA_MODULE: &str = "financialData";
pub(super) const RECOMMENDATION_MODULE: &str = "recommendationTrend";
pub(super) const REVISION_MODULE: &str = "upgradeDowngradeHistory";
pub(super) const CALENDAR_MODULE: &str = "calendarEvents";

/// Flattens several modules into one object; earlier modules win on key clashes.
pub(super) fn merged(result: &RawObject, modules: &[&str]) -> RawObject {
    let mut merged = RawObject::new();
    for module in modules {
        let Some(Value::Object(fields)) = result.get(*module) else {
            continue;
        };
        for (key, value) in fields {
            if !value.is_null() && !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

pub(super) fn module_object(result: &RawObject, module: &str) -> Result<RawObject, ProviderError> {
    match result.get(module) {
        Some(Value::Object(fields)) => Ok(fields.clone()),
        Some(Value::Null) | None => Err(ProviderError::NotFound(format!(
            "yahoo has no {module} data"
        ))),
        Some(_) => Err(ProviderError::Schema(format!(
            "yahoo module {module} is not an object"
        ))),
    }
}

pub(super) fn module_rows(
    result: &RawObject,
    module: &str,
    field: &str,
) -> Result<Vec<RawObject>, ProviderError> {
    let fields = module_object(result, module)?;
    match fields.get(field) {
        Some(Value::Array(rows)) => Ok(rows.iter().filter_map(Value::as_object).cloned().collect()),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(ProviderError::Schema(format!(
            "yahoo field {module}.{field} is not a list"
        ))),
    }
}
