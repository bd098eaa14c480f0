use serde_json::Value;
use stock_schema::schema::SectorCategory;
use stock_schema::{Field, SectorEntry, SectorTop};

use crate::errors::ProviderError;
use crate::provider::RawObject;

use super::values;

const fn list_key(category: SectorCategory) -> &'static str {
    match category {
        SectorCategory::Companies => "topCompanies",
        SectorCategory::Etfs => "topETFs",
        SectorCategory::MutualFunds => "topMutualFunds",
    }
}

/// Maps one top-holdings list of a sector overview into [`SectorTop`].
///
/// # Errors
/// Returns `NotFound` when the list is missing or has no entry with a symbol,
/// and `Schema` when it is not a list.
pub fn sector_top(
    sector: &str,
    category: SectorCategory,
    raw: &RawObject,
) -> Result<SectorTop, ProviderError> {
    let key = list_key(category);
    let rows: &[Value] = match raw.get(key) {
        Some(Value::Array(rows)) => rows,
        Some(Value::Null) | None => &[],
        Some(_) => {
            return Err(ProviderError::Schema(format!(
                "sector field {key} is not a list"
            )));
        }
    };

    let entries: Vec<SectorEntry> = rows
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|row| {
            Some(SectorEntry {
                symbol: values::text(row, &["symbol"])?,
                name: Field::from_option(values::text(row, &["name", "shortName"])),
                rating: values::text(row, &["rating"]),
                market_weight: values::decimal(row, &["marketWeight"]),
            })
        })
        .collect();

    if entries.is_empty() {
        return Err(ProviderError::NotFound(format!(
            "no top {category} for sector {sector}"
        )));
    }

    Ok(SectorTop {
        sector: sector.to_string(),
        category,
        entries,
    })
}
