//! Provider record normalization.
//!
//! Each data kind has one mapping from its raw, provider-shaped record to the
//! stable payload published to callers. Missing sub-fields become
//! `"unavailable"`; a record with no usable data is reported as not found,
//! except a news feed, where no articles is a valid answer.

mod analyst;
mod events;
mod history;
mod news;
mod profile;
mod sector;
mod statement;
pub mod values;

use serde::Serialize;
use serde_json::Value;

use crate::errors::ProviderError;
use crate::provider::{FetchRequest, HistoryWindow, ProviderRecord};

/// Maps a provider record into the payload for `request`.
///
/// # Errors
/// Returns `NotFound` when the record holds no usable data and `Schema` when
/// the record kind does not match the request.
pub fn normalize(request: &FetchRequest, record: &ProviderRecord) -> Result<Value, ProviderError> {
    match (request, record) {
        (FetchRequest::Profile { symbol }, ProviderRecord::Profile(raw)) => {
            to_payload(&profile::ticker_info(symbol, raw)?)
        }
        (FetchRequest::Statement { symbol, period }, ProviderRecord::Statement(series)) => {
            to_payload(&statement::financial_statement(symbol, *period, series)?)
        }
        (
            FetchRequest::History {
                symbol,
                window,
                interval,
            },
            ProviderRecord::History(series),
        ) => {
            let mut history = history::price_history(symbol, interval, series)?;
            if let HistoryWindow::Dates { start, end } = window {
                let first = values::iso_date(*start);
                let last = values::iso_date(*end);
                history.bars.retain(|bar| {
                    let day = bar.timestamp.get(..10).unwrap_or_default();
                    day >= first.as_str() && day <= last.as_str()
                });
                if history.bars.is_empty() {
                    return Err(ProviderError::NotFound(format!(
                        "no price history for {symbol} between {first} and {last}"
                    )));
                }
            }
            to_payload(&history)
        }
        (FetchRequest::Recommendations { symbol }, ProviderRecord::Recommendations(rows)) => {
            to_payload(&analyst::recommendation_trend(symbol, rows)?)
        }
        (FetchRequest::PriceTargets { symbol }, ProviderRecord::PriceTargets(raw)) => {
            to_payload(&analyst::price_targets(symbol, raw)?)
        }
        (FetchRequest::Revisions { symbol, limit }, ProviderRecord::Revisions(rows)) => {
            to_payload(&analyst::revisions(symbol, rows, *limit)?)
        }
        (FetchRequest::CorporateActions { symbol }, ProviderRecord::CorporateActions(series)) => {
            to_payload(&events::corporate_actions(symbol, series))
        }
        (FetchRequest::Calendar { symbol }, ProviderRecord::Calendar(raw)) => {
            to_payload(&events::earnings_calendar(symbol, raw)?)
        }
        (FetchRequest::News { symbol, limit }, ProviderRecord::News(rows)) => {
            to_payload(&news::news_feed(symbol, rows, *limit))
        }
        (FetchRequest::SectorTop { sector, category }, ProviderRecord::Sector(raw)) => {
            to_payload(&sector::sector_top(sector, *category, raw)?)
        }
        (request, record) => Err(ProviderError::Schema(format!(
            "provider returned a {} record for a {} request",
            record.kind(),
            request.kind()
        ))),
    }
}

fn to_payload<T: Serialize>(value: &T) -> Result<Value, ProviderError> {
    serde_json::to_value(value)
        .map_err(|err| ProviderError::Schema(format!("failed to encode payload: {err}")))
}
