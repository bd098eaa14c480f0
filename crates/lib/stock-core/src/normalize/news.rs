use serde_json::Value;
use stock_schema::{Field, NewsArticle, NewsFeed};

use crate::provider::RawObject;

use super::values;

const PUBLISHED_KEYS: &[&str] = &["providerPublishTime", "pubDate", "displayTime"];

/// Maps search results into a [`NewsFeed`], newest first, truncated to `limit`.
///
/// Accepts both the flat article shape and the newer one nested under
/// `content`. Articles without a title are dropped; no articles is a valid,
/// empty feed.
#[must_use]
pub fn news_feed(symbol: &str, rows: &[RawObject], limit: usize) -> NewsFeed {
    let mut dated: Vec<(Option<i64>, NewsArticle)> = rows
        .iter()
        .filter_map(|row| {
            let source = row.get("content").and_then(Value::as_object).unwrap_or(row);
            let title = values::text(source, &["title"])?;
            let published = values::timestamp(source, PUBLISHED_KEYS);
            let article = NewsArticle {
                title,
                publisher: Field::from_option(
                    values::text(source, &["publisher"])
                        .or_else(|| nested_text(source, "provider", "displayName")),
                ),
                link: Field::from_option(
                    values::text(source, &["link"])
                        .or_else(|| nested_text(source, "canonicalUrl", "url"))
                        .or_else(|| nested_text(source, "clickThroughUrl", "url")),
                ),
                published_at: Field::from_option(published.map(values::iso_timestamp)),
                related_tickers: related_tickers(row),
            };
            Some((published.map(|ts| ts.timestamp()), article))
        })
        .collect();

    // Undated articles sort last; ties keep upstream order.
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.truncate(limit);

    NewsFeed {
        symbol: symbol.to_string(),
        articles: dated.into_iter().map(|(_, article)| article).collect(),
    }
}

fn nested_text(raw: &RawObject, object: &str, key: &str) -> Option<String> {
    raw.get(object)
        .and_then(Value::as_object)
        .and_then(|inner| values::text(inner, &[key]))
}

fn related_tickers(row: &RawObject) -> Vec<String> {
    row.get("relatedTickers")
        .and_then(Value::as_array)
        .map(|tickers| {
            tickers
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
