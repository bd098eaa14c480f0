use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{Map, Value, json};
use stock_core::cache::{ResultCache, TtlPolicy};
use stock_core::clock::{Clock, ManualClock};
use stock_core::errors::ProviderError;
use stock_core::provider::memory::InMemoryProvider;
use stock_core::provider::{ProviderAdapter, ProviderRecord, RawObject, RawSeries};
use stock_core::router::ToolDispatcher;
use stock_schema::schema::{DataKind, StatementPeriod};
use stock_schema::{ToolRequest, ToolResult};

struct Harness {
    provider: Arc<InMemoryProvider>,
    clock: Arc<ManualClock>,
    dispatcher: ToolDispatcher,
}

fn harness(provider: InMemoryProvider) -> Harness {
    let provider = Arc::new(provider);
    let clock = Arc::new(ManualClock::default());
    let shared_clock: Arc<dyn Clock> = clock.clone();
    let adapter = ProviderAdapter::new(provider.clone(), shared_clock.clone());
    let cache = ResultCache::new(TtlPolicy::default(), shared_clock.clone());
    Harness {
        provider,
        clock,
        dispatcher: ToolDispatcher::new(adapter, cache, shared_clock),
    }
}

fn object(value: Value) -> RawObject {
    value.as_object().cloned().expect("fixture is an object")
}

fn args(value: Value) -> Map<String, Value> {
    object(value)
}

fn acme_profile() -> ProviderRecord {
    ProviderRecord::Profile(object(json!({
        "name": "Acme Corp",
        "currency": "usd",
        "price": 12.5
    })))
}

fn error_code(result: &ToolResult) -> &str {
    result.error().map_or("", |error| error.code.as_str())
}

fn assert_exactly_one_of_payload_or_error(result: &ToolResult) {
    let value = serde_json::to_value(result).expect("serialize result");
    let has_payload = value.get("payload").is_some();
    let has_error = value.get("error").is_some();
    assert!(has_payload ^ has_error, "result was {value}");
}

#[tokio::test]
async fn ticker_info_example_is_normalized() {
    let h = harness(InMemoryProvider::new().with_record("ACME", acme_profile()));

    let result = h
        .dispatcher
        .dispatch("ticker_info", &args(json!({ "symbol": "ACME" })))
        .await;

    assert_eq!(
        serde_json::to_value(&result).expect("serialize result"),
        json!({
            "status": "success",
            "payload": {
                "symbol": "ACME",
                "name": "Acme Corp",
                "currency": "USD",
                "price": { "amount": 12.5, "currency": "USD" }
            }
        })
    );
}

#[tokio::test]
async fn every_result_carries_payload_or_error() {
    let h = harness(InMemoryProvider::new().with_record("ACME", acme_profile()));
    let calls = [
        ("ticker_info", json!({ "symbol": "ACME" })),
        ("ticker_info", json!({ "symbol": "ZZZZ" })),
        ("ticker_info", json!({})),
        ("no_such_tool", json!({ "symbol": "ACME" })),
        ("market_data", json!({ "symbol": "ACME", "interval": "7m" })),
    ];
    for (tool, arguments) in calls {
        let result = h.dispatcher.dispatch(tool, &args(arguments)).await;
        assert_exactly_one_of_payload_or_error(&result);
    }
}

#[tokio::test]
async fn repeated_call_within_ttl_hits_cache() {
    let h = harness(InMemoryProvider::new().with_record("ACME", acme_profile()));
    let request = ToolRequest::new("ticker_info", args(json!({ "symbol": "acme" })));

    let first = h.dispatcher.dispatch_request(&request).await;
    let second = h
        .dispatcher
        .dispatch("ticker_info", &args(json!({ "symbol": " ACME " })))
        .await;

    assert_eq!(first, second);
    assert_eq!(h.provider.calls(DataKind::Profile), 1);

    h.clock.advance(Duration::from_secs(60 * 60 + 1));
    let third = h.dispatcher.dispatch_request(&request).await;
    assert_eq!(third, first);
    assert_eq!(h.provider.calls(DataKind::Profile), 2);
}

#[tokio::test]
async fn concurrent_identical_calls_fetch_once() {
    let h = harness(
        InMemoryProvider::new()
            .with_record("ACME", acme_profile())
            .with_latency(Duration::from_millis(25)),
    );
    let arguments = args(json!({ "symbol": "ACME" }));

    let results = join_all((0..20).map(|_| h.dispatcher.dispatch("ticker_info", &arguments))).await;

    assert_eq!(h.provider.calls(DataKind::Profile), 1);
    assert!(results.iter().all(ToolResult::is_success));
    assert!(results.iter().all(|result| result == &results[0]));
}

#[tokio::test]
async fn unknown_tool_is_reported() {
    let h = harness(InMemoryProvider::new());
    let result = h
        .dispatcher
        .dispatch("crystal_ball", &args(json!({ "symbol": "ACME" })))
        .await;
    assert_eq!(error_code(&result), "unknown_tool");
    assert_eq!(h.provider.total_calls(), 0);
}

#[tokio::test]
async fn missing_argument_names_the_field() {
    let h = harness(InMemoryProvider::new());
    let result = h
        .dispatcher
        .dispatch("financial_statement", &args(json!({ "period": "quarterly" })))
        .await;
    let error = result.error().expect("error result");
    assert_eq!(error.code, "invalid_argument");
    assert_eq!(error.field.as_deref(), Some("symbol"));
    assert!(!error.retryable);
}

#[tokio::test]
async fn missing_line_item_is_unavailable_not_an_error() {
    let statement = ProviderRecord::Statement(RawSeries::new(
        object(json!({ "financialCurrency": "USD" })),
        vec![object(json!({
            "endDate": "2024-09-28",
            "totalRevenue": 391_035_000_000_i64,
            "netIncome": 93_736_000_000_i64
        }))],
    ));
    let h = harness(InMemoryProvider::new().with_record("AAPL", statement));

    let result = h
        .dispatcher
        .dispatch("financial_statement", &args(json!({ "symbol": "AAPL" })))
        .await;

    let payload = result.payload().expect("success payload");
    let items = &payload["statements"][0]["line_items"];
    assert_eq!(items["total_revenue"], json!(391_035_000_000.0));
    assert_eq!(items["net_income"], json!(93_736_000_000.0));
    assert_eq!(items["ebit"], json!("unavailable"));
    assert_eq!(payload["period"], "annual");
}

#[tokio::test]
async fn transient_failures_within_budget_succeed() {
    let h = harness(
        InMemoryProvider::new()
            .with_record("ACME", acme_profile())
            .with_failures(
                DataKind::Profile,
                "ACME",
                vec![
                    ProviderError::Unavailable("rate limited".to_string()),
                    ProviderError::Unavailable("connection reset".to_string()),
                ],
            ),
    );

    let result = h
        .dispatcher
        .dispatch("ticker_info", &args(json!({ "symbol": "ACME" })))
        .await;

    assert!(result.is_success());
    assert_eq!(h.provider.calls(DataKind::Profile), 3);
}

#[tokio::test]
async fn transient_failures_beyond_budget_are_unavailable() {
    let failures = (0..4)
        .map(|attempt| ProviderError::Unavailable(format!("attempt {attempt} timed out")))
        .collect();
    let h = harness(
        InMemoryProvider::new()
            .with_record("ACME", acme_profile())
            .with_failures(DataKind::Profile, "ACME", failures),
    );

    let result = h
        .dispatcher
        .dispatch("ticker_info", &args(json!({ "symbol": "ACME" })))
        .await;

    let error = result.error().expect("error result");
    assert_eq!(error.code, "upstream_unavailable");
    assert!(error.retryable);
    assert_eq!(h.provider.calls(DataKind::Profile), 3);
}

#[tokio::test]
async fn not_found_is_distinct_and_not_retried() {
    let h = harness(InMemoryProvider::new());
    let result = h
        .dispatcher
        .dispatch("ticker_info", &args(json!({ "symbol": "ZZZZ" })))
        .await;
    assert_eq!(error_code(&result), "not_found");
    assert_eq!(h.provider.calls(DataKind::Profile), 1);
}

#[tokio::test]
async fn errors_are_cached_for_the_shorter_ttl() {
    let h = harness(InMemoryProvider::new());
    let arguments = args(json!({ "symbol": "ZZZZ" }));

    h.dispatcher.dispatch("ticker_info", &arguments).await;
    h.dispatcher.dispatch("ticker_info", &arguments).await;
    assert_eq!(h.provider.calls(DataKind::Profile), 1);

    h.clock.advance(Duration::from_secs(11));
    h.dispatcher.dispatch("ticker_info", &arguments).await;
    assert_eq!(h.provider.calls(DataKind::Profile), 2);
}

#[tokio::test]
async fn schema_drift_is_reported_as_upstream_schema() {
    let h = harness(InMemoryProvider::new().with_failures(
        DataKind::Calendar,
        "ACME",
        vec![ProviderError::Schema("calendarEvents is a list".to_string())],
    ));
    let result = h
        .dispatcher
        .dispatch("earnings_calendar", &args(json!({ "symbol": "ACME" })))
        .await;
    assert_eq!(error_code(&result), "upstream_schema");
    assert_eq!(h.provider.calls(DataKind::Calendar), 1);
}

#[tokio::test]
async fn corporate_actions_without_events_succeed() {
    let h = harness(InMemoryProvider::new().with_record(
        "BRK-A",
        ProviderRecord::CorporateActions(RawSeries::new(
            object(json!({ "currency": "USD" })),
            Vec::new(),
        )),
    ));
    let result = h
        .dispatcher
        .dispatch("corporate_actions", &args(json!({ "symbol": "brk-a" })))
        .await;
    assert_eq!(
        result.payload(),
        Some(&json!({ "symbol": "BRK-A", "currency": "USD", "actions": [] }))
    );
}

#[tokio::test]
async fn revisions_respect_limit() {
    let rows = (1..=5)
        .map(|day| {
            object(json!({
                "gradeDate": format!("2024-09-0{day}"),
                "firm": format!("Firm {day}"),
                "toGrade": "Buy"
            }))
        })
        .collect();
    let h = harness(
        InMemoryProvider::new().with_record("ACME", ProviderRecord::Revisions(rows)),
    );

    let result = h
        .dispatcher
        .dispatch("analyst_revisions", &args(json!({ "symbol": "ACME", "limit": 2 })))
        .await;

    let revisions = result.payload().expect("payload")["revisions"]
        .as_array()
        .cloned()
        .expect("revision list");
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0]["date"], "2024-09-05");
    assert_eq!(revisions[0]["from_grade"], "unavailable");
}

fn statement_series(period_end: &str, revenue: i64) -> RawSeries {
    RawSeries::new(
        object(json!({ "financialCurrency": "USD" })),
        vec![object(json!({ "asOfDate": period_end, "TotalRevenue": revenue }))],
    )
}

#[tokio::test]
async fn statement_periods_are_fetched_and_cached_separately() {
    let h = harness(
        InMemoryProvider::new()
            .with_statement(
                "AAPL",
                StatementPeriod::Annual,
                statement_series("2024-09-30", 391_035_000_000),
            )
            .with_statement(
                "AAPL",
                StatementPeriod::Quarterly,
                statement_series("2024-06-29", 85_777_000_000),
            ),
    );

    let annual = h
        .dispatcher
        .dispatch("financial_statement", &args(json!({ "symbol": "AAPL" })))
        .await;
    let quarterly = h
        .dispatcher
        .dispatch(
            "financial_statement",
            &args(json!({ "symbol": "AAPL", "period": "quarterly" })),
        )
        .await;

    let annual = annual.payload().expect("annual payload");
    let quarterly = quarterly.payload().expect("quarterly payload");
    assert_eq!(annual["period"], "annual");
    assert_eq!(annual["statements"][0]["period_end"], "2024-09-30");
    assert_eq!(quarterly["period"], "quarterly");
    assert_eq!(quarterly["statements"][0]["period_end"], "2024-06-29");
    assert_ne!(
        annual["statements"][0]["line_items"]["total_revenue"],
        quarterly["statements"][0]["line_items"]["total_revenue"]
    );
    assert_eq!(h.provider.calls(DataKind::Statement), 2);
    assert_eq!(h.dispatcher.cache().stats().await.entries, 2);

    h.dispatcher
        .dispatch(
            "financial_statement",
            &args(json!({ "symbol": "aapl", "period": "Quarter" })),
        )
        .await;
    assert_eq!(h.provider.calls(DataKind::Statement), 2);
}

#[tokio::test]
async fn news_without_articles_is_an_empty_success() {
    let h = harness(InMemoryProvider::new().with_record("ACME", ProviderRecord::News(Vec::new())));
    let result = h
        .dispatcher
        .dispatch("news", &args(json!({ "symbol": "acme" })))
        .await;
    assert_eq!(
        result.payload(),
        Some(&json!({ "symbol": "ACME", "articles": [] }))
    );
}

#[tokio::test]
async fn news_respects_limit() {
    let rows = (1..=4)
        .map(|hour| {
            object(json!({
                "title": format!("Story {hour}"),
                "publisher": "Newswire",
                "providerPublishTime": 1_727_740_800 + hour * 3600
            }))
        })
        .collect();
    let h = harness(InMemoryProvider::new().with_record("ACME", ProviderRecord::News(rows)));

    let result = h
        .dispatcher
        .dispatch("news", &args(json!({ "symbol": "ACME", "limit": "3" })))
        .await;

    let articles = result.payload().expect("payload")["articles"]
        .as_array()
        .cloned()
        .expect("article list");
    assert_eq!(articles.len(), 3);
    assert_eq!(articles[0]["title"], "Story 4");
    assert_eq!(articles[0]["link"], "unavailable");
}

#[tokio::test]
async fn sector_top_reads_the_requested_category() {
    let overview = ProviderRecord::Sector(object(json!({
        "name": "Energy",
        "topCompanies": [{ "symbol": "XOM", "name": "Exxon Mobil Corporation", "rating": "Buy" }],
        "topETFs": [{ "symbol": "XLE", "name": "Energy Select Sector SPDR Fund" }]
    })));
    let h = harness(InMemoryProvider::new().with_record("energy", overview));

    let companies = h
        .dispatcher
        .dispatch("sector_top", &args(json!({ "sector": "Energy" })))
        .await;
    let etfs = h
        .dispatcher
        .dispatch("sector_top", &args(json!({ "sector": "energy", "category": "etfs" })))
        .await;
    let funds = h
        .dispatcher
        .dispatch(
            "sector_top",
            &args(json!({ "sector": "energy", "category": "mutual_funds" })),
        )
        .await;

    assert_eq!(
        companies.payload(),
        Some(&json!({
            "sector": "energy",
            "category": "companies",
            "entries": [{ "symbol": "XOM", "name": "Exxon Mobil Corporation", "rating": "Buy" }]
        }))
    );
    assert_eq!(etfs.payload().expect("etfs")["entries"][0]["symbol"], "XLE");
    assert_eq!(error_code(&funds), "not_found");
    assert_eq!(h.provider.calls(DataKind::SectorTop), 3);
}
