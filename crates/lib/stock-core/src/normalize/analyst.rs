use stock_schema::{
    AnalystRevisions,
    Field,
    Money,
    PriceTargets,
    RecommendationPeriod,
    RecommendationTrend,
    Revision,
};

use crate::errors::ProviderError;
use crate::provider::RawObject;

use super::values;

const CURRENCY_KEYS: &[&str] = &["financialCurrency", "currency"];
const TARGET_KEYS: &[&str] = &[
    "targetHighPrice",
    "targetLowPrice",
    "targetMeanPrice",
    "targetMedianPrice",
    "high",
    "low",
    "mean",
    "median",
];
const REVISION_DATE_KEYS: &[&str] = &["epochGradeDate", "gradeDate", "date", "GradeDate"];

pub fn recommendation_trend(
    symbol: &str,
    rows: &[RawObject],
) -> Result<RecommendationTrend, ProviderError> {
    let trend: Vec<RecommendationPeriod> = rows
        .iter()
        .filter_map(|row| {
            let period = values::text(row, &["period"])?;
            let entry = RecommendationPeriod {
                period,
                strong_buy: values::count(row, &["strongBuy", "strong_buy"]).into(),
                buy: values::count(row, &["buy"]).into(),
                hold: values::count(row, &["hold"]).into(),
                sell: values::count(row, &["sell"]).into(),
                strong_sell: values::count(row, &["strongSell", "strong_sell"]).into(),
            };
            let has_counts = [
                &entry.strong_buy,
                &entry.buy,
                &entry.hold,
                &entry.sell,
                &entry.strong_sell,
            ]
            .iter()
            .any(|count| count.is_available());
            has_counts.then_some(entry)
        })
        .collect();

    if trend.is_empty() {
        return Err(ProviderError::NotFound(format!(
            "no analyst recommendations for {symbol}"
        )));
    }
    Ok(RecommendationTrend {
        symbol: symbol.to_string(),
        trend,
    })
}

pub fn price_targets(symbol: &str, raw: &RawObject) -> Result<PriceTargets, ProviderError> {
    let unit = values::currency(raw, CURRENCY_KEYS);
    let money = |keys: &[&str]| -> Field<Money> {
        let amount = values::decimal(raw, keys);
        Field::from_option(
            unit.as_ref()
                .zip(amount)
                .map(|(unit, amount)| Money::new(unit.convert(amount), &unit.code)),
        )
    };

    let high = money(&["targetHighPrice", "high"]);
    let low = money(&["targetLowPrice", "low"]);
    let mean = money(&["targetMeanPrice", "mean"]);
    let median = money(&["targetMedianPrice", "median"]);
    if values::decimal(raw, TARGET_KEYS).is_none() {
        return Err(ProviderError::NotFound(format!(
            "no analyst price targets for {symbol}"
        )));
    }

    Ok(PriceTargets {
        symbol: symbol.to_string(),
        currency: Field::from_option(unit.as_ref().map(|unit| unit.code.clone())),
        current: money(&["currentPrice", "current"]),
        high,
        low,
        mean,
        median,
        analyst_count: values::count(raw, &["numberOfAnalystOpinions", "analyst_count"]).into(),
    })
}

/// Maps upgrade/downgrade history, newest first, truncated to `limit`.
pub fn revisions(
    symbol: &str,
    rows: &[RawObject],
    limit: usize,
) -> Result<AnalystRevisions, ProviderError> {
    let mut dated: Vec<(String, Revision)> = rows
        .iter()
        .filter_map(|row| {
            let date = values::iso_date(values::date(row, REVISION_DATE_KEYS)?);
            let revision = Revision {
                date: date.clone(),
                firm: values::text(row, &["firm", "Firm"]).into(),
                to_grade: values::text(row, &["toGrade", "ToGrade"]).into(),
                from_grade: values::text(row, &["fromGrade", "FromGrade"]).into(),
                action: values::text(row, &["action", "Action"]).into(),
            };
            Some((date, revision))
        })
        .collect();

    if dated.is_empty() {
        return Err(ProviderError::NotFound(format!(
            "no analyst revisions for {symbol}"
        )));
    }
    // Stable sort keeps upstream order for revisions published on the same day.
    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.truncate(limit);

    Ok(AnalystRevisions {
        symbol: symbol.to_string(),
        revisions: dated.into_iter().map(|(_, revision)| revision).collect(),
    })
}
