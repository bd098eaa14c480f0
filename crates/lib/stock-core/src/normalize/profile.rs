use stock_schema::{Field, Money, TickerInfo};

use crate::errors::ProviderError;
use crate::provider::RawObject;

use super::values::{self, CurrencyUnit};

const NAME_KEYS: &[&str] = &["longName", "shortName", "name", "displayName"];
const CURRENCY_KEYS: &[&str] = &["currency", "financialCurrency"];
const PRICE_KEYS: &[&str] = &["currentPrice", "regularMarketPrice", "price"];
const EXCHANGE_KEYS: &[&str] = &["fullExchangeName", "exchangeName", "exchange"];
const SUMMARY_KEYS: &[&str] = &["longBusinessSummary", "description", "summary"];
const EMPLOYEE_KEYS: &[&str] = &["fullTimeEmployees", "employees"];

/// Maps a raw profile into [`TickerInfo`].
///
/// Quote-denominated values (price, 52-week range) follow the quote currency,
/// so pence and cents are converted; market cap is already reported in major
/// units.
pub fn ticker_info(symbol: &str, raw: &RawObject) -> Result<TickerInfo, ProviderError> {
    let name = values::text(raw, NAME_KEYS);
    let unit = values::currency(raw, CURRENCY_KEYS);
    let price = values::decimal(raw, PRICE_KEYS);

    if name.is_none() && price.is_none() {
        return Err(ProviderError::NotFound(format!(
            "no profile data for {symbol}"
        )));
    }

    let quoted = |keys: &[&str]| -> Option<Money> {
        let unit = unit.as_ref()?;
        values::decimal(raw, keys).map(|amount| Money::new(unit.convert(amount), &unit.code))
    };

    let mut info = TickerInfo::new(symbol);
    info.name = Field::from_option(name);
    info.currency = Field::from_option(unit.as_ref().map(|unit| unit.code.clone()));
    info.price = Field::from_option(quoted(PRICE_KEYS));
    info.exchange = values::text(raw, EXCHANGE_KEYS);
    info.quote_type = values::text(raw, &["quoteType"]);
    info.sector = values::text(raw, &["sector"]);
    info.industry = values::text(raw, &["industry"]);
    info.country = values::text(raw, &["country"]);
    info.website = values::text(raw, &["website"]);
    info.summary = values::text(raw, SUMMARY_KEYS);
    info.employees = values::unsigned(raw, EMPLOYEE_KEYS);
    info.market_cap = unit.as_ref().and_then(|unit| major_money(raw, "marketCap", unit));
    info.trailing_pe = values::decimal(raw, &["trailingPE"]);
    info.forward_pe = values::decimal(raw, &["forwardPE"]);
    info.dividend_yield = values::decimal(raw, &["dividendYield"]);
    info.fifty_two_week_high = quoted(&["fiftyTwoWeekHigh"]);
    info.fifty_two_week_low = quoted(&["fiftyTwoWeekLow"]);
    Ok(info)
}

fn major_money(raw: &RawObject, key: &str, unit: &CurrencyUnit) -> Option<Money> {
    values::decimal(raw, &[key]).map(|amount| Money::new(amount, &unit.code))
}
