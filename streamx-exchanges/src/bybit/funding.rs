//! Funding-rate history pagination.
//!
//! The venue caps a page at 200 rows and only accepts a time window, so
//! longer histories are walked forward from `since`. The step between pages
//! is inferred from the rows themselves because funding intervals differ per
//! market and can change over time.

use streamx_core::error::{Error, Result};
use streamx_core::types::{Category, FundingRate};
use tracing::debug;

use super::market::MarketLookup;
use super::parser::parse_funding_page;
use super::rest::{BybitRestApi, FUNDING_PAGE_CAP};

/// Step assumed when neither the rows nor the market say otherwise.
pub const DEFAULT_FUNDING_INTERVAL_MS: i64 = 8 * 60 * 60 * 1000;

/// Fetches funding history for `symbol`.
///
/// - `limit <= 0` means 200.
/// - With `since` set and no `until`, the window ends at
///   `since + limit * funding_interval`; that needs a known interval.
/// - Pages continue while a page is full and `last + interval < until`.
///
/// Rows come back ascending with one row per settlement time.
pub async fn fetch_funding_rate_history(
    rest: &dyn BybitRestApi,
    markets: &dyn MarketLookup,
    symbol: &str,
    since: Option<i64>,
    limit: i64,
    until: Option<i64>,
) -> Result<Vec<FundingRate>> {
    if symbol.is_empty() {
        return Err(Error::param_required("symbol is required"));
    }
    let limit = if limit <= 0 { FUNDING_PAGE_CAP } else { limit };
    let market = markets.market(symbol)?;
    if !market.swap || !matches!(market.category, Category::Linear | Category::Inverse) {
        return Err(Error::not_supported(format!(
            "funding rate history is only available for linear and inverse swaps, got {symbol}"
        )));
    }

    let page_limit = limit.min(FUNDING_PAGE_CAP);
    let interval = market.funding_interval_ms.unwrap_or(0);
    let mut start = since.filter(|s| *s > 0);
    let mut until = until.filter(|u| *u > 0);
    if let Some(since) = start {
        if until.is_none() {
            if interval <= 0 {
                return Err(Error::param_required(
                    "until is required when the funding interval is unknown",
                ));
            }
            until = Some(since + limit * interval);
        }
    }

    let mut rates: Vec<FundingRate> = Vec::new();
    loop {
        let result = rest
            .funding_history_page(market.category, &market.id, start, until, page_limit)
            .await?;
        let page = parse_funding_page(&result, markets, market.category)?;
        debug!(
            symbol,
            start = ?start,
            rows = page.raw_len,
            last = page.last_ms,
            "funding history page"
        );

        let observed = match page.rates.as_slice() {
            [first, second, ..] => (second.timestamp - first.timestamp).abs(),
            _ => 0,
        };
        let step = if observed > 0 {
            observed
        } else if interval > 0 {
            interval
        } else {
            DEFAULT_FUNDING_INTERVAL_MS
        };
        let last_ms = page.last_ms;
        let full = page.raw_len as i64 == FUNDING_PAGE_CAP;
        rates.extend(page.rates);

        let has_more = match until {
            Some(until) => full && last_ms > 0 && last_ms + step < until,
            None => false,
        };
        if !has_more {
            break;
        }
        start = Some(last_ms + step);
    }

    rates.sort_by_key(|r| r.timestamp);
    rates.dedup_by_key(|r| r.timestamp);
    Ok(rates)
}
