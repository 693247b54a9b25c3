//! Bybit V5 topic codec.
//!
//! Pure functions mapping markets and parameters to topic strings, and topic
//! strings back to a [`TopicKind`] the router can dispatch on. Two different
//! depths or intervals for one symbol are different topics, so callers must
//! keep the literal string to unsubscribe later.

use streamx_core::error::{Error, Result};
use streamx_core::types::{Category, Market};

/// Order-book topic prefix.
pub const ORDERBOOK: &str = "orderbook";
/// Public trade topic prefix.
pub const PUBLIC_TRADE: &str = "publicTrade";
/// Candle topic prefix.
pub const KLINE: &str = "kline";
/// Ticker topic prefix.
pub const TICKERS: &str = "tickers";
/// Wallet topic.
pub const WALLET: &str = "wallet";
/// Position topic prefix.
pub const POSITION: &str = "position";
/// Execution topic prefix.
pub const EXECUTION: &str = "execution";

/// Unified timeframe to Bybit interval code.
const TIMEFRAMES: [(&str, &str); 13] = [
    ("1m", "1"),
    ("3m", "3"),
    ("5m", "5"),
    ("15m", "15"),
    ("30m", "30"),
    ("1h", "60"),
    ("2h", "120"),
    ("4h", "240"),
    ("6h", "360"),
    ("12h", "720"),
    ("1d", "D"),
    ("1w", "W"),
    ("1M", "M"),
];

/// Order-book depth the venue offers for a requested limit.
///
/// A non-positive limit picks the category default.
///
/// ```rust
/// use streamx_core::types::Category;
/// use streamx_exchanges::bybit::topics::orderbook_depth;
///
/// assert_eq!(orderbook_depth(Category::Spot, 0), 50);
/// assert_eq!(orderbook_depth(Category::Spot, 120), 200);
/// assert_eq!(orderbook_depth(Category::Option, 30), 100);
/// ```
pub fn orderbook_depth(category: Category, limit: i64) -> u32 {
    if limit <= 0 {
        return if category == Category::Option { 25 } else { 50 };
    }
    if category == Category::Option {
        return if limit <= 25 { 25 } else { 100 };
    }
    match limit {
        1 => 1,
        2..=50 => 50,
        51..=200 => 200,
        _ => 1000,
    }
}

/// Maximum number of topics per subscribe frame.
pub fn batch_size(category: Option<Category>) -> usize {
    match category {
        Some(Category::Spot) => 10,
        Some(Category::Option) => 2000,
        _ => 100,
    }
}

/// `orderbook.<depth>.<id>`
pub fn orderbook_topic(depth: u32, market_id: &str) -> String {
    format!("{ORDERBOOK}.{depth}.{market_id}")
}

/// Symbol part of a public trade topic.
///
/// Option trades are published per base coin, so options use the base, or
/// the first `-` segment of the id when the base is unknown.
pub fn trade_symbol(market: &Market) -> &str {
    if !market.is_option() {
        return &market.id;
    }
    if !market.base.is_empty() {
        return &market.base;
    }
    market.id.split('-').next().unwrap_or(&market.id)
}

/// `publicTrade.<symbol>`
pub fn trade_topic(market: &Market) -> Result<String> {
    let symbol = trade_symbol(market);
    if symbol.is_empty() {
        return Err(Error::param_invalid(format!(
            "invalid market for ws trades: {}",
            market.symbol
        )));
    }
    Ok(format!("{PUBLIC_TRADE}.{symbol}"))
}

/// Bybit interval code for a unified timeframe.
pub fn interval_for(timeframe: &str) -> Option<&'static str> {
    TIMEFRAMES
        .iter()
        .find(|(tf, _)| *tf == timeframe)
        .map(|(_, code)| *code)
}

/// Unified timeframe for a Bybit interval code. Unknown codes pass through.
pub fn timeframe_for(interval: &str) -> String {
    TIMEFRAMES
        .iter()
        .find(|(_, code)| *code == interval)
        .map_or_else(|| interval.to_string(), |(tf, _)| (*tf).to_string())
}

/// `kline.<interval>.<id>` plus the reference key `symbol@interval`.
///
/// The reference key uses the resolved interval so aliases unwatch the same
/// stream.
pub fn kline_topic(market: &Market, timeframe: &str) -> Result<(String, String)> {
    if timeframe.is_empty() {
        return Err(Error::param_invalid("invalid job for watch_ohlcvs"));
    }
    let interval = interval_for(timeframe)
        .ok_or_else(|| Error::param_invalid(format!("invalid timeframe: {timeframe}")))?;
    Ok((
        format!("{KLINE}.{interval}.{}", market.id),
        format!("{}@{interval}", market.symbol),
    ))
}

/// `tickers.<id>`; spot markets carry no mark price.
pub fn mark_price_topic(market: &Market) -> Result<String> {
    if market.is_spot() {
        return Err(Error::not_supported(
            "spot market does not support mark price",
        ));
    }
    Ok(format!("{TICKERS}.{}", market.id))
}

/// Categorised private topic such as `position.linear`, or the bare prefix.
pub fn private_topic(prefix: &str, category: Option<Category>) -> String {
    match category {
        Some(cat) => format!("{prefix}.{cat}"),
        None => prefix.to_string(),
    }
}

/// Splits a topic into up to three dot-separated parts.
///
/// The third part keeps any further dots.
pub fn split_topic(topic: &str) -> (&str, &str, &str) {
    let mut parts = topic.splitn(3, '.');
    let prefix = parts.next().unwrap_or("");
    let mid = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("");
    (prefix, mid, rest)
}

/// Topic family of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// `orderbook.*`
    OrderBook,
    /// `publicTrade.*`
    Trade,
    /// `kline.*`
    Kline,
    /// `tickers.*`
    Ticker,
    /// `wallet`
    Wallet,
    /// `position` or `position.*`
    Position,
    /// `execution` or `execution.*`
    Execution,
    /// Anything else; logged and dropped.
    Unknown,
}

impl TopicKind {
    /// Classifies a topic string.
    pub fn classify(topic: &str) -> Self {
        let (prefix, _, _) = split_topic(topic);
        match prefix {
            ORDERBOOK if topic.len() > ORDERBOOK.len() => Self::OrderBook,
            PUBLIC_TRADE if topic.len() > PUBLIC_TRADE.len() => Self::Trade,
            KLINE if topic.len() > KLINE.len() => Self::Kline,
            TICKERS if topic.len() > TICKERS.len() => Self::Ticker,
            WALLET if topic == WALLET => Self::Wallet,
            POSITION => Self::Position,
            EXECUTION => Self::Execution,
            _ => Self::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot() -> Market {
        Market::spot("BTCUSDT", "BTC/USDT", "BTC", "USDT")
    }

    // ==================== Depth Tests ====================

    #[test]
    fn test_orderbook_depth_tiers() {
        assert_eq!(orderbook_depth(Category::Spot, 0), 50);
        assert_eq!(orderbook_depth(Category::Spot, -5), 50);
        assert_eq!(orderbook_depth(Category::Spot, 1), 1);
        assert_eq!(orderbook_depth(Category::Spot, 2), 50);
        assert_eq!(orderbook_depth(Category::Linear, 50), 50);
        assert_eq!(orderbook_depth(Category::Spot, 120), 200);
        assert_eq!(orderbook_depth(Category::Inverse, 200), 200);
        assert_eq!(orderbook_depth(Category::Spot, 999), 1000);
        assert_eq!(orderbook_depth(Category::Option, 0), 25);
        assert_eq!(orderbook_depth(Category::Option, 10), 25);
        assert_eq!(orderbook_depth(Category::Option, 30), 100);
    }

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(Some(Category::Spot)), 10);
        assert_eq!(batch_size(Some(Category::Option)), 2000);
        assert_eq!(batch_size(Some(Category::Linear)), 100);
        assert_eq!(batch_size(None), 100);
    }

    // ==================== Topic Tests ====================

    #[test]
    fn test_trade_topic_for_option_uses_base() {
        let mut option = Market::option("BTC-27DEC24-50000-C", "BTC/USDC:USDC-241227-50000-C", "BTC", "USDC");
        assert_eq!(trade_topic(&option).unwrap(), "publicTrade.BTC");
        option.base.clear();
        assert_eq!(trade_topic(&option).unwrap(), "publicTrade.BTC");
        assert_eq!(trade_topic(&spot()).unwrap(), "publicTrade.BTCUSDT");
    }

    #[test]
    fn test_kline_topic_and_ref() {
        let (topic, reference) = kline_topic(&spot(), "1d").unwrap();
        assert_eq!(topic, "kline.D.BTCUSDT");
        assert_eq!(reference, "BTC/USDT@D");
        assert!(kline_topic(&spot(), "7m").is_err());
        assert!(kline_topic(&spot(), "").is_err());
    }

    #[test]
    fn test_timeframe_round_trip() {
        assert_eq!(interval_for("1h"), Some("60"));
        assert_eq!(timeframe_for("60"), "1h");
        assert_eq!(timeframe_for("M"), "1M");
        assert_eq!(timeframe_for("999"), "999");
    }

    #[test]
    fn test_mark_price_topic_rejects_spot() {
        let err = mark_price_topic(&spot()).unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
        let swap = Market::swap("BTCUSDT", "BTC/USDT:USDT", "BTC", "USDT", Category::Linear);
        assert_eq!(mark_price_topic(&swap).unwrap(), "tickers.BTCUSDT");
    }

    #[test]
    fn test_private_topic() {
        assert_eq!(private_topic(POSITION, None), "position");
        assert_eq!(private_topic(EXECUTION, Some(Category::Linear)), "execution.linear");
    }

    // ==================== Classification Tests ====================

    #[test]
    fn test_classify() {
        assert_eq!(TopicKind::classify("orderbook.50.BTCUSDT"), TopicKind::OrderBook);
        assert_eq!(TopicKind::classify("publicTrade.BTC"), TopicKind::Trade);
        assert_eq!(TopicKind::classify("kline.5.BTCUSDT"), TopicKind::Kline);
        assert_eq!(TopicKind::classify("tickers.BTCUSDT"), TopicKind::Ticker);
        assert_eq!(TopicKind::classify("wallet"), TopicKind::Wallet);
        assert_eq!(TopicKind::classify("position"), TopicKind::Position);
        assert_eq!(TopicKind::classify("position.linear"), TopicKind::Position);
        assert_eq!(TopicKind::classify("execution.spot"), TopicKind::Execution);
        assert_eq!(TopicKind::classify("greeks.BTC"), TopicKind::Unknown);
        assert_eq!(TopicKind::classify(""), TopicKind::Unknown);
    }

    #[test]
    fn test_split_topic() {
        assert_eq!(split_topic("kline.D.BTCUSDT"), ("kline", "D", "BTCUSDT"));
        assert_eq!(split_topic("tickers.BTCUSDT"), ("tickers", "BTCUSDT", ""));
        assert_eq!(split_topic("wallet"), ("wallet", "", ""));
    }
}
