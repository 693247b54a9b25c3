//! Candle types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Symbol, Timestamp};

/// One candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ohlcv {
    /// Candle open time in milliseconds.
    pub timestamp: Timestamp,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Base volume.
    pub volume: Decimal,
    /// Quote turnover.
    pub turnover: Decimal,
}

/// Candle tagged with its symbol and timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairTfKline {
    /// Unified symbol.
    pub symbol: Symbol,
    /// Unified timeframe such as `1m` or `1d`.
    pub timeframe: String,
    /// The candle.
    pub ohlcv: Ohlcv,
}
