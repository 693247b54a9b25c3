//! Market type definitions.
//!
//! A [`Market`] ties the unified symbol used by callers (`BTC/USDT`,
//! `BTC/USDT:USDT`) to the venue market id (`BTCUSDT`) and the category that
//! selects the streaming endpoint.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::Symbol;
use crate::error::Error;

/// Venue asset-class partition.
///
/// Selects the public endpoint, the subscribe batch size and the order-book
/// depth tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Spot trading pairs.
    Spot,
    /// USDT/USDC-margined contracts.
    Linear,
    /// Coin-margined contracts.
    Inverse,
    /// Options.
    Option,
}

impl Category {
    /// All categories, in endpoint order.
    pub const ALL: [Category; 4] = [
        Category::Spot,
        Category::Linear,
        Category::Inverse,
        Category::Option,
    ];

    /// Wire name of the category.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Linear => "linear",
            Self::Inverse => "inverse",
            Self::Option => "option",
        }
    }

    /// Returns true for linear and inverse contracts.
    pub fn is_contract(self) -> bool {
        matches!(self, Self::Linear | Self::Inverse)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spot" => Ok(Self::Spot),
            "linear" => Ok(Self::Linear),
            "inverse" => Ok(Self::Inverse),
            "option" => Ok(Self::Option),
            other => Err(Error::param_invalid(format!("unknown category: {other}"))),
        }
    }
}

/// Market metadata needed by the streaming layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Venue market id, e.g. `BTCUSDT`.
    pub id: String,
    /// Unified symbol, e.g. `BTC/USDT:USDT`.
    pub symbol: Symbol,
    /// Base currency code.
    pub base: String,
    /// Quote currency code.
    pub quote: String,
    /// Venue category.
    pub category: Category,
    /// Perpetual contract flag.
    pub swap: bool,
    /// Contract multiplier, when the market is a contract.
    pub contract_size: Option<Decimal>,
    /// Funding interval in milliseconds, when the venue publishes one.
    pub funding_interval_ms: Option<i64>,
}

impl Market {
    /// Creates a spot market.
    pub fn spot(
        id: impl Into<String>,
        symbol: impl Into<String>,
        base: impl Into<String>,
        quote: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            base: base.into(),
            quote: quote.into(),
            category: Category::Spot,
            swap: false,
            contract_size: None,
            funding_interval_ms: None,
        }
    }

    /// Creates a perpetual swap in the given contract category.
    pub fn swap(
        id: impl Into<String>,
        symbol: impl Into<String>,
        base: impl Into<String>,
        quote: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            category,
            swap: true,
            contract_size: Some(Decimal::ONE),
            ..Self::spot(id, symbol, base, quote)
        }
    }

    /// Creates an option market.
    pub fn option(
        id: impl Into<String>,
        symbol: impl Into<String>,
        base: impl Into<String>,
        quote: impl Into<String>,
    ) -> Self {
        Self {
            category: Category::Option,
            ..Self::spot(id, symbol, base, quote)
        }
    }

    /// Sets the funding interval.
    #[must_use]
    pub fn with_funding_interval_ms(mut self, interval_ms: i64) -> Self {
        self.funding_interval_ms = Some(interval_ms);
        self
    }

    /// Returns true for spot markets.
    pub fn is_spot(&self) -> bool {
        self.category == Category::Spot
    }

    /// Returns true for option markets.
    pub fn is_option(&self) -> bool {
        self.category == Category::Option
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trip_names() {
        for cat in Category::ALL {
            assert_eq!(cat.as_str().parse::<Category>().unwrap(), cat);
        }
        assert!("futures".parse::<Category>().is_err());
        assert_eq!("LINEAR".parse::<Category>().unwrap(), Category::Linear);
    }

    #[test]
    fn test_market_constructors() {
        let m = Market::swap("BTCUSDT", "BTC/USDT:USDT", "BTC", "USDT", Category::Linear)
            .with_funding_interval_ms(28_800_000);
        assert!(m.swap);
        assert!(m.category.is_contract());
        assert_eq!(m.funding_interval_ms, Some(28_800_000));

        let o = Market::option("BTC-27DEC24-50000-C", "BTC/USDC:USDC-241227-50000-C", "BTC", "USDC");
        assert!(o.is_option());
        assert!(!o.swap);
    }
}
