//! Market metadata lookup.
//!
//! The session layer only needs two directions: unified symbol to market
//! (for outbound topics) and venue id plus category to unified symbol (for
//! inbound frames). Venue ids repeat across categories (`BTCUSDT` is both a
//! spot pair and a linear perpetual), so reverse lookups are category-scoped.

use std::collections::HashMap;
use streamx_core::error::{Error, Result};
use streamx_core::types::{Category, Market};

/// Source of market metadata.
pub trait MarketLookup: Send + Sync {
    /// Market for a unified symbol.
    fn market(&self, symbol: &str) -> Result<Market>;

    /// Market for a venue id within a category.
    fn market_by_id(&self, id: &str, category: Category) -> Option<Market>;

    /// Unified symbol for a venue id, falling back to the id itself.
    fn safe_symbol(&self, id: &str, category: Category) -> String {
        self.market_by_id(id, category)
            .map_or_else(|| id.to_string(), |m| m.symbol)
    }
}

/// In-memory market table.
///
/// ```rust
/// use streamx_core::types::{Category, Market};
/// use streamx_exchanges::bybit::market::{MarketLookup, MarketRegistry};
///
/// let registry = MarketRegistry::new(vec![
///     Market::spot("BTCUSDT", "BTC/USDT", "BTC", "USDT"),
///     Market::swap("BTCUSDT", "BTC/USDT:USDT", "BTC", "USDT", Category::Linear),
/// ]);
/// assert_eq!(registry.safe_symbol("BTCUSDT", Category::Linear), "BTC/USDT:USDT");
/// assert_eq!(registry.safe_symbol("XYZ", Category::Spot), "XYZ");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MarketRegistry {
    by_symbol: HashMap<String, Market>,
    by_id: HashMap<(Category, String), String>,
}

impl MarketRegistry {
    /// Builds a registry from a list of markets.
    pub fn new(markets: impl IntoIterator<Item = Market>) -> Self {
        let mut registry = Self::default();
        for market in markets {
            registry.insert(market);
        }
        registry
    }

    /// Adds or replaces a market.
    pub fn insert(&mut self, market: Market) {
        self.by_id
            .insert((market.category, market.id.clone()), market.symbol.clone());
        self.by_symbol.insert(market.symbol.clone(), market);
    }

    /// Number of markets.
    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    /// Returns true if no markets are loaded.
    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

impl MarketLookup for MarketRegistry {
    fn market(&self, symbol: &str) -> Result<Market> {
        if symbol.is_empty() {
            return Err(Error::param_required("symbol is required"));
        }
        self.by_symbol
            .get(symbol)
            .cloned()
            .ok_or_else(|| Error::param_invalid(format!("unknown symbol: {symbol}")))
    }

    fn market_by_id(&self, id: &str, category: Category) -> Option<Market> {
        let symbol = self.by_id.get(&(category, id.to_string()))?;
        self.by_symbol.get(symbol).cloned()
    }
}
