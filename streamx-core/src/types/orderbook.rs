//! Order book types.
//!
//! [`BookSide`] keeps price levels sorted in a `BTreeMap` and applies batches
//! of `(price, size)` pairs with upsert-or-remove semantics: a zero size
//! removes the level, anything else sets it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Symbol, Timestamp};

/// One side of a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSide {
    /// Bids iterate from the highest price, asks from the lowest.
    descending: bool,
    /// Maximum number of levels kept; 0 keeps everything.
    depth: usize,
    levels: BTreeMap<Decimal, Decimal>,
}

impl BookSide {
    /// Creates a side from a snapshot of levels. Zero sizes are ignored.
    pub fn new(descending: bool, depth: usize, levels: &[(Decimal, Decimal)]) -> Self {
        let mut side = Self {
            descending,
            depth,
            levels: BTreeMap::new(),
        };
        side.update(levels);
        side
    }

    /// Creates an empty bid side.
    pub fn bids(depth: usize) -> Self {
        Self::new(true, depth, &[])
    }

    /// Creates an empty ask side.
    pub fn asks(depth: usize) -> Self {
        Self::new(false, depth, &[])
    }

    /// Applies a batch of levels: zero size removes, non-zero sets.
    ///
    /// Levels beyond the configured depth are dropped from the worst end.
    pub fn update(&mut self, levels: &[(Decimal, Decimal)]) {
        for &(price, size) in levels {
            if size.is_zero() {
                self.levels.remove(&price);
            } else {
                self.levels.insert(price, size);
            }
        }
        self.trim();
    }

    fn trim(&mut self) {
        if self.depth == 0 {
            return;
        }
        while self.levels.len() > self.depth {
            let worst = if self.descending {
                self.levels.keys().next().copied()
            } else {
                self.levels.keys().next_back().copied()
            };
            match worst {
                Some(price) => {
                    self.levels.remove(&price);
                }
                None => break,
            }
        }
    }

    /// Iterates levels best-first.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Decimal, Decimal)> + '_> {
        let it = self.levels.iter().map(|(p, s)| (*p, *s));
        if self.descending {
            Box::new(it.rev())
        } else {
            Box::new(it)
        }
    }

    /// Best level of the side.
    pub fn best(&self) -> Option<(Decimal, Decimal)> {
        self.iter().next()
    }

    /// Size resting at `price`.
    pub fn size_at(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price).copied()
    }

    /// Levels best-first as a vector.
    pub fn to_vec(&self) -> Vec<(Decimal, Decimal)> {
        self.iter().collect()
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if the side has no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Configured depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Sum of sizes on this side.
    pub fn volume(&self) -> Decimal {
        self.levels.values().copied().sum()
    }
}

/// Maintained order book of one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Unified symbol.
    pub symbol: Symbol,
    /// Timestamp of the last applied update, in milliseconds.
    pub timestamp: Timestamp,
    /// Update id of the last applied update.
    pub nonce: i64,
    /// Bid side, best (highest) first.
    pub bids: BookSide,
    /// Ask side, best (lowest) first.
    pub asks: BookSide,
    /// Depth the book was subscribed with.
    pub limit: usize,
}

impl OrderBook {
    /// Builds a book from a full snapshot.
    pub fn from_snapshot(
        symbol: impl Into<Symbol>,
        timestamp: Timestamp,
        nonce: i64,
        limit: usize,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            nonce,
            bids: BookSide::new(true, limit, bids),
            asks: BookSide::new(false, limit, asks),
            limit,
        }
    }

    /// Merges a delta.
    ///
    /// An empty level list leaves that side untouched. Timestamp and nonce are
    /// always overwritten.
    pub fn apply_delta(
        &mut self,
        timestamp: Timestamp,
        nonce: i64,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
    ) {
        if !bids.is_empty() {
            self.bids.update(bids);
        }
        if !asks.is_empty() {
            self.asks.update(asks);
        }
        self.timestamp = timestamp;
        self.nonce = nonce;
    }

    /// Highest bid.
    pub fn best_bid(&self) -> Option<(Decimal, Decimal)> {
        self.bids.best()
    }

    /// Lowest ask.
    pub fn best_ask(&self) -> Option<(Decimal, Decimal)> {
        self.asks.best()
    }

    /// Ask minus bid.
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.0 - self.best_bid()?.0)
    }

    /// Midpoint of the best bid and ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.best_ask()?.0 + self.best_bid()?.0) / Decimal::TWO)
    }
}
