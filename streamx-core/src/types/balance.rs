//! Account balance types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::Timestamp;

/// Balance of one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Asset {
    /// Available for trading or withdrawal.
    pub free: Decimal,
    /// Locked in orders and positions.
    pub used: Decimal,
    /// Total equity.
    pub total: Decimal,
    /// Borrowed amount.
    pub debt: Decimal,
    /// Unrealized profit and loss.
    pub upnl: Decimal,
}

impl Asset {
    /// Returns true if every field is zero.
    pub fn is_zero(&self) -> bool {
        self.free.is_zero()
            && self.used.is_zero()
            && self.total.is_zero()
            && self.debt.is_zero()
            && self.upnl.is_zero()
    }
}

/// Balance snapshot of an account.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Balances {
    /// Per-currency balances.
    pub assets: BTreeMap<String, Asset>,
    /// Snapshot time in milliseconds.
    pub timestamp: Timestamp,
    /// Raw payload.
    #[serde(default)]
    pub info: Value,
}

impl Balances {
    /// Balance of `currency`, if present.
    pub fn get(&self, currency: &str) -> Option<&Asset> {
        self.assets.get(currency)
    }

    /// Inserts a currency balance. With `keep_zero` unset, all-zero balances
    /// are dropped.
    pub fn insert(&mut self, currency: impl Into<String>, asset: Asset, keep_zero: bool) {
        if keep_zero || !asset.is_zero() {
            self.assets.insert(currency.into(), asset);
        }
    }
}
