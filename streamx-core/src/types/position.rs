//! Position and account configuration types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Symbol, Timestamp};
use crate::types::market::Category;

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// Long exposure.
    Long,
    /// Short exposure.
    Short,
}

/// Open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Unified symbol.
    pub symbol: Symbol,
    /// Category the position lives in.
    pub category: Category,
    /// Direction; `None` for an empty one-way slot.
    pub side: Option<PositionSide>,
    /// Size in contracts or base units.
    pub contracts: Decimal,
    /// Average entry price.
    pub entry_price: Decimal,
    /// Mark price.
    pub mark_price: Decimal,
    /// Position notional.
    pub notional: Decimal,
    /// Leverage, rounded to an integer.
    pub leverage: u32,
    /// Contract multiplier, zero when unknown.
    pub contract_size: Decimal,
    /// Initial margin.
    pub initial_margin: Decimal,
    /// Maintenance margin.
    pub maintenance_margin: Decimal,
    /// Unrealized profit and loss.
    pub unrealized_pnl: Decimal,
    /// Liquidation price, when reported.
    pub liquidation_price: Option<Decimal>,
    /// Isolated margin mode.
    pub isolated: bool,
    /// Hedge mode slot.
    pub hedged: bool,
    /// Last update time in milliseconds.
    pub timestamp: Timestamp,
    /// Raw payload.
    #[serde(default)]
    pub info: Value,
}

/// Leverage setting of a symbol, emitted when it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Unified symbol.
    pub symbol: Symbol,
    /// New leverage.
    pub leverage: u32,
}
