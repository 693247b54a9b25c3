//! Trade and fill types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Symbol, Timestamp};

/// Aggressor or order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy side.
    Buy,
    /// Sell side.
    Sell,
}

impl Side {
    /// Parses `Buy` / `Sell` in any letter case.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("buy") {
            Some(Self::Buy)
        } else if s.eq_ignore_ascii_case("sell") {
            Some(Self::Sell)
        } else {
            None
        }
    }
}

/// Public trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Trade id.
    pub id: String,
    /// Unified symbol.
    pub symbol: Symbol,
    /// Execution time in milliseconds.
    pub timestamp: Timestamp,
    /// Aggressor side, if reported.
    pub side: Option<Side>,
    /// Price.
    pub price: Decimal,
    /// Amount in base units.
    pub amount: Decimal,
    /// Price times amount.
    pub cost: Decimal,
    /// Raw payload.
    #[serde(default)]
    pub info: Value,
}

/// Fee charged on a fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    /// Fee amount.
    pub cost: Decimal,
    /// Fee currency.
    pub currency: String,
}

/// Order state derived from a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Nothing filled yet.
    Open,
    /// Some quantity filled.
    PartiallyFilled,
    /// Fully filled.
    Filled,
}

impl OrderState {
    /// Derives the state from order, leaves and executed quantities.
    ///
    /// When the order quantity is unknown (zero), any executed quantity counts
    /// as a partial fill.
    pub fn from_quantities(
        order_qty: Decimal,
        leaves_qty: Decimal,
        filled: Decimal,
        exec_qty: Decimal,
    ) -> Self {
        if order_qty > Decimal::ZERO {
            if filled <= Decimal::ZERO {
                Self::Open
            } else if leaves_qty <= Decimal::ZERO || filled >= order_qty {
                Self::Filled
            } else {
                Self::PartiallyFilled
            }
        } else if exec_qty > Decimal::ZERO {
            Self::PartiallyFilled
        } else {
            Self::Open
        }
    }
}

/// Private fill of one of the account's orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MyTrade {
    /// Execution id.
    pub id: String,
    /// Order id.
    pub order_id: String,
    /// Client order id, empty when unset.
    pub client_order_id: String,
    /// Unified symbol.
    pub symbol: Symbol,
    /// Execution time in milliseconds.
    pub timestamp: Timestamp,
    /// Order side.
    pub side: Option<Side>,
    /// Lowercased venue order type, e.g. `limit`.
    pub order_type: String,
    /// Execution price.
    pub price: Decimal,
    /// Executed quantity.
    pub amount: Decimal,
    /// Executed value.
    pub cost: Decimal,
    /// Fee, omitted when zero.
    pub fee: Option<Fee>,
    /// Whether the fill was on the maker side.
    pub maker: bool,
    /// Total order quantity.
    pub order_amount: Decimal,
    /// Cumulative filled quantity of the order.
    pub filled: Decimal,
    /// Remaining order quantity.
    pub remaining: Decimal,
    /// Order state after this fill.
    pub state: OrderState,
    /// Raw payload.
    #[serde(default)]
    pub info: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_side_parse() {
        assert_eq!(Side::parse("Buy"), Some(Side::Buy));
        assert_eq!(Side::parse("SELL"), Some(Side::Sell));
        assert_eq!(Side::parse(""), None);
    }

    #[test]
    fn test_order_state_from_quantities() {
        assert_eq!(
            OrderState::from_quantities(dec!(1), dec!(1), dec!(0), dec!(0)),
            OrderState::Open
        );
        assert_eq!(
            OrderState::from_quantities(dec!(1), dec!(0.4), dec!(0.6), dec!(0.6)),
            OrderState::PartiallyFilled
        );
        assert_eq!(
            OrderState::from_quantities(dec!(1), dec!(0), dec!(1), dec!(0.4)),
            OrderState::Filled
        );
        assert_eq!(
            OrderState::from_quantities(dec!(0), dec!(0), dec!(0.2), dec!(0.2)),
            OrderState::PartiallyFilled
        );
        assert_eq!(
            OrderState::from_quantities(dec!(0), dec!(0), dec!(0), dec!(0)),
            OrderState::Open
        );
    }
}
