//! Funding rate types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Symbol, Timestamp};

/// One historical funding rate settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    /// Unified symbol.
    pub symbol: Symbol,
    /// Rate applied at the settlement.
    pub funding_rate: Decimal,
    /// Settlement time in milliseconds.
    pub timestamp: Timestamp,
    /// Raw row.
    #[serde(default)]
    pub info: Value,
}
