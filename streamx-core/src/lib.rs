//! streamx core library
//!
//! Venue-neutral building blocks for realtime exchange sessions: the error
//! taxonomy, configuration and credentials, logging setup, the transport
//! seam the session layer writes through, typed output queues, and the
//! domain types (order books, trades, candles, balances, positions).
//!
//! # Features
//!
//! - **Precision**: prices and sizes are `rust_decimal::Decimal`
//! - **Async**: built on tokio; every watch call returns a [`MessageStream`]
//! - **Testability**: the `test-utils` feature exposes an in-memory transport
//!
//! # Example
//!
//! ```rust
//! use streamx_core::prelude::*;
//! use rust_decimal_macros::dec;
//!
//! let mut book = OrderBook::from_snapshot(
//!     "BTC/USDT",
//!     1_700_000_000_000,
//!     1,
//!     50,
//!     &[(dec!(100), dec!(1))],
//!     &[(dec!(101), dec!(2))],
//! );
//! book.apply_delta(1_700_000_000_100, 2, &[(dec!(100), dec!(0))], &[]);
//! assert!(book.best_bid().is_none());
//! assert_eq!(book.spread(), None);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::unreadable_literal)]

// Re-exports of external dependencies
pub use rust_decimal;
pub use serde;
pub use serde_json;

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod outputs;
pub mod parser_utils;
pub mod signal;
pub mod types;
pub mod ws_client;

pub use config::{RetryPolicy, StreamConfig};
pub use credentials::{Credentials, SecretString};
pub use error::{ContextExt, Error, ExchangeErrorDetails, NetworkError, ParseError, Result};
pub use outputs::{MessageStream, OutputQueues};
pub use signal::OnceSignal;
pub use types::{
    AccountConfig, Asset, Balances, BookSide, Category, Fee, FundingRate, Market, MyTrade, Ohlcv,
    OrderBook, OrderState, PairTfKline, Position, PositionSide, Side, Symbol, Timestamp, Trade,
};
pub use ws_client::{ConnId, TransportEvent, WsConnector, WsTransport};
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// ```rust
/// use streamx_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{RetryPolicy, StreamConfig};
    pub use crate::credentials::{Credentials, SecretString};
    pub use crate::error::{ContextExt, Error, Result};
    pub use crate::logging::{LogConfig, LogFormat, LogLevel, init_logging, try_init_logging};
    pub use crate::outputs::{MessageStream, OutputQueues};
    pub use crate::parser_utils::milliseconds;
    pub use crate::signal::OnceSignal;
    pub use crate::types::{
        AccountConfig, Asset, Balances, BookSide, Category, Fee, FundingRate, Market, MyTrade,
        Ohlcv, OrderBook, OrderState, PairTfKline, Position, PositionSide, Side, Symbol,
        Timestamp, Trade,
    };
    pub use crate::ws_client::{ConnId, TransportEvent, WsConnector, WsTransport};
    pub use rust_decimal::Decimal;
    pub use tokio_util::sync::CancellationToken;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "streamx-core");
    }
}
