//! # streamx
//!
//! Realtime exchange streaming sessions in Rust: order books, trades, candles,
//! mark prices and account state over multiplexed WebSocket connections.
//!
//! ## Features
//!
//! - **Async/Await**: built on tokio; every watch call returns a stream
//! - **Recovery**: subscriptions survive reconnects, private streams log in
//!   again before resubscribing
//! - **Precision**: prices and sizes are `rust_decimal::Decimal`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use streamx::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run(connector: Arc<dyn WsConnector>) -> Result<()> {
//! let bybit = BybitBuilder::from_env().connector(connector).build()?;
//! bybit.login(None).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Re-export core types and traits
pub use streamx_core::{
    error::{Error, Result},
    types::*,
};

// Re-export venue sessions
pub use streamx_exchanges::bybit;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use streamx_exchanges::prelude::*;
}
