//! streamx venue connectors
//!
//! Streaming session layers built on streamx-core.
//!
//! # Supported Venues
//!
//! - Bybit V5: public market data and private account streams
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use streamx_exchanges::bybit::BybitBuilder;
//!
//! # async fn example(connector: Arc<dyn streamx_core::WsConnector>) -> streamx_core::Result<()> {
//! let stream = BybitBuilder::from_env().connector(connector).build()?;
//! let history = stream
//!     .fetch_funding_rate_history("BTC/USDT:USDT", None, 50, None)
//!     .await?;
//! println!("{} funding rows", history.len());
//! # Ok(())
//! # }
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
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::implicit_hasher)]

// Re-export streamx-core
pub use streamx_core;

/// Bybit V5 streaming session
pub mod bybit;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bybit::{AuthStatus, BybitBuilder, BybitOptions, BybitStream, MarketRegistry};
    pub use streamx_core::prelude::*;
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
