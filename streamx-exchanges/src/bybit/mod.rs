//! Bybit V5 streaming sessions.
//!
//! Public market data (order books, trades, candles, mark prices) and private
//! account streams (wallet, positions, leverage, executions) over multiplexed
//! websocket connections, with HMAC-SHA256 login and recovery after
//! reconnects. Build a session with [`BybitBuilder`].

use serde::{Deserialize, Serialize};
use streamx_core::types::Category;

pub mod auth;
pub mod builder;
pub mod error;
pub mod funding;
pub mod market;
pub mod parser;
pub mod rest;
pub mod topics;
pub mod ws;

pub use auth::BybitAuth;
pub use builder::BybitBuilder;
pub use error::{BybitErrorCode, map_ret_code};
pub use market::{MarketLookup, MarketRegistry};
pub use rest::{BybitRestApi, HttpBybitRest};
pub use ws::{AuthStatus, BybitStream};

/// Account name used when the caller does not pick one.
pub const DEFAULT_ACCOUNT: &str = "default";

/// Bybit-specific options.
///
/// # Example
///
/// ```rust
/// use streamx_exchanges::bybit::BybitOptions;
///
/// let options = BybitOptions {
///     testnet: true,
///     ..Default::default()
/// };
/// assert!(options.urls().rest.contains("testnet"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BybitOptions {
    /// Enables testnet environment.
    pub testnet: bool,
    /// Receive window in milliseconds.
    pub recv_window: u64,
    /// Account used by calls that take no account name.
    pub default_account: String,
    /// Overrides the REST base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_url: Option<String>,
    /// Overrides the public websocket base URL (without category suffix).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_public_base: Option<String>,
    /// Overrides the private websocket URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_private: Option<String>,
}

impl Default for BybitOptions {
    fn default() -> Self {
        Self {
            testnet: false,
            recv_window: 5000,
            default_account: DEFAULT_ACCOUNT.to_string(),
            rest_url: None,
            ws_public_base: None,
            ws_private: None,
        }
    }
}

impl BybitOptions {
    /// Endpoints for these options, overrides applied.
    pub fn urls(&self) -> BybitUrls {
        let mut urls = if self.testnet {
            BybitUrls::testnet()
        } else {
            BybitUrls::production()
        };
        if let Some(rest) = &self.rest_url {
            urls.rest.clone_from(rest);
        }
        if let Some(base) = &self.ws_public_base {
            urls.ws_public_base = base.trim_end_matches('/').to_string();
        }
        if let Some(private) = &self.ws_private {
            urls.ws_private.clone_from(private);
        }
        urls
    }
}

/// Bybit API URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BybitUrls {
    /// REST API base URL.
    pub rest: String,
    /// Public WebSocket base URL (without category suffix).
    pub ws_public_base: String,
    /// Private WebSocket URL.
    pub ws_private: String,
}

impl BybitUrls {
    /// Returns production environment URLs.
    pub fn production() -> Self {
        Self {
            rest: "https://api.bybit.com".to_string(),
            ws_public_base: "wss://stream.bybit.com/v5/public".to_string(),
            ws_private: "wss://stream.bybit.com/v5/private".to_string(),
        }
    }

    /// Returns testnet environment URLs.
    pub fn testnet() -> Self {
        Self {
            rest: "https://api-testnet.bybit.com".to_string(),
            ws_public_base: "wss://stream-testnet.bybit.com/v5/public".to_string(),
            ws_private: "wss://stream-testnet.bybit.com/v5/private".to_string(),
        }
    }

    /// Public websocket URL of a category: `<base>/spot`, `<base>/linear`, ...
    pub fn ws_public_for(&self, category: Category) -> String {
        format!("{}/{}", self.ws_public_base, category.as_str())
    }

    /// Websocket URL of a client scope; `None` is the private stream.
    pub fn ws_for(&self, category: Option<Category>) -> String {
        match category {
            Some(category) => self.ws_public_for(category),
            None => self.ws_private.clone(),
        }
    }
}
