//! Bybit session builder.
//!
//! Provides a fluent API for assembling a [`BybitStream`]: accounts, market
//! metadata, the websocket transport and the REST collaborator.

use super::market::{MarketLookup, MarketRegistry};
use super::rest::{BybitRestApi, HttpBybitRest};
use super::{BybitOptions, BybitStream};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use streamx_core::config::{RetryPolicy, StreamConfig};
use streamx_core::credentials::Credentials;
use streamx_core::error::{Error, Result};
use streamx_core::ws_client::WsConnector;
use tracing::debug;

/// Environment variable holding the API key of the default account.
pub const ENV_API_KEY: &str = "BYBIT_API_KEY";
/// Environment variable holding the secret of the default account.
pub const ENV_SECRET: &str = "BYBIT_SECRET";
/// Environment variable enabling testnet (`1` or `true`).
pub const ENV_TESTNET: &str = "BYBIT_TESTNET";

/// Builder for [`BybitStream`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use streamx_core::credentials::Credentials;
/// use streamx_core::types::Market;
/// use streamx_exchanges::bybit::{BybitBuilder, MarketRegistry};
///
/// # fn run(connector: Arc<dyn streamx_core::WsConnector>) -> streamx_core::Result<()> {
/// let stream = BybitBuilder::new()
///     .account("main", Credentials::new("key", "secret"))
///     .markets(MarketRegistry::new(vec![Market::spot("BTCUSDT", "BTC/USDT", "BTC", "USDT")]))
///     .connector(connector)
///     .testnet(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BybitBuilder {
    options: BybitOptions,
    config: StreamConfig,
    retry: RetryPolicy,
    accounts: HashMap<String, Credentials>,
    markets: Option<Arc<dyn MarketLookup>>,
    connector: Option<Arc<dyn WsConnector>>,
    rest: Option<Arc<dyn BybitRestApi>>,
}

impl std::fmt::Debug for BybitBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitBuilder")
            .field("options", &self.options)
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("accounts", &self.accounts.keys().collect::<Vec<_>>())
            .field("has_connector", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for BybitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BybitBuilder {
    /// Creates a builder with default options and no accounts.
    pub fn new() -> Self {
        Self {
            options: BybitOptions::default(),
            config: StreamConfig::default(),
            retry: RetryPolicy::default(),
            accounts: HashMap::new(),
            markets: None,
            connector: None,
            rest: None,
        }
    }

    /// Creates a builder from `BYBIT_API_KEY`, `BYBIT_SECRET` and
    /// `BYBIT_TESTNET`, reading a `.env` file first when one exists.
    ///
    /// The credentials become the default account when both are set.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            debug!(error = %e, "no .env file loaded");
        }
        let mut builder = Self::new();
        if let Some(credentials) = Credentials::from_env(ENV_API_KEY, ENV_SECRET) {
            builder = builder.account(super::DEFAULT_ACCOUNT, credentials);
        }
        let testnet = std::env::var(ENV_TESTNET)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        builder.testnet(testnet)
    }

    /// Registers credentials under an account name.
    pub fn account(mut self, name: impl Into<String>, credentials: Credentials) -> Self {
        self.accounts.insert(name.into(), credentials);
        self
    }

    /// Sets the account used when a call names none.
    pub fn default_account(mut self, name: impl Into<String>) -> Self {
        self.options.default_account = name.into();
        self
    }

    /// Sets the market table.
    pub fn markets(mut self, markets: MarketRegistry) -> Self {
        self.markets = Some(Arc::new(markets));
        self
    }

    /// Sets a custom market source.
    pub fn market_lookup(mut self, markets: Arc<dyn MarketLookup>) -> Self {
        self.markets = Some(markets);
        self
    }

    /// Sets the websocket transport factory. Required.
    pub fn connector(mut self, connector: Arc<dyn WsConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replaces the REST collaborator.
    pub fn rest(mut self, rest: Arc<dyn BybitRestApi>) -> Self {
        self.rest = Some(rest);
        self
    }

    /// Sets the session tunables.
    pub fn stream_config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the keepalive ping interval.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// Sets the login deadline.
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.config.login_timeout = timeout;
        self
    }

    /// Sets the retry policy of the default REST collaborator.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enables or disables testnet mode.
    pub fn testnet(mut self, enabled: bool) -> Self {
        self.options.testnet = enabled;
        self
    }

    /// Sets the receive window for signed requests, in milliseconds.
    pub fn recv_window(mut self, millis: u64) -> Self {
        self.options.recv_window = millis;
        self
    }

    /// Overrides the REST base URL.
    pub fn rest_url(mut self, url: impl Into<String>) -> Self {
        self.options.rest_url = Some(url.into());
        self
    }

    /// Overrides the public websocket base URL.
    pub fn ws_public_base(mut self, url: impl Into<String>) -> Self {
        self.options.ws_public_base = Some(url.into());
        self
    }

    /// Overrides the private websocket URL.
    pub fn ws_private(mut self, url: impl Into<String>) -> Self {
        self.options.ws_private = Some(url.into());
        self
    }

    /// Sets all options at once.
    pub fn options(mut self, options: BybitOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the session.
    ///
    /// # Errors
    ///
    /// Returns `ParamRequired` when no connector was set and `ParamInvalid`
    /// for a zero ping interval or login timeout.
    pub fn build(self) -> Result<BybitStream> {
        let connector = self
            .connector
            .ok_or_else(|| Error::param_required("a websocket connector is required"))?;
        if self.config.ping_interval.is_zero() {
            return Err(Error::param_invalid("ping interval must be positive"));
        }
        if self.config.login_timeout.is_zero() {
            return Err(Error::param_invalid("login timeout must be positive"));
        }
        let rest = self.rest.unwrap_or_else(|| {
            Arc::new(HttpBybitRest::new(
                self.options.urls().rest,
                self.options.recv_window,
                self.retry,
            ))
        });
        let markets = self
            .markets
            .unwrap_or_else(|| Arc::new(MarketRegistry::default()));
        Ok(BybitStream::new(
            self.options,
            self.config,
            connector,
            markets,
            rest,
            self.accounts,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamx_core::ws_client::mock::MockConnector;

    fn connector() -> Arc<dyn WsConnector> {
        Arc::new(MockConnector::new(10))
    }

    #[test]
    fn test_builder_defaults() {
        let builder = BybitBuilder::new();
        assert!(!builder.options.testnet);
        assert_eq!(builder.options.recv_window, 5000);
        assert!(builder.accounts.is_empty());
    }

    #[test]
    fn test_build_requires_connector() {
        let err = BybitBuilder::new().build().unwrap_err();
        assert!(matches!(err, Error::ParamRequired(_)));
    }

    #[test]
    fn test_build_rejects_zero_ping_interval() {
        let err = BybitBuilder::new()
            .connector(connector())
            .ping_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ParamInvalid(_)));
    }

    #[test]
    fn test_builder_overrides() {
        let stream = BybitBuilder::new()
            .connector(connector())
            .testnet(true)
            .ws_private("ws://127.0.0.1:9/private")
            .default_account("main")
            .account("main", Credentials::new("k", "s"))
            .build()
            .unwrap();
        assert!(stream.urls().rest.contains("testnet"));
        assert_eq!(stream.urls().ws_private, "ws://127.0.0.1:9/private");
        assert_eq!(stream.options().default_account, "main");
    }
}
