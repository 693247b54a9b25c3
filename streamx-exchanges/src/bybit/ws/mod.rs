//! Bybit V5 websocket session.
//!
//! [`BybitStream`] is a cheap handle over shared session state. Logical
//! clients are created per (category, account) on first use; every watch call
//! returns a [`MessageStream`] fed by the reader tasks of those clients.

mod account;
mod auth;
mod client;
mod orderbook;
mod recovery;
mod router;
mod subscribe;
mod watch;

pub use auth::{AuthStatus, LoginFailure, LoginOutcome};
pub use client::{PRIVATE_SCOPE, client_key};

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use streamx_core::config::StreamConfig;
use streamx_core::credentials::Credentials;
use streamx_core::error::{Error, Result};
use streamx_core::outputs::{MessageStream, OutputQueues};
use streamx_core::types::{
    AccountConfig, Balances, Category, FundingRate, MyTrade, OrderBook, PairTfKline, Position,
    Trade,
};
use streamx_core::ws_client::WsConnector;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::market::MarketLookup;
use super::rest::BybitRestApi;
use super::{BybitOptions, BybitUrls, funding};
use account::AccountCaches;
use auth::AuthCoordinator;
use client::ClientRegistry;
use orderbook::{DepthLimits, OrderBookStore};
use router::MarkPriceCache;

/// Output family; the suffix of a queue key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Order books.
    OrderBook,
    /// Public trades.
    Trades,
    /// Candles.
    Kline,
    /// Mark-price maps.
    MarkPrice,
    /// Balance snapshots.
    Balance,
    /// Position lists.
    Positions,
    /// Leverage changes.
    AccountConfig,
    /// Own fills.
    MyTrades,
}

impl OutputKind {
    /// Queue key suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderBook => "orderbook",
            Self::Trades => "trades",
            Self::Kline => "kline",
            Self::MarkPrice => "markPrice",
            Self::Balance => "balance",
            Self::Positions => "positions",
            Self::AccountConfig => "accConfig",
            Self::MyTrades => "mytrades",
        }
    }
}

/// One queue registry per output family.
pub(crate) struct Outputs {
    pub(crate) order_books: OutputQueues<OrderBook>,
    pub(crate) trades: OutputQueues<Trade>,
    pub(crate) klines: OutputQueues<PairTfKline>,
    pub(crate) mark_prices: OutputQueues<BTreeMap<String, Decimal>>,
    pub(crate) balances: OutputQueues<Balances>,
    pub(crate) positions: OutputQueues<Vec<Position>>,
    pub(crate) account_configs: OutputQueues<AccountConfig>,
    pub(crate) my_trades: OutputQueues<MyTrade>,
}

impl Outputs {
    fn new(capacity: usize) -> Self {
        Self {
            order_books: OutputQueues::new(capacity),
            trades: OutputQueues::new(capacity),
            klines: OutputQueues::new(capacity),
            mark_prices: OutputQueues::new(capacity),
            balances: OutputQueues::new(capacity),
            positions: OutputQueues::new(capacity),
            account_configs: OutputQueues::new(capacity),
            my_trades: OutputQueues::new(capacity),
        }
    }

    fn clear(&self) {
        self.order_books.clear();
        self.trades.clear();
        self.klines.clear();
        self.mark_prices.clear();
        self.balances.clear();
        self.positions.clear();
        self.account_configs.clear();
        self.my_trades.clear();
    }
}

/// Session state shared by the handle and every background task.
pub(crate) struct Inner {
    pub(crate) options: BybitOptions,
    pub(crate) urls: BybitUrls,
    pub(crate) config: StreamConfig,
    pub(crate) connector: Arc<dyn WsConnector>,
    pub(crate) markets: Arc<dyn MarketLookup>,
    pub(crate) rest: Arc<dyn BybitRestApi>,
    pub(crate) accounts: HashMap<String, Credentials>,
    pub(crate) clients: ClientRegistry,
    pub(crate) auth: AuthCoordinator,
    pub(crate) books: OrderBookStore,
    pub(crate) depths: DepthLimits,
    pub(crate) account_caches: AccountCaches,
    pub(crate) mark_prices: MarkPriceCache,
    pub(crate) outputs: Outputs,
    pub(crate) shutdown: CancellationToken,
    pub(crate) heartbeat_started: AtomicBool,
}

impl Inner {
    /// Credentials of `account`; private streams cannot start without them.
    pub(crate) fn credentials(&self, account: &str) -> Result<Credentials> {
        self.accounts
            .get(account)
            .filter(|c| c.is_complete())
            .cloned()
            .ok_or_else(|| Error::authentication(format!("no credentials for account {account}")))
    }

    fn account<'a>(&'a self, account: Option<&'a str>) -> &'a str {
        account.unwrap_or(&self.options.default_account)
    }
}

/// Streaming session handle.
///
/// Cloning is cheap; clones share clients, caches and output queues.
///
/// # Example
///
/// ```no_run
/// use futures::StreamExt;
/// use streamx_exchanges::bybit::BybitBuilder;
///
/// # async fn run(connector: std::sync::Arc<dyn streamx_core::WsConnector>) -> streamx_core::Result<()> {
/// let stream = BybitBuilder::new().connector(connector).build()?;
/// let mut books = stream.watch_order_books(&["BTC/USDT"], 50).await?;
/// while let Some(book) = books.next().await {
///     println!("{:?}", book?.best_bid());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BybitStream {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BybitStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitStream")
            .field("options", &self.inner.options)
            .field("accounts", &self.inner.accounts.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl BybitStream {
    pub(crate) fn new(
        options: BybitOptions,
        config: StreamConfig,
        connector: Arc<dyn WsConnector>,
        markets: Arc<dyn MarketLookup>,
        rest: Arc<dyn BybitRestApi>,
        accounts: HashMap<String, Credentials>,
    ) -> Self {
        let urls = options.urls();
        let outputs = Outputs::new(config.queue_capacity);
        Self {
            inner: Arc::new(Inner {
                options,
                urls,
                config,
                connector,
                markets,
                rest,
                accounts,
                clients: ClientRegistry::default(),
                auth: AuthCoordinator::default(),
                books: OrderBookStore::default(),
                depths: DepthLimits::default(),
                account_caches: AccountCaches::default(),
                mark_prices: MarkPriceCache::default(),
                outputs,
                shutdown: CancellationToken::new(),
                heartbeat_started: AtomicBool::new(false),
            }),
        }
    }

    /// Options the session was built with.
    pub fn options(&self) -> &BybitOptions {
        &self.inner.options
    }

    /// Endpoints in use.
    pub fn urls(&self) -> &BybitUrls {
        &self.inner.urls
    }

    /// Logs the private client of `account` in. Concurrent calls share one
    /// login and one outcome.
    pub async fn login(&self, account: Option<&str>) -> Result<()> {
        let account = self.inner.account(account);
        let client = self.inner.client(None, account).await?;
        self.inner.login(&client, None, false).await
    }

    /// Login state of the private client of `account`.
    pub async fn auth_status(&self, account: Option<&str>) -> AuthStatus {
        let key = client_key(None, self.inner.account(account));
        self.inner.auth.status(&key).await
    }

    /// Current copy of the maintained book of `symbol`.
    pub async fn order_book(&self, symbol: &str) -> Option<OrderBook> {
        self.inner.books.get(symbol).await
    }

    /// Depth currently subscribed for `symbol`.
    pub async fn subscribed_depth(&self, symbol: &str) -> Result<Option<u32>> {
        let market = self.inner.markets.market(symbol)?;
        let key = client_key(Some(market.category), &self.inner.options.default_account);
        Ok(self.inner.depths.get(&key, &market.id).await)
    }

    /// Last mark price seen for `symbol` in `category`.
    pub async fn mark_price(&self, category: Category, symbol: &str) -> Option<Decimal> {
        self.inner.mark_prices.get(category, symbol).await
    }

    /// Cached balance snapshot of `account`.
    pub async fn balances(&self, account: Option<&str>) -> Option<Balances> {
        let account = self.inner.account(account);
        self.inner.account_caches.balances(account).await
    }

    /// Cached open positions of `account`, of one category or all.
    pub async fn positions(&self, account: Option<&str>, category: Option<Category>) -> Vec<Position> {
        let account = self.inner.account(account);
        self.inner.account_caches.positions(account, category).await
    }

    /// Cached leverage of `symbol` on `account`.
    pub async fn leverage(&self, account: Option<&str>, symbol: &str) -> Option<u32> {
        let account = self.inner.account(account);
        self.inner.account_caches.leverage(account, symbol).await
    }

    /// Funding-rate history of a linear or inverse swap over REST.
    pub async fn fetch_funding_rate_history(
        &self,
        symbol: &str,
        since: Option<i64>,
        limit: i64,
        until: Option<i64>,
    ) -> Result<Vec<FundingRate>> {
        funding::fetch_funding_rate_history(
            self.inner.rest.as_ref(),
            self.inner.markets.as_ref(),
            symbol,
            since,
            limit,
            until,
        )
        .await
    }

    /// Stops the heartbeat and every reader task and ends all streams.
    pub fn close(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        info!("closing bybit stream session");
        self.inner.shutdown.cancel();
        self.inner.outputs.clear();
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

/// Result type of every watch call.
pub type WatchResult<T> = Result<MessageStream<T>>;
