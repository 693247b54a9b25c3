//! Watch and unwatch operations.
//!
//! Every watch call opens its output stream before writing topics, so no
//! frame that arrives right after the subscribe is lost. A failed write
//! releases the references the call registered.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use streamx_core::error::{Error, Result};
use streamx_core::outputs::OutputQueues;
use streamx_core::types::{
    AccountConfig, Balances, Category, Market, MyTrade, OrderBook, PairTfKline, Position, Trade,
};
use tracing::{debug, instrument, warn};

use super::client::WsClient;
use super::{BybitStream, Inner, OutputKind, WatchResult};
use crate::bybit::topics::{
    EXECUTION, POSITION, TopicKind, WALLET, kline_topic, mark_price_topic, orderbook_depth,
    orderbook_topic, private_topic, trade_topic,
};

/// Reference key of private queues.
const ACCOUNT_REF: &str = "account";

impl Inner {
    /// Resolves `symbols`, which must share one category.
    fn resolve(&self, symbols: &[&str]) -> Result<(Category, Vec<Market>)> {
        let markets = symbols
            .iter()
            .map(|s| self.markets.market(s))
            .collect::<Result<Vec<_>>>()?;
        let Some(category) = markets.first().map(|m| m.category) else {
            return Err(Error::param_required("symbols are required"));
        };
        if markets.iter().any(|m| m.category != category) {
            return Err(Error::param_invalid(
                "all symbols of one call must belong to the same category",
            ));
        }
        Ok((category, markets))
    }

    async fn open_stream<T: Clone + Send + 'static>(
        &self,
        client: &WsClient,
        queues: &OutputQueues<T>,
        kind: OutputKind,
        refs: &[String],
        topics: &[String],
    ) -> WatchResult<T> {
        let key = client.queue_key(kind);
        let stream = queues.subscribe(&key, refs.iter().cloned());
        if let Err(e) = self.write_topics(client, None, topics).await {
            queues.release(&key, refs);
            return Err(e);
        }
        Ok(stream)
    }

    async fn public_client(self: &Arc<Self>, category: Category) -> Result<Arc<WsClient>> {
        self.client(Some(category), &self.options.default_account).await
    }

    async fn private_client(self: &Arc<Self>, account: &str) -> Result<Arc<WsClient>> {
        let client = self.client(None, account).await?;
        self.login(&client, None, false).await?;
        Ok(client)
    }

    async fn close_public<T: Clone + Send + 'static>(
        &self,
        client: &WsClient,
        queues: &OutputQueues<T>,
        kind: OutputKind,
        refs: &[String],
        topics: &[String],
    ) -> Result<()> {
        self.unsubscribe_topics(client, topics).await?;
        if queues.release(&client.queue_key(kind), refs) {
            debug!(client = %client.key, kind = kind.as_str(), "output queue closed");
        }
        Ok(())
    }
}

fn symbols_of(markets: &[Market]) -> Vec<String> {
    markets.iter().map(|m| m.symbol.clone()).collect()
}

fn ids_of(markets: &[Market]) -> Vec<String> {
    markets.iter().map(|m| m.id.clone()).collect()
}

fn reject_spot(category: Option<Category>, what: &str) -> Result<()> {
    if category == Some(Category::Spot) {
        return Err(Error::unsupported_market(format!(
            "{what} is not available for spot"
        )));
    }
    Ok(())
}

impl BybitStream {
    /// Streams order books of `symbols` at the depth tier covering `limit`.
    ///
    /// Asking for a different depth than the one subscribed unsubscribes the
    /// old topic first.
    #[instrument(skip(self), fields(count = symbols.len()))]
    pub async fn watch_order_books(&self, symbols: &[&str], limit: i64) -> WatchResult<OrderBook> {
        let inner = &self.inner;
        let (category, markets) = inner.resolve(symbols)?;
        let client = inner.public_client(category).await?;
        let depth = orderbook_depth(category, limit);
        let ids = ids_of(&markets);

        let stale = inner.depths.replace(&client.key, &ids, depth).await;
        if !stale.is_empty() {
            debug!(client = %client.key, depth, stale = ?stale, "order book depth changed");
            if let Err(e) = inner.unsubscribe_topics(&client, &stale).await {
                inner.depths.restore(&client.key, &stale).await;
                return Err(e);
            }
        }
        let topics: Vec<String> = ids.iter().map(|id| orderbook_topic(depth, id)).collect();
        inner
            .open_stream(
                &client,
                &inner.outputs.order_books,
                OutputKind::OrderBook,
                &symbols_of(&markets),
                &topics,
            )
            .await
    }

    /// Stops the order books of `symbols`.
    pub async fn unwatch_order_books(&self, symbols: &[&str]) -> Result<()> {
        let inner = &self.inner;
        let (category, markets) = inner.resolve(symbols)?;
        let client = inner.public_client(category).await?;
        let topics = inner
            .depths
            .remove(&client.key, &ids_of(&markets), orderbook_depth(category, 0))
            .await;
        inner
            .close_public(
                &client,
                &inner.outputs.order_books,
                OutputKind::OrderBook,
                &symbols_of(&markets),
                &topics,
            )
            .await
    }

    /// Streams public trades of `symbols`.
    #[instrument(skip(self), fields(count = symbols.len()))]
    pub async fn watch_trades(&self, symbols: &[&str]) -> WatchResult<Trade> {
        let inner = &self.inner;
        let (category, markets) = inner.resolve(symbols)?;
        let topics = markets.iter().map(trade_topic).collect::<Result<Vec<_>>>()?;
        let client = inner.public_client(category).await?;
        inner
            .open_stream(
                &client,
                &inner.outputs.trades,
                OutputKind::Trades,
                &symbols_of(&markets),
                &topics,
            )
            .await
    }

    /// Stops the trades of `symbols`.
    pub async fn unwatch_trades(&self, symbols: &[&str]) -> Result<()> {
        let inner = &self.inner;
        let (category, markets) = inner.resolve(symbols)?;
        let topics = markets.iter().map(trade_topic).collect::<Result<Vec<_>>>()?;
        let client = inner.public_client(category).await?;
        inner
            .close_public(
                &client,
                &inner.outputs.trades,
                OutputKind::Trades,
                &symbols_of(&markets),
                &topics,
            )
            .await
    }

    /// Streams candles for `(symbol, timeframe)` jobs.
    #[instrument(skip(self), fields(count = jobs.len()))]
    pub async fn watch_ohlcvs(&self, jobs: &[(&str, &str)]) -> WatchResult<PairTfKline> {
        let inner = &self.inner;
        let (category, topics, refs) = kline_jobs(inner, jobs)?;
        let client = inner.public_client(category).await?;
        inner
            .open_stream(&client, &inner.outputs.klines, OutputKind::Kline, &refs, &topics)
            .await
    }

    /// Stops candle jobs.
    pub async fn unwatch_ohlcvs(&self, jobs: &[(&str, &str)]) -> Result<()> {
        let inner = &self.inner;
        let (category, topics, refs) = kline_jobs(inner, jobs)?;
        let client = inner.public_client(category).await?;
        inner
            .close_public(&client, &inner.outputs.klines, OutputKind::Kline, &refs, &topics)
            .await
    }

    /// Streams mark prices of contract `symbols` as symbol to price maps.
    #[instrument(skip(self), fields(count = symbols.len()))]
    pub async fn watch_mark_prices(&self, symbols: &[&str]) -> WatchResult<BTreeMap<String, Decimal>> {
        let inner = &self.inner;
        let (category, markets) = inner.resolve(symbols)?;
        let topics = markets.iter().map(mark_price_topic).collect::<Result<Vec<_>>>()?;
        let client = inner.public_client(category).await?;
        inner
            .open_stream(
                &client,
                &inner.outputs.mark_prices,
                OutputKind::MarkPrice,
                &symbols_of(&markets),
                &topics,
            )
            .await
    }

    /// Stops the mark prices of `symbols`.
    pub async fn unwatch_mark_prices(&self, symbols: &[&str]) -> Result<()> {
        let inner = &self.inner;
        let (category, markets) = inner.resolve(symbols)?;
        let topics = markets.iter().map(mark_price_topic).collect::<Result<Vec<_>>>()?;
        let client = inner.public_client(category).await?;
        inner
            .close_public(
                &client,
                &inner.outputs.mark_prices,
                OutputKind::MarkPrice,
                &symbols_of(&markets),
                &topics,
            )
            .await
    }

    /// Streams the unified wallet of `account`.
    ///
    /// The first item is a REST snapshot; zero balances are left out of it
    /// but kept in stream updates. A failed snapshot is logged and the
    /// stream starts with the first update.
    #[instrument(skip(self))]
    pub async fn watch_balance(&self, account: Option<&str>) -> WatchResult<Balances> {
        let inner = &self.inner;
        let client = inner.private_client(inner.account(account)).await?;
        let refs = [ACCOUNT_REF.to_string()];
        let stream = inner
            .open_stream(
                &client,
                &inner.outputs.balances,
                OutputKind::Balance,
                &refs,
                &[WALLET.to_string()],
            )
            .await?;
        if let Err(e) = inner.seed_balances(&client).await {
            warn!(client = %client.key, error = %e, "balance snapshot unavailable, streaming updates only");
        }
        Ok(stream)
    }

    /// Streams positions of `account`, of one category or of every
    /// contract category.
    ///
    /// The first item is a REST snapshot covering `category`, or linear and
    /// inverse when none is given.
    #[instrument(skip(self))]
    pub async fn watch_positions(&self, account: Option<&str>, category: Option<Category>) -> WatchResult<Vec<Position>> {
        reject_spot(category, "positions")?;
        let inner = &self.inner;
        let client = inner.private_client(inner.account(account)).await?;
        let refs = [ACCOUNT_REF.to_string()];
        let stream = inner
            .open_stream(
                &client,
                &inner.outputs.positions,
                OutputKind::Positions,
                &refs,
                &[private_topic(POSITION, category)],
            )
            .await?;
        let seeded = match category {
            Some(category) => vec![category],
            None => vec![Category::Linear, Category::Inverse],
        };
        if let Err(e) = inner.seed_positions(&client, &seeded).await {
            warn!(client = %client.key, error = %e, "position snapshot unavailable, streaming updates only");
        }
        Ok(stream)
    }

    /// Streams leverage changes of `account`.
    #[instrument(skip(self))]
    pub async fn watch_account_config(&self, account: Option<&str>, category: Option<Category>) -> WatchResult<AccountConfig> {
        reject_spot(category, "account config")?;
        let inner = &self.inner;
        let client = inner.private_client(inner.account(account)).await?;
        inner
            .open_stream(
                &client,
                &inner.outputs.account_configs,
                OutputKind::AccountConfig,
                &[ACCOUNT_REF.to_string()],
                &[private_topic(POSITION, category)],
            )
            .await
    }

    /// Streams own fills of `account`.
    #[instrument(skip(self))]
    pub async fn watch_my_trades(&self, account: Option<&str>, category: Option<Category>) -> WatchResult<MyTrade> {
        let inner = &self.inner;
        let client = inner.private_client(inner.account(account)).await?;
        inner
            .open_stream(
                &client,
                &inner.outputs.my_trades,
                OutputKind::MyTrades,
                &[ACCOUNT_REF.to_string()],
                &[private_topic(EXECUTION, category)],
            )
            .await
    }

    /// Unsubscribes private `topics` of `account` and closes the streams
    /// they fed.
    pub async fn unwatch_private(&self, account: Option<&str>, topics: &[&str]) -> Result<()> {
        if topics.is_empty() {
            return Err(Error::param_required("topics are required"));
        }
        let inner = &self.inner;
        let client = inner.client(None, inner.account(account)).await?;
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        inner.unsubscribe_topics(&client, &topics).await?;

        let refs = [ACCOUNT_REF];
        for topic in &topics {
            match TopicKind::classify(topic) {
                TopicKind::Wallet => {
                    inner.outputs.balances.release(&client.queue_key(OutputKind::Balance), refs);
                }
                TopicKind::Position => {
                    inner.outputs.positions.release(&client.queue_key(OutputKind::Positions), refs);
                    inner
                        .outputs
                        .account_configs
                        .release(&client.queue_key(OutputKind::AccountConfig), refs);
                }
                TopicKind::Execution => {
                    inner.outputs.my_trades.release(&client.queue_key(OutputKind::MyTrades), refs);
                }
                _ => debug!(client = %client.key, topic, "not a private topic"),
            }
        }
        Ok(())
    }
}

/// Topics and reference keys of candle jobs, which must share a category.
fn kline_jobs(inner: &Inner, jobs: &[(&str, &str)]) -> Result<(Category, Vec<String>, Vec<String>)> {
    let symbols: Vec<&str> = jobs.iter().map(|(symbol, _)| *symbol).collect();
    let (category, markets) = inner.resolve(&symbols)?;
    let mut topics = Vec::with_capacity(jobs.len());
    let mut refs = Vec::with_capacity(jobs.len());
    for (market, (_, timeframe)) in markets.iter().zip(jobs) {
        let (topic, reference) = kline_topic(market, timeframe)?;
        topics.push(topic);
        refs.push(reference);
    }
    Ok((category, topics, refs))
}
