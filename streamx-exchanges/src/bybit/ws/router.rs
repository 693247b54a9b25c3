//! Inbound frame routing and public-stream handlers.
//!
//! Frames decode into [`WsEnvelope`] first. Data frames are classified by
//! topic into a [`TopicKind`]; control frames are routed by `op`. Malformed
//! frames and unknown topics are logged and dropped.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use streamx_core::types::{Category, PairTfKline};
use streamx_core::ws_client::ConnId;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::client::WsClient;
use super::{Inner, OutputKind};
use crate::bybit::parser::{
    WsEnvelope, parse_ws_kline, parse_ws_mark_prices, parse_ws_trade, ws_list, ws_ticker_items,
};
use crate::bybit::topics::{TopicKind, split_topic, timeframe_for};

/// Latest mark price per symbol, per category.
#[derive(Default)]
pub(crate) struct MarkPriceCache {
    prices: RwLock<HashMap<Category, HashMap<String, Decimal>>>,
}

impl MarkPriceCache {
    pub(crate) async fn merge(&self, category: Category, prices: &BTreeMap<String, Decimal>) {
        let mut all = self.prices.write().await;
        let cache = all.entry(category).or_default();
        for (symbol, price) in prices {
            cache.insert(symbol.clone(), *price);
        }
    }

    pub(crate) async fn get(&self, category: Category, symbol: &str) -> Option<Decimal> {
        self.prices.read().await.get(&category)?.get(symbol).copied()
    }
}

impl Inner {
    /// Routes one text frame.
    pub(crate) async fn dispatch(self: &Arc<Self>, client: &Arc<WsClient>, conn: ConnId, text: &str) {
        let env = match WsEnvelope::decode(text) {
            Ok(env) => env,
            Err(e) => {
                error!(client = %client.key, conn, error = %e, "undecodable ws frame");
                return;
            }
        };
        if !env.topic.is_empty() {
            self.route_topic(client, &env).await;
        } else if !env.op.is_empty() {
            self.route_op(client, conn, &env).await;
        } else {
            debug!(client = %client.key, conn, "frame without topic or op");
        }
    }

    async fn route_op(self: &Arc<Self>, client: &Arc<WsClient>, conn: ConnId, env: &WsEnvelope) {
        match env.op.as_str() {
            "auth" => self.on_auth_reply(client, env).await,
            "subscribe" | "unsubscribe" => {
                if let Err(failure) = env.op_result() {
                    warn!(client = %client.key, conn, op = %env.op, req_id = %env.req_id, error = %failure, "ws op failed");
                }
            }
            "ping" | "pong" => {}
            other => debug!(client = %client.key, conn, op = other, "unhandled ws op"),
        }
    }

    async fn route_topic(&self, client: &WsClient, env: &WsEnvelope) {
        let kind = TopicKind::classify(&env.topic);
        match (kind, client.category) {
            (TopicKind::Wallet, _) => self.on_wallet(client, env).await,
            (TopicKind::Position, _) => self.on_position(client, env).await,
            (TopicKind::Execution, _) => self.on_execution(client, env),
            (TopicKind::OrderBook, Some(category)) => self.on_orderbook(client, category, env).await,
            (TopicKind::Trade, Some(category)) => self.on_trades(client, category, env),
            (TopicKind::Kline, Some(category)) => self.on_kline(client, category, env),
            (TopicKind::Ticker, Some(category)) => self.on_tickers(client, category, env).await,
            _ => debug!(client = %client.key, topic = %env.topic, "unhandled ws topic"),
        }
    }

    fn on_trades(&self, client: &WsClient, category: Category, env: &WsEnvelope) {
        let items = match ws_list(&env.data) {
            Ok(items) => items,
            Err(e) => {
                error!(client = %client.key, topic = %env.topic, error = %e, "bad trade frame");
                return;
            }
        };
        let key = client.queue_key(OutputKind::Trades);
        for item in items {
            if let Some(trade) = parse_ws_trade(item, self.markets.as_ref(), category) {
                self.outputs.trades.publish(&key, trade);
            }
        }
    }

    fn on_kline(&self, client: &WsClient, category: Category, env: &WsEnvelope) {
        let (_, interval, market_id) = split_topic(&env.topic);
        if market_id.is_empty() {
            debug!(client = %client.key, topic = %env.topic, "kline topic without market id");
            return;
        }
        let items = match ws_list(&env.data) {
            Ok(items) => items,
            Err(e) => {
                error!(client = %client.key, topic = %env.topic, error = %e, "bad kline frame");
                return;
            }
        };
        let symbol = self.markets.safe_symbol(market_id, category);
        let timeframe = timeframe_for(interval);
        let key = client.queue_key(OutputKind::Kline);
        for item in items {
            self.outputs.klines.publish(
                &key,
                PairTfKline {
                    symbol: symbol.clone(),
                    timeframe: timeframe.clone(),
                    ohlcv: parse_ws_kline(item),
                },
            );
        }
    }

    async fn on_tickers(&self, client: &WsClient, category: Category, env: &WsEnvelope) {
        let items = match ws_ticker_items(&env.data) {
            Ok(items) => items,
            Err(e) => {
                error!(client = %client.key, topic = %env.topic, error = %e, "bad ticker frame");
                return;
            }
        };
        let prices = parse_ws_mark_prices(&items, &env.topic, self.markets.as_ref(), category);
        if prices.is_empty() {
            return;
        }
        self.mark_prices.merge(category, &prices).await;
        self.outputs
            .mark_prices
            .publish(&client.queue_key(OutputKind::MarkPrice), prices);
    }
}
