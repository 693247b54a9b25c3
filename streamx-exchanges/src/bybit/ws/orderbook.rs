//! Order-book reconciliation and per-symbol depth tracking.

use std::collections::HashMap;
use std::sync::Arc;
use streamx_core::types::{Category, OrderBook};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::client::WsClient;
use super::{Inner, OutputKind};
use crate::bybit::parser::{OrderBookFrame, WsEnvelope, parse_orderbook_frame};
use crate::bybit::topics::{orderbook_depth, orderbook_topic, split_topic};

/// Maintained books by unified symbol.
///
/// The map lock only guards lookup and replacement of entries. Merging a
/// delta into an existing book happens under that book's own lock, which
/// only the reader of the book's connection takes on the write path.
#[derive(Default)]
pub(crate) struct OrderBookStore {
    books: Mutex<HashMap<String, Arc<Mutex<OrderBook>>>>,
}

impl OrderBookStore {
    /// Applies one frame and returns the resulting book.
    ///
    /// Snapshots, frames with update id 1 and the first frame of a symbol
    /// replace the book; everything else merges into it.
    pub(crate) async fn apply(&self, symbol: &str, frame: &OrderBookFrame, snapshot: bool, depth: usize) -> OrderBook {
        let reset = snapshot || frame.update_id == 1;
        let mut books = self.books.lock().await;
        let existing = if reset { None } else { books.get(symbol).cloned() };

        let Some(book) = existing else {
            let fresh = OrderBook::from_snapshot(
                symbol,
                frame.timestamp,
                frame.update_id,
                depth,
                &frame.bids,
                &frame.asks,
            );
            books.insert(symbol.to_string(), Arc::new(Mutex::new(fresh.clone())));
            return fresh;
        };
        drop(books);

        let mut book = book.lock().await;
        if frame.update_id <= book.nonce {
            warn!(
                symbol,
                previous = book.nonce,
                update_id = frame.update_id,
                "order book update id went backwards"
            );
        }
        book.apply_delta(frame.timestamp, frame.update_id, &frame.bids, &frame.asks);
        book.clone()
    }

    /// Current copy of a book.
    pub(crate) async fn get(&self, symbol: &str) -> Option<OrderBook> {
        let book = self.books.lock().await.get(symbol).cloned()?;
        let book = book.lock().await;
        Some(book.clone())
    }
}

/// Active order-book depth per market id, per client.
#[derive(Default)]
pub(crate) struct DepthLimits {
    limits: Mutex<HashMap<String, HashMap<String, u32>>>,
}

impl DepthLimits {
    /// Sets `depth` for each market id and returns the topics of depths it
    /// replaced, which must be unsubscribed before the new ones go out.
    pub(crate) async fn replace(&self, client_key: &str, market_ids: &[String], depth: u32) -> Vec<String> {
        let mut limits = self.limits.lock().await;
        let client = limits.entry(client_key.to_string()).or_default();
        let mut stale = Vec::new();
        for id in market_ids {
            if let Some(old) = client.insert(id.clone(), depth) {
                if old != depth {
                    stale.push(orderbook_topic(old, id));
                }
            }
        }
        stale
    }

    /// Puts back the depths of `topics` returned by [`Self::replace`] when
    /// unsubscribing them failed and they are still streaming.
    pub(crate) async fn restore(&self, client_key: &str, topics: &[String]) {
        let mut limits = self.limits.lock().await;
        let client = limits.entry(client_key.to_string()).or_default();
        for topic in topics {
            let (_, depth, id) = split_topic(topic);
            if let Ok(depth) = depth.parse::<u32>() {
                client.insert(id.to_string(), depth);
            }
        }
    }

    /// Forgets the market ids and returns their active topics; ids without a
    /// recorded depth map to `default_depth`.
    pub(crate) async fn remove(&self, client_key: &str, market_ids: &[String], default_depth: u32) -> Vec<String> {
        let mut limits = self.limits.lock().await;
        let client = limits.entry(client_key.to_string()).or_default();
        market_ids
            .iter()
            .map(|id| orderbook_topic(client.remove(id).unwrap_or(default_depth), id))
            .collect()
    }

    pub(crate) async fn get(&self, client_key: &str, market_id: &str) -> Option<u32> {
        self.limits.lock().await.get(client_key)?.get(market_id).copied()
    }
}

impl Inner {
    /// Handles an `orderbook.<depth>.<id>` frame.
    pub(crate) async fn on_orderbook(&self, client: &WsClient, category: Category, env: &WsEnvelope) {
        let frame = match parse_orderbook_frame(&env.data, env.ts) {
            Ok(frame) => frame,
            Err(e) => {
                error!(client = %client.key, topic = %env.topic, error = %e, "bad order book frame");
                return;
            }
        };
        let (_, depth, topic_id) = split_topic(&env.topic);
        let depth = depth
            .parse::<u32>()
            .unwrap_or_else(|_| orderbook_depth(category, 0));
        let market_id = if frame.market_id.is_empty() { topic_id } else { frame.market_id.as_str() };
        let symbol = self.markets.safe_symbol(market_id, category);

        let book = self
            .books
            .apply(&symbol, &frame, env.kind == "snapshot", depth as usize)
            .await;
        if self.outputs.order_books.publish(&client.queue_key(OutputKind::OrderBook), book) == 0 {
            debug!(client = %client.key, symbol, "order book update without listeners");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn frame(update_id: i64, bids: &[(i64, i64)], asks: &[(i64, i64)]) -> OrderBookFrame {
        let levels = |l: &[(i64, i64)]| -> Vec<(Decimal, Decimal)> {
            l.iter()
                .map(|(p, s)| ((*p).into(), (*s).into()))
                .collect()
        };
        OrderBookFrame {
            market_id: "BTCUSDT".to_string(),
            bids: levels(bids),
            asks: levels(asks),
            timestamp: 1_000 + update_id,
            update_id,
        }
    }

    // ==================== Reconcile Tests ====================

    #[tokio::test]
    async fn test_first_frame_creates_book_even_as_delta() {
        let store = OrderBookStore::default();
        let book = store.apply("BTC/USDT", &frame(5, &[(100, 1)], &[(101, 1)]), false, 50).await;
        assert_eq!(book.nonce, 5);
        assert_eq!(book.limit, 50);
        assert_eq!(book.best_bid(), Some((dec!(100), dec!(1))));
    }

    #[tokio::test]
    async fn test_delta_merges_and_keeps_missing_side() {
        let store = OrderBookStore::default();
        store.apply("BTC/USDT", &frame(2, &[(100, 1), (99, 2)], &[(101, 1)]), true, 50).await;
        let book = store.apply("BTC/USDT", &frame(3, &[(100, 0), (98, 5)], &[]), false, 50).await;
        assert_eq!(book.bids.to_vec(), vec![(dec!(99), dec!(2)), (dec!(98), dec!(5))]);
        assert_eq!(book.asks.to_vec(), vec![(dec!(101), dec!(1))]);
        assert_eq!(book.nonce, 3);
        assert_eq!(book.timestamp, 1_003);
    }

    #[tokio::test]
    async fn test_update_id_one_resets_book() {
        let store = OrderBookStore::default();
        store.apply("BTC/USDT", &frame(7, &[(100, 1)], &[(101, 1)]), true, 50).await;
        let book = store.apply("BTC/USDT", &frame(1, &[(90, 3)], &[]), false, 50).await;
        assert_eq!(book.bids.to_vec(), vec![(dec!(90), dec!(3))]);
        assert!(book.asks.is_empty());
        assert_eq!(store.get("BTC/USDT").await.unwrap().nonce, 1);
    }

    #[tokio::test]
    async fn test_stale_update_is_still_applied() {
        let store = OrderBookStore::default();
        store.apply("BTC/USDT", &frame(10, &[(100, 1)], &[]), true, 50).await;
        let book = store.apply("BTC/USDT", &frame(9, &[(100, 4)], &[]), false, 50).await;
        assert_eq!(book.best_bid(), Some((dec!(100), dec!(4))));
        assert_eq!(book.nonce, 9);
    }

    // ==================== Depth Map Tests ====================

    #[tokio::test]
    async fn test_depth_change_reports_old_topic() {
        let depths = DepthLimits::default();
        let ids = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
        assert!(depths.replace("spot/default", &ids, 50).await.is_empty());
        assert!(depths.replace("spot/default", &ids[..1], 50).await.is_empty());
        assert_eq!(
            depths.replace("spot/default", &ids[..1], 200).await,
            vec!["orderbook.50.BTCUSDT".to_string()]
        );
        assert_eq!(depths.get("spot/default", "BTCUSDT").await, Some(200));
        assert_eq!(depths.get("linear/default", "BTCUSDT").await, None);
    }

    #[tokio::test]
    async fn test_remove_falls_back_to_default_depth() {
        let depths = DepthLimits::default();
        depths.replace("spot/default", &["BTCUSDT".to_string()], 1).await;
        let topics = depths
            .remove("spot/default", &["BTCUSDT".to_string(), "SOLUSDT".to_string()], 50)
            .await;
        assert_eq!(topics, vec!["orderbook.1.BTCUSDT", "orderbook.50.SOLUSDT"]);
        assert_eq!(depths.get("spot/default", "BTCUSDT").await, None);
    }
}
