//! Private stream tests: login coordination, reconnect replay and account
//! caches.

use async_trait::async_trait;
use futures::StreamExt;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use streamx_core::credentials::Credentials;
use streamx_core::error::{Error, Result};
use streamx_core::types::{Category, Market, PositionSide};
use streamx_core::ws_client::mock::{MockConnector, MockTransport};
use streamx_core::{MessageStream, WsTransport};
use streamx_exchanges::bybit::{AuthStatus, BybitBuilder, BybitRestApi, BybitStream, MarketRegistry};

const WAIT: Duration = Duration::from_secs(2);
const PRIVATE: &str = "private/default";

#[derive(Default)]
struct StubRest {
    wallet_calls: AtomicUsize,
    position_calls: AtomicUsize,
    unavailable: bool,
}

impl StubRest {
    fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl BybitRestApi for StubRest {
    async fn funding_history_page(
        &self,
        _category: Category,
        _market_id: &str,
        _start: Option<i64>,
        _end: Option<i64>,
        _limit: i64,
    ) -> Result<Value> {
        Ok(json!({"list": []}))
    }

    async fn wallet_balance(&self, _credentials: &Credentials) -> Result<Value> {
        self.wallet_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::runtime("wallet service unavailable"));
        }
        Ok(json!({
            "list": [{
                "coin": [
                    {"coin": "USDT", "walletBalance": "100", "equity": "100", "locked": "0",
                     "totalOrderIM": "10", "totalPositionIM": "0"},
                    {"coin": "BTC", "walletBalance": "0", "equity": "0"}
                ]
            }]
        }))
    }

    async fn position_list(&self, _credentials: &Credentials, category: Category) -> Result<Value> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(Error::runtime("position service unavailable"));
        }
        let list = match category {
            Category::Linear => json!([{
                "symbol": "BTCUSDT", "side": "Buy", "size": "2", "avgPrice": "100",
                "leverage": "10", "positionIdx": 0, "updatedTime": "1700000000000"
            }]),
            _ => json!([]),
        };
        Ok(json!({"list": list}))
    }
}

fn markets() -> MarketRegistry {
    MarketRegistry::new(vec![
        Market::swap("BTCUSDT", "BTC/USDT:USDT", "BTC", "USDT", Category::Linear),
        Market::swap("ETHUSDT", "ETH/USDT:USDT", "ETH", "USDT", Category::Linear),
    ])
}

fn session(connector: &Arc<MockConnector>, rest: &Arc<StubRest>) -> BybitStream {
    BybitBuilder::new()
        .account("default", Credentials::new("key", "secret"))
        .markets(markets())
        .connector(connector.clone())
        .rest(rest.clone())
        .login_timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

fn answering() -> Arc<MockConnector> {
    Arc::new(MockConnector::new(50).with_auth_reply(MockConnector::auth_success()))
}

async fn next<T>(stream: &mut MessageStream<T>) -> T {
    tokio::time::timeout(WAIT, stream.next())
        .await
        .expect("no item before the deadline")
        .expect("stream ended")
        .expect("stream error")
}

async fn wait_for_frames(transport: &MockTransport, op: &str, count: usize) -> Vec<Value> {
    for _ in 0..200 {
        let frames = transport.frames_with_op(op);
        if frames.len() >= count {
            return frames;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {count} {op} frames, got {:?}", transport.frames());
}

// ==================== Login Tests ====================

#[tokio::test]
async fn test_concurrent_logins_share_one_auth_frame() {
    let connector = answering();
    let bybit = session(&connector, &Arc::new(StubRest::default()));

    let (a, b, c) = tokio::join!(bybit.login(None), bybit.login(None), bybit.login(None));
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    let transport = connector.transport(PRIVATE).unwrap();
    let auth = transport.frames_with_op("auth");
    assert_eq!(auth.len(), 1);
    assert_eq!(auth[0]["args"][0], "key");
    assert_eq!(bybit.auth_status(None).await, AuthStatus::Authenticated);

    bybit.login(None).await.unwrap();
    assert_eq!(transport.frames_with_op("auth").len(), 1);
}

#[tokio::test]
async fn test_rejected_login_reaches_every_waiter() {
    let connector = Arc::new(
        MockConnector::new(50).with_auth_reply(MockConnector::auth_failure("invalid api key")),
    );
    let bybit = session(&connector, &Arc::new(StubRest::default()));

    let (a, b) = tokio::join!(bybit.login(None), bybit.login(None));
    for result in [a, b] {
        let err = result.unwrap_err();
        assert!(err.to_string().contains("invalid api key"), "{err}");
    }
    assert_eq!(bybit.auth_status(None).await, AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn test_login_without_reply_times_out() {
    let connector = Arc::new(MockConnector::new(50));
    let bybit = session(&connector, &Arc::new(StubRest::default()));
    let err = bybit.login(None).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(bybit.auth_status(None).await, AuthStatus::Unauthenticated);
}

#[tokio::test]
async fn test_unknown_account_is_rejected() {
    let connector = answering();
    let bybit = session(&connector, &Arc::new(StubRest::default()));
    let err = bybit.login(Some("other")).await.unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert!(connector.transport("private/other").is_none());
}

// ==================== Reconnect Tests ====================

#[tokio::test]
async fn test_private_reconnect_logs_in_then_replays_once() {
    let connector = answering();
    let bybit = session(&connector, &Arc::new(StubRest::default()));
    let _fills = bybit.watch_my_trades(None, Some(Category::Linear)).await.unwrap();

    let transport = connector.transport(PRIVATE).unwrap();
    let conn = transport.connections()[0];
    assert_eq!(transport.topics(conn), vec!["execution.linear"]);
    transport.clear_frames();

    transport.simulate_reconnect(conn).await;
    let subs = wait_for_frames(&transport, "subscribe", 1).await;
    assert_eq!(subs[0]["args"], json!(["execution.linear"]));

    let frames = transport.frames();
    assert_eq!(frames[0].1["op"], "auth");
    assert_eq!(frames[1].1["op"], "subscribe");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.frames_with_op("subscribe").len(), 1);
    assert_eq!(bybit.auth_status(None).await, AuthStatus::Authenticated);
}

#[tokio::test]
async fn test_failed_relogin_drops_pending_topics() {
    let connector = answering();
    let bybit = session(&connector, &Arc::new(StubRest::default()));
    let _fills = bybit.watch_my_trades(None, None).await.unwrap();
    let transport = connector.transport(PRIVATE).unwrap();
    let conn = transport.connections()[0];
    transport.clear_frames();
    transport.fail_writes_after(0);

    transport.simulate_reconnect(conn).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(transport.frames().is_empty());
    assert_eq!(bybit.auth_status(None).await, AuthStatus::Unauthenticated);
}

// ==================== Account Cache Tests ====================

#[tokio::test]
async fn test_watch_balance_seeds_then_streams() {
    let connector = answering();
    let rest = Arc::new(StubRest::default());
    let bybit = session(&connector, &rest);
    let mut balances = bybit.watch_balance(None).await.unwrap();

    let snapshot = next(&mut balances).await;
    let usdt = snapshot.get("USDT").unwrap();
    assert_eq!(usdt.used, dec!(10));
    assert_eq!(usdt.free, dec!(90));
    assert_eq!(usdt.total, dec!(100));
    assert!(snapshot.get("BTC").is_none());
    assert_eq!(rest.wallet_calls.load(Ordering::SeqCst), 1);

    let transport = connector.transport(PRIVATE).unwrap();
    assert_eq!(transport.frames_with_op("subscribe")[0]["args"], json!(["wallet"]));
    let conn = transport.connections()[0];
    transport
        .push_json(
            conn,
            &json!({
                "topic": "wallet",
                "creationTime": 1_700_000_000_500_i64,
                "data": [{"coin": [{"coin": "BTC", "walletBalance": "0", "equity": "0"}]}]
            }),
        )
        .await;
    let update = next(&mut balances).await;
    assert_eq!(update.timestamp, 1_700_000_000_500);
    assert!(update.get("BTC").is_some());
    assert_eq!(bybit.balances(None).await.unwrap(), update);
}

#[tokio::test]
async fn test_positions_seed_and_leverage_changes() {
    let connector = answering();
    let rest = Arc::new(StubRest::default());
    let bybit = session(&connector, &rest);

    let mut positions = bybit.watch_positions(None, None).await.unwrap();
    let seeded = next(&mut positions).await;
    assert_eq!(seeded.len(), 1);
    assert_eq!(seeded[0].symbol, "BTC/USDT:USDT");
    assert_eq!(seeded[0].side, Some(PositionSide::Long));
    assert_eq!(rest.position_calls.load(Ordering::SeqCst), 2);

    let mut configs = bybit.watch_account_config(None, None).await.unwrap();
    let transport = connector.transport(PRIVATE).unwrap();
    assert_eq!(transport.frames_with_op("subscribe").len(), 1);
    let conn = transport.connections()[0];

    transport
        .push_json(
            conn,
            &json!({
                "topic": "position",
                "creationTime": 1,
                "data": [
                    {"category": "linear", "symbol": "ETHUSDT", "side": "Sell", "size": "3",
                     "avgPrice": "10", "leverage": "4.5", "positionIdx": 0},
                    {"category": "linear", "symbol": "BTCUSDT", "side": "", "size": "0",
                     "leverage": "10", "positionIdx": 0}
                ]
            }),
        )
        .await;

    let update = next(&mut positions).await;
    assert_eq!(update.len(), 1);
    assert_eq!(update[0].symbol, "ETH/USDT:USDT");
    assert_eq!(update[0].leverage, 5);

    let mut changed = vec![next(&mut configs).await, next(&mut configs).await];
    changed.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    assert_eq!(changed[0].symbol, "BTC/USDT:USDT");
    assert_eq!(changed[0].leverage, 10);
    assert_eq!(changed[1].leverage, 5);

    let cached = bybit.positions(None, Some(Category::Linear)).await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].symbol, "ETH/USDT:USDT");
    assert_eq!(bybit.leverage(None, "ETH/USDT:USDT").await, Some(5));
}

#[tokio::test]
async fn test_position_frame_replaces_category_list() {
    let connector = answering();
    let bybit = session(&connector, &Arc::new(StubRest::default()));
    let mut positions = bybit
        .watch_positions(None, Some(Category::Linear))
        .await
        .unwrap();
    assert_eq!(next(&mut positions).await[0].symbol, "BTC/USDT:USDT");

    let transport = connector.transport(PRIVATE).unwrap();
    let conn = transport.connections()[0];
    transport
        .push_json(
            conn,
            &json!({
                "topic": "position.linear",
                "data": [{"category": "linear", "symbol": "ETHUSDT", "side": "Buy", "size": "1",
                          "avgPrice": "10", "leverage": "3", "positionIdx": 0}]
            }),
        )
        .await;
    let update = next(&mut positions).await;
    assert_eq!(update.len(), 1);

    let cached: Vec<String> = bybit
        .positions(None, Some(Category::Linear))
        .await
        .into_iter()
        .map(|p| p.symbol)
        .collect();
    assert_eq!(cached, vec!["ETH/USDT:USDT"]);
}

#[tokio::test]
async fn test_private_watch_survives_snapshot_failure() {
    let connector = answering();
    let rest = Arc::new(StubRest::unavailable());
    let bybit = session(&connector, &rest);

    let mut balances = bybit.watch_balance(None).await.unwrap();
    let _positions = bybit.watch_positions(None, None).await.unwrap();
    assert_eq!(rest.wallet_calls.load(Ordering::SeqCst), 1);
    assert!(bybit.balances(None).await.is_none());

    let transport = connector.transport(PRIVATE).unwrap();
    let conn = transport.connections()[0];
    assert_eq!(transport.topics(conn), vec!["wallet", "position"]);
    transport
        .push_json(
            conn,
            &json!({
                "topic": "wallet",
                "creationTime": 1_700_000_000_900_i64,
                "data": [{"coin": [{"coin": "USDT", "walletBalance": "5", "equity": "5"}]}]
            }),
        )
        .await;
    let update = next(&mut balances).await;
    assert_eq!(update.timestamp, 1_700_000_000_900);
    assert_eq!(update.get("USDT").unwrap().total, dec!(5));
}

#[tokio::test]
async fn test_spot_positions_are_unsupported() {
    let connector = answering();
    let bybit = session(&connector, &Arc::new(StubRest::default()));
    let err = bybit
        .watch_positions(None, Some(Category::Spot))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::UnsupportedMarket(_)));
}

#[tokio::test]
async fn test_executions_stream_and_unwatch() {
    let connector = answering();
    let bybit = session(&connector, &Arc::new(StubRest::default()));
    let mut fills = bybit.watch_my_trades(None, None).await.unwrap();
    let transport = connector.transport(PRIVATE).unwrap();
    let conn = transport.connections()[0];

    transport
        .push_json(
            conn,
            &json!({
                "topic": "execution",
                "data": [{
                    "category": "linear", "symbol": "BTCUSDT", "execId": "x1", "orderId": "o1",
                    "side": "Buy", "execPrice": "100", "execQty": "1", "orderQty": "3",
                    "leavesQty": "2", "execFee": "0.01", "feeCurrency": "USDT",
                    "isMaker": "true", "execTime": "1700000000000", "orderType": "Limit"
                }]
            }),
        )
        .await;
    let fill = next(&mut fills).await;
    assert_eq!(fill.symbol, "BTC/USDT:USDT");
    assert_eq!(fill.cost, dec!(100));
    assert_eq!(fill.filled, dec!(1));
    assert!(fill.maker);
    assert_eq!(fill.fee.unwrap().cost, dec!(0.01));

    bybit.unwatch_private(None, &["execution"]).await.unwrap();
    assert_eq!(transport.frames_with_op("unsubscribe")[0]["args"], json!(["execution"]));
    let end = tokio::time::timeout(WAIT, fills.next()).await.unwrap();
    assert!(end.is_none());
}
