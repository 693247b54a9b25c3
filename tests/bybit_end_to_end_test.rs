//! End-to-end tests through the public `streamx` surface.

use futures::StreamExt;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use streamx::prelude::*;
use streamx_core::ws_client::mock::MockConnector;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOUR: i64 = 60 * 60 * 1000;
const SINCE: i64 = 1_700_000_000_000;

fn markets() -> MarketRegistry {
    MarketRegistry::new(vec![
        Market::spot("BTCUSDT", "BTC/USDT", "BTC", "USDT"),
        Market::swap("BTCUSDT", "BTC/USDT:USDT", "BTC", "USDT", Category::Linear)
            .with_funding_interval_ms(8 * HOUR),
    ])
}

/// Funding rows `from..to` of an 8h series, newest first like the venue.
fn funding_rows(from: i64, to: i64) -> Value {
    let rows: Vec<Value> = (from..to)
        .rev()
        .map(|i| {
            json!({
                "symbol": "BTCUSDT",
                "fundingRate": "0.0001",
                "fundingRateTimestamp": (SINCE + i * 8 * HOUR).to_string()
            })
        })
        .collect();
    json!({"retCode": 0, "retMsg": "OK", "result": {"category": "linear", "list": rows}})
}

// ==================== Funding Tests ====================

#[tokio::test]
async fn test_funding_history_walks_pages_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v5/market/funding/history"))
        .and(query_param("startTime", SINCE.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(funding_rows(0, 200)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v5/market/funding/history"))
        .and(query_param("startTime", (SINCE + 200 * 8 * HOUR).to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(funding_rows(200, 250)))
        .expect(1)
        .mount(&server)
        .await;

    let bybit = BybitBuilder::new()
        .markets(markets())
        .connector(Arc::new(MockConnector::new(10)))
        .rest_url(server.uri())
        .build()
        .unwrap();
    let rates = bybit
        .fetch_funding_rate_history("BTC/USDT:USDT", Some(SINCE), 250, None)
        .await
        .unwrap();

    assert_eq!(rates.len(), 250);
    assert_eq!(rates[0].timestamp, SINCE);
    assert_eq!(rates[249].timestamp, SINCE + 249 * 8 * HOUR);
    assert!(rates.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert_eq!(rates[0].funding_rate, dec!(0.0001));
    assert_eq!(rates[0].symbol, "BTC/USDT:USDT");
}

#[tokio::test]
async fn test_funding_history_rejects_spot() {
    let bybit = BybitBuilder::new()
        .markets(markets())
        .connector(Arc::new(MockConnector::new(10)))
        .build()
        .unwrap();
    let err = bybit
        .fetch_funding_rate_history("BTC/USDT", None, 10, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
}

// ==================== Session Tests ====================

#[tokio::test]
async fn test_session_streams_and_closes() -> anyhow::Result<()> {
    let connector = Arc::new(MockConnector::new(10));
    let bybit = BybitBuilder::new()
        .markets(markets())
        .connector(connector.clone())
        .build()?;
    let mut trades = bybit.watch_trades(&["BTC/USDT:USDT"]).await?;

    let transport = connector
        .transport("linear/default")
        .ok_or_else(|| anyhow::anyhow!("no linear transport"))?;
    assert_eq!(transport.url(), "wss://stream.bybit.com/v5/public/linear");
    let conn = transport.connections()[0];
    transport
        .push_json(
            conn,
            &json!({"topic": "publicTrade.BTCUSDT", "data": [{"s": "BTCUSDT", "p": "10", "v": "2", "S": "Sell", "i": "a"}]}),
        )
        .await;
    let trade = tokio::time::timeout(Duration::from_secs(2), trades.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("stream ended early"))??;
    assert_eq!(trade.side, Some(Side::Sell));
    assert_eq!(trade.cost, dec!(20));

    bybit.close();
    let end = tokio::time::timeout(Duration::from_secs(2), trades.next()).await?;
    assert!(end.is_none());
    Ok(())
}
