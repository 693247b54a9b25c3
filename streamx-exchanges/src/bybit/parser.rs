//! Bybit payload parsers.
//!
//! Converts V5 websocket frames and REST rows into streamx types. Venue
//! numbers arrive as strings or numbers; the helpers in
//! `streamx_core::parser_utils` accept both.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use streamx_core::error::{Error, ParseError, Result};
use streamx_core::parser_utils::{
    decimal_or_zero, parse_bool, parse_decimal, parse_price_levels, parse_string, parse_timestamp,
    value_decimal, value_string,
};
use streamx_core::types::{
    Asset, Balances, Category, Fee, FundingRate, MyTrade, Ohlcv, OrderState, Position,
    PositionSide, Side, Timestamp, Trade,
};

use super::market::MarketLookup;
use super::topics::split_topic;

// ============================================================================
// Envelope
// ============================================================================

/// Generic inbound frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsEnvelope {
    /// Control operation (`auth`, `subscribe`, `pong`, ...).
    #[serde(default)]
    pub op: String,
    /// Data topic.
    #[serde(default)]
    pub topic: String,
    /// `snapshot` or `delta`.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Op outcome, when the venue reports one.
    pub success: Option<bool>,
    /// Op result code.
    #[serde(default, rename = "retCode")]
    pub ret_code: i64,
    /// Op result code, alternate spelling.
    #[serde(default, rename = "ret_code")]
    pub ret_code_alt: i64,
    /// Op result message.
    #[serde(default, rename = "retMsg")]
    pub ret_msg: String,
    /// Op result message, alternate spelling.
    #[serde(default, rename = "ret_msg")]
    pub ret_msg_alt: String,
    /// Request id echoed back.
    #[serde(default)]
    pub req_id: String,
    /// Server-side connection id.
    #[serde(default)]
    pub conn_id: String,
    /// Server time in milliseconds.
    #[serde(default)]
    pub ts: Timestamp,
    /// Creation time of private frames.
    #[serde(default, rename = "creationTime")]
    pub creation_time: Timestamp,
    /// Raw payload.
    #[serde(default)]
    pub data: Value,
}

impl WsEnvelope {
    /// Decodes one text frame.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn message(&self) -> &str {
        if self.ret_msg.is_empty() {
            &self.ret_msg_alt
        } else {
            &self.ret_msg
        }
    }

    /// Outcome of an op reply.
    ///
    /// An explicit `success` flag decides. Without one, `retCode` (or
    /// `ret_code` when `retCode` is 0) of 0 or 20001 counts as success and
    /// any other code is mapped through the retCode table.
    pub fn op_result(&self) -> std::result::Result<(), OpFailure> {
        if let Some(success) = self.success {
            if success {
                return Ok(());
            }
            let msg = self.message();
            return Err(OpFailure {
                code: None,
                message: if msg.is_empty() {
                    "ws op failed".to_string()
                } else {
                    msg.to_string()
                },
            });
        }
        let code = if self.ret_code == 0 && self.ret_code_alt != 0 {
            self.ret_code_alt
        } else {
            self.ret_code
        };
        if code == 0 || code == 20001 {
            return Ok(());
        }
        Err(OpFailure {
            code: Some(code),
            message: self.message().to_string(),
        })
    }
}

/// Failed op reply, kept cloneable so one outcome can reach many waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpFailure {
    /// Server code, absent when only `success: false` was reported.
    pub code: Option<i64>,
    /// Server message.
    pub message: String,
}

impl OpFailure {
    /// Converts to the error taxonomy.
    pub fn to_error(&self) -> Error {
        match self.code {
            Some(code) => super::error::map_ret_code(code, &self.message),
            None => Error::runtime(self.message.clone()),
        }
    }
}

impl std::fmt::Display for OpFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Items of a list payload. `null` is an empty list.
pub fn ws_list(data: &Value) -> Result<&[Value]> {
    match data {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(&[]),
        _ => Err(ParseError::invalid_value("data", "expected a list").into()),
    }
}

/// Items of a ticker payload, which may be a single object or a list.
pub fn ws_ticker_items(data: &Value) -> Result<Vec<&Value>> {
    match data {
        Value::Object(_) => Ok(vec![data]),
        other => Ok(ws_list(other)?.iter().collect()),
    }
}

/// Category named by an item's `category` field.
pub fn item_category(item: &Value) -> Option<Category> {
    item.get("category")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

// ============================================================================
// Public Streams
// ============================================================================

/// Decoded order-book frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookFrame {
    /// Venue market id.
    pub market_id: String,
    /// Bid levels.
    pub bids: Vec<(Decimal, Decimal)>,
    /// Ask levels.
    pub asks: Vec<(Decimal, Decimal)>,
    /// Frame time; falls back to the envelope time.
    pub timestamp: Timestamp,
    /// Update id.
    pub update_id: i64,
}

/// Parses `{s, b, a, ts, u}`.
pub fn parse_orderbook_frame(data: &Value, envelope_ts: Timestamp) -> Result<OrderBookFrame> {
    if !data.is_object() {
        return Err(ParseError::invalid_value("data", "expected an order book object").into());
    }
    let timestamp = parse_timestamp(data, "ts")
        .filter(|ts| *ts != 0)
        .unwrap_or(envelope_ts);
    Ok(OrderBookFrame {
        market_id: parse_string(data, "s"),
        bids: parse_price_levels(data.get("b")),
        asks: parse_price_levels(data.get("a")),
        timestamp,
        update_id: parse_timestamp(data, "u").unwrap_or(0),
    })
}

/// Parses one public trade. Items without a market id are skipped.
pub fn parse_ws_trade(item: &Value, markets: &dyn MarketLookup, category: Category) -> Option<Trade> {
    let market_id = parse_string(item, "s");
    if market_id.is_empty() {
        return None;
    }
    let price = decimal_or_zero(item, "p");
    let amount = decimal_or_zero(item, "v");
    Some(Trade {
        id: parse_string(item, "i"),
        symbol: markets.safe_symbol(&market_id, category),
        timestamp: parse_timestamp(item, "T").unwrap_or(0),
        side: Side::parse(&parse_string(item, "S")),
        price,
        amount,
        cost: price * amount,
        info: item.clone(),
    })
}

/// Parses one candle.
pub fn parse_ws_kline(item: &Value) -> Ohlcv {
    Ohlcv {
        timestamp: parse_timestamp(item, "start").unwrap_or(0),
        open: decimal_or_zero(item, "open"),
        high: decimal_or_zero(item, "high"),
        low: decimal_or_zero(item, "low"),
        close: decimal_or_zero(item, "close"),
        volume: decimal_or_zero(item, "volume"),
        turnover: decimal_or_zero(item, "turnover"),
    }
}

/// Extracts non-zero mark prices keyed by unified symbol.
///
/// Items without a `symbol` use the market id from the topic.
pub fn parse_ws_mark_prices(
    items: &[&Value],
    topic: &str,
    markets: &dyn MarketLookup,
    category: Category,
) -> BTreeMap<String, Decimal> {
    let (_, topic_id, _) = split_topic(topic);
    let mut prices = BTreeMap::new();
    for item in items {
        let mut market_id = parse_string(item, "symbol");
        if market_id.is_empty() {
            market_id = topic_id.to_string();
        }
        if market_id.is_empty() {
            continue;
        }
        let Some(mark) = parse_decimal(item, "markPrice").filter(|p| !p.is_zero()) else {
            continue;
        };
        prices.insert(markets.safe_symbol(&market_id, category), mark);
    }
    prices
}

// ============================================================================
// Account Streams
// ============================================================================

/// Parses one wallet item (`{coin: [...]}`) into balances.
///
/// Per coin: `used = locked + totalOrderIM + totalPositionIM`,
/// `free = max(walletBalance - spotBorrow - used, 0)`, `total = equity`
/// when reported, else `walletBalance - spotBorrow`.
pub fn parse_wallet(item: &Value, timestamp: Timestamp, keep_zero: bool) -> Balances {
    let mut balances = Balances {
        timestamp,
        info: item.clone(),
        ..Balances::default()
    };
    let coins = item.get("coin").and_then(Value::as_array);
    for coin in coins.into_iter().flatten() {
        let code = parse_string(coin, "coin");
        if code.is_empty() {
            continue;
        }
        let base = decimal_or_zero(coin, "walletBalance") - decimal_or_zero(coin, "spotBorrow");
        let mut total = match coin.get("equity").map(|v| value_string(Some(v))) {
            Some(equity) if !equity.is_empty() => decimal_or_zero(coin, "equity"),
            _ => base,
        };
        let used = decimal_or_zero(coin, "locked")
            + decimal_or_zero(coin, "totalOrderIM")
            + decimal_or_zero(coin, "totalPositionIM");
        let free = (base - used).max(Decimal::ZERO);
        if total.is_zero() && free + used > Decimal::ZERO {
            total = free + used;
        }
        let asset = Asset {
            free,
            used,
            total,
            debt: decimal_or_zero(coin, "borrowAmount"),
            upnl: decimal_or_zero(coin, "unrealisedPnl"),
        };
        balances.insert(code, asset, keep_zero);
    }
    balances
}

/// Leverage rounded half away from zero; `None` when not positive.
pub fn parse_leverage(item: &Value) -> Option<u32> {
    parse_decimal(item, "leverage")?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .filter(|lev| *lev > 0)
}

/// Parses one position row. Empty one-way slots (size 0, no side) are
/// skipped.
pub fn parse_position(
    item: &Value,
    markets: &dyn MarketLookup,
    category: Category,
) -> Option<Position> {
    let size = decimal_or_zero(item, "size");
    let raw_side = parse_string(item, "side");
    let raw_side = raw_side.trim();
    if size.is_zero() && raw_side.is_empty() {
        return None;
    }
    let position_idx = parse_timestamp(item, "positionIdx").unwrap_or(0);
    let side = match Side::parse(raw_side) {
        Some(Side::Buy) => Some(PositionSide::Long),
        Some(Side::Sell) => Some(PositionSide::Short),
        None => match position_idx {
            1 => Some(PositionSide::Long),
            2 => Some(PositionSide::Short),
            _ => None,
        },
    };
    let market_id = parse_string(item, "symbol");
    let market = markets.market_by_id(&market_id, category);
    let contract_size = market
        .as_ref()
        .and_then(|m| m.contract_size)
        .unwrap_or(Decimal::ZERO);
    let symbol = market.map_or_else(|| market_id.clone(), |m| m.symbol);

    let entry = decimal_or_zero(item, "avgPrice");
    let mut notional = decimal_or_zero(item, "positionValue");
    if notional.is_zero() && entry > Decimal::ZERO && size > Decimal::ZERO {
        notional = size.abs() * entry;
        if contract_size > Decimal::ZERO {
            notional *= contract_size;
        }
    }
    let timestamp = parse_timestamp(item, "updatedTime")
        .filter(|ts| *ts != 0)
        .or_else(|| parse_timestamp(item, "createdTime"))
        .unwrap_or(0);

    Some(Position {
        symbol,
        category,
        side,
        contracts: size.abs(),
        entry_price: entry,
        mark_price: decimal_or_zero(item, "markPrice"),
        notional: notional.abs(),
        leverage: parse_leverage(item).unwrap_or(0),
        contract_size,
        initial_margin: decimal_or_zero(item, "positionIM"),
        maintenance_margin: decimal_or_zero(item, "positionMM"),
        unrealized_pnl: decimal_or_zero(item, "unrealisedPnl"),
        liquidation_price: parse_decimal(item, "liqPrice").filter(|p| !p.is_zero()),
        isolated: parse_timestamp(item, "tradeMode") == Some(1),
        hedged: position_idx != 0,
        timestamp,
        info: item.clone(),
    })
}

/// Parses one execution into a fill.
pub fn parse_ws_my_trade(
    item: &Value,
    markets: &dyn MarketLookup,
    category: Category,
) -> Option<MyTrade> {
    let market_id = parse_string(item, "symbol");
    if market_id.is_empty() {
        return None;
    }
    let price = decimal_or_zero(item, "execPrice");
    let exec_qty = decimal_or_zero(item, "execQty");
    let mut cost = decimal_or_zero(item, "execValue");
    if cost.is_zero() {
        cost = price * exec_qty;
    }
    let order_qty = decimal_or_zero(item, "orderQty");
    let leaves_qty = decimal_or_zero(item, "leavesQty");
    let filled = if order_qty > Decimal::ZERO {
        (order_qty - leaves_qty).max(Decimal::ZERO)
    } else {
        exec_qty
    };
    let fee_cost = decimal_or_zero(item, "execFee");
    let fee = (!fee_cost.is_zero()).then(|| Fee {
        cost: fee_cost,
        currency: parse_string(item, "feeCurrency"),
    });
    Some(MyTrade {
        id: parse_string(item, "execId"),
        order_id: parse_string(item, "orderId"),
        client_order_id: parse_string(item, "orderLinkId"),
        symbol: markets.safe_symbol(&market_id, category),
        timestamp: parse_timestamp(item, "execTime").unwrap_or(0),
        side: Side::parse(&parse_string(item, "side")),
        order_type: parse_string(item, "orderType").to_ascii_lowercase(),
        price,
        amount: exec_qty,
        cost,
        fee,
        maker: parse_bool(item, "isMaker"),
        order_amount: order_qty,
        filled,
        remaining: leaves_qty,
        state: OrderState::from_quantities(order_qty, leaves_qty, filled, exec_qty),
        info: item.clone(),
    })
}

// ============================================================================
// REST Rows
// ============================================================================

/// One decoded funding-history page.
#[derive(Debug, Clone, Default)]
pub struct FundingPage {
    /// Rows in ascending time order.
    pub rates: Vec<FundingRate>,
    /// Number of rows the venue returned.
    pub raw_len: usize,
    /// Latest settlement time seen, 0 for an empty page.
    pub last_ms: Timestamp,
}

/// Parses the `list` of a funding-history result.
pub fn parse_funding_page(
    result: &Value,
    markets: &dyn MarketLookup,
    category: Category,
) -> Result<FundingPage> {
    let list = result
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::from(ParseError::missing_field("list")))?;
    let mut page = FundingPage {
        raw_len: list.len(),
        ..FundingPage::default()
    };
    for row in list {
        let timestamp = parse_timestamp(row, "fundingRateTimestamp").unwrap_or(0);
        page.last_ms = page.last_ms.max(timestamp);
        let market_id = parse_string(row, "symbol");
        if market_id.is_empty() {
            continue;
        }
        page.rates.push(FundingRate {
            symbol: markets.safe_symbol(&market_id, category),
            funding_rate: row
                .get("fundingRate")
                .and_then(value_decimal)
                .unwrap_or(Decimal::ZERO),
            timestamp,
            info: row.clone(),
        });
    }
    page.rates.sort_by_key(|r| r.timestamp);
    Ok(page)
}
