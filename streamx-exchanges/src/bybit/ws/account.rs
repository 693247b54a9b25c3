//! Account caches and private-stream handlers.
//!
//! Balances are replaced wholesale per account. Positions are kept per
//! account and category; every frame replaces the list of each category it
//! carries with its open positions. Leverage is merged key by key and changes
//! are republished as [`AccountConfig`] events.

use std::collections::{BTreeMap, HashMap};
use streamx_core::error::Result;
use streamx_core::parser_utils::{milliseconds, parse_string};
use streamx_core::types::{AccountConfig, Balances, Category, Position};
use tokio::sync::RwLock;
use tracing::{debug, error};

use super::client::WsClient;
use super::{Inner, OutputKind};
use crate::bybit::parser::{
    WsEnvelope, item_category, parse_leverage, parse_position, parse_wallet, parse_ws_my_trade,
    ws_list,
};

/// Per-account balance, position and leverage state.
#[derive(Default)]
pub(crate) struct AccountCaches {
    balances: RwLock<HashMap<String, Balances>>,
    positions: RwLock<HashMap<(String, Category), Vec<Position>>>,
    leverage: RwLock<HashMap<String, HashMap<String, u32>>>,
}

impl AccountCaches {
    pub(crate) async fn set_balances(&self, account: &str, balances: Balances) {
        self.balances
            .write()
            .await
            .insert(account.to_string(), balances);
    }

    pub(crate) async fn balances(&self, account: &str) -> Option<Balances> {
        self.balances.read().await.get(account).cloned()
    }

    /// Replaces the position lists of the given categories.
    pub(crate) async fn replace_positions(&self, account: &str, lists: BTreeMap<Category, Vec<Position>>) {
        let mut all = self.positions.write().await;
        for (category, positions) in lists {
            all.insert((account.to_string(), category), positions);
        }
    }

    /// Cached positions of one category, or of every category.
    pub(crate) async fn positions(&self, account: &str, category: Option<Category>) -> Vec<Position> {
        self.positions
            .read()
            .await
            .iter()
            .filter(|((acc, cat), _)| acc == account && category.is_none_or(|c| c == *cat))
            .flat_map(|(_, positions)| positions.iter().cloned())
            .collect()
    }

    /// Merges leverage values and returns the ones that changed.
    pub(crate) async fn merge_leverage(&self, account: &str, updates: Vec<(String, u32)>) -> Vec<AccountConfig> {
        let mut all = self.leverage.write().await;
        let known = all.entry(account.to_string()).or_default();
        let mut changed = Vec::new();
        for (symbol, leverage) in updates {
            if leverage == 0 || known.get(&symbol) == Some(&leverage) {
                continue;
            }
            known.insert(symbol.clone(), leverage);
            changed.push(AccountConfig { symbol, leverage });
        }
        changed
    }

    pub(crate) async fn leverage(&self, account: &str, symbol: &str) -> Option<u32> {
        self.leverage.read().await.get(account)?.get(symbol).copied()
    }
}

impl Inner {
    /// Handles a `wallet` frame: the first item is the unified account.
    pub(crate) async fn on_wallet(&self, client: &WsClient, env: &WsEnvelope) {
        let items = match ws_list(&env.data) {
            Ok(items) => items,
            Err(e) => {
                error!(client = %client.key, error = %e, "bad wallet frame");
                return;
            }
        };
        let Some(item) = items.first() else {
            return;
        };
        let timestamp = if env.creation_time > 0 { env.creation_time } else { env.ts };
        let balances = parse_wallet(item, timestamp, true);
        self.account_caches
            .set_balances(&client.account, balances.clone())
            .await;
        self.outputs
            .balances
            .publish(&client.queue_key(OutputKind::Balance), balances);
    }

    /// Handles a `position[.<category>]` frame.
    pub(crate) async fn on_position(&self, client: &WsClient, env: &WsEnvelope) {
        let items = match ws_list(&env.data) {
            Ok(items) => items,
            Err(e) => {
                error!(client = %client.key, error = %e, "bad position frame");
                return;
            }
        };

        let mut leverage = Vec::new();
        let mut lists: BTreeMap<Category, Vec<Position>> = BTreeMap::new();
        let mut published = Vec::new();
        for item in items {
            let category = item_category(item).unwrap_or(Category::Linear);
            let market_id = parse_string(item, "symbol");
            if let Some(lev) = parse_leverage(item) {
                leverage.push((self.markets.safe_symbol(&market_id, category), lev));
            }
            let list = lists.entry(category).or_default();
            if let Some(position) = parse_position(item, self.markets.as_ref(), category)
                .filter(|p| !p.contracts.is_zero())
            {
                list.push(position.clone());
                published.push(position);
            }
        }

        let configs = self
            .account_caches
            .merge_leverage(&client.account, leverage)
            .await;
        self.account_caches
            .replace_positions(&client.account, lists)
            .await;
        if published.is_empty() && configs.is_empty() {
            return;
        }
        if !published.is_empty() {
            self.outputs
                .positions
                .publish(&client.queue_key(OutputKind::Positions), published);
        }
        let key = client.queue_key(OutputKind::AccountConfig);
        for config in configs {
            debug!(client = %client.key, symbol = %config.symbol, leverage = config.leverage, "leverage changed");
            self.outputs.account_configs.publish(&key, config);
        }
    }

    /// Handles an `execution[.<category>]` frame.
    pub(crate) fn on_execution(&self, client: &WsClient, env: &WsEnvelope) {
        let items = match ws_list(&env.data) {
            Ok(items) => items,
            Err(e) => {
                error!(client = %client.key, error = %e, "bad execution frame");
                return;
            }
        };
        let key = client.queue_key(OutputKind::MyTrades);
        for item in items {
            let category = item_category(item).unwrap_or(Category::Linear);
            if let Some(trade) = parse_ws_my_trade(item, self.markets.as_ref(), category) {
                self.outputs.my_trades.publish(&key, trade);
            }
        }
    }

    /// Seeds the balance cache over REST and publishes the snapshot.
    pub(crate) async fn seed_balances(&self, client: &WsClient) -> Result<Balances> {
        let credentials = self.credentials(&client.account)?;
        let result = self.rest.wallet_balance(&credentials).await?;
        let list = ws_list(result.get("list").unwrap_or(&serde_json::Value::Null))?;
        let balances = match list.first() {
            Some(item) => parse_wallet(item, milliseconds(), false),
            None => Balances {
                timestamp: milliseconds(),
                ..Balances::default()
            },
        };
        self.account_caches
            .set_balances(&client.account, balances.clone())
            .await;
        self.outputs
            .balances
            .publish(&client.queue_key(OutputKind::Balance), balances.clone());
        Ok(balances)
    }

    /// Seeds the position cache over REST for each category and publishes
    /// the combined snapshot.
    pub(crate) async fn seed_positions(&self, client: &WsClient, categories: &[Category]) -> Result<Vec<Position>> {
        let credentials = self.credentials(&client.account)?;
        let mut all = Vec::new();
        for &category in categories {
            let result = self.rest.position_list(&credentials, category).await?;
            let list = ws_list(result.get("list").unwrap_or(&serde_json::Value::Null))?;
            let positions: Vec<Position> = list
                .iter()
                .filter_map(|item| parse_position(item, self.markets.as_ref(), category))
                .filter(|p| !p.contracts.is_zero())
                .collect();
            all.extend(positions.iter().cloned());
            self.account_caches
                .replace_positions(&client.account, BTreeMap::from([(category, positions)]))
                .await;
        }
        self.outputs
            .positions
            .publish(&client.queue_key(OutputKind::Positions), all.clone());
        Ok(all)
    }
}
