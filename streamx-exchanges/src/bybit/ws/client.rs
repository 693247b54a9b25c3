//! Logical clients and their reader tasks.
//!
//! A logical client is one (category, account) pair, or the private stream
//! of an account. It is created on first use and lives until the session is
//! closed. Inbound events of a client fan out to one worker task per physical
//! connection, so frames of one connection are handled strictly in arrival
//! order while different connections proceed concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use streamx_core::error::Result;
use streamx_core::types::Category;
use streamx_core::ws_client::{ConnId, TransportEvent, WsTransport};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use super::Inner;
use super::OutputKind;
use crate::bybit::topics::batch_size;

/// Scope name of private clients.
pub const PRIVATE_SCOPE: &str = "private";

const EVENT_BUFFER: usize = 1024;
const WORKER_BUFFER: usize = 256;

/// `"<scope>/<account>"`, scope being the category or `private`.
///
/// ```rust
/// use streamx_core::types::Category;
/// use streamx_exchanges::bybit::ws::client_key;
///
/// assert_eq!(client_key(Some(Category::Spot), "default"), "spot/default");
/// assert_eq!(client_key(None, "main"), "private/main");
/// ```
pub fn client_key(category: Option<Category>, account: &str) -> String {
    let scope = category.map_or(PRIVATE_SCOPE, Category::as_str);
    format!("{scope}/{account}")
}

/// One logical client.
pub(crate) struct WsClient {
    pub(crate) key: String,
    pub(crate) account: String,
    /// `None` for the private stream.
    pub(crate) category: Option<Category>,
    pub(crate) transport: Arc<dyn WsTransport>,
}

impl WsClient {
    pub(crate) fn is_private(&self) -> bool {
        self.category.is_none()
    }

    pub(crate) fn queue_key(&self, kind: OutputKind) -> String {
        format!("{}.{}", self.key, kind.as_str())
    }

    pub(crate) fn batch_size(&self) -> usize {
        batch_size(self.category)
    }
}

impl std::fmt::Debug for WsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClient")
            .field("key", &self.key)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Clients by key.
#[derive(Default)]
pub(crate) struct ClientRegistry {
    clients: RwLock<HashMap<String, Arc<WsClient>>>,
}

impl ClientRegistry {
    pub(crate) async fn get(&self, key: &str) -> Option<Arc<WsClient>> {
        self.clients.read().await.get(key).cloned()
    }

    pub(crate) async fn all(&self) -> Vec<Arc<WsClient>> {
        self.clients.read().await.values().cloned().collect()
    }
}

impl Inner {
    /// Returns the client for `(category, account)`, creating it and its
    /// reader tasks on first use.
    pub(crate) async fn client(
        self: &Arc<Self>,
        category: Option<Category>,
        account: &str,
    ) -> Result<Arc<WsClient>> {
        let key = client_key(category, account);
        if let Some(client) = self.clients.get(&key).await {
            return Ok(client);
        }
        if category.is_none() {
            self.credentials(account)?;
        }

        let mut clients = self.clients.clients.write().await;
        if let Some(client) = clients.get(&key) {
            return Ok(Arc::clone(client));
        }
        let url = self.urls.ws_for(category);
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let transport = self.connector.connect(&url, &key, tx)?;
        let client = Arc::new(WsClient {
            key: key.clone(),
            account: account.to_string(),
            category,
            transport,
        });
        clients.insert(key.clone(), Arc::clone(&client));
        drop(clients);

        info!(client = %key, url = %url, "created ws client");
        self.spawn_dispatcher(Arc::clone(&client), rx);
        self.ensure_heartbeat();
        Ok(client)
    }

    fn spawn_dispatcher(self: &Arc<Self>, client: Arc<WsClient>, mut rx: mpsc::Receiver<TransportEvent>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let mut workers: HashMap<ConnId, mpsc::Sender<TransportEvent>> = HashMap::new();
            loop {
                let event = tokio::select! {
                    () = inner.shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let conn = event.conn();
                let closed = event.is_closed();
                let worker = workers
                    .entry(conn)
                    .or_insert_with(|| inner.spawn_worker(Arc::clone(&client), conn));
                if worker.send(event).await.is_err() {
                    warn!(client = %client.key, conn, "connection worker is gone");
                }
                if closed {
                    workers.remove(&conn);
                }
            }
            debug!(client = %client.key, "dispatcher stopped");
        });
    }

    fn spawn_worker(self: &Arc<Self>, client: Arc<WsClient>, conn: ConnId) -> mpsc::Sender<TransportEvent> {
        let (tx, mut rx) = mpsc::channel(WORKER_BUFFER);
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = inner.shutdown.cancelled() => break,
                    event = rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                match event {
                    TransportEvent::Message { text, .. } => inner.dispatch(&client, conn, &text).await,
                    TransportEvent::Reconnected { topics, .. } => {
                        inner.on_reconnect(&client, conn, topics).await;
                    }
                    TransportEvent::Closed { .. } => {
                        debug!(client = %client.key, conn, "connection closed");
                        break;
                    }
                }
            }
        });
        tx
    }
}
