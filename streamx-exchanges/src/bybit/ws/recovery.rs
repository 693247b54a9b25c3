//! Reconnect recovery and keepalive.

use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use streamx_core::ws_client::ConnId;
use tracing::{debug, error, info, warn};

use super::Inner;
use super::auth::PendingReconnect;
use super::client::WsClient;

impl Inner {
    /// Restores a re-established connection.
    ///
    /// Public clients resubscribe right away. Private clients must log in
    /// again first, so the topics are parked and replayed by the auth reply.
    pub(crate) async fn on_reconnect(self: &Arc<Self>, client: &Arc<WsClient>, conn: ConnId, topics: Vec<String>) {
        if topics.is_empty() {
            debug!(client = %client.key, conn, "reconnected without topics");
            return;
        }
        if !client.is_private() {
            info!(client = %client.key, conn, topics = topics.len(), "reconnected, resubscribing");
            self.spawn_replay(Arc::clone(client), PendingReconnect { conn, topics });
            return;
        }

        info!(client = %client.key, conn, topics = topics.len(), "private reconnect, logging in again");
        self.auth
            .mark_reconnecting(&client.key, PendingReconnect { conn, topics })
            .await;
        let inner = Arc::clone(self);
        let client = Arc::clone(client);
        tokio::spawn(async move {
            if let Err(e) = inner.login(&client, Some(conn), true).await {
                error!(client = %client.key, conn, error = %e, "re-login after reconnect failed");
            }
        });
    }

    /// Writes the saved topics back on their connection in the background.
    pub(crate) fn spawn_replay(self: &Arc<Self>, client: Arc<WsClient>, record: PendingReconnect) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            match inner.write_topics(&client, Some(record.conn), &record.topics).await {
                Ok(()) => debug!(client = %client.key, conn = record.conn, "subscriptions restored"),
                Err(e) => error!(client = %client.key, conn = record.conn, error = %e, "restoring subscriptions failed"),
            }
        });
    }

    /// Starts the keepalive task once per session.
    pub(crate) fn ensure_heartbeat(self: &Arc<Self>) {
        if self.heartbeat_started.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let period = inner.config.ping_interval;
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    () = inner.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        inner.ping_all().await;
                    }
                }
            }
            debug!("heartbeat stopped");
        });
    }

    /// Pings every connection of every client. Returns the number of pings
    /// written; failures are left to the transport's own reconnect logic.
    pub(crate) async fn ping_all(&self) -> usize {
        let frame = &json!({"op": "ping"});
        let clients = self.clients.all().await;
        let pings = clients.iter().flat_map(|client| {
            client.transport.connections().into_iter().map(move |conn| {
                async move {
                    match client.transport.write(conn, frame).await {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(client = %client.key, conn, error = %e, "ping failed");
                            false
                        }
                    }
                }
            })
        });
        join_all(pings).await.into_iter().filter(|ok| *ok).count()
    }
}
