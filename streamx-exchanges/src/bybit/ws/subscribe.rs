//! Subscribe and unsubscribe frames.

use serde_json::{Value, json};
use std::collections::HashSet;
use streamx_core::error::{ContextExt, Result};
use streamx_core::ws_client::ConnId;
use tracing::{debug, instrument};

use super::Inner;
use super::client::WsClient;

/// `{"op": <op>, "args": [...]}`
pub(crate) fn op_frame(op: &str, topics: &[String]) -> Value {
    json!({"op": op, "args": topics})
}

impl Inner {
    /// Subscribes `topics` in batches of the client's batch size.
    ///
    /// With `conn` set every batch is written on that connection, whose
    /// bookkeeping already holds the topics; this is the replay path.
    /// Otherwise topics already bound somewhere are skipped and each batch is
    /// bound to a connection from the transport. A failed write stops the
    /// remaining batches; earlier batches stay subscribed.
    #[instrument(skip(self, client, topics), fields(client = %client.key, topics = topics.len()))]
    pub(crate) async fn write_topics(&self, client: &WsClient, conn: Option<ConnId>, topics: &[String]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut pending: Vec<String> = topics
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect();
        if conn.is_none() {
            let bound: HashSet<String> = client
                .transport
                .connections()
                .into_iter()
                .flat_map(|c| client.transport.topics(c))
                .collect();
            pending.retain(|t| !bound.contains(t));
        }
        if pending.is_empty() {
            return Ok(());
        }

        for batch in pending.chunks(client.batch_size()) {
            let (target, acquired) = match conn {
                Some(conn) => (conn, false),
                None => (client.transport.acquire(batch).await?, true),
            };
            let frame = op_frame("subscribe", batch);
            if let Err(e) = client.transport.write(target, &frame).await {
                if acquired {
                    client.transport.unbind(target, batch);
                }
                return Err(e).context(format!("subscribe {} topics on {}", batch.len(), client.key));
            }
            debug!(client = %client.key, conn = target, topics = ?batch, "subscribed");
        }
        Ok(())
    }

    /// Unsubscribes `topics` from whichever connections carry them, one
    /// frame per connection holding only the topics active there. Topics stay
    /// bound on a connection whose write failed.
    #[instrument(skip(self, client, topics), fields(client = %client.key, topics = topics.len()))]
    pub(crate) async fn unsubscribe_topics(&self, client: &WsClient, topics: &[String]) -> Result<()> {
        let wanted: HashSet<&str> = topics.iter().map(String::as_str).collect();
        for conn in client.transport.connections() {
            let active: Vec<String> = client
                .transport
                .topics(conn)
                .into_iter()
                .filter(|t| wanted.contains(t.as_str()))
                .collect();
            if active.is_empty() {
                continue;
            }
            client
                .transport
                .write(conn, &op_frame("unsubscribe", &active))
                .await
                .with_context(|| format!("unsubscribe {} topics on {}", active.len(), client.key))?;
            client.transport.unbind(conn, &active);
            debug!(client = %client.key, conn, topics = ?active, "unsubscribed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_frame() {
        let frame = op_frame("subscribe", &["wallet".to_string(), "position".to_string()]);
        assert_eq!(frame["op"], "subscribe");
        assert_eq!(frame["args"][1], "position");
    }
}
