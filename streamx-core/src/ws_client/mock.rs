//! In-memory transport for tests.
//!
//! [`MockTransport`] records every written frame, keeps per-connection topic
//! bookkeeping with a topic cap, and lets tests inject inbound frames and
//! reconnects. [`MockConnector`] hands out one transport per client key and
//! keeps them reachable for assertions.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use super::{ConnId, TransportEvent, WsConnector, WsTransport};
use crate::error::{Error, Result};

#[derive(Default)]
struct MockState {
    next_id: ConnId,
    conns: BTreeMap<ConnId, Vec<String>>,
    frames: Vec<(ConnId, Value)>,
    writes_left: Option<usize>,
}

/// Recording transport.
pub struct MockTransport {
    url: String,
    client_key: String,
    topic_cap: usize,
    auth_reply: Option<Value>,
    events: mpsc::Sender<TransportEvent>,
    state: Mutex<MockState>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("url", &self.url)
            .field("client_key", &self.client_key)
            .field("topic_cap", &self.topic_cap)
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// Creates a transport that puts at most `topic_cap` topics on a
    /// connection. When `auth_reply` is set it is pushed back on the same
    /// connection after every `auth` frame.
    pub fn new(
        url: impl Into<String>,
        client_key: impl Into<String>,
        topic_cap: usize,
        auth_reply: Option<Value>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            url: url.into(),
            client_key: client_key.into(),
            topic_cap: topic_cap.max(1),
            auth_reply,
            events,
            state: Mutex::new(MockState {
                next_id: 1,
                ..MockState::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Endpoint the transport was created for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Client key the transport was created for.
    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    /// Opens an empty connection and returns its id.
    pub fn open_connection(&self) -> ConnId {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.conns.insert(id, Vec::new());
        id
    }

    /// Every frame written so far, in order.
    pub fn frames(&self) -> Vec<(ConnId, Value)> {
        self.lock().frames.clone()
    }

    /// Written frames whose `op` equals `op`.
    pub fn frames_with_op(&self, op: &str) -> Vec<Value> {
        self.lock()
            .frames
            .iter()
            .filter(|(_, f)| f.get("op").and_then(Value::as_str) == Some(op))
            .map(|(_, f)| f.clone())
            .collect()
    }

    /// Forgets recorded frames.
    pub fn clear_frames(&self) {
        self.lock().frames.clear();
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.lock().conns.len()
    }

    /// Lets `n` more writes succeed, then fails every write.
    pub fn fail_writes_after(&self, n: usize) {
        self.lock().writes_left = Some(n);
    }

    /// Pushes an inbound text frame.
    pub async fn push_text(&self, conn: ConnId, text: impl Into<String>) {
        let _ = self
            .events
            .send(TransportEvent::Message {
                conn,
                text: text.into(),
            })
            .await;
    }

    /// Pushes an inbound JSON frame.
    pub async fn push_json(&self, conn: ConnId, frame: &Value) {
        self.push_text(conn, frame.to_string()).await;
    }

    /// Reports a drop and re-establishment of `conn`. Bound topics survive,
    /// as they would on a transport that reconnects in place.
    pub async fn simulate_reconnect(&self, conn: ConnId) {
        let topics = self.topics(conn);
        let _ = self
            .events
            .send(TransportEvent::Reconnected { conn, topics })
            .await;
    }

    /// Closes `conn` and reports it.
    pub async fn simulate_close(&self, conn: ConnId) {
        self.lock().conns.remove(&conn);
        let _ = self.events.send(TransportEvent::Closed { conn }).await;
    }
}

#[async_trait]
impl WsTransport for MockTransport {
    async fn acquire(&self, topics: &[String]) -> Result<ConnId> {
        let mut state = self.lock();
        let cap = self.topic_cap;
        let found = state
            .conns
            .iter()
            .find(|(_, bound)| bound.len() + topics.len() <= cap)
            .map(|(id, _)| *id);
        let id = match found {
            Some(id) => id,
            None => {
                let id = state.next_id;
                state.next_id += 1;
                state.conns.insert(id, Vec::new());
                id
            }
        };
        if let Some(bound) = state.conns.get_mut(&id) {
            for t in topics {
                if !bound.contains(t) {
                    bound.push(t.clone());
                }
            }
        }
        Ok(id)
    }

    fn unbind(&self, conn: ConnId, topics: &[String]) {
        if let Some(bound) = self.lock().conns.get_mut(&conn) {
            bound.retain(|t| !topics.contains(t));
        }
    }

    async fn write(&self, conn: ConnId, frame: &Value) -> Result<()> {
        {
            let mut state = self.lock();
            if !state.conns.contains_key(&conn) {
                return Err(Error::network(format!("connection {conn} is closed")));
            }
            if let Some(left) = state.writes_left.as_mut() {
                if *left == 0 {
                    return Err(Error::network("mock write failure"));
                }
                *left -= 1;
            }
            state.frames.push((conn, frame.clone()));
        }
        if frame.get("op").and_then(Value::as_str) == Some("auth") {
            if let Some(reply) = &self.auth_reply {
                self.push_json(conn, reply).await;
            }
        }
        Ok(())
    }

    fn topics(&self, conn: ConnId) -> Vec<String> {
        self.lock().conns.get(&conn).cloned().unwrap_or_default()
    }

    fn connections(&self) -> Vec<ConnId> {
        self.lock().conns.keys().copied().collect()
    }
}

/// Connector producing [`MockTransport`]s.
pub struct MockConnector {
    topic_cap: usize,
    auth_reply: Option<Value>,
    transports: DashMap<String, Arc<MockTransport>>,
}

impl MockConnector {
    /// Creates a connector whose transports cap connections at `topic_cap`
    /// topics.
    pub fn new(topic_cap: usize) -> Self {
        Self {
            topic_cap,
            auth_reply: None,
            transports: DashMap::new(),
        }
    }

    /// Answers every auth frame with `reply`.
    #[must_use]
    pub fn with_auth_reply(mut self, reply: Value) -> Self {
        self.auth_reply = Some(reply);
        self
    }

    /// Transport created for `client_key`, if any.
    pub fn transport(&self, client_key: &str) -> Option<Arc<MockTransport>> {
        self.transports.get(client_key).map(|t| Arc::clone(&t))
    }

    /// A successful auth response frame.
    pub fn auth_success() -> Value {
        json!({"op": "auth", "success": true, "ret_msg": "", "conn_id": "mock"})
    }

    /// A rejected auth response frame.
    pub fn auth_failure(message: &str) -> Value {
        json!({"op": "auth", "success": false, "ret_msg": message, "conn_id": "mock"})
    }
}

impl WsConnector for MockConnector {
    fn connect(
        &self,
        url: &str,
        client_key: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn WsTransport>> {
        let transport = Arc::new(MockTransport::new(
            url,
            client_key,
            self.topic_cap,
            self.auth_reply.clone(),
            events,
        ));
        self.transports
            .insert(client_key.to_string(), Arc::clone(&transport));
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_acquire_respects_topic_cap() {
        let (tx, _rx) = mpsc::channel(8);
        let t = MockTransport::new("wss://x", "spot/default", 2, None, tx);
        let a = t.acquire(&topics(&["a", "b"])).await.unwrap();
        let b = t.acquire(&topics(&["c"])).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(t.topics(a), topics(&["a", "b"]));
        t.unbind(a, &topics(&["a"]));
        let c = t.acquire(&topics(&["d"])).await.unwrap();
        assert_eq!(c, a);
        assert_eq!(t.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_write_records_and_fails_on_demand() {
        let (tx, _rx) = mpsc::channel(8);
        let t = MockTransport::new("wss://x", "k", 10, None, tx);
        let conn = t.open_connection();
        t.fail_writes_after(1);
        assert!(t.write(conn, &json!({"op": "ping"})).await.is_ok());
        assert!(t.write(conn, &json!({"op": "ping"})).await.is_err());
        assert_eq!(t.frames_with_op("ping").len(), 1);
        assert!(t.write(99, &json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_auth_reply_and_reconnect_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let t = MockTransport::new("wss://x", "k", 10, Some(MockConnector::auth_success()), tx);
        let conn = t.acquire(&topics(&["wallet"])).await.unwrap();
        t.write(conn, &json!({"op": "auth", "args": []})).await.unwrap();
        match rx.recv().await.unwrap() {
            TransportEvent::Message { conn: c, text } => {
                assert_eq!(c, conn);
                assert!(text.contains("\"success\":true"));
            }
            other => panic!("unexpected {other}"),
        }
        t.simulate_reconnect(conn).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::Reconnected {
                conn,
                topics: topics(&["wallet"])
            }
        );
    }

    #[test]
    fn test_connector_keeps_transports() {
        let connector = MockConnector::new(10);
        let (tx, _rx) = mpsc::channel(1);
        connector.connect("wss://x", "private/main", tx).unwrap();
        assert!(connector.transport("private/main").is_some());
        assert!(connector.transport("spot/main").is_none());
    }
}
