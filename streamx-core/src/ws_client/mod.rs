//! Streaming transport seam.
//!
//! The session layer never dials sockets itself. It talks to a
//! [`WsTransport`], which owns the physical connections of one logical client
//! and their topic bookkeeping, and it receives inbound frames and reconnect
//! notices as [`TransportEvent`]s on an mpsc channel handed to the
//! [`WsConnector`] when the client is created.

mod event;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use event::{ConnId, TransportEvent};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;

/// Physical connections of one logical client.
#[async_trait]
pub trait WsTransport: Send + Sync {
    /// Finds or opens a connection with room for `topics` and binds them to
    /// it.
    async fn acquire(&self, topics: &[String]) -> Result<ConnId>;

    /// Removes `topics` from the bookkeeping of `conn`.
    fn unbind(&self, conn: ConnId, topics: &[String]);

    /// Writes one JSON frame on `conn`.
    async fn write(&self, conn: ConnId, frame: &Value) -> Result<()>;

    /// Topics currently bound to `conn`, in bind order.
    fn topics(&self, conn: ConnId) -> Vec<String>;

    /// Every open connection.
    fn connections(&self) -> Vec<ConnId>;
}

/// Factory for transports.
pub trait WsConnector: Send + Sync {
    /// Creates the transport of a logical client. Inbound traffic for every
    /// connection it opens goes to `events`.
    fn connect(
        &self,
        url: &str,
        client_key: &str,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn WsTransport>>;
}
