//! Transport events delivered to the session layer.

/// Identifier of one physical connection within a transport.
pub type ConnId = u64;

/// Event raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Message {
        /// Connection the frame arrived on.
        conn: ConnId,
        /// Frame payload.
        text: String,
    },
    /// The connection dropped and was re-established. `topics` are the topics
    /// that were bound to it just before the drop.
    Reconnected {
        /// Re-established connection.
        conn: ConnId,
        /// Topics bound before the drop.
        topics: Vec<String>,
    },
    /// The connection closed for good.
    Closed {
        /// Closed connection.
        conn: ConnId,
    },
}

impl TransportEvent {
    /// Connection the event belongs to.
    #[must_use]
    pub fn conn(&self) -> ConnId {
        match self {
            Self::Message { conn, .. } | Self::Reconnected { conn, .. } | Self::Closed { conn } => {
                *conn
            }
        }
    }

    /// Returns true if this is a Reconnected event.
    #[inline]
    #[must_use]
    pub fn is_reconnected(&self) -> bool {
        matches!(self, Self::Reconnected { .. })
    }

    /// Returns true if this is a Closed event.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

impl std::fmt::Display for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message { conn, text } => write!(f, "Message(conn={conn}, {} bytes)", text.len()),
            Self::Reconnected { conn, topics } => {
                write!(f, "Reconnected(conn={conn}, topics={})", topics.len())
            }
            Self::Closed { conn } => write!(f, "Closed(conn={conn})"),
        }
    }
}
