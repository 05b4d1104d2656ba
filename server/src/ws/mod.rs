pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use axum::extract::ws::Message;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Type alias for the sender half of a WebSocket connection's outbound queue.
/// Other parts of the system clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// Opaque, server-assigned identifier naming one live WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Draw a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Connection registry: tracks every live WebSocket by its connection id.
///
/// Delivery is fire-and-forget. Each connection owns an unbounded outbound
/// queue drained by its writer task, so a slow client never blocks the
/// caller. Sending to an unknown or closed connection is a silent no-op.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, ConnectionSender>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened channel and return its identifier.
    /// The identifier never collides with a currently live one.
    pub fn register(&self, sender: ConnectionSender) -> ConnectionId {
        loop {
            let id = ConnectionId::generate();
            if let Entry::Vacant(slot) = self.connections.entry(id.clone()) {
                slot.insert(sender);
                tracing::debug!(
                    connection_id = %id,
                    connections = self.connections.len(),
                    "Connection registered"
                );
                return id;
            }
        }
    }

    /// Forget a connection. Returns false if it was already gone.
    pub fn unregister(&self, id: &ConnectionId) -> bool {
        let removed = self.connections.remove(id).is_some();
        if removed {
            tracing::debug!(connection_id = %id, "Connection unregistered");
        }
        removed
    }

    /// Best-effort delivery of an already-encoded frame.
    pub fn send(&self, id: &ConnectionId, message: Message) {
        if let Some(sender) = self.connections.get(id) {
            let _ = sender.send(message);
        }
    }

    /// True if the id is registered and its writer is still running.
    pub fn is_live(&self, id: &ConnectionId) -> bool {
        self.connections
            .get(id)
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
