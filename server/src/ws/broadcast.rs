use axum::extract::ws::Message;

use super::protocol::ServerMessage;
use super::{ConnectionId, ConnectionRegistry};

/// Encode a server message as a JSON text frame.
pub fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode server message");
            None
        }
    }
}

/// Send a message to a single connection.
pub fn send_to(registry: &ConnectionRegistry, to: &ConnectionId, message: &ServerMessage) {
    if let Some(frame) = encode(message) {
        registry.send(to, frame);
    }
}

/// Fan a message out to every recipient except `excluding`.
///
/// The frame is encoded once and cloned per recipient, so everyone
/// receives the same bytes.
pub fn broadcast<'a, I>(
    registry: &ConnectionRegistry,
    recipients: I,
    message: &ServerMessage,
    excluding: Option<&ConnectionId>,
) where
    I: IntoIterator<Item = &'a ConnectionId>,
{
    let Some(frame) = encode(message) else {
        return;
    };

    for id in recipients {
        if Some(id) == excluding {
            continue;
        }
        registry.send(id, frame.clone());
    }
}
