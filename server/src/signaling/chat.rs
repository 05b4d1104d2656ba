use chrono::Utc;

use crate::state::AppState;
use crate::ws::broadcast::broadcast;
use crate::ws::protocol::ServerMessage;
use crate::ws::ConnectionId;

/// Relay a chat line to everyone in the room, sender included.
/// Identity comes from the sender's participant record. Nothing is stored.
pub fn handle_chat(state: &AppState, connection_id: &ConnectionId, room_id: &str, message: String) {
    if room_id.is_empty() {
        return;
    }

    let delivered = state
        .rooms
        .with_member(room_id, connection_id, |room, participant| {
            let chat = ServerMessage::ChatMessage {
                connection_id: participant.connection_id.clone(),
                user_id: participant.user_id.clone(),
                display_name: participant.display_name.clone(),
                message,
                ts: Utc::now().timestamp_millis(),
            };
            broadcast(&state.connections, &room.connection_ids(), &chat, None);
        })
        .is_some();

    if delivered {
        tracing::debug!(connection_id = %connection_id, room_id = %room_id, "Chat relayed");
    } else {
        tracing::debug!(
            connection_id = %connection_id,
            room_id = %room_id,
            "Ignoring chat from non-member"
        );
    }
}
