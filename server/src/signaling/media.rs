use crate::state::AppState;
use crate::ws::broadcast::broadcast;
use crate::ws::protocol::ServerMessage;
use crate::ws::ConnectionId;

/// Handle a toggle-media request: partial update, then echo the resulting
/// flags to the whole room, sender included.
pub fn handle_toggle(
    state: &AppState,
    connection_id: &ConnectionId,
    room_id: &str,
    audio: Option<bool>,
    video: Option<bool>,
) {
    if room_id.is_empty() {
        return;
    }

    let flags = state
        .rooms
        .update_media(room_id, connection_id, audio, video, |room, participant| {
            let message = ServerMessage::MediaStateChanged {
                connection_id: participant.connection_id.clone(),
                audio: participant.audio_enabled,
                video: participant.video_enabled,
            };
            broadcast(&state.connections, &room.connection_ids(), &message, None);
        });

    match flags {
        Some((audio, video)) => tracing::debug!(
            connection_id = %connection_id,
            room_id = %room_id,
            audio,
            video,
            "Media state changed"
        ),
        None => tracing::debug!(
            connection_id = %connection_id,
            room_id = %room_id,
            "Ignoring media toggle outside of room"
        ),
    }
}
