use crate::signaling::state::{Participant, Removal, Room};
use crate::state::AppState;
use crate::ws::broadcast::{broadcast, send_to};
use crate::ws::protocol::{RosterEntry, ServerMessage};
use crate::ws::ConnectionId;

/// Handle a join-room request.
///
/// Under the room's lock, in order:
/// 1. `participant-joined` to everyone already in the room
/// 2. `existing-participants` (the other ids) to the joiner
/// 3. `roster-snapshot` to the whole room, joiner included
///
/// If the connection sits in a different room it is removed from there first.
pub fn handle_join(
    state: &AppState,
    connection_id: &ConnectionId,
    room_id: &str,
    user_id: Option<String>,
    display_name: Option<String>,
) {
    if room_id.is_empty() {
        tracing::debug!(connection_id = %connection_id, "Ignoring join without room id");
        return;
    }

    for previous in state.rooms.rooms_containing(connection_id) {
        if previous != room_id {
            remove_participant(state, connection_id, &previous);
        }
    }

    let participant = Participant::new(connection_id.clone(), user_id, display_name);
    let joined = ServerMessage::ParticipantJoined {
        connection_id: connection_id.clone(),
        user_id: participant.user_id.clone(),
        display_name: participant.display_name.clone(),
    };

    let mut size = 0;
    let created = state.rooms.join(room_id, participant, |room| {
        let everyone = room.connection_ids();
        let others: Vec<ConnectionId> = everyone
            .iter()
            .filter(|id| *id != connection_id)
            .cloned()
            .collect();

        broadcast(&state.connections, &everyone, &joined, Some(connection_id));
        send_to(
            &state.connections,
            connection_id,
            &ServerMessage::ExistingParticipants {
                participant_ids: others,
            },
        );
        broadcast(&state.connections, &everyone, &roster_snapshot(room), None);
        size = everyone.len();
    });

    if created {
        tracing::info!(room_id = %room_id, "Room created");
    }
    tracing::info!(
        connection_id = %connection_id,
        room_id = %room_id,
        participants = size,
        "Participant joined"
    );
}

/// Handle an explicit leave-room request.
pub fn handle_leave(state: &AppState, connection_id: &ConnectionId, room_id: &str) {
    if room_id.is_empty() {
        tracing::debug!(connection_id = %connection_id, "Ignoring leave without room id");
        return;
    }
    remove_participant(state, connection_id, room_id);
}

/// Transport-level disconnect: remove the connection from every room listing it.
pub fn handle_disconnect(state: &AppState, connection_id: &ConnectionId) {
    for room_id in state.rooms.rooms_containing(connection_id) {
        remove_participant(state, connection_id, &room_id);
    }
}

/// Shared removal path for leave and disconnect. Idempotent.
///
/// Remaining participants get `participant-left` followed by a fresh
/// `roster-snapshot`. An emptied room is deleted and nobody is notified.
pub fn remove_participant(state: &AppState, connection_id: &ConnectionId, room_id: &str) -> Removal {
    let left = ServerMessage::ParticipantLeft {
        connection_id: connection_id.clone(),
        room_id: room_id.to_string(),
    };

    let removal = state.rooms.remove(room_id, connection_id, |room| {
        let remaining = room.connection_ids();
        broadcast(&state.connections, &remaining, &left, None);
        broadcast(&state.connections, &remaining, &roster_snapshot(room), None);
    });

    match removal {
        Removal::NotPresent => {
            tracing::debug!(
                connection_id = %connection_id,
                room_id = %room_id,
                "Removal of absent participant ignored"
            );
        }
        Removal::Removed => {
            tracing::info!(connection_id = %connection_id, room_id = %room_id, "Participant left");
        }
        Removal::RoomClosed => {
            tracing::info!(
                connection_id = %connection_id,
                room_id = %room_id,
                "Last participant left, room deleted"
            );
        }
    }

    removal
}

/// Build the full roster message for a room. Computed once per broadcast.
pub fn roster_snapshot(room: &Room) -> ServerMessage {
    ServerMessage::RosterSnapshot {
        participants: room.roster().into_iter().map(RosterEntry::from).collect(),
    }
}
