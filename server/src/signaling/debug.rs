//! Read-only room introspection over HTTP, for operational visibility.
//! Not meant to be exposed publicly; disable with `debug_endpoints = false`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::signaling::state::Room;
use crate::state::AppState;
use crate::ws::ConnectionId;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub participant_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDebug {
    pub connection_id: ConnectionId,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub audio: bool,
    pub video: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDebug {
    pub room_id: String,
    pub exists: bool,
    pub created_at: DateTime<Utc>,
    pub participants: Vec<ParticipantDebug>,
}

impl From<&Room> for RoomDebug {
    fn from(room: &Room) -> Self {
        Self {
            room_id: room.room_id().to_string(),
            exists: true,
            created_at: room.created_at(),
            participants: room
                .roster()
                .into_iter()
                .map(|p| ParticipantDebug {
                    connection_id: p.connection_id.clone(),
                    user_id: p.user_id.clone(),
                    display_name: p.display_name.clone(),
                    audio: p.audio_enabled,
                    video: p.video_enabled,
                    joined_at: p.joined_at,
                })
                .collect(),
        }
    }
}

/// GET /v1/rooms
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let rooms = state
        .rooms
        .snapshot_all()
        .iter()
        .map(|room| RoomSummary {
            room_id: room.room_id().to_string(),
            participant_count: room.len(),
            created_at: room.created_at(),
        })
        .collect();
    Json(rooms)
}

/// GET /v1/rooms/{room_id}/debug
pub async fn room_debug(State(state): State<AppState>, Path(room_id): Path<String>) -> Response {
    match state.rooms.snapshot(&room_id) {
        Some(room) => Json(RoomDebug::from(&room)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "roomId": room_id, "exists": false })),
        )
            .into_response(),
    }
}
