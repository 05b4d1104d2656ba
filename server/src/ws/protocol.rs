//! JSON wire protocol spoken over the signaling WebSocket.
//!
//! Every frame is a text frame holding one object tagged by `"type"`.
//! Inbound frames decode into [`ClientMessage`] and are dispatched to the
//! signaling handlers; outbound frames are [`ServerMessage`]s.
//!
//! Nothing here ever answers with an error. Frames that fail to decode are
//! logged and dropped so a buggy client cannot disturb the room.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::signaling::relay::NegotiationKind;
use crate::signaling::state::Participant;
use crate::signaling::{chat, media, membership, relay};
use crate::state::AppState;
use crate::ws::ConnectionId;

/// Every `type` a client may send.
const CLIENT_MESSAGE_TYPES: &[&str] = &[
    "join-room",
    "leave-room",
    "send-offer",
    "send-answer",
    "send-candidate",
    "toggle-media",
    "send-chat",
];

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    JoinRoom(JoinRequest),
    LeaveRoom(LeaveRequest),
    SendOffer(RelayRequest),
    SendAnswer(RelayRequest),
    SendCandidate(RelayRequest),
    ToggleMedia(ToggleRequest),
    SendChat(ChatRequest),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default)]
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    #[serde(default)]
    pub room_id: String,
}

/// Partial media update. An absent flag leaves that track unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    #[serde(default)]
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub message: String,
}

/// Opaque negotiation payload, kept as the exact JSON text the sender wrote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Box<RawValue>);

impl Payload {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        RawValue::from_string(json.to_string()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.get()
    }

    /// Decode a payload that has already been buffered, as happens inside
    /// an internally tagged enum. The text is re-encoded from a [`Value`],
    /// so this is only used when reading server frames back.
    fn deserialize_buffered<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        serde_json::value::to_raw_value(&value)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// A negotiation message addressed to one peer. `payload` is never inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub target: ConnectionId,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub room_id: String,
}

/// A negotiation message as delivered to its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedNegotiation {
    pub from: ConnectionId,
    #[serde(deserialize_with = "Payload::deserialize_buffered")]
    pub payload: Payload,
    pub room_id: String,
}

/// One row of a roster snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub connection_id: ConnectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub audio: bool,
    pub video: bool,
}

impl From<&Participant> for RosterEntry {
    fn from(p: &Participant) -> Self {
        Self {
            connection_id: p.connection_id.clone(),
            user_id: p.user_id.clone(),
            display_name: p.display_name.clone(),
            audio: p.audio_enabled,
            video: p.video_enabled,
        }
    }
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every connection: the id the server assigned to it.
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: ConnectionId },
    /// Sent to everyone already in the room when someone joins.
    #[serde(rename_all = "camelCase")]
    ParticipantJoined {
        connection_id: ConnectionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
    /// Sent only to the joiner. The joiner must send the first offer to
    /// each listed peer; existing peers only ever answer.
    #[serde(rename_all = "camelCase")]
    ExistingParticipants { participant_ids: Vec<ConnectionId> },
    /// Authoritative full roster, identical for every recipient.
    RosterSnapshot { participants: Vec<RosterEntry> },
    #[serde(rename_all = "camelCase")]
    ParticipantLeft {
        connection_id: ConnectionId,
        room_id: String,
    },
    OfferRelayed(RelayedNegotiation),
    AnswerRelayed(RelayedNegotiation),
    CandidateRelayed(RelayedNegotiation),
    #[serde(rename_all = "camelCase")]
    MediaStateChanged {
        connection_id: ConnectionId,
        audio: bool,
        video: bool,
    },
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        connection_id: ConnectionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        message: String,
        ts: i64,
    },
}

/// Only the `type` field of an inbound frame.
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Decode one inbound text frame.
///
/// The `type` tag is read first and the matching request is then decoded
/// straight from the original text, so relay payloads keep their exact bytes.
pub fn decode_client_message(text: &str) -> Result<ClientMessage, serde_json::Error> {
    let Envelope { kind } = serde_json::from_str(text)?;
    let message = match kind.as_str() {
        "join-room" => ClientMessage::JoinRoom(serde_json::from_str(text)?),
        "leave-room" => ClientMessage::LeaveRoom(serde_json::from_str(text)?),
        "send-offer" => ClientMessage::SendOffer(serde_json::from_str(text)?),
        "send-answer" => ClientMessage::SendAnswer(serde_json::from_str(text)?),
        "send-candidate" => ClientMessage::SendCandidate(serde_json::from_str(text)?),
        "toggle-media" => ClientMessage::ToggleMedia(serde_json::from_str(text)?),
        "send-chat" => ClientMessage::SendChat(serde_json::from_str(text)?),
        other => {
            return Err(serde::de::Error::unknown_variant(
                other,
                CLIENT_MESSAGE_TYPES,
            ))
        }
    };
    Ok(message)
}

/// Handle an incoming text frame from `connection_id`.
pub fn handle_text_message(text: &str, connection_id: &ConnectionId, state: &AppState) {
    let message = match decode_client_message(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(
                connection_id = %connection_id,
                error = %e,
                "Dropping undecodable frame: {}",
                text.chars().take(100).collect::<String>()
            );
            return;
        }
    };

    dispatch(message, connection_id, state);
}

/// Dispatch a decoded message to the appropriate handler.
pub fn dispatch(message: ClientMessage, connection_id: &ConnectionId, state: &AppState) {
    match message {
        ClientMessage::JoinRoom(req) => membership::handle_join(
            state,
            connection_id,
            &req.room_id,
            req.user_id,
            req.display_name,
        ),
        ClientMessage::LeaveRoom(req) => {
            membership::handle_leave(state, connection_id, &req.room_id)
        }
        ClientMessage::SendOffer(req) => {
            relay::handle_relay(state, connection_id, NegotiationKind::Offer, req)
        }
        ClientMessage::SendAnswer(req) => {
            relay::handle_relay(state, connection_id, NegotiationKind::Answer, req)
        }
        ClientMessage::SendCandidate(req) => {
            relay::handle_relay(state, connection_id, NegotiationKind::Candidate, req)
        }
        ClientMessage::ToggleMedia(req) => {
            media::handle_toggle(state, connection_id, &req.room_id, req.audio, req.video)
        }
        ClientMessage::SendChat(req) => {
            chat::handle_chat(state, connection_id, &req.room_id, req.message)
        }
    }
}
