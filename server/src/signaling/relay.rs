use crate::state::AppState;
use crate::ws::broadcast::send_to;
use crate::ws::protocol::{RelayRequest, RelayedNegotiation, ServerMessage};
use crate::ws::ConnectionId;

/// The three negotiation message kinds forwarded between peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationKind {
    Offer,
    Answer,
    Candidate,
}

impl NegotiationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
        }
    }

    fn wrap(self, relayed: RelayedNegotiation) -> ServerMessage {
        match self {
            Self::Offer => ServerMessage::OfferRelayed(relayed),
            Self::Answer => ServerMessage::AnswerRelayed(relayed),
            Self::Candidate => ServerMessage::CandidateRelayed(relayed),
        }
    }
}

/// Relay an offer/answer/candidate to its target with the sender's id attached.
///
/// The payload is forwarded untouched. A target with no live connection is
/// dropped silently; the sender learns about departures from roster events.
pub fn handle_relay(
    state: &AppState,
    from: &ConnectionId,
    kind: NegotiationKind,
    req: RelayRequest,
) {
    if !state.connections.is_live(&req.target) {
        tracing::debug!(
            from = %from,
            target = %req.target,
            kind = kind.as_str(),
            "Dropping relay to stale target"
        );
        return;
    }

    tracing::debug!(
        from = %from,
        target = %req.target,
        room_id = %req.room_id,
        kind = kind.as_str(),
        "Relaying negotiation message"
    );

    let message = kind.wrap(RelayedNegotiation {
        from: from.clone(),
        payload: req.payload,
        room_id: req.room_id,
    });
    send_to(&state.connections, &req.target, &message);
}
