//! Room signaling: membership, negotiation relay, media state and chat.
//!
//! Handlers here never fail. Malformed input, stale targets and duplicate
//! removals degrade to silent no-ops; clients resync from the next roster
//! snapshot.

pub mod chat;
pub mod debug;
pub mod media;
pub mod membership;
pub mod relay;
pub mod state;
