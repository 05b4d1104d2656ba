use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::ws::ConnectionId;

/// A connection's membership record inside one room.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub joined_at: DateTime<Utc>,
    /// Position in the room's join order, assigned by the directory.
    join_seq: u64,
}

impl Participant {
    /// New participant with both media tracks enabled.
    /// Empty identity strings are treated as anonymous.
    pub fn new(
        connection_id: ConnectionId,
        user_id: Option<String>,
        display_name: Option<String>,
    ) -> Self {
        Self {
            connection_id,
            user_id: user_id.filter(|s| !s.is_empty()),
            display_name: display_name.filter(|s| !s.is_empty()),
            audio_enabled: true,
            video_enabled: true,
            joined_at: Utc::now(),
            join_seq: 0,
        }
    }
}

/// One active room. Only ever observed through the directory while non-empty.
#[derive(Debug, Clone)]
pub struct Room {
    room_id: String,
    participants: HashMap<ConnectionId, Participant>,
    created_at: DateTime<Utc>,
    next_seq: u64,
}

impl Room {
    fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            participants: HashMap::new(),
            created_at: Utc::now(),
            next_seq: 0,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.participants.contains_key(connection_id)
    }

    pub fn participant(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.participants.get(connection_id)
    }

    /// Full roster in join order.
    pub fn roster(&self) -> Vec<&Participant> {
        let mut roster: Vec<&Participant> = self.participants.values().collect();
        roster.sort_by_key(|p| p.join_seq);
        roster
    }

    /// Connection ids in roster order.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.roster()
            .into_iter()
            .map(|p| p.connection_id.clone())
            .collect()
    }
}

/// Result of removing a connection from a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The room or the participant was already absent.
    NotPresent,
    /// Participant removed, others remain.
    Removed,
    /// Participant removed and the room was deleted with it.
    RoomClosed,
}

/// In-memory room directory.
///
/// Rooms are created on first join and deleted in the same step that removes
/// their last participant, so the directory never holds an empty room.
///
/// Every mutating method takes a `fanout` closure that runs while the room's
/// entry guard is still held. Callers compute their snapshot and enqueue
/// notifications inside it, which serializes concurrent joins/leaves on the
/// same room and guarantees all recipients see the same roster.
#[derive(Debug, Clone, Default)]
pub struct RoomDirectory {
    /// room_id -> Room
    rooms: Arc<DashMap<String, Room>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `participant` in `room_id`, creating the room if needed.
    ///
    /// Returns true if the room was created by this call.
    pub fn join<F>(&self, room_id: &str, mut participant: Participant, fanout: F) -> bool
    where
        F: FnOnce(&Room),
    {
        let (mut room, created) = match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(entry) => (entry.into_ref(), false),
            Entry::Vacant(entry) => (entry.insert(Room::new(room_id)), true),
        };

        participant.join_seq = room.next_seq;
        room.next_seq += 1;
        room.participants
            .insert(participant.connection_id.clone(), participant);
        fanout(room.value());
        created
    }

    /// Remove a connection from a room. Idempotent.
    ///
    /// `fanout` runs only when the room still has participants afterwards.
    pub fn remove<F>(&self, room_id: &str, connection_id: &ConnectionId, fanout: F) -> Removal
    where
        F: FnOnce(&Room),
    {
        match self.rooms.entry(room_id.to_string()) {
            Entry::Vacant(_) => Removal::NotPresent,
            Entry::Occupied(mut entry) => {
                if entry.get_mut().participants.remove(connection_id).is_none() {
                    return Removal::NotPresent;
                }
                if entry.get().is_empty() {
                    entry.remove();
                    Removal::RoomClosed
                } else {
                    fanout(entry.get());
                    Removal::Removed
                }
            }
        }
    }

    /// Apply a partial media update. Fields left as `None` are unchanged.
    ///
    /// Returns the resulting `(audio, video)` flags, or None if the room or
    /// participant does not exist.
    pub fn update_media<F>(
        &self,
        room_id: &str,
        connection_id: &ConnectionId,
        audio: Option<bool>,
        video: Option<bool>,
        fanout: F,
    ) -> Option<(bool, bool)>
    where
        F: FnOnce(&Room, &Participant),
    {
        let mut room = self.rooms.get_mut(room_id)?;
        let participant = room.participants.get_mut(connection_id)?;
        if let Some(audio) = audio {
            participant.audio_enabled = audio;
        }
        if let Some(video) = video {
            participant.video_enabled = video;
        }
        let flags = (participant.audio_enabled, participant.video_enabled);

        let room = room.value();
        if let Some(participant) = room.participant(connection_id) {
            fanout(room, participant);
        }
        Some(flags)
    }

    /// Run `f` against a room member while the room is held.
    pub fn with_member<F, R>(&self, room_id: &str, connection_id: &ConnectionId, f: F) -> Option<R>
    where
        F: FnOnce(&Room, &Participant) -> R,
    {
        let room = self.rooms.get(room_id)?;
        let participant = room.participant(connection_id)?;
        Some(f(room.value(), participant))
    }

    /// Room ids currently listing this connection.
    pub fn rooms_containing(&self, connection_id: &ConnectionId) -> Vec<String> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().contains(connection_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Read-only copy of a room.
    pub fn snapshot(&self, room_id: &str) -> Option<Room> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    /// Read-only copies of every room, ordered by room id.
    pub fn snapshot_all(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
