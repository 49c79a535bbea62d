//! Typing tracker: per-room sets of connections currently typing.
//!
//! The tracker is a pure reflector of the last signal received per
//! connection per room. No debouncing or timeout happens server-side;
//! the client is responsible for emitting a stop signal after idling.

use parley_protocol::{ConnectionId, RoomId};
use std::collections::HashMap;

/// Per-room typing state, insertion-ordered.
#[derive(Debug, Default)]
pub struct TypingTracker {
    rooms: HashMap<RoomId, Vec<(ConnectionId, String)>>,
}

impl TypingTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a typing signal.
    ///
    /// On `true`, upserts the connection into the room's set; on `false`,
    /// deletes it. An emptied room entry is dropped.
    pub fn set(
        &mut self,
        room_id: &str,
        connection_id: &str,
        display_name: &str,
        is_typing: bool,
    ) {
        if is_typing {
            let entries = self.rooms.entry(room_id.to_string()).or_default();
            if let Some(entry) = entries.iter_mut().find(|(id, _)| id == connection_id) {
                entry.1 = display_name.to_string();
            } else {
                entries.push((connection_id.to_string(), display_name.to_string()));
            }
        } else if let Some(entries) = self.rooms.get_mut(room_id) {
            entries.retain(|(id, _)| id != connection_id);
            if entries.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }

    /// Check whether a connection is marked typing in a room.
    #[must_use]
    pub fn is_typing(&self, room_id: &str, connection_id: &str) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|entries| entries.iter().any(|(id, _)| id == connection_id))
    }

    /// Display names of everyone typing in a room, in signal order.
    #[must_use]
    pub fn names(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|entries| entries.iter().map(|(_, name)| name.clone()).collect())
            .unwrap_or_default()
    }

    /// Remove a connection from every room's typing set.
    ///
    /// Returns the IDs of the rooms that had an entry removed.
    pub fn remove_connection(&mut self, connection_id: &str) -> Vec<RoomId> {
        let mut touched = Vec::new();
        self.rooms.retain(|room_id, entries| {
            let before = entries.len();
            entries.retain(|(id, _)| id != connection_id);
            if entries.len() != before {
                touched.push(room_id.clone());
            }
            !entries.is_empty()
        });
        touched
    }
}
