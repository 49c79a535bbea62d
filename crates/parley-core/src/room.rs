//! Rooms and the room directory.
//!
//! A room is a named broadcast channel holding the set of subscribed
//! connections and a bounded FIFO history of messages. The directory owns
//! room creation and lookup; rooms are never deleted, and the default
//! room exists from construction.

use crate::hub::HubError;
use parley_protocol::{ChatMessage, ConnectionId, MessageId, RoomId, RoomSummary};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Maximum room name length.
pub const MAX_ROOM_NAME_LENGTH: usize = 64;

/// Default per-room history capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// ID of the default room every identified connection starts in.
pub const DEFAULT_ROOM_ID: &str = "global";

/// Name of the default room.
pub const DEFAULT_ROOM_NAME: &str = "Global";

/// Validate a room name, returning the trimmed form.
///
/// # Errors
///
/// Returns an error message if the room name is invalid.
pub fn validate_room_name(name: &str) -> Result<&str, &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Room name cannot be empty.");
    }
    if trimmed.len() > MAX_ROOM_NAME_LENGTH {
        return Err("Room name too long.");
    }
    Ok(trimmed)
}

/// A named room with subscribers and bounded history.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    /// FIFO ring of stored messages, oldest first.
    history: VecDeque<ChatMessage>,
    /// Connections currently subscribed to this room.
    subscribers: HashSet<ConnectionId>,
    capacity: usize,
}

impl Room {
    fn new(id: impl Into<RoomId>, name: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            history: VecDeque::with_capacity(capacity),
            subscribers: HashSet::new(),
            capacity,
        }
    }

    /// Get the room ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the room name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe a connection to this room.
    ///
    /// Returns `true` if the connection was not already subscribed.
    pub fn subscribe(&mut self, connection_id: impl Into<ConnectionId>) -> bool {
        let connection_id = connection_id.into();
        let added = self.subscribers.insert(connection_id.clone());
        if added {
            debug!(room = %self.id, connection = %connection_id, "Connection subscribed");
        }
        added
    }

    /// Unsubscribe a connection from this room.
    ///
    /// Returns `true` if the connection was subscribed.
    pub fn unsubscribe(&mut self, connection_id: &str) -> bool {
        let removed = self.subscribers.remove(connection_id);
        if removed {
            debug!(room = %self.id, connection = %connection_id, "Connection unsubscribed");
        }
        removed
    }

    /// Check if a connection is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, connection_id: &str) -> bool {
        self.subscribers.contains(connection_id)
    }

    /// Iterate over subscribed connection IDs.
    pub fn subscribers(&self) -> impl Iterator<Item = &ConnectionId> {
        self.subscribers.iter()
    }

    /// Get the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Append a message to the history, evicting the oldest past capacity.
    pub fn append(&mut self, message: ChatMessage) {
        self.history.push_back(message);
        if self.history.len() > self.capacity {
            self.history.pop_front();
        }
    }

    /// Get the last `limit` messages, oldest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<ChatMessage> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Look up a stored message for mutation.
    pub fn message_mut(&mut self, message_id: MessageId) -> Option<&mut ChatMessage> {
        self.history.iter_mut().find(|m| m.id == message_id)
    }

    /// Get the number of stored messages.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

/// Directory of all rooms, indexed by ID and by case-folded name.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, Room>,
    /// Room IDs in creation order, default room first.
    order: Vec<RoomId>,
    /// Lowercased room name to ID, for case-insensitive uniqueness.
    names: HashMap<String, RoomId>,
    next_seq: u64,
    capacity: usize,
}

impl RoomDirectory {
    /// Create a directory with the default history capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a directory whose rooms hold up to `capacity` messages.
    ///
    /// The default room is seeded at construction.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut directory = Self {
            rooms: HashMap::new(),
            order: Vec::new(),
            names: HashMap::new(),
            next_seq: 1,
            capacity,
        };
        directory.insert(DEFAULT_ROOM_ID.to_string(), DEFAULT_ROOM_NAME.to_string());
        directory
    }

    fn insert(&mut self, id: RoomId, name: String) {
        self.names.insert(name.to_lowercase(), id.clone());
        self.order.push(id.clone());
        self.rooms.insert(id.clone(), Room::new(id, name, self.capacity));
    }

    /// Create a new room.
    ///
    /// # Errors
    ///
    /// Returns `EmptyName` for a blank name and `DuplicateName` when a
    /// room with the same name (case-insensitively) already exists.
    pub fn create(&mut self, name: &str) -> Result<RoomId, HubError> {
        let name = validate_room_name(name).map_err(HubError::EmptyName)?;

        if self.names.contains_key(&name.to_lowercase()) {
            return Err(HubError::DuplicateName);
        }

        let id = format!("room_{}", self.next_seq);
        self.next_seq += 1;
        debug!(room = %id, name = %name, "Creating new room");
        self.insert(id.clone(), name.to_string());
        Ok(id)
    }

    /// Look up a room by ID.
    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Look up a room by ID for mutation.
    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Get the number of rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// List all rooms in creation order, default room first.
    #[must_use]
    pub fn list(&self) -> Vec<RoomSummary> {
        self.order
            .iter()
            .filter_map(|id| self.rooms.get(id))
            .map(|room| RoomSummary {
                id: room.id.clone(),
                name: room.name.clone(),
            })
            .collect()
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
