//! Chat message model.
//!
//! A message is immutable once routed, with one exception: its reaction
//! map, which is toggled in place while the message sits in a room's
//! history. Private messages reuse the same record but are never stored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique message identifier.
pub type MessageId = u64;

/// A connection identifier, assigned by the server at socket accept.
pub type ConnectionId = String;

/// A room identifier.
pub type RoomId = String;

/// Reaction state: emoji symbol to the connections that reacted with it.
///
/// A connection appears at most once per emoji. An emoji whose reactor
/// list empties is removed from the map rather than kept as an empty key.
pub type Reactions = BTreeMap<String, Vec<ConnectionId>>;

/// Sender name used for messages from connections that never identified.
pub const ANONYMOUS: &str = "Anonymous";

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> MessageId {
    // Combine timestamp with atomic counter for guaranteed uniqueness
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    timestamp.wrapping_add(counter)
}

/// Current wall-clock time in unix milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: MessageId,
    /// Message body, non-empty after trimming.
    pub body: String,
    /// Connection that sent the message.
    pub sender_id: ConnectionId,
    /// Sender display name captured at send time.
    pub sender_name: String,
    /// Creation timestamp in unix milliseconds.
    pub timestamp: u64,
    /// Owning room, absent for private messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Whether this is a private (direct) message.
    pub private: bool,
    /// Recipient connection, present only on private messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<ConnectionId>,
    /// Reactions keyed by emoji.
    #[serde(default, skip_serializing_if = "Reactions::is_empty")]
    pub reactions: Reactions,
}

impl ChatMessage {
    /// Create a room message with a fresh ID, timestamp, and no reactions.
    #[must_use]
    pub fn room(
        room_id: impl Into<RoomId>,
        sender_id: impl Into<ConnectionId>,
        sender_name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_message_id(),
            body: body.into(),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            timestamp: now_millis(),
            room_id: Some(room_id.into()),
            private: false,
            recipient_id: None,
            reactions: Reactions::new(),
        }
    }

    /// Create a private message addressed to a single recipient.
    #[must_use]
    pub fn private(
        recipient_id: impl Into<ConnectionId>,
        sender_id: impl Into<ConnectionId>,
        sender_name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_message_id(),
            body: body.into(),
            sender_id: sender_id.into(),
            sender_name: sender_name.into(),
            timestamp: now_millis(),
            room_id: None,
            private: true,
            recipient_id: Some(recipient_id.into()),
            reactions: Reactions::new(),
        }
    }

    /// Toggle a reaction for a connection.
    ///
    /// Adds the connection to the emoji's reactor list if absent, removes
    /// it if present. An emptied emoji key is deleted from the map.
    /// Returns the updated reaction map.
    pub fn toggle_reaction(&mut self, emoji: &str, connection_id: &str) -> &Reactions {
        let reactors = self.reactions.entry(emoji.to_string()).or_default();
        if let Some(pos) = reactors.iter().position(|id| id == connection_id) {
            reactors.remove(pos);
        } else {
            reactors.push(connection_id.to_string());
        }
        if self.reactions.get(emoji).is_some_and(Vec::is_empty) {
            self.reactions.remove(emoji);
        }
        &self.reactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_message_creation() {
        let msg = ChatMessage::room("global", "conn-1", "Alice", "hello");
        assert_eq!(msg.room_id.as_deref(), Some("global"));
        assert_eq!(msg.sender_name, "Alice");
        assert!(!msg.private);
        assert!(msg.recipient_id.is_none());
        assert!(msg.reactions.is_empty());
    }

    #[test]
    fn test_private_message_creation() {
        let msg = ChatMessage::private("conn-2", "conn-1", "Alice", "psst");
        assert!(msg.private);
        assert_eq!(msg.recipient_id.as_deref(), Some("conn-2"));
        assert!(msg.room_id.is_none());
    }

    #[test]
    fn test_unique_message_ids() {
        let id1 = generate_message_id();
        let id2 = generate_message_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut msg = ChatMessage::room("global", "conn-1", "Alice", "hi");

        let reactions = msg.toggle_reaction("👍", "conn-2");
        assert_eq!(reactions.get("👍").map(Vec::len), Some(1));

        // Toggling again is an involution: back to the prior (empty) state
        let reactions = msg.toggle_reaction("👍", "conn-2");
        assert!(reactions.is_empty());
    }

    #[test]
    fn test_toggle_never_leaves_empty_key() {
        let mut msg = ChatMessage::room("global", "conn-1", "Alice", "hi");
        msg.toggle_reaction("🎉", "conn-2");
        msg.toggle_reaction("🎉", "conn-3");
        msg.toggle_reaction("🎉", "conn-2");
        assert_eq!(msg.reactions.get("🎉").map(Vec::len), Some(1));

        msg.toggle_reaction("🎉", "conn-3");
        assert!(!msg.reactions.contains_key("🎉"));
    }

    #[test]
    fn test_toggle_tracks_connections_independently() {
        let mut msg = ChatMessage::room("global", "conn-1", "Alice", "hi");
        msg.toggle_reaction("👍", "conn-2");
        msg.toggle_reaction("👍", "conn-3");

        let reactors = msg.reactions.get("👍").unwrap();
        assert_eq!(reactors.as_slice(), ["conn-2", "conn-3"]);
    }
}
