//! Event types exchanged between chat clients and the server.
//!
//! Events are the fundamental unit of communication. Each event is
//! serialized as a MessagePack map with a `type` discriminant.

use crate::message::{ChatMessage, ConnectionId, MessageId, Reactions, RoomId};
use serde::{Deserialize, Serialize};

/// One entry in the presence list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// Connection ID.
    pub connection_id: ConnectionId,
    /// Display name chosen at identify time.
    pub display_name: String,
}

/// One entry in the room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    /// Room ID.
    pub id: RoomId,
    /// Human-readable room name.
    pub name: String,
}

/// An event sent by a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Choose a display name and enter the default room.
    Identify {
        /// Display name, non-empty after trimming.
        display_name: String,
    },

    /// Create a new named room.
    CreateRoom {
        /// Room name, unique case-insensitively.
        name: String,
    },

    /// Move this connection into an existing room.
    JoinRoom {
        /// Target room ID.
        room_id: RoomId,
    },

    /// Send a message to a room.
    SendMessage {
        /// Message body.
        text: String,
        /// Target room ID.
        room_id: RoomId,
    },

    /// Send a private message to a single peer connection.
    SendPrivateMessage {
        /// Recipient connection ID.
        recipient_id: ConnectionId,
        /// Message body.
        text: String,
    },

    /// Signal typing state in a room.
    SetTyping {
        /// Target room ID.
        room_id: RoomId,
        /// Whether this connection is currently typing.
        is_typing: bool,
    },

    /// Toggle an emoji reaction on a stored message.
    ToggleReaction {
        /// Target message ID.
        message_id: MessageId,
        /// Emoji symbol.
        emoji: String,
        /// Room that holds the message.
        room_id: RoomId,
    },
}

/// An event sent by the server to one or more clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Connection accepted; carries the assigned connection ID.
    Connected {
        /// Unique connection identifier.
        connection_id: ConnectionId,
        /// Protocol version spoken by the server.
        version: u8,
    },

    /// Full presence list, ordered by join sequence.
    PresenceList {
        /// Identified connections.
        users: Vec<PresenceEntry>,
    },

    /// Full room list in creation order, default room first.
    RoomList {
        /// Known rooms.
        rooms: Vec<RoomSummary>,
    },

    /// Confirmation that this connection entered a room.
    JoinedRoom {
        /// Room ID.
        room_id: RoomId,
        /// Room name.
        name: String,
    },

    /// Recent history of a just-joined room, most-recent-last.
    RoomBackfill {
        /// Stored messages, oldest first.
        messages: Vec<ChatMessage>,
    },

    /// A routed chat message, public or private.
    Message {
        /// The message.
        message: ChatMessage,
    },

    /// Updated reaction state for a stored message.
    ReactionsUpdated {
        /// Target message ID.
        message_id: MessageId,
        /// Full reaction map after the toggle.
        reactions: Reactions,
    },

    /// Current typing indicator list for a room.
    TypingList {
        /// Room ID.
        room_id: RoomId,
        /// Display names of connections currently typing.
        names: Vec<String>,
    },

    /// A peer identified and entered the chat.
    PeerJoined {
        /// Connection ID.
        connection_id: ConnectionId,
        /// Display name.
        display_name: String,
    },

    /// An identified peer disconnected.
    PeerLeft {
        /// Connection ID.
        connection_id: ConnectionId,
        /// Display name.
        display_name: String,
    },

    /// A validation failure surfaced to the originating connection.
    ErrorNotice {
        /// Human-readable error message.
        message: String,
    },
}

impl ServerEvent {
    /// Create a Connected event.
    #[must_use]
    pub fn connected(connection_id: impl Into<ConnectionId>, version: u8) -> Self {
        ServerEvent::Connected {
            connection_id: connection_id.into(),
            version,
        }
    }

    /// Create an ErrorNotice event.
    #[must_use]
    pub fn error_notice(message: impl Into<String>) -> Self {
        ServerEvent::ErrorNotice {
            message: message.into(),
        }
    }

    /// Create a Message event.
    #[must_use]
    pub fn message(message: ChatMessage) -> Self {
        ServerEvent::Message { message }
    }
}
