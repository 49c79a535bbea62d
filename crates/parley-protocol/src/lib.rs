//! # parley-protocol
//!
//! Wire protocol definitions for the Parley realtime chat server.
//!
//! This crate defines the events exchanged between chat clients and the
//! server, the chat message model, and the length-prefixed MessagePack
//! codec used to frame them.
//!
//! ## Event Types
//!
//! - `ClientEvent` - identify, room management, messages, typing, reactions
//! - `ServerEvent` - presence/room/typing lists, routed messages, notices
//!
//! ## Example
//!
//! ```rust
//! use parley_protocol::{codec, ClientEvent};
//!
//! let event = ClientEvent::SendMessage {
//!     text: "Hello, world!".into(),
//!     room_id: "global".into(),
//! };
//!
//! // Encode and decode
//! let encoded = codec::encode(&event).unwrap();
//! let decoded: ClientEvent = codec::decode(&encoded).unwrap();
//! ```

pub mod codec;
pub mod events;
pub mod message;

/// Current protocol version, echoed in the `connected` handshake event.
pub const PROTOCOL_VERSION: u8 = 1;

pub use codec::{decode, encode, ProtocolError};
pub use events::{ClientEvent, PresenceEntry, RoomSummary, ServerEvent};
pub use message::{ChatMessage, ConnectionId, MessageId, Reactions, RoomId, ANONYMOUS};
