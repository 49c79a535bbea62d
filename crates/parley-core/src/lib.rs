//! # parley-core
//!
//! Session, room, presence, and message-routing state for the Parley
//! realtime chat server.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **PresenceRegistry** - who is online, and under what display name
//! - **RoomDirectory** - named rooms with bounded message history
//! - **TypingTracker** - per-room "currently typing" sets
//! - **Hub** - connection lifecycle, message routing, and fan-out
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Connection │────▶│     Hub     │────▶│    Room     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                        │        │
//!                        ▼        ▼
//!               ┌─────────────┐ ┌─────────────┐
//!               │  Presence   │ │   Typing    │
//!               └─────────────┘ └─────────────┘
//! ```
//!
//! All shared state is owned by the [`Hub`] and mutated under a single
//! lock, one inbound event at a time.

pub mod hub;
pub mod presence;
pub mod room;
pub mod typing;

pub use hub::{EventSender, Hub, HubConfig, HubError};
pub use presence::PresenceRegistry;
pub use room::{Room, RoomDirectory};
pub use typing::TypingTracker;
