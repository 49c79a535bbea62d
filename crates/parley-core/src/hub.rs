//! The hub: connection lifecycle, message routing, and fan-out.
//!
//! The hub owns every piece of shared chat state. Each inbound event is
//! handled to completion under a single state lock, so no two mutations
//! interleave and cross-component transitions (disconnect touching
//! presence, typing, and room subscriptions) stay atomic. Delivery is
//! fire-and-forget through per-connection unbounded queues; a slow or
//! vanished subscriber never blocks the sender's path.

use crate::presence::{validate_display_name, PresenceRegistry};
use crate::room::{RoomDirectory, DEFAULT_HISTORY_CAPACITY, DEFAULT_ROOM_ID};
use crate::typing::TypingTracker;
use dashmap::DashMap;
use parley_protocol::{
    ChatMessage, ConnectionId, MessageId, PresenceEntry, RoomId, RoomSummary, ServerEvent,
    ANONYMOUS, PROTOCOL_VERSION,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Validation failures surfaced to the originating connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HubError {
    /// Empty or invalid name.
    #[error("{0}")]
    EmptyName(&'static str),

    /// Room name collides case-insensitively with an existing room.
    #[error("Room name already exists.")]
    DuplicateName,

    /// Blank message body.
    #[error("Cannot send an empty message.")]
    EmptyMessage,
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-room history capacity.
    pub history_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Outbound delivery handle for one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Mutable chat state, guarded by a single lock.
struct HubState {
    presence: PresenceRegistry,
    rooms: RoomDirectory,
    typing: TypingTracker,
    /// Current room per connection. At most one; absent until identify
    /// or an explicit join.
    membership: HashMap<ConnectionId, RoomId>,
}

/// The central chat hub.
///
/// Orchestrates the presence registry, room directory, and typing
/// tracker, and fans events out to the right subscriber set.
pub struct Hub {
    state: Mutex<HubState>,
    /// Outbound queues indexed by connection.
    connections: DashMap<ConnectionId, EventSender>,
}

impl Hub {
    /// Create a new hub with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration.
    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        info!("Creating hub with config: {:?}", config);
        Self {
            state: Mutex::new(HubState {
                presence: PresenceRegistry::new(),
                rooms: RoomDirectory::with_capacity(config.history_capacity),
                typing: TypingTracker::new(),
                membership: HashMap::new(),
            }),
            connections: DashMap::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.state().rooms.room_count()
    }

    /// Room list snapshot, creation order, default room first.
    #[must_use]
    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        self.state().rooms.list()
    }

    /// Presence snapshot, ordered by join sequence.
    #[must_use]
    pub fn presence_snapshot(&self) -> Vec<PresenceEntry> {
        self.state().presence.snapshot()
    }

    // -- delivery ---------------------------------------------------------

    fn send_to(&self, connection_id: &str, event: ServerEvent) {
        if let Some(tx) = self.connections.get(connection_id) {
            // A closed queue means the peer is mid-disconnect; drop the event
            let _ = tx.send(event);
        }
    }

    fn broadcast_all(&self, event: &ServerEvent) {
        for entry in self.connections.iter() {
            let _ = entry.value().send(event.clone());
        }
    }

    fn broadcast_room(&self, state: &HubState, room_id: &str, event: &ServerEvent) {
        let Some(room) = state.rooms.get(room_id) else {
            return;
        };
        for connection_id in room.subscribers() {
            if let Some(tx) = self.connections.get(connection_id) {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Move a connection's single room subscription.
    ///
    /// The target room must exist; callers check first.
    fn switch_room(state: &mut HubState, connection_id: &str, room_id: &str) {
        if let Some(previous) = state
            .membership
            .insert(connection_id.to_string(), room_id.to_string())
        {
            if previous != room_id {
                if let Some(room) = state.rooms.get_mut(&previous) {
                    room.unsubscribe(connection_id);
                }
            }
        }
        if let Some(room) = state.rooms.get_mut(room_id) {
            room.subscribe(connection_id);
        }
    }

    // -- lifecycle --------------------------------------------------------

    /// Register a connection's outbound queue and confirm the session.
    pub fn connect(&self, connection_id: impl Into<ConnectionId>, sender: EventSender) {
        let connection_id = connection_id.into();
        debug!(connection = %connection_id, "Connection registered");
        self.connections.insert(connection_id.clone(), sender);
        self.send_to(
            &connection_id,
            ServerEvent::connected(connection_id.clone(), PROTOCOL_VERSION),
        );
    }

    /// Attach a display name to a connection and enter the default room.
    ///
    /// The caller alone receives the room list and a join confirmation;
    /// everyone is then told about the newcomer and the updated presence.
    /// Re-identifying overwrites the display name silently.
    ///
    /// # Errors
    ///
    /// Returns `EmptyName` if the display name is blank after trimming.
    pub fn identify(&self, connection_id: &str, display_name: &str) -> Result<(), HubError> {
        let name = validate_display_name(display_name)
            .map_err(HubError::EmptyName)?
            .to_string();

        let mut state = self.state();
        state.presence.join(connection_id, name.clone());
        Self::switch_room(&mut state, connection_id, DEFAULT_ROOM_ID);

        self.send_to(
            connection_id,
            ServerEvent::RoomList {
                rooms: state.rooms.list(),
            },
        );
        if let Some(room) = state.rooms.get(DEFAULT_ROOM_ID) {
            self.send_to(
                connection_id,
                ServerEvent::JoinedRoom {
                    room_id: room.id().to_string(),
                    name: room.name().to_string(),
                },
            );
        }

        self.broadcast_all(&ServerEvent::PeerJoined {
            connection_id: connection_id.to_string(),
            display_name: name.clone(),
        });
        self.broadcast_all(&ServerEvent::PresenceList {
            users: state.presence.snapshot(),
        });

        info!(connection = %connection_id, name = %name, "Identified");
        Ok(())
    }

    /// Create a room and announce the updated room list to everyone.
    ///
    /// # Errors
    ///
    /// Returns `EmptyName` for a blank name and `DuplicateName` for a
    /// case-insensitive collision.
    pub fn create_room(&self, connection_id: &str, name: &str) -> Result<RoomId, HubError> {
        let mut state = self.state();
        let room_id = state.rooms.create(name)?;

        self.broadcast_all(&ServerEvent::RoomList {
            rooms: state.rooms.list(),
        });

        debug!(connection = %connection_id, room = %room_id, "Room created");
        Ok(room_id)
    }

    /// Move a connection into an existing room.
    ///
    /// An unknown room is a silent no-op: the lookup short-circuits
    /// before any subscription change. On success the caller alone
    /// receives a join confirmation and the room's recent history.
    pub fn join_room(&self, connection_id: &str, room_id: &str) {
        let mut state = self.state();
        let Some(room) = state.rooms.get(room_id) else {
            debug!(connection = %connection_id, room = %room_id, "Join to unknown room dropped");
            return;
        };
        let room_id = room.id().to_string();
        let name = room.name().to_string();

        Self::switch_room(&mut state, connection_id, &room_id);

        let messages = state
            .rooms
            .get(&room_id)
            .map(|r| r.recent(DEFAULT_HISTORY_CAPACITY))
            .unwrap_or_default();

        self.send_to(
            connection_id,
            ServerEvent::JoinedRoom {
                room_id: room_id.clone(),
                name,
            },
        );
        self.send_to(connection_id, ServerEvent::RoomBackfill { messages });
    }

    /// Tear down a connection across every component.
    ///
    /// This is the only transition that touches multiple rooms' typing
    /// state at once. Unconditional: after it returns, no state for the
    /// connection survives.
    pub fn disconnect(&self, connection_id: &str) {
        self.connections.remove(connection_id);

        let mut state = self.state();
        let removed_name = state.presence.remove(connection_id);
        if let Some(room_id) = state.membership.remove(connection_id) {
            if let Some(room) = state.rooms.get_mut(&room_id) {
                room.unsubscribe(connection_id);
            }
        }
        let touched_rooms = state.typing.remove_connection(connection_id);

        if let Some(display_name) = removed_name {
            info!(connection = %connection_id, name = %display_name, "Disconnected");
            self.broadcast_all(&ServerEvent::PeerLeft {
                connection_id: connection_id.to_string(),
                display_name,
            });
        } else {
            debug!(connection = %connection_id, "Unidentified connection closed");
        }

        self.broadcast_all(&ServerEvent::PresenceList {
            users: state.presence.snapshot(),
        });
        for room_id in touched_rooms {
            let names = state.typing.names(&room_id);
            self.broadcast_room(
                &state,
                &room_id,
                &ServerEvent::TypingList {
                    room_id: room_id.clone(),
                    names,
                },
            );
        }
    }

    // -- routing ----------------------------------------------------------

    /// Route a message to a room and fan it out to every subscriber,
    /// including the sender.
    ///
    /// The sender's display name comes from the presence registry, with
    /// an "Anonymous" fallback so an unidentified connection cannot crash
    /// the router. A message to an unknown room is dropped silently.
    ///
    /// # Errors
    ///
    /// Returns `EmptyMessage` if the text is blank after trimming.
    pub fn send_message(&self, connection_id: &str, room_id: &str, text: &str) -> Result<(), HubError> {
        if text.trim().is_empty() {
            return Err(HubError::EmptyMessage);
        }

        let mut state = self.state();
        if !state.rooms.contains(room_id) {
            warn!(connection = %connection_id, room = %room_id, "Message to unknown room dropped");
            return Ok(());
        }

        let sender_name = state
            .presence
            .display_name(connection_id)
            .unwrap_or(ANONYMOUS)
            .to_string();
        let message = ChatMessage::room(room_id, connection_id, sender_name, text);
        let event = ServerEvent::message(message.clone());

        if let Some(room) = state.rooms.get_mut(room_id) {
            room.append(message);
        }
        self.broadcast_room(&state, room_id, &event);
        Ok(())
    }

    /// Relay a private message to a single peer.
    ///
    /// Delivered to exactly the recipient and back to the sender; never
    /// stored. No existence check on the recipient: delivery to a
    /// vanished peer is a transport-level no-op.
    ///
    /// # Errors
    ///
    /// Returns `EmptyMessage` if the text is blank after trimming.
    pub fn send_private(
        &self,
        connection_id: &str,
        recipient_id: &str,
        text: &str,
    ) -> Result<(), HubError> {
        if text.trim().is_empty() {
            return Err(HubError::EmptyMessage);
        }

        let sender_name = self
            .state()
            .presence
            .display_name(connection_id)
            .unwrap_or(ANONYMOUS)
            .to_string();
        let message = ChatMessage::private(recipient_id, connection_id, sender_name, text);
        let event = ServerEvent::message(message);

        self.send_to(recipient_id, event.clone());
        self.send_to(connection_id, event);
        Ok(())
    }

    /// Toggle an emoji reaction on a stored message and broadcast the
    /// updated reaction map to the room.
    ///
    /// Unknown room or message is a silent no-op: evicted and
    /// never-existed are indistinguishable to the caller.
    pub fn toggle_reaction(
        &self,
        connection_id: &str,
        message_id: MessageId,
        emoji: &str,
        room_id: &str,
    ) {
        let mut state = self.state();
        let Some(room) = state.rooms.get_mut(room_id) else {
            return;
        };
        let Some(message) = room.message_mut(message_id) else {
            debug!(room = %room_id, message = message_id, "Reaction on unknown message dropped");
            return;
        };

        let reactions = message.toggle_reaction(emoji, connection_id).clone();
        self.broadcast_room(
            &state,
            room_id,
            &ServerEvent::ReactionsUpdated {
                message_id,
                reactions,
            },
        );
    }

    /// Surface a validation failure to the originating connection only.
    pub fn notify_error(&self, connection_id: &str, error: &HubError) {
        self.send_to(connection_id, ServerEvent::error_notice(error.to_string()));
    }

    /// Record a typing signal and broadcast the room's typing list.
    ///
    /// Signals from unidentified connections are ignored; every accepted
    /// signal broadcasts, even when the set did not change.
    pub fn set_typing(&self, connection_id: &str, room_id: &str, is_typing: bool) {
        let mut state = self.state();
        let Some(display_name) = state
            .presence
            .display_name(connection_id)
            .map(str::to_string)
        else {
            return;
        };

        state
            .typing
            .set(room_id, connection_id, &display_name, is_typing);
        let names = state.typing.names(room_id);
        self.broadcast_room(
            &state,
            room_id,
            &ServerEvent::TypingList {
                room_id: room_id.to_string(),
                names,
            },
        );
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connect(hub: &Hub, id: &str) -> UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.connect(id, tx);
        rx
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn history(hub: &Hub, room_id: &str) -> Vec<ChatMessage> {
        hub.state()
            .rooms
            .get(room_id)
            .map(|r| r.recent(DEFAULT_HISTORY_CAPACITY))
            .unwrap_or_default()
    }

    #[test]
    fn test_connect_sends_handshake() {
        let hub = Hub::new();
        let mut rx = connect(&hub, "conn-1");

        let events = drain(&mut rx);
        assert!(matches!(
            &events[..],
            [ServerEvent::Connected { connection_id, version }]
                if connection_id == "conn-1" && *version == PROTOCOL_VERSION
        ));
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn test_identify_confirms_and_broadcasts() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        let mut b = connect(&hub, "conn-b");
        drain(&mut a);
        drain(&mut b);

        hub.identify("conn-a", "Alice").unwrap();

        let to_a = drain(&mut a);
        // Direct: room list + join confirmation, then the broadcasts
        assert!(matches!(
            &to_a[0],
            ServerEvent::RoomList { rooms } if rooms.len() == 1 && rooms[0].id == "global"
        ));
        assert!(matches!(
            &to_a[1],
            ServerEvent::JoinedRoom { room_id, name } if room_id == "global" && name == "Global"
        ));

        // An unidentified bystander still sees the broadcasts
        let to_b = drain(&mut b);
        assert!(to_b.iter().any(|e| matches!(
            e,
            ServerEvent::PeerJoined { display_name, .. } if display_name == "Alice"
        )));
        assert!(to_b.iter().any(|e| matches!(
            e,
            ServerEvent::PresenceList { users }
                if users.len() == 1 && users[0].display_name == "Alice"
        )));
    }

    #[test]
    fn test_identify_rejects_blank_name() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        drain(&mut a);

        assert!(matches!(
            hub.identify("conn-a", "   "),
            Err(HubError::EmptyName(_))
        ));
        assert!(drain(&mut a).is_empty());
        assert!(hub.presence_snapshot().is_empty());
    }

    #[test]
    fn test_reidentify_overwrites_name() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        hub.identify("conn-a", "Alicia").unwrap();
        drain(&mut a);

        let users = hub.presence_snapshot();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].display_name, "Alicia");
    }

    #[test]
    fn test_create_room_broadcasts_list() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        let mut b = connect(&hub, "conn-b");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);
        drain(&mut b);

        let dev = hub.create_room("conn-a", "Dev").unwrap();

        for rx in [&mut a, &mut b] {
            let events = drain(rx);
            assert!(events.iter().any(|e| matches!(
                e,
                ServerEvent::RoomList { rooms }
                    if rooms.len() == 2 && rooms[0].id == "global" && rooms[1].id == dev
            )));
        }
    }

    #[test]
    fn test_create_room_duplicate_case_insensitive() {
        let hub = Hub::new();
        hub.create_room("conn-a", "Lobby").unwrap();

        assert_eq!(
            hub.create_room("conn-a", "lobby"),
            Err(HubError::DuplicateName)
        );
    }

    #[test]
    fn test_join_unknown_room_is_silent() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);

        hub.join_room("conn-a", "room_404");

        assert!(drain(&mut a).is_empty());
        // Still subscribed to the previous room
        assert!(hub
            .state()
            .rooms
            .get("global")
            .unwrap()
            .is_subscribed("conn-a"));
    }

    #[test]
    fn test_join_room_moves_subscription_and_backfills() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        let mut b = connect(&hub, "conn-b");
        hub.identify("conn-a", "Alice").unwrap();
        hub.identify("conn-b", "Bob").unwrap();

        let dev = hub.create_room("conn-a", "Dev").unwrap();
        hub.send_message("conn-a", "global", "before the move").unwrap();
        drain(&mut a);
        drain(&mut b);

        hub.join_room("conn-b", &dev);

        let to_b = drain(&mut b);
        assert!(matches!(
            &to_b[0],
            ServerEvent::JoinedRoom { room_id, name } if *room_id == dev && name == "Dev"
        ));
        assert!(matches!(
            &to_b[1],
            ServerEvent::RoomBackfill { messages } if messages.is_empty()
        ));

        // Bob left global: a message there no longer reaches him
        hub.send_message("conn-a", "global", "anyone?").unwrap();
        assert!(drain(&mut b).is_empty());
        assert!(!drain(&mut a).is_empty());
    }

    #[test]
    fn test_backfill_carries_recent_history() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        let mut b = connect(&hub, "conn-b");
        hub.identify("conn-a", "Alice").unwrap();
        hub.send_message("conn-a", "global", "hello").unwrap();
        drain(&mut a);

        hub.identify("conn-b", "Bob").unwrap();
        drain(&mut b);
        hub.join_room("conn-b", "global");

        let to_b = drain(&mut b);
        assert!(to_b.iter().any(|e| matches!(
            e,
            ServerEvent::RoomBackfill { messages }
                if messages.len() == 1 && messages[0].body == "hello"
        )));
    }

    #[test]
    fn test_send_message_reaches_room_subscribers() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        let mut b = connect(&hub, "conn-b");
        hub.identify("conn-a", "Alice").unwrap();
        hub.identify("conn-b", "Bob").unwrap();
        drain(&mut a);
        drain(&mut b);

        hub.send_message("conn-a", "global", "hello").unwrap();

        // Both subscribers receive it, including the sender
        for rx in [&mut a, &mut b] {
            let events = drain(rx);
            assert!(events.iter().any(|e| matches!(
                e,
                ServerEvent::Message { message }
                    if message.body == "hello"
                        && message.sender_name == "Alice"
                        && message.room_id.as_deref() == Some("global")
            )));
        }

        let stored = history(&hub, "global");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].body, "hello");
    }

    #[test]
    fn test_blank_message_rejected_without_side_effects() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);

        let error = hub.send_message("conn-a", "global", "   ").unwrap_err();
        assert_eq!(error, HubError::EmptyMessage);
        assert!(drain(&mut a).is_empty());
        assert!(history(&hub, "global").is_empty());

        // The notice goes to the originator alone
        hub.notify_error("conn-a", &error);
        let events = drain(&mut a);
        assert!(matches!(
            &events[..],
            [ServerEvent::ErrorNotice { message }] if message == "Cannot send an empty message."
        ));
    }

    #[test]
    fn test_message_to_unknown_room_dropped() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);

        hub.send_message("conn-a", "room_404", "void").unwrap();

        assert!(drain(&mut a).is_empty());
    }

    #[test]
    fn test_unidentified_sender_falls_back_to_anonymous() {
        let hub = Hub::new();
        let _ghost = connect(&hub, "conn-ghost");
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);

        hub.send_message("conn-ghost", "global", "boo").unwrap();

        let events = drain(&mut a);
        assert!(events.iter().any(|e| matches!(
            e,
            ServerEvent::Message { message } if message.sender_name == ANONYMOUS
        )));
    }

    #[test]
    fn test_private_message_reaches_exactly_both_parties() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        let mut b = connect(&hub, "conn-b");
        let mut c = connect(&hub, "conn-c");
        hub.identify("conn-a", "Alice").unwrap();
        hub.identify("conn-b", "Bob").unwrap();
        hub.identify("conn-c", "Carol").unwrap();
        drain(&mut a);
        drain(&mut b);
        drain(&mut c);

        hub.send_private("conn-a", "conn-b", "psst").unwrap();

        for rx in [&mut a, &mut b] {
            let events = drain(rx);
            assert!(events.iter().any(|e| matches!(
                e,
                ServerEvent::Message { message }
                    if message.private
                        && message.body == "psst"
                        && message.recipient_id.as_deref() == Some("conn-b")
            )));
        }
        assert!(drain(&mut c).is_empty());

        // Never stored anywhere
        assert!(history(&hub, "global").is_empty());
    }

    #[test]
    fn test_private_message_to_vanished_peer_is_noop() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);

        hub.send_private("conn-a", "conn-gone", "anyone?").unwrap();

        // Sender still gets its own copy
        let events = drain(&mut a);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_reaction_toggle_roundtrip() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();

        let dev = hub.create_room("conn-a", "Dev").unwrap();
        hub.join_room("conn-a", &dev);
        hub.send_message("conn-a", &dev, "hello").unwrap();
        let message_id = history(&hub, &dev)[0].id;
        drain(&mut a);

        hub.toggle_reaction("conn-a", message_id, "👍", &dev);
        let events = drain(&mut a);
        assert!(events.iter().any(|e| matches!(
            e,
            ServerEvent::ReactionsUpdated { reactions, .. }
                if reactions.get("👍").map(Vec::as_slice) == Some(&["conn-a".to_string()][..])
        )));

        hub.toggle_reaction("conn-a", message_id, "👍", &dev);
        let events = drain(&mut a);
        assert!(events.iter().any(|e| matches!(
            e,
            ServerEvent::ReactionsUpdated { reactions, .. } if reactions.is_empty()
        )));
    }

    #[test]
    fn test_reaction_on_unknown_target_is_silent() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);

        hub.toggle_reaction("conn-a", 42, "👍", "room_404");
        hub.toggle_reaction("conn-a", 42, "👍", "global");

        assert!(drain(&mut a).is_empty());
    }

    #[test]
    fn test_history_bounded_at_capacity() {
        let hub = Hub::with_config(HubConfig {
            history_capacity: 100,
        });
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);

        for i in 0..105 {
            hub.send_message("conn-a", "global", &format!("msg {i}")).unwrap();
        }

        let stored = history(&hub, "global");
        assert_eq!(stored.len(), 100);
        assert_eq!(stored.first().unwrap().body, "msg 5");
        assert_eq!(stored.last().unwrap().body, "msg 104");
    }

    #[test]
    fn test_typing_broadcasts_to_room() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        let mut b = connect(&hub, "conn-b");
        hub.identify("conn-a", "Alice").unwrap();
        hub.identify("conn-b", "Bob").unwrap();
        drain(&mut a);
        drain(&mut b);

        hub.set_typing("conn-a", "global", true);
        let to_b = drain(&mut b);
        assert!(to_b.iter().any(|e| matches!(
            e,
            ServerEvent::TypingList { room_id, names }
                if room_id == "global" && names == &["Alice".to_string()]
        )));

        hub.set_typing("conn-a", "global", false);
        let to_b = drain(&mut b);
        assert!(to_b.iter().any(|e| matches!(
            e,
            ServerEvent::TypingList { names, .. } if names.is_empty()
        )));
    }

    #[test]
    fn test_typing_from_unidentified_connection_ignored() {
        let hub = Hub::new();
        let _ghost = connect(&hub, "conn-ghost");
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);

        hub.set_typing("conn-ghost", "global", true);

        assert!(drain(&mut a).is_empty());
    }

    #[test]
    fn test_disconnect_cascades_cleanup() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        let mut b = connect(&hub, "conn-b");
        hub.identify("conn-a", "Alice").unwrap();
        hub.identify("conn-b", "Bob").unwrap();

        // Alice is typing in global when she vanishes, no stop signal
        hub.set_typing("conn-a", "global", true);
        drain(&mut a);
        drain(&mut b);

        hub.disconnect("conn-a");

        let to_b = drain(&mut b);
        assert!(to_b.iter().any(|e| matches!(
            e,
            ServerEvent::PeerLeft { display_name, .. } if display_name == "Alice"
        )));
        assert!(to_b.iter().any(|e| matches!(
            e,
            ServerEvent::PresenceList { users }
                if users.len() == 1 && users[0].display_name == "Bob"
        )));
        assert!(to_b.iter().any(|e| matches!(
            e,
            ServerEvent::TypingList { room_id, names }
                if room_id == "global" && names.is_empty()
        )));

        assert_eq!(hub.connection_count(), 1);
        assert!(!hub
            .state()
            .rooms
            .get("global")
            .unwrap()
            .is_subscribed("conn-a"));
    }

    #[test]
    fn test_disconnect_unidentified_skips_peer_left() {
        let hub = Hub::new();
        let ghost = connect(&hub, "conn-ghost");
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();
        drain(&mut a);
        drop(ghost);

        hub.disconnect("conn-ghost");

        let to_a = drain(&mut a);
        assert!(!to_a
            .iter()
            .any(|e| matches!(e, ServerEvent::PeerLeft { .. })));
        // Presence is still rebroadcast
        assert!(to_a
            .iter()
            .any(|e| matches!(e, ServerEvent::PresenceList { .. })));
    }

    #[test]
    fn test_room_scenario_end_to_end() {
        let hub = Hub::new();
        let mut a = connect(&hub, "conn-a");
        hub.identify("conn-a", "Alice").unwrap();

        let dev = hub.create_room("conn-a", "Dev").unwrap();
        let listed: Vec<_> = hub.room_summaries().into_iter().map(|r| r.name).collect();
        assert_eq!(listed, ["Global", "Dev"]);

        hub.join_room("conn-a", &dev);
        hub.send_message("conn-a", &dev, "hello").unwrap();

        let stored = history(&hub, &dev);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].body, "hello");
        assert_eq!(stored[0].room_id.as_deref(), Some(dev.as_str()));
        drain(&mut a);

        hub.toggle_reaction("conn-a", stored[0].id, "👍", &dev);
        let reactions = history(&hub, &dev)[0].reactions.clone();
        assert_eq!(
            reactions.get("👍").map(Vec::as_slice),
            Some(&["conn-a".to_string()][..])
        );

        hub.toggle_reaction("conn-a", stored[0].id, "👍", &dev);
        assert!(history(&hub, &dev)[0].reactions.is_empty());
    }
}
