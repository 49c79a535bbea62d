//! Presence registry: the live set of identified connections.
//!
//! Source of truth for "who is online." A connection enters the registry
//! when it identifies with a display name and leaves on disconnect.

use parley_protocol::{ConnectionId, PresenceEntry};
use std::collections::HashMap;
use tracing::debug;

/// Maximum display name length.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 64;

/// Validate a display name, returning the trimmed form.
///
/// # Errors
///
/// Returns an error message if the name is invalid.
pub fn validate_display_name(name: &str) -> Result<&str, &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Display name cannot be empty.");
    }
    if trimmed.len() > MAX_DISPLAY_NAME_LENGTH {
        return Err("Display name too long.");
    }
    Ok(trimmed)
}

/// State for a single identified connection.
#[derive(Debug)]
struct Member {
    display_name: String,
    /// Join sequence number, for deterministic snapshot ordering.
    joined_seq: u64,
}

/// Registry of identified connections and their display names.
///
/// Display names are not unique: two connections may share a name.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    members: HashMap<ConnectionId, Member>,
    next_seq: u64,
}

impl PresenceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of identified connections.
    #[must_use]
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Check if a connection has identified.
    #[must_use]
    pub fn is_present(&self, connection_id: &str) -> bool {
        self.members.contains_key(connection_id)
    }

    /// Look up a connection's display name.
    #[must_use]
    pub fn display_name(&self, connection_id: &str) -> Option<&str> {
        self.members
            .get(connection_id)
            .map(|m| m.display_name.as_str())
    }

    /// Register a connection under a display name.
    ///
    /// Re-joining overwrites the display name silently and keeps the
    /// original join order. Returns `true` if this is a new member.
    pub fn join(&mut self, connection_id: impl Into<ConnectionId>, display_name: impl Into<String>) -> bool {
        let connection_id = connection_id.into();
        let display_name = display_name.into();

        if let Some(member) = self.members.get_mut(&connection_id) {
            member.display_name = display_name;
            return false;
        }

        let joined_seq = self.next_seq;
        self.next_seq += 1;
        debug!(connection = %connection_id, name = %display_name, "Presence: member joined");
        self.members.insert(
            connection_id,
            Member {
                display_name,
                joined_seq,
            },
        );
        true
    }

    /// Remove a connection from the registry.
    ///
    /// Returns the removed display name, if any.
    pub fn remove(&mut self, connection_id: &str) -> Option<String> {
        let member = self.members.remove(connection_id);
        if member.is_some() {
            debug!(connection = %connection_id, "Presence: member left");
        }
        member.map(|m| m.display_name)
    }

    /// Get the full presence list, ordered by join sequence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PresenceEntry> {
        let mut members: Vec<_> = self.members.iter().collect();
        members.sort_by_key(|(_, m)| m.joined_seq);
        members
            .into_iter()
            .map(|(connection_id, m)| PresenceEntry {
                connection_id: connection_id.clone(),
                display_name: m.display_name.clone(),
            })
            .collect()
    }

    /// Check if nobody has identified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
