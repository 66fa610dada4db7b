//! In-memory index of live connections per authenticated user.
//!
//! The registry is local to one process and starts empty. In a deployment
//! with several API instances each instance only knows its own sockets, so
//! exclusions computed from it are only correct for that instance.

use std::collections::HashSet;

use bloch_core::types::UserId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Concurrent `user -> {connection}` and `connection -> user` maps.
///
/// All methods take `&self`; share it as `Arc<ConnectionRegistry>`.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_user: DashMap<UserId, HashSet<String>>,
    by_connection: DashMap<String, UserId>,
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `connection_id` belongs to `user_id`.
    ///
    /// Blank arguments are ignored. Adding the same pair twice is a no-op. A
    /// connection re-added under another user moves to that user.
    pub fn add(&self, user_id: &str, connection_id: &str) {
        if is_blank(user_id) || is_blank(connection_id) {
            return;
        }

        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id.to_string());

        let previous = self
            .by_connection
            .insert(connection_id.to_string(), user_id.to_string());
        if let Some(previous) = previous {
            if previous != user_id {
                self.detach(&previous, connection_id);
            }
        }
    }

    /// Forget a connection. Unknown or blank ids are ignored.
    ///
    /// The owning user's entry disappears with its last connection.
    pub fn remove_connection(&self, connection_id: &str) {
        if is_blank(connection_id) {
            return;
        }
        if let Some((_, user_id)) = self.by_connection.remove(connection_id) {
            self.detach(&user_id, connection_id);
        }
    }

    /// Live connection ids of one user, in no particular order.
    pub fn connections_for_user(&self, user_id: &str) -> Vec<String> {
        if is_blank(user_id) {
            return Vec::new();
        }
        self.by_user
            .get(user_id)
            .map(|connections| connections.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn user_for_connection(&self, connection_id: &str) -> Option<UserId> {
        self.by_connection
            .get(connection_id)
            .map(|user| user.value().clone())
    }

    /// Number of users with at least one live connection.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    pub fn connection_count(&self) -> usize {
        self.by_connection.len()
    }

    fn detach(&self, user_id: &str, connection_id: &str) {
        if let Entry::Occupied(mut entry) = self.by_user.entry(user_id.to_string()) {
            entry.get_mut().remove(connection_id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
