//! Connection registry
//!
//! Source of truth for "who is online". Three maps:
//! - connections by id
//! - per-user connection lists, oldest first (the personal channel)
//! - the presence slot: one connection id per online user
//!
//! Lock order is always `users` before `presence`; `connections` is never
//! held while either of them is taken.

use dashmap::DashMap;
use tracing::{debug, warn};

use super::connection::{ConnectionEntry, ConnectionState, OutboundSender};
use super::{ConnectionId, UserId};

/// What a closing connection did to the presence slot of its user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    /// The user went offline.
    Removed,
    /// The slot moved to another live connection of the same user.
    HandedOff(ConnectionId),
    /// The slot belonged to a newer connection and was left alone.
    Unchanged,
}

#[derive(Debug, Default)]
pub struct Registry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    users: DashMap<UserId, Vec<ConnectionId>>,
    presence: DashMap<UserId, ConnectionId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly authenticated connection. Last write wins the presence slot.
    pub fn register(&self, user: UserId, tx: OutboundSender) -> ConnectionId {
        let id = ConnectionId::new();
        let mut entry = ConnectionEntry::new(user.clone(), tx);
        if let Err(e) = entry.authenticate() {
            warn!(conn_id = %id, user = %user, error = %e, "fresh entry failed to authenticate");
        }
        self.connections.insert(id, entry);

        let mut ids = self.users.entry(user.clone()).or_default();
        ids.push(id);
        let devices = ids.len();
        self.presence.insert(user.clone(), id);
        drop(ids);

        debug!(conn_id = %id, user = %user, devices, "connection registered");
        id
    }

    /// Drop a connection. `None` if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> Option<(ConnectionEntry, PresenceChange)> {
        let (_, mut entry) = self.connections.remove(&id)?;
        entry.state = entry
            .state
            .transition(ConnectionState::Closed)
            .unwrap_or(ConnectionState::Closed);

        let change = match self.users.get_mut(&entry.user) {
            Some(mut ids) => {
                ids.retain(|c| *c != id);
                let successor = ids.last().copied();
                let change = self.release_presence(&entry.user, id, successor);
                drop(ids);
                self.users.remove_if(&entry.user, |_, ids| ids.is_empty());
                change
            }
            None => self.release_presence(&entry.user, id, None),
        };

        debug!(conn_id = %id, user = %entry.user, ?change, "connection unregistered");
        Some((entry, change))
    }

    // Compare-and-delete: only the connection that owns the slot may clear it.
    fn release_presence(
        &self,
        user: &UserId,
        id: ConnectionId,
        successor: Option<ConnectionId>,
    ) -> PresenceChange {
        match successor {
            Some(next) => match self.presence.get_mut(user) {
                Some(mut slot) if *slot == id => {
                    *slot = next;
                    PresenceChange::HandedOff(next)
                }
                _ => PresenceChange::Unchanged,
            },
            None => match self.presence.remove_if(user, |_, owner| *owner == id) {
                Some(_) => PresenceChange::Removed,
                None => PresenceChange::Unchanged,
            },
        }
    }

    /// Sorted snapshot of online user ids.
    pub fn online_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.presence.iter().map(|e| e.key().clone()).collect();
        users.sort();
        users
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.presence.contains_key(user)
    }

    pub fn presence_slot(&self, user: &UserId) -> Option<ConnectionId> {
        self.presence.get(user).map(|e| *e.value())
    }

    pub fn user_of(&self, id: ConnectionId) -> Option<UserId> {
        self.connections.get(&id).map(|e| e.user.clone())
    }

    /// Every live connection of a user.
    pub fn connections_of(&self, user: &UserId) -> Vec<ConnectionId> {
        self.users
            .get(user)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    pub fn all_connections(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|e| *e.key()).collect()
    }

    /// Run `f` against a live entry while holding its shard lock.
    pub fn with_entry<R>(&self, id: ConnectionId, f: impl FnOnce(&ConnectionEntry) -> R) -> Option<R> {
        self.connections.get(&id).map(|e| f(e.value()))
    }

    pub fn with_entry_mut<R>(
        &self,
        id: ConnectionId,
        f: impl FnOnce(&mut ConnectionEntry) -> R,
    ) -> Option<R> {
        self.connections.get_mut(&id).map(|mut e| f(e.value_mut()))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
