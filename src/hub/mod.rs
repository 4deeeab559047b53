//! Presence & room fan-out hub
//!
//! Owns every live connection of the process. Connections are registered
//! after authentication, subscribe to rooms through an access-checked join,
//! and receive events fanned out to a room, a user's personal channel, or
//! everyone. Delivery is fire-and-forget: each connection has an unbounded
//! outbound queue drained by its own writer task.

mod connection;
mod ids;
mod membership;
mod registry;
mod rooms;

pub use connection::{ConnectionEntry, ConnectionState, Outbound, OutboundSender};
pub use ids::{ConnectionId, RoomId, UserId};
pub use membership::{MembershipAuthority, DEFAULT_JOIN_TIMEOUT};
pub use registry::{PresenceChange, Registry};
pub use rooms::RoomTable;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::HubError;
use crate::protocol::{self, CLOSE_GOING_AWAY, ONLINE_USERS};

pub struct Hub {
    registry: Registry,
    rooms: RoomTable,
    authority: MembershipAuthority,
    /// Serializes presence snapshots so the last one sent matches the registry.
    presence_guard: Mutex<()>,
}

impl Hub {
    pub fn new(authority: MembershipAuthority) -> Self {
        Self {
            registry: Registry::new(),
            rooms: RoomTable::new(),
            authority,
            presence_guard: Mutex::new(()),
        }
    }

    /* ---------------- lifecycle ---------------- */

    /// Register an authenticated connection and announce the new online set.
    pub fn connect(&self, user: UserId, tx: OutboundSender) -> ConnectionId {
        let conn_id = self.registry.register(user.clone(), tx);
        info!(conn_id = %conn_id, user = %user, "connection authenticated");
        self.broadcast_presence();
        conn_id
    }

    /// Tear down a connection: personal channel, every joined room, presence.
    /// Safe to call more than once.
    pub fn disconnect(&self, conn_id: ConnectionId) {
        let Some((entry, change)) = self.registry.unregister(conn_id) else {
            debug!(conn_id = %conn_id, "disconnect for unknown connection");
            return;
        };

        for room in &entry.rooms {
            self.rooms.remove(room, conn_id);
        }

        info!(
            conn_id = %conn_id,
            user = %entry.user,
            rooms = entry.rooms.len(),
            ?change,
            "connection closed"
        );

        if change == PresenceChange::Removed {
            self.broadcast_presence();
        }
    }

    /// Ask every connection to close. Writers send the close frame and the
    /// reader loops run the normal disconnect path.
    pub fn shutdown(&self) {
        let conns = self.registry.all_connections();
        info!(connections = conns.len(), "hub shutting down");
        for conn_id in conns {
            self.registry.with_entry_mut(conn_id, |entry| {
                if let Ok(next) = entry.state.transition(ConnectionState::Closed) {
                    entry.state = next;
                }
                entry.send(Outbound::Close {
                    code: CLOSE_GOING_AWAY,
                    reason: "server shutting down".to_string(),
                })
            });
        }
    }

    /* ---------------- rooms ---------------- */

    /// Access-checked room subscription. Idempotent for an already joined room.
    pub async fn join(&self, conn_id: ConnectionId, room: RoomId) -> Result<(), HubError> {
        let user = self.registry.user_of(conn_id).ok_or(HubError::NotConnected)?;

        if !self.authority.can_join(&user, &room).await? {
            debug!(conn_id = %conn_id, user = %user, room = %room, "join refused");
            return Err(HubError::NotAuthorized(room));
        }

        // The entry lock is held across both inserts, so a concurrent
        // disconnect either sees the room in `entry.rooms` or we see no entry.
        let fresh = self
            .registry
            .with_entry_mut(conn_id, |entry| {
                entry.rooms.insert(room.clone());
                self.rooms.add(&room, conn_id)
            })
            .ok_or(HubError::NotConnected)?;

        debug!(conn_id = %conn_id, user = %user, room = %room, fresh, "joined room");
        Ok(())
    }

    /// Leaving a room that was never joined is a no-op.
    pub fn leave(&self, conn_id: ConnectionId, room: &RoomId) {
        self.registry
            .with_entry_mut(conn_id, |entry| entry.rooms.remove(room));
        let was_in = self.rooms.remove(room, conn_id);
        debug!(conn_id = %conn_id, room = %room, was_in, "left room");
    }

    /// Drop every connection of `user` from `room`, for when the user lost
    /// membership. Returns how many subscriptions were removed.
    pub fn evict_user_from_room(&self, user: &UserId, room: &RoomId) -> usize {
        let mut evicted = 0;
        for conn_id in self.registry.connections_of(user) {
            // same entry-then-table order as join
            let removed = self
                .registry
                .with_entry_mut(conn_id, |entry| {
                    entry.rooms.remove(room);
                    self.rooms.remove(room, conn_id)
                })
                .unwrap_or(false);
            if removed {
                evicted += 1;
            }
        }
        info!(user = %user, room = %room, evicted, "user evicted from room");
        evicted
    }

    pub fn rooms_of(&self, conn_id: ConnectionId) -> Vec<RoomId> {
        self.registry
            .with_entry(conn_id, |entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_subscriber_count(&self, room: &RoomId) -> usize {
        self.rooms.subscriber_count(room)
    }

    /* ---------------- fan-out ---------------- */

    /// Deliver to every connection joined to `room`, the sender's own included.
    pub fn emit_to_room<T: Serialize + ?Sized>(&self, room: &RoomId, event: &str, payload: &T) -> usize {
        let targets = self.rooms.subscribers(room);
        let delivered = self.fan_out(&targets, event, payload);
        debug!(room = %room, event, targets = targets.len(), delivered, "room emit");
        delivered
    }

    /// Deliver to every live connection of `user`.
    pub fn emit_to_user<T: Serialize + ?Sized>(&self, user: &UserId, event: &str, payload: &T) -> usize {
        let targets = self.registry.connections_of(user);
        let delivered = self.fan_out(&targets, event, payload);
        debug!(user = %user, event, targets = targets.len(), delivered, "user emit");
        delivered
    }

    /// Deliver to every connected client.
    pub fn broadcast<T: Serialize + ?Sized>(&self, event: &str, payload: &T) -> usize {
        let targets = self.registry.all_connections();
        let delivered = self.fan_out(&targets, event, payload);
        debug!(event, targets = targets.len(), delivered, "broadcast");
        delivered
    }

    fn fan_out<T: Serialize + ?Sized>(&self, targets: &[ConnectionId], event: &str, payload: &T) -> usize {
        if targets.is_empty() {
            return 0;
        }
        let frame = match protocol::encode_event(event, payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event, error = %e, "failed to encode event");
                return 0;
            }
        };

        // one failed send never stops the rest
        let mut delivered = 0;
        for conn_id in targets {
            match self
                .registry
                .with_entry(*conn_id, |entry| {
                    entry.state.is_open() && entry.send(Outbound::Frame(frame.clone()))
                })
            {
                Some(true) => delivered += 1,
                Some(false) => debug!(conn_id = %conn_id, event, "connection closing, event dropped"),
                None => debug!(conn_id = %conn_id, event, "connection closed before delivery"),
            }
        }
        delivered
    }

    /* ---------------- presence ---------------- */

    pub fn online_users(&self) -> Vec<UserId> {
        self.registry.online_users()
    }

    pub fn is_online(&self, user: &UserId) -> bool {
        self.registry.is_online(user)
    }

    // Full snapshot, not a delta.
    fn broadcast_presence(&self) {
        let _guard = self
            .presence_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let online = self.registry.online_users();
        let delivered = self.broadcast(ONLINE_USERS, &online);
        debug!(online = online.len(), delivered, "presence snapshot sent");
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("connections", &self.registry.connection_count())
            .field("rooms", &self.rooms.room_count())
            .field("authority", &self.authority)
            .finish()
    }
}

/// Shared handle type used across the crate.
pub type SharedHub = Arc<Hub>;
