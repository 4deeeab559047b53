//! Dispatcher handle
//!
//! HTTP handlers hold a `Realtime` and call into it after their write has
//! been committed. Delivery is best-effort: with no hub attached the call is
//! logged and dropped, never surfaced to the caller.

use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::warn;

use crate::error::HubError;
use crate::hub::{Hub, RoomId, SharedHub, UserId};

#[derive(Clone, Default)]
pub struct Realtime {
    hub: Arc<RwLock<Option<SharedHub>>>,
}

impl Realtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, hub: SharedHub) {
        *self.hub.write().unwrap_or_else(PoisonError::into_inner) = Some(hub);
    }

    /// Stop routing events to the hub. Returns the detached hub.
    pub fn detach(&self) -> Option<SharedHub> {
        self.hub.write().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn hub(&self) -> Result<Arc<Hub>, HubError> {
        self.hub
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(HubError::NotInitialized)
    }

    pub fn is_attached(&self) -> bool {
        self.hub().is_ok()
    }

    pub fn emit_to_room<T: Serialize + ?Sized>(&self, room: &RoomId, event: &str, payload: &T) -> usize {
        match self.hub() {
            Ok(hub) => hub.emit_to_room(room, event, payload),
            Err(e) => {
                warn!(room = %room, event, error = %e, "room emit dropped");
                0
            }
        }
    }

    pub fn emit_to_user<T: Serialize + ?Sized>(&self, user: &UserId, event: &str, payload: &T) -> usize {
        match self.hub() {
            Ok(hub) => hub.emit_to_user(user, event, payload),
            Err(e) => {
                warn!(user = %user, event, error = %e, "user emit dropped");
                0
            }
        }
    }

    pub fn broadcast<T: Serialize + ?Sized>(&self, event: &str, payload: &T) -> usize {
        match self.hub() {
            Ok(hub) => hub.broadcast(event, payload),
            Err(e) => {
                warn!(event, error = %e, "broadcast dropped");
                0
            }
        }
    }

    /// Remove a user who lost membership from the room's live subscribers.
    pub fn evict_user_from_room(&self, user: &UserId, room: &RoomId) -> usize {
        match self.hub() {
            Ok(hub) => hub.evict_user_from_room(user, room),
            Err(e) => {
                warn!(user = %user, room = %room, error = %e, "room eviction dropped");
                0
            }
        }
    }
}

impl std::fmt::Debug for Realtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realtime")
            .field("attached", &self.is_attached())
            .finish()
    }
}
