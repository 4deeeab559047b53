use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::hub::{RoomId, UserId};
use crate::protocol::{
    ChatDeleted, ChatUpdate, RoomDeleted, CHAT_DELETED, CHAT_INFO_UPDATED, CHAT_NEW, CHAT_UPDATE,
    MESSAGE_NEW, PUBLIC_ROOM_UPDATED, ROOM_DELETED,
};
use crate::realtime::Realtime;
use crate::store::ChatStore;

/// Typed fan-out for writes that have already been persisted.
/// Every method returns the number of connections reached; none can fail.
#[derive(Clone)]
pub struct Notifier {
    realtime: Realtime,
    store: Arc<dyn ChatStore>,
}

impl Notifier {
    pub fn new(realtime: Realtime, store: Arc<dyn ChatStore>) -> Self {
        Self { realtime, store }
    }

    /// `message:new` to everyone currently joined to the room.
    pub fn message_created(&self, room: &RoomId, message: &Value) -> usize {
        self.realtime.emit_to_room(room, MESSAGE_NEW, message)
    }

    /// `chat:update` to the personal channel of every member.
    pub async fn chat_updated(&self, chat: &RoomId, last_message: Value) -> usize {
        let members = self.members(chat).await;
        let payload = ChatUpdate {
            chat_id: chat.clone(),
            last_message,
        };
        self.to_users(&members, CHAT_UPDATE, &payload)
    }

    /// `chat:new` to each newly added member.
    pub fn chat_created(&self, summary: &Value, members: &[UserId]) -> usize {
        self.to_users(members, CHAT_NEW, summary)
    }

    pub async fn chat_info_updated(&self, chat: &RoomId, info: &Value) -> usize {
        let members = self.members(chat).await;
        self.to_users(&members, CHAT_INFO_UPDATED, info)
    }

    /// Participants are passed in: once the chat is gone the store can't list them.
    pub fn chat_deleted(&self, chat: &RoomId, participants: &[UserId]) -> usize {
        let payload = ChatDeleted { chat_id: chat.clone() };
        self.to_users(participants, CHAT_DELETED, &payload)
    }

    pub fn room_deleted(&self, room: &RoomId, members: &[UserId]) -> usize {
        let payload = RoomDeleted { room_id: room.clone() };
        self.to_users(members, ROOM_DELETED, &payload)
    }

    /// Public rooms are visible to everyone, so this goes to all clients.
    pub fn public_room_updated(&self, summary: &Value) -> usize {
        self.realtime.broadcast(PUBLIC_ROOM_UPDATED, summary)
    }

    /// Membership was revoked: stop room delivery to the user's live
    /// connections. Returns the number of subscriptions dropped.
    pub fn member_removed(&self, room: &RoomId, user: &UserId) -> usize {
        self.realtime.evict_user_from_room(user, room)
    }

    async fn members(&self, chat: &RoomId) -> Vec<UserId> {
        match self.store.member_ids(chat).await {
            Ok(members) => members,
            Err(e) => {
                warn!(chat = %chat, error = %e, "member lookup failed, skipping fan-out");
                Vec::new()
            }
        }
    }

    fn to_users<T: serde::Serialize + ?Sized>(&self, users: &[UserId], event: &str, payload: &T) -> usize {
        let delivered = users
            .iter()
            .map(|user| self.realtime.emit_to_user(user, event, payload))
            .sum();
        debug!(event, users = users.len(), delivered, "notified users");
        delivered
    }
}
