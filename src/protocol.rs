//! Wire protocol
//!
//! JSON text frames over a WebSocket.
//!
//! ```text
//! server event   {"event": "message:new", "data": {...}}
//! ack            {"ack": 7}  |  {"ack": 7, "error": "not a member of room r1"}
//! client frame   {"event": "chat:join", "data": "r1", "ack": 7}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hub::RoomId;

/* ---------- client -> server ---------- */
pub const CHAT_JOIN: &str = "chat:join";
pub const CHAT_LEAVE: &str = "chat:leave";

/* ---------- server -> client ---------- */
pub const CONNECT_ERROR: &str = "connect_error";
pub const ONLINE_USERS: &str = "online:users";
pub const MESSAGE_NEW: &str = "message:new";
pub const CHAT_UPDATE: &str = "chat:update";
pub const CHAT_NEW: &str = "chat:new";
pub const CHAT_INFO_UPDATED: &str = "chat:info-updated";
pub const CHAT_DELETED: &str = "chat:deleted";
pub const ROOM_DELETED: &str = "public-room:deleted";
pub const PUBLIC_ROOM_UPDATED: &str = "public-room:updated";

/// Close code sent after a rejected handshake.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;
/// Close code sent to every client on server shutdown.
pub const CLOSE_GOING_AWAY: u16 = 1001;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid room id")]
    InvalidRoom,
}

#[derive(Serialize)]
struct EventFrame<'a, T: ?Sized> {
    event: &'a str,
    data: &'a T,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AckFrame {
    pub ack: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Encode once, share the text between every recipient.
pub fn encode_event<T: Serialize + ?Sized>(event: &str, data: &T) -> Result<Arc<str>, serde_json::Error> {
    serde_json::to_string(&EventFrame { event, data }).map(Arc::from)
}

pub fn encode_ack(ack: u64, error: Option<String>) -> Result<Arc<str>, serde_json::Error> {
    serde_json::to_string(&AckFrame { ack, error }).map(Arc::from)
}

/* ---------- event payloads ---------- */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpdate {
    pub chat_id: RoomId,
    pub last_message: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDeleted {
    pub chat_id: RoomId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDeleted {
    pub room_id: RoomId,
}

/* ---------- inbound ---------- */
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub ack: Option<u64>,
}

#[derive(Debug, PartialEq)]
pub enum ClientCommand {
    Join { room: RoomId, ack: Option<u64> },
    Leave { room: RoomId },
    Invalid { reason: String, ack: Option<u64> },
    Unknown { event: String },
}

impl ClientFrame {
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn into_command(self) -> ClientCommand {
        match self.event.as_str() {
            CHAT_JOIN => match room_of(&self.data) {
                Ok(room) => ClientCommand::Join { room, ack: self.ack },
                Err(e) => ClientCommand::Invalid {
                    reason: e.to_string(),
                    ack: self.ack,
                },
            },
            CHAT_LEAVE => match room_of(&self.data) {
                Ok(room) => ClientCommand::Leave { room },
                Err(e) => ClientCommand::Invalid {
                    reason: e.to_string(),
                    ack: self.ack,
                },
            },
            _ => ClientCommand::Unknown { event: self.event },
        }
    }
}

// Bare string, or `{"roomId": ..}` / `{"chatId": ..}`.
fn room_of(data: &Value) -> Result<RoomId, ProtocolError> {
    let id = match data {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map
            .get("roomId")
            .or_else(|| map.get("chatId"))
            .and_then(Value::as_str),
        _ => None,
    };
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(RoomId::from(id)),
        _ => Err(ProtocolError::InvalidRoom),
    }
}
