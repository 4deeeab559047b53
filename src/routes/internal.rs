//! Entry points for the HTTP layer that owns persistence. Called after a
//! write has committed; the answer is always 202 with how many live
//! connections were reached.

use axum::{
    http::{HeaderMap, StatusCode},
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppErr, AppResult},
    hub::{RoomId, UserId},
    state::AppState,
};

pub const INTERNAL_KEY_HEADER: &str = "x-internal-key";

pub fn router() -> Router {
    Router::new()
        .route("/internal/emit",   post(emit))
        .route("/internal/notify", post(notify))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Room(RoomId),
    User(UserId),
    All,
}

#[derive(Debug, Deserialize)]
pub struct EmitReq {
    pub target:  Target,
    pub event:   String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifyReq {
    MessageNew        { room_id: RoomId, message: Value },
    ChatUpdate        { chat_id: RoomId, last_message: Value },
    ChatNew           { chat: Value, members: Vec<UserId> },
    ChatInfoUpdated   { chat_id: RoomId, info: Value },
    ChatDeleted       { chat_id: RoomId, participants: Vec<UserId> },
    RoomDeleted       { room_id: RoomId, members: Vec<UserId> },
    PublicRoomUpdated { room: Value },
    /// Membership revoked; `delivered` counts the subscriptions dropped.
    MemberRemoved     { room_id: RoomId, user_id: UserId },
}

fn check_key(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let Some(expected) = state.internal_key.as_deref() else {
        return Err(AppErr::Forbidden);
    };
    match headers.get(INTERNAL_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(given) if given == expected => Ok(()),
        _ => Err(AppErr::Forbidden),
    }
}

fn accepted(delivered: usize) -> (StatusCode, Json<Value>) {
    (StatusCode::ACCEPTED, Json(json!({ "delivered": delivered })))
}

async fn emit(
    headers: HeaderMap,
    Extension(state): Extension<AppState>,
    Json(req): Json<EmitReq>,
) -> AppResult<(StatusCode, Json<Value>)> {
    check_key(&state, &headers)?;
    let rt = &state.realtime;
    let delivered = match &req.target {
        Target::Room(room) => rt.emit_to_room(room, &req.event, &req.payload),
        Target::User(user) => rt.emit_to_user(user, &req.event, &req.payload),
        Target::All        => rt.broadcast(&req.event, &req.payload),
    };
    Ok(accepted(delivered))
}

async fn notify(
    headers: HeaderMap,
    Extension(state): Extension<AppState>,
    Json(req): Json<NotifyReq>,
) -> AppResult<(StatusCode, Json<Value>)> {
    check_key(&state, &headers)?;
    let n = &state.notifier;
    let delivered = match req {
        NotifyReq::MessageNew { room_id, message }         => n.message_created(&room_id, &message),
        NotifyReq::ChatUpdate { chat_id, last_message }    => n.chat_updated(&chat_id, last_message).await,
        NotifyReq::ChatNew { chat, members }               => n.chat_created(&chat, &members),
        NotifyReq::ChatInfoUpdated { chat_id, info }       => n.chat_info_updated(&chat_id, &info).await,
        NotifyReq::ChatDeleted { chat_id, participants }   => n.chat_deleted(&chat_id, &participants),
        NotifyReq::RoomDeleted { room_id, members }        => n.room_deleted(&room_id, &members),
        NotifyReq::PublicRoomUpdated { room }              => n.public_room_updated(&room),
        NotifyReq::MemberRemoved { room_id, user_id }      => n.member_removed(&room_id, &user_id),
    };
    Ok(accepted(delivered))
}
