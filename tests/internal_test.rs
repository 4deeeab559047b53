//! HTTP surface: presence snapshot and the internal emit/notify endpoints.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use chat_hub::{
    hub::{Outbound, RoomId, UserId},
    identity::JwtProvider,
    routes::{self, internal::INTERNAL_KEY_HEADER},
    state::AppState,
    store::MemoryStore,
};
use common::*;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tower::ServiceExt;

fn app(state: &AppState) -> Router {
    routes::app(state.clone(), routes::DEFAULT_BODY_LIMIT)
}

fn post(uri: &str, key: Option<&str>, body: Value) -> Request<Body> {
    let mut req = Request::post(uri).header("content-type", "application/json");
    if let Some(key) = key {
        req = req.header(INTERNAL_KEY_HEADER, key);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Attach a fake connection directly to the hub.
fn attach(state: &AppState, user: &str) -> UnboundedReceiver<Outbound> {
    let (tx, rx) = mpsc::unbounded_channel();
    state.hub.connect(UserId::from(user), tx);
    rx
}

fn events(rx: &mut UnboundedReceiver<Outbound>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(Outbound::Frame(text)) = rx.try_recv() {
        out.push(serde_json::from_str(&text).unwrap());
    }
    out
}

#[tokio::test]
async fn emit_requires_key() {
    let (state, _) = test_state();
    let body = json!({"target": "all", "event": "x", "payload": {}});

    let res = app(&state).oneshot(post("/api/internal/emit", None, body.clone())).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app(&state)
        .oneshot(post("/api/internal/emit", Some("wrong"), body))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn internal_routes_absent_without_key() {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store, Arc::new(JwtProvider::new(SECRET)), Duration::from_secs(1));

    let res = app(&state)
        .oneshot(post("/api/internal/emit", Some(INTERNAL_KEY), json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn emit_to_user_counts_deliveries() {
    let (state, _) = test_state();
    let mut phone = attach(&state, "alice");
    let mut laptop = attach(&state, "alice");
    let mut other = attach(&state, "bob");
    events(&mut phone);
    events(&mut laptop);
    events(&mut other);

    let res = app(&state)
        .oneshot(post(
            "/api/internal/emit",
            Some(INTERNAL_KEY),
            json!({"target": {"user": "alice"}, "event": "chat:new", "payload": {"id": "c1"}}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(res).await, json!({"delivered": 2}));

    assert_eq!(events(&mut phone), vec![json!({"event": "chat:new", "data": {"id": "c1"}})]);
    assert_eq!(events(&mut laptop).len(), 1);
    assert!(events(&mut other).is_empty());
}

#[tokio::test]
async fn emit_to_empty_room_is_still_accepted() {
    let (state, _) = test_state();
    let res = app(&state)
        .oneshot(post(
            "/api/internal/emit",
            Some(INTERNAL_KEY),
            json!({"target": {"room": "nobody-here"}, "event": "message:new"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(res).await["delivered"], 0);
}

#[tokio::test]
async fn notify_chat_update_uses_stored_members() {
    let (state, store) = test_state();
    store.add_member("c1", "alice").unwrap();
    store.add_member("c1", "bob").unwrap();
    let mut alice = attach(&state, "alice");
    events(&mut alice);

    let res = app(&state)
        .oneshot(post(
            "/api/internal/notify",
            Some(INTERNAL_KEY),
            json!({"kind": "chat_update", "chat_id": "c1", "last_message": {"text": "yo"}}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    // bob is offline, so only alice's connection counts
    assert_eq!(json_body(res).await["delivered"], 1);

    let got = events(&mut alice);
    assert_eq!(got[0]["event"], "chat:update");
    assert_eq!(got[0]["data"], json!({"chatId": "c1", "lastMessage": {"text": "yo"}}));
}

#[tokio::test]
async fn notify_room_deleted() {
    let (state, _) = test_state();
    let mut bob = attach(&state, "bob");
    events(&mut bob);

    let res = app(&state)
        .oneshot(post(
            "/api/internal/notify",
            Some(INTERNAL_KEY),
            json!({"kind": "room_deleted", "room_id": "lobby", "members": ["bob", "carol"]}),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(res).await["delivered"], 1);
    assert_eq!(
        events(&mut bob),
        vec![json!({"event": "public-room:deleted", "data": {"roomId": "lobby"}})]
    );
}

#[tokio::test]
async fn notify_member_removed_evicts_live_subscriptions() {
    let (state, store) = test_state();
    store.add_member("r1", "alice").unwrap();
    let (tx, mut alice) = mpsc::unbounded_channel();
    let conn = state.hub.connect(UserId::from("alice"), tx);
    state.hub.join(conn, RoomId::from("r1")).await.unwrap();
    events(&mut alice);

    store.remove_member(&RoomId::from("r1"), &UserId::from("alice")).unwrap();
    let res = app(&state)
        .oneshot(post(
            "/api/internal/notify",
            Some(INTERNAL_KEY),
            json!({"kind": "member_removed", "room_id": "r1", "user_id": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    assert_eq!(json_body(res).await["delivered"], 1);

    assert_eq!(state.realtime.emit_to_room(&RoomId::from("r1"), "message:new", &json!({})), 0);
    assert!(events(&mut alice).is_empty());
}

#[tokio::test]
async fn notify_rejects_unknown_kind() {
    let (state, _) = test_state();
    let res = app(&state)
        .oneshot(post(
            "/api/internal/notify",
            Some(INTERNAL_KEY),
            json!({"kind": "launch_rockets"}),
        ))
        .await
        .unwrap();
    assert!(res.status().is_client_error());
}

#[tokio::test]
async fn online_snapshot_requires_auth() {
    let (state, store) = test_state();
    let token = user_token(&store, "alice");
    let _conn = attach(&state, "bob");

    let res = app(&state)
        .oneshot(Request::get("/api/online").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app(&state)
        .oneshot(
            Request::get("/api/online")
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!(["bob"]));
}
