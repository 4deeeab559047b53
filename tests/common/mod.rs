//! Shared helpers: boot the app on a random port and drive it over WebSocket.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chat_hub::{identity::JwtProvider, routes, state::AppState, store::MemoryStore, utils::jwt};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub const SECRET: &[u8] = b"integration-secret";
pub const INTERNAL_KEY: &str = "internal-test-key";

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

impl TestServer {
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/chat", self.addr)
    }
}

pub fn test_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        store.clone(),
        Arc::new(JwtProvider::new(SECRET)),
        Duration::from_millis(500),
    )
    .with_internal_key(Some(INTERNAL_KEY.to_string()));
    (state, store)
}

/// Start the server on 127.0.0.1:0.
pub async fn start_test_server() -> TestServer {
    let (state, store) = test_state();
    serve(state, store).await
}

pub async fn serve(state: AppState, store: Arc<MemoryStore>) -> TestServer {
    let app = routes::app(state.clone(), routes::DEFAULT_BODY_LIMIT);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer { addr, state, store }
}

/// Register `name` as a local user and return a token for it.
pub fn user_token(store: &MemoryStore, name: &str) -> String {
    let subject = format!("sub-{name}");
    store.add_user(&subject, name).unwrap();
    jwt::sign(&subject, SECRET).unwrap()
}

pub async fn connect(server: &TestServer, token: &str) -> Ws {
    let url = format!("{}?token={}", server.ws_url(), token);
    let (ws, _) = tokio_tungstenite::connect_async(url).await.expect("ws connect");
    ws
}

pub async fn send_json(ws: &mut Ws, frame: Value) {
    ws.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Next text frame as JSON, skipping control frames. Panics after 2s.
pub async fn next_json(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("transport error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Skip ahead to the next frame for `event`.
pub async fn next_event(ws: &mut Ws, event: &str) -> Value {
    loop {
        let frame = next_json(ws).await;
        if frame["event"] == event {
            return frame["data"].clone();
        }
    }
}

/// Skip ahead to the ack with this id.
pub async fn next_ack(ws: &mut Ws, id: u64) -> Value {
    loop {
        let frame = next_json(ws).await;
        if frame["ack"] == id {
            return frame;
        }
    }
}

/// Wait until a presence snapshot equal to `expected` arrives.
pub async fn wait_for_online(ws: &mut Ws, expected: &[&str]) {
    loop {
        let data = next_event(ws, "online:users").await;
        let users: Vec<String> = serde_json::from_value(data).unwrap();
        if users == expected {
            return;
        }
    }
}

/// Collect every text frame that arrives within `ms`.
pub async fn drain(ws: &mut Ws, ms: u64) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Ok(Some(Ok(msg))) = tokio::time::timeout(Duration::from_millis(ms), ws.next()).await {
        if let Message::Text(text) = msg {
            frames.push(serde_json::from_str(&text).unwrap());
        }
    }
    frames
}

/// Poll `cond` every 20ms; panics if it hasn't held within 2s.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met within 2s");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
