use std::time::Duration;

use axum::{
    extract::{ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade}, Extension, Query},
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::{sync::mpsc, time};
use tracing::{debug, info, warn};

use crate::{
    error::HubError,
    hub::{ConnectionId, Outbound, OutboundSender, UserId},
    identity,
    protocol::{self, ClientCommand, ClientFrame, CLOSE_GOING_AWAY, CLOSE_UNAUTHORIZED, CONNECT_ERROR},
    state::AppState,
};

#[derive(Deserialize)]
struct WsQuery { token: Option<String> }

pub fn router() -> Router {
    Router::new().route("/chat", get(ws_handler))
}

/// Verification runs after the upgrade so a rejected client still gets the reason.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(q): Query<WsQuery>,
    headers: HeaderMap,
    Extension(state): Extension<AppState>,
) -> Response {
    let credential = identity::extract_credential(q.token.as_deref(), &headers);
    ws.on_upgrade(move |sock| handshake(sock, state, credential))
}

/* ---------------- handshake ---------------- */
async fn handshake(sock: WebSocket, state: AppState, credential: Option<String>) {
    match state.verifier.verify(credential.as_deref()).await {
        Ok(user) => user_ws(sock, state, user).await,
        Err(err) => reject(sock, &err).await,
    }
}

async fn reject(mut sock: WebSocket, err: &HubError) {
    warn!(reason = %err, "connection rejected");
    if let Ok(frame) = protocol::encode_event(CONNECT_ERROR, &err.to_string()) {
        let _ = sock.send(Message::Text(frame.to_string())).await;
    }
    let _ = sock
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_UNAUTHORIZED,
            reason: "unauthorized".into(),
        })))
        .await;
}

/* ---------------- per connection ---------------- */
// Time the writer gets to flush a queued close frame after the reader quits.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

async fn user_ws(sock: WebSocket, state: AppState, user: UserId) {
    let (sink, mut stream) = sock.split();
    let (tx, rx) = mpsc::unbounded_channel::<Outbound>();
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();

    let conn_id = state.hub.connect(user.clone(), tx.clone());
    let mut writer = tokio::spawn(write_loop(sink, rx));
    let mut pinger = tokio::spawn(heartbeat(
        conn_id,
        tx.clone(),
        pong_rx,
        state.ping_interval,
        state.pong_timeout,
    ));
    let mut writer_done = false;

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(raw))) => on_frame(&state, conn_id, &tx, &raw).await,
                Some(Ok(Message::Pong(_))) => { let _ = pong_tx.send(()); }
                Some(Ok(Message::Close(frame))) => {
                    debug!(conn_id = %conn_id, ?frame, "client closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = %conn_id, error = %e, "transport error");
                    break;
                }
                None => break,
            },
            _ = &mut writer => {
                debug!(conn_id = %conn_id, "writer finished");
                writer_done = true;
                break;
            }
            _ = &mut pinger => {
                debug!(conn_id = %conn_id, "heartbeat lost");
                break;
            }
        }
    }

    state.hub.disconnect(conn_id);
    pinger.abort();
    drop(tx);
    if !writer_done && time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    info!(conn_id = %conn_id, user = %user, "socket done");
}

/// Drains the outbound queue into the socket.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
) {
    while let Some(item) = rx.recv().await {
        let sent = match item {
            Outbound::Frame(text) => sink.send(Message::Text(text.to_string())).await,
            Outbound::Ping => sink.send(Message::Ping(Vec::new())).await,
            Outbound::Close { code, reason } => {
                let _ = sink.send(Message::Close(Some(CloseFrame { code, reason: reason.into() }))).await;
                break;
            }
        };
        if sent.is_err() { break; }
    }
}

/// Pings through the outbound queue and waits for the pong. Returns when a
/// pong is overdue, after queueing a going-away close, or when the queue is gone.
async fn heartbeat(
    conn_id: ConnectionId,
    tx: OutboundSender,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    every: Duration,
    pong_timeout: Duration,
) {
    let mut ticker = time::interval(every);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        // pongs that arrived before this ping don't count
        while pong_rx.try_recv().is_ok() {}
        if tx.send(Outbound::Ping).is_err() {
            return;
        }

        match time::timeout(pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            Ok(None) => return,
            Err(_) => {
                warn!(conn_id = %conn_id, timeout_ms = pong_timeout.as_millis() as u64, "pong overdue, closing");
                let _ = tx.send(Outbound::Close {
                    code: CLOSE_GOING_AWAY,
                    reason: "pong timeout".to_string(),
                });
                return;
            }
        }
    }
}

async fn on_frame(state: &AppState, conn_id: ConnectionId, tx: &OutboundSender, raw: &str) {
    let frame = match ClientFrame::parse(raw) {
        Ok(f) => f,
        Err(e) => {
            debug!(conn_id = %conn_id, error = %e, "ignored frame");
            return;
        }
    };

    match frame.into_command() {
        ClientCommand::Join { room, ack } => {
            let result = state.hub.join(conn_id, room.clone()).await;
            if let Err(e) = &result {
                debug!(conn_id = %conn_id, room = %room, error = %e, "join failed");
            }
            if let Some(id) = ack {
                reply(tx, id, result.err().map(|e| e.to_string()));
            }
        }
        ClientCommand::Leave { room } => state.hub.leave(conn_id, &room),
        ClientCommand::Invalid { reason, ack } => {
            debug!(conn_id = %conn_id, reason = %reason, "invalid command");
            if let Some(id) = ack {
                reply(tx, id, Some(reason));
            }
        }
        ClientCommand::Unknown { event } => {
            debug!(conn_id = %conn_id, event = %event, "unknown event");
        }
    }
}

// Acks ride the same queue as events, so they stay in order.
fn reply(tx: &OutboundSender, id: u64, error: Option<String>) {
    match protocol::encode_ack(id, error) {
        Ok(frame) => { let _ = tx.send(Outbound::Frame(frame)); }
        Err(e) => warn!(ack = id, error = %e, "failed to encode ack"),
    }
}
