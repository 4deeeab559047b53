use axum::{http::StatusCode, response::IntoResponse};

use crate::hub::{ConnectionState, RoomId};
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppErr>;

/* ── HTTP surface ── */
#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Bad request: {0}")]
    Bad(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden")]
    Forbidden,
}

impl IntoResponse for AppErr {
    fn into_response(self) -> axum::response::Response {
        let (code, body) = match self {
            AppErr::Bad(msg) => (StatusCode::BAD_REQUEST, msg),
            AppErr::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppErr::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string()),
        };
        (code, body).into_response()
    }
}

impl From<HubError> for AppErr {
    fn from(e: HubError) -> Self {
        match e {
            HubError::Unauthorized(reason) => AppErr::Unauthorized(reason),
            other => AppErr::Bad(other.to_string()),
        }
    }
}

/* ── realtime core ── */
/// Failures inside the hub. `Display` output is what clients see in
/// `connect_error` frames and join acks.
#[derive(thiserror::Error, Debug)]
pub enum HubError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not a member of room {0}")]
    NotAuthorized(RoomId),

    #[error("membership check for room {0} timed out")]
    Timeout(RoomId),

    #[error("realtime hub is not initialized")]
    NotInitialized,

    #[error("connection is closed")]
    NotConnected,

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("illegal connection transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
}
