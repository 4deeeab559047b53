use axum::{Extension, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::state::AppState;

pub mod internal;
pub mod online;
pub mod ws;

pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

pub fn router(with_internal: bool) -> Router {
    let api = if with_internal {
        online::router().merge(internal::router())
    } else {
        online::router()
    };
    Router::new()
        .nest("/api", api)
        .nest("/ws",  ws::router())
}

/// Full application: routes plus shared state and middleware.
pub fn app(state: AppState, body_limit: usize) -> Router {
    router(state.internal_key.is_some())
        .layer(Extension(state))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
}
