use axum::{routing::get, Extension, Json, Router, http::HeaderMap};

use crate::{error::AppResult, hub::UserId, identity, state::AppState};

pub fn router() -> Router {
    Router::new().route("/online", get(online))
}

/// Current presence snapshot, same shape as `online:users`.
async fn online(
    headers: HeaderMap,
    Extension(state): Extension<AppState>,
) -> AppResult<Json<Vec<UserId>>> {
    let credential = identity::extract_credential(None, &headers);
    state.verifier.verify(credential.as_deref()).await?;
    Ok(Json(state.hub.online_users()))
}
