//! Dev routes — live game overrides for manual testing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use uuid::Uuid;

use crate::routes::{error_response, game_error_status};
use crate::services::dev::{self as dev_svc, DevError, DevUpdate};
use crate::state::AppState;

fn dev_error_status(err: &DevError) -> StatusCode {
    match err {
        DevError::Game(e) => game_error_status(e),
        DevError::UnknownField(_) | DevError::InvalidValue { .. } => StatusCode::BAD_REQUEST,
    }
}

/// `POST /dev/{game_id}/update`
pub async fn update(State(state): State<AppState>, Path(game_id): Path<Uuid>, Json(body): Json<DevUpdate>) -> Response {
    match dev_svc::apply_dev_update(&state, game_id, body).await {
        Ok(game) => Json(game).into_response(),
        Err(e) => error_response(dev_error_status(&e), &e),
    }
}
