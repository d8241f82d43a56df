//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the account and friends endpoints, the two websocket
//! endpoints (matchmaking queue and per-game socket), and the debug/dev HTTP
//! routes under a single Axum router. Dev overrides and the username dump
//! are mounted only when enabled in configuration.

pub mod auth;
pub mod dev;
pub mod friends;
pub mod matchmaking;
pub mod ws;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::game::GameError;
use crate::protocol::ErrorCode;
use crate::services;
use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/auth/status", get(auth::status))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/friends/request/{target_id}", post(friends::send_request))
        .route("/friends/accept/{requester_id}", post(friends::accept))
        .route("/friends/reject/{requester_id}", post(friends::reject))
        .route("/friends/list", get(friends::list))
        .route("/friends/requests", get(friends::requests))
        .route("/friends/search", get(friends::search))
        .route("/ws/matchmaking", get(matchmaking::handle_queue_ws))
        .route("/ws/game/{game_id}", get(ws::handle_game_ws))
        .route("/debug/games", get(debug_games))
        .route("/game/{game_id}/state", get(game_state))
        .route("/healthz", get(healthz));

    if state.config.dev_routes {
        router = router
            .route("/dev/{game_id}/update", post(dev::update))
            .route("/auth/dump", get(auth::dump));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON error body with a grepable code.
pub(crate) fn error_response<E: ErrorCode>(status: StatusCode, err: &E) -> Response {
    (status, Json(json!({ "code": err.error_code(), "message": err.to_string() }))).into_response()
}

pub(crate) fn game_error_status(err: &GameError) -> StatusCode {
    match err {
        GameError::GameNotFound(_) | GameError::PlayerNotFound(_) | GameError::SquareNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        GameError::NotSeated => StatusCode::FORBIDDEN,
        _ => StatusCode::BAD_REQUEST,
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// `GET /debug/games` — summaries of every live game.
async fn debug_games(State(state): State<AppState>) -> Response {
    Json(services::game::list_games(&state).await).into_response()
}

/// `GET /game/{game_id}/state` — current state of a live game.
async fn game_state(State(state): State<AppState>, Path(game_id): Path<Uuid>) -> Response {
    match services::game::snapshot(&state, game_id).await {
        Ok(game) => Json(game).into_response(),
        Err(e) => error_response(game_error_status(&e), &e),
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
