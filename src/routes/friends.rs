//! Friends routes — requests, responses, lists, and user search.
//!
//! Every handler requires a bearer token through `AuthUser`; the caller is
//! always the token's account.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use crate::game::AccountId;
use crate::routes::auth::AuthUser;
use crate::routes::error_response;
use crate::services::friends::{self, FriendError, FriendStatus, RequestOutcome};
use crate::state::AppState;

pub(crate) fn friend_error_status(err: &FriendError) -> StatusCode {
    match err {
        FriendError::SelfRequest | FriendError::EmptyQuery => StatusCode::BAD_REQUEST,
        FriendError::UserNotFound(_) | FriendError::RequestNotFound => StatusCode::NOT_FOUND,
        FriendError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn friend_failure(err: &FriendError) -> Response {
    let status = friend_error_status(err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "friends request failed");
    }
    error_response(status, err)
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

/// `POST /friends/request/{target_id}`
pub async fn send_request(State(state): State<AppState>, auth: AuthUser, Path(target_id): Path<AccountId>) -> Response {
    match friends::send_request(&state.pool, auth.claims.user_id, target_id).await {
        Ok(RequestOutcome::Sent) => (StatusCode::CREATED, Json(json!({ "message": "Request sent!" }))).into_response(),
        Ok(RequestOutcome::Exists) => Json(json!({
            "status": "exists",
            "detail": "Request already pending or you are friends.",
        }))
        .into_response(),
        Err(e) => friend_failure(&e),
    }
}

/// `POST /friends/accept/{requester_id}`
pub async fn accept(State(state): State<AppState>, auth: AuthUser, Path(requester_id): Path<AccountId>) -> Response {
    match friends::respond(&state.pool, requester_id, auth.claims.user_id, FriendStatus::Accepted).await {
        Ok(()) => Json(json!({ "message": "You are now friends!" })).into_response(),
        Err(e) => friend_failure(&e),
    }
}

/// `POST /friends/reject/{requester_id}`
pub async fn reject(State(state): State<AppState>, auth: AuthUser, Path(requester_id): Path<AccountId>) -> Response {
    match friends::respond(&state.pool, requester_id, auth.claims.user_id, FriendStatus::Rejected).await {
        Ok(()) => Json(json!({ "message": "Friend request rejected." })).into_response(),
        Err(e) => friend_failure(&e),
    }
}

/// `GET /friends/list`
pub async fn list(State(state): State<AppState>, auth: AuthUser) -> Response {
    match friends::list_friends(&state.pool, auth.claims.user_id).await {
        Ok(ids) => Json(json!({ "friends": ids })).into_response(),
        Err(e) => friend_failure(&e),
    }
}

/// `GET /friends/requests` — pending requests addressed to the caller.
pub async fn requests(State(state): State<AppState>, auth: AuthUser) -> Response {
    match friends::incoming_requests(&state.pool, auth.claims.user_id).await {
        Ok(ids) => Json(json!({ "requests": ids })).into_response(),
        Err(e) => friend_failure(&e),
    }
}

/// `GET /friends/search?query=<text>`
pub async fn search(State(state): State<AppState>, auth: AuthUser, Query(params): Query<SearchParams>) -> Response {
    match friends::search_users(&state.pool, auth.claims.user_id, &params.query).await {
        Ok(results) => Json(json!({ "results": results })).into_response(),
        Err(e) => friend_failure(&e),
    }
}

#[cfg(test)]
#[path = "friends_test.rs"]
mod tests;
