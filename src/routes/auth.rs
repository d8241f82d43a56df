//! Auth routes — registration, login, and token status.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

use crate::routes::error_response;
use crate::services::auth::{self as auth_svc, AuthError, Claims, Credentials};
use crate::state::AppState;

pub(crate) fn auth_error_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AuthError::UsernameTaken => StatusCode::CONFLICT,
        AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
        AuthError::Hashing(_) | AuthError::Signing(_) | AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn auth_failure(err: &AuthError) -> Response {
    let status = auth_error_status(err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "auth request failed");
    }
    error_response(status, err)
}

/// Claims from an `Authorization: Bearer <token>` header, if present and valid.
pub(crate) fn bearer_claims(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
    auth_svc::verify_token(secret, token.trim()).ok()
}

/// Account behind a valid `Authorization: Bearer` token.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub claims: Claims,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let claims = bearer_claims(&parts.headers, &app_state.config.jwt_secret).ok_or(StatusCode::UNAUTHORIZED)?;
        Ok(Self { claims })
    }
}

/// `POST /auth/register`
pub async fn register(State(state): State<AppState>, Json(body): Json<Credentials>) -> Response {
    let config = &state.config;
    match auth_svc::register(&state.pool, &config.jwt_secret, config.token_ttl_secs, &body).await {
        Ok(token) => (StatusCode::CREATED, Json(token)).into_response(),
        Err(e) => auth_failure(&e),
    }
}

/// `POST /auth/login`
pub async fn login(State(state): State<AppState>, Json(body): Json<Credentials>) -> Response {
    let config = &state.config;
    match auth_svc::login(&state.pool, &config.jwt_secret, config.token_ttl_secs, &body).await {
        Ok(token) => Json(token).into_response(),
        Err(e) => auth_failure(&e),
    }
}

/// `GET /auth/status` — whether the caller's bearer token is valid.
pub async fn status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match bearer_claims(&headers, &state.config.jwt_secret) {
        Some(claims) => Json(json!({
            "authenticated": true,
            "user_id": claims.user_id,
            "username": claims.username,
        }))
        .into_response(),
        None => Json(json!({ "authenticated": false })).into_response(),
    }
}

/// `GET /auth/dump` — every registered username. Dev-only.
pub async fn dump(State(state): State<AppState>) -> Response {
    match auth_svc::list_usernames(&state.pool).await {
        Ok(users) => Json(json!({ "users": users })).into_response(),
        Err(e) => auth_failure(&e),
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
