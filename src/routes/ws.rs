//! Game WebSocket handler — action intake and state fan-out.
//!
//! DESIGN
//! ======
//! On upgrade the socket registers against its seat and enters a `select!`
//! loop:
//! - Incoming client text → parse + apply (or relay chat)
//! - Messages on the seat's channel → forward to client
//!
//! Accepted actions reach the client through the room broadcast like
//! everyone else's; only rejections are answered directly, to the sender.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → verify token, check the seat → register, send `reconnect`
//! 2. Client sends actions → apply → broadcast to the room
//! 3. A newer socket for the same seat drops this one's channel → close
//! 4. Close → unregister (the game itself lives on)

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::game::{AccountId, GameError, PlayerId};
use crate::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::services;
use crate::services::auth::Claims;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub player_id: Option<AccountId>,
}

/// Verify the query-string token and that any claimed account id is the
/// token's own.
pub(crate) fn authenticate(state: &AppState, params: &WsParams) -> Result<Claims, (StatusCode, &'static str)> {
    let Some(token) = params.token.as_deref() else {
        return Err((StatusCode::UNAUTHORIZED, "token required"));
    };
    let claims = services::auth::verify_token(&state.config.jwt_secret, token)
        .map_err(|_| (StatusCode::UNAUTHORIZED, "invalid or expired token"))?;
    if params.player_id.is_some_and(|id| id != claims.user_id) {
        return Err((StatusCode::FORBIDDEN, "player_id does not match token"));
    }
    Ok(claims)
}

// =============================================================================
// UPGRADE
// =============================================================================

/// `GET /ws/game/{game_id}?token=<jwt>&player_id=<account id>`
pub async fn handle_game_ws(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let claims = match authenticate(&state, &params) {
        Ok(claims) => claims,
        Err(rejection) => return rejection.into_response(),
    };

    let Ok(room) = services::game::room_or_hydrate(&state, game_id).await else {
        return (StatusCode::NOT_FOUND, "game not found").into_response();
    };
    let seated = room.lock().await.game.seat_of(claims.user_id).is_some();
    if !seated {
        return (StatusCode::FORBIDDEN, "not seated in this game").into_response();
    }

    ws.on_upgrade(move |socket| run_game_ws(socket, state, game_id, claims.user_id))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_game_ws(mut socket: WebSocket, state: AppState, game_id: Uuid, user_id: AccountId) {
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config.client_channel_capacity);

    let joined = match services::game::connect(&state, game_id, user_id, tx).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!(%game_id, user_id, error = %e, "ws: game connect rejected");
            let _ = send_message(&mut socket, &ServerMessage::error(&e)).await;
            return;
        }
    };
    info!(%game_id, user_id, player_id = joined.player_id, conn_id = %joined.conn_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let reply = handle_inbound(&state, game_id, joined.player_id, text.as_str()).await;
                        if let Some(reply) = reply {
                            if send_message(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            outbound = rx.recv() => {
                let Some(message) = outbound else {
                    info!(%game_id, player_id = joined.player_id, "ws: replaced by newer connection");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                if send_message(&mut socket, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    services::game::disconnect(&state, game_id, joined).await;
    info!(%game_id, player_id = joined.player_id, "ws: client disconnected");
}

// =============================================================================
// INBOUND
// =============================================================================

/// Parse and process one inbound text frame. Returns the message for the
/// sender only, which is an error when the frame was rejected.
pub(crate) async fn handle_inbound(
    state: &AppState,
    game_id: Uuid,
    player_id: PlayerId,
    text: &str,
) -> Option<ServerMessage> {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(%game_id, player_id, error = %e, "ws: malformed inbound message");
            return Some(ServerMessage::error(&e));
        }
    };

    let result: Result<(), GameError> = match message {
        ClientMessage::Game(action) => services::game::apply_action(state, game_id, player_id, action)
            .await
            .map(|_| ()),
        ClientMessage::Chat(chat) => services::game::relay_chat(state, game_id, player_id, chat).await,
    };

    match result {
        Ok(()) => None,
        Err(e) => {
            warn!(%game_id, player_id, code = e.error_code(), error = %e, "ws: action rejected");
            Some(ServerMessage::error(&e))
        }
    }
}

pub(crate) async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), axum::Error> {
    socket.send(Message::Text(message.to_text().into())).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
