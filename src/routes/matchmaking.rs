//! Matchmaking WebSocket handler — queue join/leave and match delivery.
//!
//! The socket is registered in the lobby while open, so a friend's party
//! join can pull it in, and owns at most one queue entry. `match_found`
//! arrives on the socket's channel from whichever join filled the pool; the
//! client then opens the game socket. Closing the queue socket drops its
//! entry along with the rest of its party.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::protocol::{ErrorCode, QueueCommand, ServerMessage};
use crate::routes::ws::{WsParams, authenticate, send_message};
use crate::services;
use crate::services::auth::Claims;
use crate::services::matchmaking::{JoinStatus, MatchError, QueueEntry};
use crate::state::AppState;

/// `GET /ws/matchmaking?token=<jwt>`
pub async fn handle_queue_ws(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    match authenticate(&state, &params) {
        Ok(claims) => ws.on_upgrade(move |socket| run_queue_ws(socket, state, claims)),
        Err(rejection) => rejection.into_response(),
    }
}

async fn run_queue_ws(mut socket: WebSocket, state: AppState, claims: Claims) {
    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config.client_channel_capacity);
    let lobby_entry = QueueEntry { user_id: claims.user_id, name: claims.username.clone(), conn_id, tx: tx.clone() };
    services::matchmaking::register(&state, lobby_entry).await;
    info!(user_id = claims.user_id, %conn_id, "ws: matchmaking client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let reply = handle_queue_text(&state, &claims, conn_id, &tx, text.as_str()).await;
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
            Some(message) = rx.recv() => {
                if send_message(&mut socket, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    services::matchmaking::leave_connection(&state, claims.user_id, conn_id).await;
    info!(user_id = claims.user_id, %conn_id, "ws: matchmaking client disconnected");
}

/// Handle one queue command. Returns the direct reply for the sender, if any.
/// A completed match is delivered through `tx` instead.
pub(crate) async fn handle_queue_text(
    state: &AppState,
    claims: &Claims,
    conn_id: Uuid,
    tx: &mpsc::Sender<ServerMessage>,
    text: &str,
) -> Option<ServerMessage> {
    let user_id = claims.user_id;
    let command = match QueueCommand::parse(text) {
        Ok(command) => command,
        Err(e) => {
            warn!(user_id, error = %e, "ws: malformed queue command");
            return Some(ServerMessage::error(&e));
        }
    };

    match command {
        QueueCommand::Join { player_id, target_size, party } => {
            if player_id.is_some_and(|id| id != user_id) {
                return Some(ServerMessage::error(&MatchError::Forbidden(user_id)));
            }
            let entry = QueueEntry { user_id, name: claims.username.clone(), conn_id, tx: tx.clone() };
            match services::matchmaking::join(state, entry, target_size, &party).await {
                Ok(JoinStatus::Waiting { queued, .. }) => {
                    Some(ServerMessage::queue_status(format!("Player {user_id} joined the queue"), queued))
                }
                Ok(JoinStatus::Matched { .. }) => None,
                Err(MatchError::AlreadyQueued(_)) => {
                    let queued = queued_len(state).await;
                    Some(ServerMessage::queue_status(format!("Player {user_id} is already in the queue"), queued))
                }
                Err(e) => {
                    warn!(user_id, code = e.error_code(), error = %e, "ws: queue join rejected");
                    Some(ServerMessage::error(&e))
                }
            }
        }
        QueueCommand::Leave => {
            let message = if services::matchmaking::leave(state, user_id).await {
                format!("Player {user_id} left the queue")
            } else {
                format!("Player {user_id} is not in the queue")
            };
            Some(ServerMessage::queue_status(message, queued_len(state).await))
        }
    }
}

async fn queued_len(state: &AppState) -> usize {
    state.matchmaker.lock().await.queued_len()
}

#[cfg(test)]
#[path = "matchmaking_test.rs"]
mod tests;
