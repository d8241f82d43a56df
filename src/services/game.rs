//! Game service — room registry, action dispatch, broadcast, and chat relay.
//!
//! DESIGN
//! ======
//! Every mutation of a game goes through `apply_action` (or the dev
//! overrides), which holds that room's mutex for the whole
//! apply-then-broadcast step. Broadcast uses `try_send` on bounded
//! per-connection channels, so a slow client only loses its own messages and
//! never stalls the room.
//!
//! Rooms are created by matchmaking and hydrated from Postgres on first
//! connect when the process has restarted. Disconnects only remove the
//! socket registration; the game lives on.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::game::player::PlayerId;
use crate::game::{AccountId, EventKind, Game, GameAction, GameError, Phase, Seat};
use crate::protocol::{ChatLine, ChatPayload, ServerMessage};
use crate::services::persistence;
use crate::state::{AppState, Connection, GameRoom, SharedRoom};

// =============================================================================
// TYPES
// =============================================================================

/// A socket registered against a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    pub player_id: PlayerId,
    pub conn_id: Uuid,
}

/// Row for the debug listing.
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub id: Uuid,
    pub phase: Phase,
    pub turn: PlayerId,
    pub players: usize,
    pub connected: usize,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Create a game for `seats` and register its room.
pub async fn create_game(state: &AppState, seats: &[Seat]) -> Game {
    let game = Game::new(Uuid::new_v4(), seats, state.config.rules);
    let game_id = game.id;
    let room = Arc::new(Mutex::new(GameRoom::new(game.clone())));
    state.games.write().await.insert(game_id, room);
    info!(%game_id, players = seats.len(), "game created");
    game
}

/// Look up a live room.
///
/// # Errors
///
/// Returns `GameNotFound` if the game is not in memory.
pub async fn room(state: &AppState, game_id: Uuid) -> Result<SharedRoom, GameError> {
    state
        .games
        .read()
        .await
        .get(&game_id)
        .cloned()
        .ok_or(GameError::GameNotFound(game_id))
}

/// Look up a live room, hydrating it from the latest stored snapshot if the
/// process no longer has it.
///
/// # Errors
///
/// Returns `GameNotFound` if neither memory nor Postgres has the game.
pub async fn room_or_hydrate(state: &AppState, game_id: Uuid) -> Result<SharedRoom, GameError> {
    if let Ok(room) = room(state, game_id).await {
        return Ok(room);
    }

    let game = match persistence::load_game(&state.pool, game_id).await {
        Ok(Some(game)) => game,
        Ok(None) => return Err(GameError::GameNotFound(game_id)),
        Err(e) => {
            error!(%game_id, error = %e, "game hydrate failed");
            return Err(GameError::GameNotFound(game_id));
        }
    };

    let mut games = state.games.write().await;
    let room = games
        .entry(game_id)
        .or_insert_with(|| Arc::new(Mutex::new(GameRoom::hydrated(game))))
        .clone();
    info!(%game_id, "game hydrated from snapshot");
    Ok(room)
}

/// Summaries of every live game.
pub async fn list_games(state: &AppState) -> Vec<GameSummary> {
    let rooms: Vec<SharedRoom> = state.games.read().await.values().cloned().collect();
    let mut summaries = Vec::with_capacity(rooms.len());
    for room in rooms {
        let room = room.lock().await;
        summaries.push(GameSummary {
            id: room.game.id,
            phase: room.game.phase,
            turn: room.game.turn,
            players: room.game.players.len(),
            connected: room.connections.len(),
        });
    }
    summaries
}

/// Copy of the current state of a live game.
///
/// # Errors
///
/// Returns `GameNotFound` if the game is not in memory.
pub async fn snapshot(state: &AppState, game_id: Uuid) -> Result<Game, GameError> {
    let room = room(state, game_id).await?;
    let room = room.lock().await;
    Ok(room.game.clone())
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Register a socket for the seat owned by `user_id`.
///
/// The new connection receives a `reconnect` snapshot first. An existing
/// registration for the same seat is replaced; dropping its sender closes the
/// stale socket's outbound channel.
///
/// # Errors
///
/// Returns `GameNotFound` for an unknown game and `NotSeated` when the
/// account does not play in it.
pub async fn connect(
    state: &AppState,
    game_id: Uuid,
    user_id: AccountId,
    tx: mpsc::Sender<ServerMessage>,
) -> Result<Joined, GameError> {
    let mut room = loop {
        let shared = room_or_hydrate(state, game_id).await?;
        let room = Arc::clone(&shared).lock_owned().await;
        // Evicted between lookup and lock: look again, which re-hydrates.
        if is_registered(state, game_id, &shared).await {
            break room;
        }
    };

    let player_id = room.game.seat_of(user_id).ok_or(GameError::NotSeated)?;
    let conn_id = Uuid::new_v4();

    let _ = tx.try_send(ServerMessage::state(EventKind::Reconnect, &room.game, Vec::new()));
    if room.connections.insert(player_id, Connection { conn_id, tx }).is_some() {
        info!(%game_id, player_id, "replaced stale connection");
    }

    let notice = ServerMessage::state(EventKind::PlayerConnected, &room.game, Vec::new());
    send_to_connections(&room, Some(player_id), &notice);
    info!(%game_id, player_id, user_id, %conn_id, "player connected");
    Ok(Joined { player_id, conn_id })
}

async fn is_registered(state: &AppState, game_id: Uuid, room: &SharedRoom) -> bool {
    state.games.read().await.get(&game_id).is_some_and(|r| Arc::ptr_eq(r, room))
}

/// Remove a socket registration if it is still the current one for its seat.
pub async fn disconnect(state: &AppState, game_id: Uuid, joined: Joined) {
    let Ok(room) = room(state, game_id).await else {
        return;
    };
    let mut room = room.lock().await;
    let current = room
        .connections
        .get(&joined.player_id)
        .is_some_and(|c| c.conn_id == joined.conn_id);
    if current {
        room.connections.remove(&joined.player_id);
        info!(%game_id, player_id = joined.player_id, "player disconnected");
    }
}

// =============================================================================
// ACTIONS
// =============================================================================

/// Apply one action and broadcast the new state to every connection.
///
/// # Errors
///
/// Returns the engine's rejection. Nothing is broadcast in that case.
pub async fn apply_action(
    state: &AppState,
    game_id: Uuid,
    player_id: PlayerId,
    action: GameAction,
) -> Result<EventKind, GameError> {
    let room = room(state, game_id).await?;
    let mut guard = room.lock().await;
    let room = &mut *guard;

    let applied = room.game.apply(player_id, action, room.dice.as_mut())?;
    room.version += 1;
    info!(
        %game_id,
        player_id,
        action = action.name(),
        event = ?applied.event,
        phase = %room.game.phase,
        "game action applied"
    );

    let event = applied.event;
    broadcast(room, &ServerMessage::state(event, &room.game, applied.notices));
    Ok(event)
}

/// Relay a chat line to every connection in the game. Game state is untouched.
///
/// # Errors
///
/// Returns `GameNotFound` or `PlayerNotFound`.
pub async fn relay_chat(state: &AppState, game_id: Uuid, player_id: PlayerId, chat: ChatPayload) -> Result<(), GameError> {
    let room = room(state, game_id).await?;
    let room = room.lock().await;
    let player = room.game.player(player_id).ok_or(GameError::PlayerNotFound(player_id))?;

    let line = ChatLine {
        sender: chat
            .sender
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| player.name.clone()),
        text: chat.text,
        color: chat
            .color
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| player.color.clone()),
    };
    broadcast(&room, &ServerMessage::chat(line));
    Ok(())
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Send a message to every connection in the room.
pub fn broadcast(room: &GameRoom, message: &ServerMessage) {
    send_to_connections(room, None, message);
}

fn send_to_connections(room: &GameRoom, exclude: Option<PlayerId>, message: &ServerMessage) {
    for (&player_id, conn) in &room.connections {
        if exclude == Some(player_id) {
            continue;
        }
        match conn.tx.try_send(message.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(game_id = %room.game.id, player_id, "client channel full; dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(game_id = %room.game.id, player_id, "client channel closed; dropping message");
            }
        }
    }
}

#[cfg(test)]
#[path = "game_test.rs"]
mod tests;
