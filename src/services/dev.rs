//! Dev overrides — direct edits to a live game for manual testing.
//!
//! Only reachable when `ENABLE_DEV_ROUTES` is set. Overrides bypass the turn
//! rules but still go through the room lock, bump the version so the change
//! is persisted, and broadcast a `dev_update` to every connection.

use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::game::board::BOARD_SIZE;
use crate::game::{EventKind, Game, GameError, Phase, PlayerId};
use crate::protocol::{ErrorCode, ServerMessage};
use crate::services::game::{broadcast, room};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum DevUpdate {
    Player { player_id: PlayerId, field: String, value: Value },
    Game { field: String, value: Value },
    AddProperty { player_id: PlayerId, value: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DevError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ErrorCode for DevError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Game(e) => e.error_code(),
            Self::UnknownField(_) => "E_UNKNOWN_FIELD",
            Self::InvalidValue { .. } => "E_INVALID_VALUE",
        }
    }
}

fn invalid(field: &str, reason: &str) -> DevError {
    DevError::InvalidValue { field: field.to_string(), reason: reason.to_string() }
}

fn as_bool(field: &str, value: &Value) -> Result<bool, DevError> {
    value.as_bool().ok_or_else(|| invalid(field, "expected a boolean"))
}

fn as_int<T: TryFrom<i64>>(field: &str, value: &Value) -> Result<T, DevError> {
    value
        .as_i64()
        .and_then(|n| T::try_from(n).ok())
        .ok_or_else(|| invalid(field, "expected an integer in range"))
}

/// Apply an override to a game in place.
///
/// # Errors
///
/// Returns `PlayerNotFound`/`SquareNotFound`, an unknown field, or a value of
/// the wrong shape. The game is untouched on error.
pub fn apply_to_game(game: &mut Game, update: &DevUpdate) -> Result<(), DevError> {
    match update {
        DevUpdate::Player { player_id, field, value } => {
            let player = game.players.get_mut(*player_id).ok_or(GameError::PlayerNotFound(*player_id))?;
            match field.as_str() {
                "money" => player.money = as_int(field, value)?,
                "position" => {
                    let position: usize = as_int(field, value)?;
                    if position >= BOARD_SIZE {
                        return Err(invalid(field, "off the board"));
                    }
                    player.position = position;
                }
                "in_jail" => player.in_jail = as_bool(field, value)?,
                "jail_turns" => player.jail_turns = as_int(field, value)?,
                "get_out_of_jail_free" => {
                    player.get_out_of_jail_free = as_int(field, value)?;
                    game.return_surplus_cards(*player_id);
                }
                "is_bankrupt" => player.is_bankrupt = as_bool(field, value)?,
                "name" => {
                    let name = value.as_str().map(str::trim).filter(|s| !s.is_empty());
                    player.name = name.ok_or_else(|| invalid(field, "expected a non-empty string"))?.to_string();
                }
                other => return Err(DevError::UnknownField(other.to_string())),
            }
        }
        DevUpdate::Game { field, value } => match field.as_str() {
            "phase" => {
                game.phase = Phase::deserialize(value).map_err(|e| invalid(field, &e.to_string()))?;
            }
            "turn" => {
                let turn: PlayerId = as_int(field, value)?;
                if turn >= game.players.len() {
                    return Err(GameError::PlayerNotFound(turn).into());
                }
                game.turn = turn;
            }
            other => return Err(DevError::UnknownField(other.to_string())),
        },
        DevUpdate::AddProperty { player_id, value } => game.grant_property(*player_id, *value)?,
    }
    Ok(())
}

/// Apply an override to a live game and broadcast the result.
///
/// # Errors
///
/// See `apply_to_game`; also `GameNotFound`.
pub async fn apply_dev_update(state: &AppState, game_id: Uuid, update: DevUpdate) -> Result<Game, DevError> {
    let room = room(state, game_id).await?;
    let mut room = room.lock().await;

    let mut next = room.game.clone();
    apply_to_game(&mut next, &update)?;
    room.game = next;
    room.version += 1;
    info!(%game_id, ?update, "dev override applied");

    broadcast(&room, &ServerMessage::state(EventKind::DevUpdate, &room.game, Vec::new()));
    Ok(room.game.clone())
}

#[cfg(test)]
#[path = "dev_test.rs"]
mod tests;
