//! Wire protocol — inbound action envelopes and outbound server messages.
//!
//! ARCHITECTURE
//! ============
//! Clients send `{action, payload}` envelopes. The gateway parses each into a
//! typed `ClientMessage` (game action or chat) or `QueueCommand` before any
//! service sees it, so the services never touch raw JSON.
//!
//! DESIGN
//! ======
//! - Outbound messages are untagged: state broadcasts carry the event name in
//!   `type`, matchmaking results carry `action: "match_found"`.
//! - Errors always carry a grepable `code` from `ErrorCode`.
//! - Action names accept both the snake_case and the uppercase spellings
//!   clients have historically sent (`MORTGAGE` / `mortgage_property`).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{AccountId, EventKind, Game, GameAction, GameError, JailChoice, Notice};
use crate::game::player::Player;

/// Longest chat line relayed, in characters.
pub const MAX_CHAT_LEN: usize = 500;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code for structured error messages.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// INBOUND
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    action: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct BidPayload {
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct JailPayload {
    action: JailChoice,
}

#[derive(Debug, Deserialize)]
struct SquarePayload {
    square_id: usize,
}

/// Chat as sent by a client. Missing sender and color fall back to the seat.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatPayload {
    #[serde(alias = "message")]
    pub text: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ClientMessage {
    Game(GameAction),
    Chat(ChatPayload),
}

fn parse_envelope(text: &str) -> Result<Envelope, GameError> {
    serde_json::from_str(text).map_err(|e| GameError::Malformed(format!("invalid json: {e}")))
}

fn payload<T: DeserializeOwned>(action: &str, value: serde_json::Value) -> Result<T, GameError> {
    let value = if value.is_null() { serde_json::json!({}) } else { value };
    serde_json::from_value(value).map_err(|e| GameError::Malformed(format!("{action}: {e}")))
}

impl ClientMessage {
    /// Parse one game-socket text frame.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Malformed` for bad JSON, unknown actions, or
    /// payloads missing required fields.
    pub fn parse(text: &str) -> Result<Self, GameError> {
        let Envelope { action, payload: body } = parse_envelope(text)?;

        let action = match action.as_str() {
            "roll_dice" => GameAction::RollDice,
            "buy_property" => GameAction::BuyProperty,
            "pass_on_buy" => GameAction::PassOnBuy,
            "place_bid" => GameAction::PlaceBid { amount: payload::<BidPayload>(&action, body)?.amount },
            "fold_auction" => GameAction::FoldAuction,
            "jail_action" => GameAction::Jail(payload::<JailPayload>(&action, body)?.action),
            "build_house" => GameAction::BuildHouse { square_id: payload::<SquarePayload>(&action, body)?.square_id },
            "SELL_HOUSE" | "sell_house" => {
                GameAction::SellHouse { square_id: payload::<SquarePayload>(&action, body)?.square_id }
            }
            "MORTGAGE" | "mortgage_property" => {
                GameAction::Mortgage { square_id: payload::<SquarePayload>(&action, body)?.square_id }
            }
            "UNMORTGAGE" | "unmortgage_property" => {
                GameAction::Unmortgage { square_id: payload::<SquarePayload>(&action, body)?.square_id }
            }
            "declare_bankruptcy" => GameAction::DeclareBankruptcy,
            "end_turn" => GameAction::EndTurn,
            "reset_game" => GameAction::ResetGame,
            "CHAT" | "chat" => {
                let chat: ChatPayload = payload(&action, body)?;
                if chat.text.trim().is_empty() {
                    return Err(GameError::Malformed("chat text is empty".into()));
                }
                if chat.text.chars().count() > MAX_CHAT_LEN {
                    return Err(GameError::Malformed(format!("chat text exceeds {MAX_CHAT_LEN} characters")));
                }
                return Ok(Self::Chat(chat));
            }
            other => return Err(GameError::Malformed(format!("unknown action: {other}"))),
        };
        Ok(Self::Game(action))
    }
}

#[derive(Debug, Default, Deserialize)]
struct JoinPayload {
    #[serde(default)]
    player_id: Option<AccountId>,
    #[serde(default)]
    target_size: Option<usize>,
    /// Friends queued together with the sender as one party.
    #[serde(default)]
    party: Vec<AccountId>,
}

/// Matchmaking socket commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueCommand {
    Join { player_id: Option<AccountId>, target_size: Option<usize>, party: Vec<AccountId> },
    Leave,
}

impl QueueCommand {
    /// Parse one matchmaking-socket text frame.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Malformed` for bad JSON or unknown actions.
    pub fn parse(text: &str) -> Result<Self, GameError> {
        let Envelope { action, payload: body } = parse_envelope(text)?;
        match action.as_str() {
            "join" => {
                let join: JoinPayload = payload(&action, body)?;
                Ok(Self::Join { player_id: join.player_id, target_size: join.target_size, party: join.party })
            }
            "leave" => Ok(Self::Leave),
            other => Err(GameError::Malformed(format!("unknown action: {other}"))),
        }
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ChatMessage,
    Error,
    QueueStatus,
    MatchFound,
}

/// A relayed chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub sender: String,
    pub text: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Full state after an accepted action, or on (re)connect.
    State {
        #[serde(rename = "type")]
        event: EventKind,
        state: Box<Game>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        events: Vec<Notice>,
    },
    Chat {
        #[serde(rename = "type")]
        kind: MessageKind,
        data: ChatLine,
    },
    Error {
        #[serde(rename = "type")]
        kind: MessageKind,
        code: &'static str,
        message: String,
    },
    QueueStatus {
        #[serde(rename = "type")]
        kind: MessageKind,
        message: String,
        queued: usize,
    },
    MatchFound {
        action: MessageKind,
        game_id: Uuid,
        players: Vec<(AccountId, Player)>,
    },
}

impl ServerMessage {
    #[must_use]
    pub fn state(event: EventKind, game: &Game, events: Vec<Notice>) -> Self {
        Self::State { event, state: Box::new(game.clone()), events }
    }

    #[must_use]
    pub fn chat(line: ChatLine) -> Self {
        Self::Chat { kind: MessageKind::ChatMessage, data: line }
    }

    #[must_use]
    pub fn error<E: ErrorCode>(err: &E) -> Self {
        Self::Error { kind: MessageKind::Error, code: err.error_code(), message: err.to_string() }
    }

    #[must_use]
    pub fn queue_status(message: impl Into<String>, queued: usize) -> Self {
        Self::QueueStatus { kind: MessageKind::QueueStatus, message: message.into(), queued }
    }

    #[must_use]
    pub fn match_found(game: &Game) -> Self {
        Self::MatchFound { action: MessageKind::MatchFound, game_id: game.id, players: game.seat_mapping() }
    }

    /// Serialize for a text frame. Falls back to `{}` on failure.
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod tests;
