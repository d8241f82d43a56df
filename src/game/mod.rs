//! Game rules — board, ownership, auctions, cards, and the turn engine.
//!
//! DESIGN
//! ======
//! Everything under `game` is synchronous and free of I/O. The service layer
//! owns locking, broadcast, and persistence; the engine only validates an
//! action against the current phase and mutates a `Game`.

pub mod action;
pub mod auction;
pub mod board;
pub mod cards;
pub mod dice;
pub mod engine;
pub mod event;
pub mod ownership;
pub mod player;

pub use action::{GameAction, JailChoice};
pub use engine::{Game, Phase, Rules};
pub use event::{EventKind, Notice};
pub use player::{AccountId, PlayerId, Seat};

use uuid::Uuid;

use crate::protocol::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("game not found: {0}")]
    GameNotFound(Uuid),
    #[error("you are not seated in this game")]
    NotSeated,
    #[error("unknown player: {0}")]
    PlayerNotFound(PlayerId),
    #[error("unknown square: {0}")]
    SquareNotFound(usize),
    #[error("not your turn")]
    NotYourTurn,
    #[error("action not allowed during {0}")]
    WrongPhase(Phase),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
    #[error("{0}")]
    Rule(String),
    #[error("malformed action: {0}")]
    Malformed(String),
}

impl ErrorCode for GameError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::GameNotFound(_) => "E_GAME_NOT_FOUND",
            Self::NotSeated => "E_NOT_SEATED",
            Self::PlayerNotFound(_) => "E_PLAYER_NOT_FOUND",
            Self::SquareNotFound(_) => "E_SQUARE_NOT_FOUND",
            Self::NotYourTurn => "E_NOT_YOUR_TURN",
            Self::WrongPhase(_) => "E_WRONG_PHASE",
            Self::InsufficientFunds { .. } => "E_INSUFFICIENT_FUNDS",
            Self::Rule(_) => "E_RULE_VIOLATION",
            Self::Malformed(_) => "E_MALFORMED_ACTION",
        }
    }
}
