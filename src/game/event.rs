//! Broadcast event names and the notices an action produced.

use serde::{Deserialize, Serialize};

use super::cards::{Card, DeckKind};
use super::dice::Dice;
use super::player::PlayerId;

/// The `type` field of a state broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    GameUpdate,
    PropertyBought,
    AuctionStarted,
    AuctionUpdate,
    AuctionFinished,
    HouseBuilt,
    HouseSold,
    PropertyMortgaged,
    PropertyUnmortgaged,
    PlayerBankrupt,
    EndTurn,
    ResetGame,
    Reconnect,
    PlayerConnected,
    DevUpdate,
}

/// Something that happened while applying an action, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    DiceRolled { player_id: PlayerId, dice: Dice },
    PassedGo { player_id: PlayerId, amount: i64 },
    Moved { player_id: PlayerId, position: usize },
    RentPaid { from: PlayerId, to: PlayerId, square_id: usize, amount: i64 },
    TaxPaid { player_id: PlayerId, amount: i64 },
    CardDrawn { player_id: PlayerId, deck: DeckKind, card: Card },
    Collected { from: PlayerId, to: PlayerId, amount: i64 },
    SentToJail { player_id: PlayerId },
    ReleasedFromJail { player_id: PlayerId },
    PropertyBought { player_id: PlayerId, square_id: usize, price: i64 },
    AuctionStarted { square_id: usize },
    BidPlaced { player_id: PlayerId, amount: i64 },
    Folded { player_id: PlayerId },
    AuctionWon { player_id: PlayerId, square_id: usize, price: i64 },
    AuctionUnsold { square_id: usize },
    HouseBuilt { player_id: PlayerId, square_id: usize, houses: u8 },
    HouseSold { player_id: PlayerId, square_id: usize, houses: u8 },
    Mortgaged { player_id: PlayerId, square_id: usize, amount: i64 },
    Unmortgaged { player_id: PlayerId, square_id: usize, amount: i64 },
    DebtOwed { player_id: PlayerId, amount: i64 },
    DebtSettled { player_id: PlayerId },
    Bankrupt { player_id: PlayerId, creditor: Option<PlayerId> },
    TurnStarted { player_id: PlayerId },
    GameOver { winner: PlayerId },
}
