//! Auction subsystem — bidding rotation, folds, and resolution.
//!
//! DESIGN
//! ======
//! An auction only tracks bids. Money and ownership move in the engine once
//! `bid` or `fold` reports an `AuctionOutcome`. Bids strictly increase, so
//! there are no ties, and the standing high bidder may not fold.

use serde::{Deserialize, Serialize};

use super::GameError;
use super::board::Square;
use super::player::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    #[serde(rename = "auctionProperty")]
    pub property: Square,
    pub highest_bid: i64,
    pub highest_bidder: Option<PlayerId>,
    /// Players still bidding, in rotation order.
    pub active_players: Vec<PlayerId>,
    pub turn_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuctionOutcome {
    Sold { winner: PlayerId, price: i64 },
    Unsold,
}

impl Auction {
    /// Open an auction. Returns `None` when nobody is eligible to bid.
    #[must_use]
    pub fn open(property: Square, bidders: Vec<PlayerId>) -> Option<Self> {
        if bidders.is_empty() {
            return None;
        }
        Some(Self { property, highest_bid: 0, highest_bidder: None, active_players: bidders, turn_index: 0 })
    }

    #[must_use]
    pub fn current_bidder(&self) -> Option<PlayerId> {
        self.active_players.get(self.turn_index).copied()
    }

    /// Record a bid from the player whose turn it is.
    ///
    /// # Errors
    ///
    /// Rejects bids out of turn, bids not above the standing bid, and bids
    /// above `available`.
    pub fn bid(&mut self, bidder: PlayerId, amount: i64, available: i64) -> Result<Option<AuctionOutcome>, GameError> {
        if self.current_bidder() != Some(bidder) {
            return Err(GameError::NotYourTurn);
        }
        if amount <= self.highest_bid {
            return Err(GameError::Rule(format!("bid must exceed {}", self.highest_bid)));
        }
        if amount > available {
            return Err(GameError::InsufficientFunds { needed: amount, available });
        }

        self.highest_bid = amount;
        self.highest_bidder = Some(bidder);

        if self.active_players.len() == 1 {
            return Ok(Some(AuctionOutcome::Sold { winner: bidder, price: amount }));
        }
        self.turn_index = (self.turn_index + 1) % self.active_players.len();
        Ok(None)
    }

    /// Withdraw `player` from the auction.
    ///
    /// # Errors
    ///
    /// Rejects players who are not bidding and the standing high bidder.
    pub fn fold(&mut self, player: PlayerId) -> Result<Option<AuctionOutcome>, GameError> {
        let Some(index) = self.active_players.iter().position(|&p| p == player) else {
            return Err(GameError::Rule("not bidding in this auction".into()));
        };
        if self.highest_bidder == Some(player) {
            return Err(GameError::Rule("the highest bidder cannot fold".into()));
        }

        self.active_players.remove(index);
        if index < self.turn_index {
            self.turn_index -= 1;
        }
        if self.turn_index >= self.active_players.len() {
            self.turn_index = 0;
        }

        if self.active_players.len() > 1 {
            return Ok(None);
        }
        Ok(Some(match self.highest_bidder {
            Some(winner) => AuctionOutcome::Sold { winner, price: self.highest_bid },
            None => AuctionOutcome::Unsold,
        }))
    }
}

#[cfg(test)]
#[path = "auction_test.rs"]
mod tests;
