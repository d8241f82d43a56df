//! Player registry entries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Per-game seat index (0..n in seat order).
pub type PlayerId = usize;

/// Account id from the `users` table.
pub type AccountId = i64;

const PALETTE: [&str; 4] = ["#E53935", "#1E88E5", "#43A047", "#FDD835"];

/// Who sits where when a game is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub user_id: AccountId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub user_id: AccountId,
    pub name: String,
    /// Negative only while a debt is outstanding.
    pub money: i64,
    pub position: usize,
    pub color: String,
    pub properties: BTreeSet<usize>,
    pub in_jail: bool,
    pub jail_turns: u8,
    pub get_out_of_jail_free: u32,
    pub is_bankrupt: bool,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, seat: &Seat, money: i64) -> Self {
        Self {
            id,
            user_id: seat.user_id,
            name: seat.name.clone(),
            money,
            position: 0,
            color: PALETTE[id % PALETTE.len()].to_string(),
            properties: BTreeSet::new(),
            in_jail: false,
            jail_turns: 0,
            get_out_of_jail_free: 0,
            is_bankrupt: false,
        }
    }

    #[must_use]
    pub fn seat(&self) -> Seat {
        Seat { user_id: self.user_id, name: self.name.clone() }
    }
}
