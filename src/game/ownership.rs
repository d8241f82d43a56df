//! Property ownership store — owner, houses, and mortgage overlay.
//!
//! DESIGN
//! ======
//! One `MutableProperty` exists for every purchasable square, keyed by square
//! id. Rent and group queries take the static `Board` so the store itself
//! holds only mutable facts. Invariant: `houses > 0` implies an owner and no
//! mortgage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::board::{Board, ColorGroup, Square, SquareKind};
use super::player::PlayerId;

pub const MAX_HOUSES: u8 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutableProperty {
    pub owner_id: Option<PlayerId>,
    pub houses: u8,
    pub is_mortgaged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyStore(BTreeMap<usize, MutableProperty>);

impl PropertyStore {
    /// Unowned entries for every purchasable square on the board.
    #[must_use]
    pub fn for_board(board: &Board) -> Self {
        Self(board.purchasable().map(|s| (s.id, MutableProperty::default())).collect())
    }

    #[must_use]
    pub fn get(&self, square_id: usize) -> Option<&MutableProperty> {
        self.0.get(&square_id)
    }

    pub fn get_mut(&mut self, square_id: usize) -> Option<&mut MutableProperty> {
        self.0.get_mut(&square_id)
    }

    #[must_use]
    pub fn owner(&self, square_id: usize) -> Option<PlayerId> {
        self.0.get(&square_id).and_then(|p| p.owner_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &MutableProperty)> {
        self.0.iter().map(|(id, p)| (*id, p))
    }

    /// Squares of `kind` owned by `owner`, mortgaged or not.
    #[must_use]
    pub fn owned_count(&self, board: &Board, owner: PlayerId, kind: SquareKind) -> usize {
        self.iter()
            .filter(|(id, p)| p.owner_id == Some(owner) && board.square(*id).is_some_and(|s| s.kind == kind))
            .count()
    }

    #[must_use]
    pub fn owns_group(&self, board: &Board, owner: PlayerId, group: ColorGroup) -> bool {
        board.group_members(group).all(|s| self.owner(s.id) == Some(owner))
    }

    /// House counts across a color group, in board order.
    #[must_use]
    pub fn group_houses(&self, board: &Board, group: ColorGroup) -> Vec<u8> {
        board
            .group_members(group)
            .map(|s| self.get(s.id).map_or(0, |p| p.houses))
            .collect()
    }

    #[must_use]
    pub fn group_has_mortgage(&self, board: &Board, group: ColorGroup) -> bool {
        board
            .group_members(group)
            .any(|s| self.get(s.id).is_some_and(|p| p.is_mortgaged))
    }

    /// Whether `owner` has anything left to sell or mortgage.
    #[must_use]
    pub fn has_liquid_assets(&self, owner: PlayerId) -> bool {
        self.0
            .values()
            .any(|p| p.owner_id == Some(owner) && (p.houses > 0 || !p.is_mortgaged))
    }

    /// Total buildings `owner` holds, split into (houses, hotels).
    #[must_use]
    pub fn buildings(&self, owner: PlayerId) -> (i64, i64) {
        self.0
            .values()
            .filter(|p| p.owner_id == Some(owner))
            .fold((0, 0), |(houses, hotels), p| match p.houses {
                MAX_HOUSES => (houses, hotels + 1),
                n => (houses + i64::from(n), hotels),
            })
    }

    /// Rent owed by a visitor landing on `square`. Zero when unowned or mortgaged.
    #[must_use]
    pub fn rent(&self, board: &Board, square: &Square, dice_sum: usize) -> i64 {
        let Some(details) = &square.details else {
            return 0;
        };
        let Some(prop) = self.get(square.id) else {
            return 0;
        };
        let Some(owner) = prop.owner_id else {
            return 0;
        };
        if prop.is_mortgaged {
            return 0;
        }

        match square.kind {
            SquareKind::Property => {
                if prop.houses == 0 {
                    let base = details.rent.first().copied().unwrap_or(0);
                    if self.owns_group(board, owner, details.color) { base * 2 } else { base }
                } else {
                    details.rent.get(usize::from(prop.houses)).copied().unwrap_or(0)
                }
            }
            SquareKind::Railroad => {
                let owned = self.owned_count(board, owner, SquareKind::Railroad);
                let index = owned.clamp(1, details.rent.len()) - 1;
                details.rent.get(index).copied().unwrap_or(0)
            }
            SquareKind::Utility => {
                let owned = self.owned_count(board, owner, SquareKind::Utility);
                let index = owned.clamp(1, details.rent.len()) - 1;
                let multiplier = details.rent.get(index).copied().unwrap_or(0);
                multiplier * i64::try_from(dice_sum).unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Hand every square `from` owns to `to`. Buildings must already be gone.
    pub fn transfer_all(&mut self, from: PlayerId, to: PlayerId) -> Vec<usize> {
        let mut moved = Vec::new();
        for (id, prop) in &mut self.0 {
            if prop.owner_id == Some(from) {
                prop.owner_id = Some(to);
                moved.push(*id);
            }
        }
        moved
    }

    /// Return every square `owner` holds to the bank, clean.
    pub fn release_all(&mut self, owner: PlayerId) {
        for prop in self.0.values_mut() {
            if prop.owner_id == Some(owner) {
                *prop = MutableProperty::default();
            }
        }
    }
}

#[cfg(test)]
#[path = "ownership_test.rs"]
mod tests;
