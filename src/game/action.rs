//! Game actions accepted by the engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JailChoice {
    Pay,
    Roll,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    RollDice,
    BuyProperty,
    PassOnBuy,
    PlaceBid { amount: i64 },
    FoldAuction,
    Jail(JailChoice),
    BuildHouse { square_id: usize },
    SellHouse { square_id: usize },
    Mortgage { square_id: usize },
    Unmortgage { square_id: usize },
    DeclareBankruptcy,
    EndTurn,
    ResetGame,
}

impl GameAction {
    /// Wire name used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::RollDice => "roll_dice",
            Self::BuyProperty => "buy_property",
            Self::PassOnBuy => "pass_on_buy",
            Self::PlaceBid { .. } => "place_bid",
            Self::FoldAuction => "fold_auction",
            Self::Jail(_) => "jail_action",
            Self::BuildHouse { .. } => "build_house",
            Self::SellHouse { .. } => "SELL_HOUSE",
            Self::Mortgage { .. } => "MORTGAGE",
            Self::Unmortgage { .. } => "UNMORTGAGE",
            Self::DeclareBankruptcy => "declare_bankruptcy",
            Self::EndTurn => "end_turn",
            Self::ResetGame => "reset_game",
        }
    }
}
