//! Board model — the 40 static squares.
//!
//! DESIGN
//! ======
//! The board is immutable after load and shared by every game through an
//! `Arc`. The standard layout is built in code; `BOARD_CONFIG` may point at a
//! JSON file with the same shape to replace it at startup. Purchasable squares
//! carry `PropertyDetails` flattened into the square so the wire shape matches
//! what clients render (`price`, `rent`, `house_cost`, `color`).

use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: usize = 40;
pub const JAIL_SQUARE: usize = 10;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SquareKind {
    Go,
    Property,
    Railroad,
    Utility,
    Tax,
    Chance,
    Community,
    Jail,
    FreeParking,
    GoToJail,
}

impl SquareKind {
    #[must_use]
    pub fn is_purchasable(self) -> bool {
        matches!(self, Self::Property | Self::Railroad | Self::Utility)
    }
}

/// Color group a purchasable square belongs to. Railroads and utilities form
/// their own groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColorGroup {
    Brown,
    LightBlue,
    Pink,
    Orange,
    Red,
    Yellow,
    Green,
    DarkBlue,
    Railroad,
    Utility,
}

/// Purchase and rent data for property, railroad, and utility squares.
///
/// `rent` holds six entries for streets (unimproved, 1-4 houses, hotel), four
/// for railroads (1-4 owned), and two dice multipliers for utilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDetails {
    pub price: i64,
    pub rent: Vec<i64>,
    #[serde(default)]
    pub house_cost: i64,
    pub color: ColorGroup,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    pub id: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SquareKind,
    #[serde(flatten)]
    pub details: Option<PropertyDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<i64>,
}

impl Square {
    #[must_use]
    pub fn price(&self) -> i64 {
        self.details.as_ref().map_or(0, |d| d.price)
    }

    #[must_use]
    pub fn group(&self) -> Option<ColorGroup> {
        self.details.as_ref().map(|d| d.color)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("board must have {BOARD_SIZE} squares, found {0}")]
    WrongSize(usize),
    #[error("square at index {index} has id {id}")]
    OutOfOrder { index: usize, id: usize },
    #[error("square {0} is purchasable but has no price data")]
    MissingDetails(usize),
    #[error("square {id} has {found} rent entries, expected {expected}")]
    RentShape { id: usize, found: usize, expected: usize },
    #[error("tax square {0} has no tax_amount")]
    MissingTax(usize),
    #[error("failed to read board file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid board json: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// BOARD
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    squares: Vec<Square>,
}

impl Board {
    /// Validate and wrap a list of squares.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is not 40 squares in id order, or a
    /// purchasable or tax square lacks the data needed to price it.
    pub fn new(squares: Vec<Square>) -> Result<Self, BoardError> {
        if squares.len() != BOARD_SIZE {
            return Err(BoardError::WrongSize(squares.len()));
        }
        for (index, square) in squares.iter().enumerate() {
            if square.id != index {
                return Err(BoardError::OutOfOrder { index, id: square.id });
            }
            if square.kind.is_purchasable() {
                let Some(details) = &square.details else {
                    return Err(BoardError::MissingDetails(square.id));
                };
                let expected = match square.kind {
                    SquareKind::Railroad => 4,
                    SquareKind::Utility => 2,
                    _ => 6,
                };
                if details.rent.len() != expected {
                    return Err(BoardError::RentShape { id: square.id, found: details.rent.len(), expected });
                }
            }
            if square.kind == SquareKind::Tax && square.tax_amount.is_none() {
                return Err(BoardError::MissingTax(square.id));
            }
        }
        Ok(Self { squares })
    }

    /// Parse a board from its JSON representation (an array of squares).
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails validation.
    pub fn from_json(raw: &str) -> Result<Self, BoardError> {
        let squares: Vec<Square> = serde_json::from_str(raw)?;
        Self::new(squares)
    }

    /// Load a board JSON file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load(path: &Path) -> Result<Self, BoardError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// The classic US layout, with Vermont Avenue at 7 and Chance at 8.
    #[must_use]
    pub fn standard() -> Self {
        use ColorGroup::*;

        let squares = vec![
            special(0, "Go", SquareKind::Go),
            street(1, "Mediterranean Avenue", Brown, 60, 50, [2, 10, 30, 90, 160, 250]),
            special(2, "Community Chest", SquareKind::Community),
            street(3, "Baltic Avenue", Brown, 60, 50, [4, 20, 60, 180, 320, 450]),
            tax(4, "Income Tax", 200),
            railroad(5, "Reading Railroad"),
            street(6, "Oriental Avenue", LightBlue, 100, 50, [6, 30, 90, 270, 400, 550]),
            street(7, "Vermont Avenue", LightBlue, 100, 50, [6, 30, 90, 270, 400, 550]),
            special(8, "Chance", SquareKind::Chance),
            street(9, "Connecticut Avenue", LightBlue, 120, 50, [8, 40, 100, 300, 450, 600]),
            special(10, "Jail", SquareKind::Jail),
            street(11, "St. Charles Place", Pink, 140, 100, [10, 50, 150, 450, 625, 750]),
            utility(12, "Electric Company"),
            street(13, "States Avenue", Pink, 140, 100, [10, 50, 150, 450, 625, 750]),
            street(14, "Virginia Avenue", Pink, 160, 100, [12, 60, 180, 500, 700, 900]),
            railroad(15, "Pennsylvania Railroad"),
            street(16, "St. James Place", Orange, 180, 100, [14, 70, 200, 550, 750, 950]),
            special(17, "Community Chest", SquareKind::Community),
            street(18, "Tennessee Avenue", Orange, 180, 100, [14, 70, 200, 550, 750, 950]),
            street(19, "New York Avenue", Orange, 200, 100, [16, 80, 220, 600, 800, 1000]),
            special(20, "Free Parking", SquareKind::FreeParking),
            street(21, "Kentucky Avenue", Red, 220, 150, [18, 90, 250, 700, 875, 1050]),
            special(22, "Chance", SquareKind::Chance),
            street(23, "Indiana Avenue", Red, 220, 150, [18, 90, 250, 700, 875, 1050]),
            street(24, "Illinois Avenue", Red, 240, 150, [20, 100, 300, 750, 925, 1100]),
            railroad(25, "B. & O. Railroad"),
            street(26, "Atlantic Avenue", Yellow, 260, 150, [22, 110, 330, 800, 975, 1150]),
            street(27, "Ventnor Avenue", Yellow, 260, 150, [22, 110, 330, 800, 975, 1150]),
            utility(28, "Water Works"),
            street(29, "Marvin Gardens", Yellow, 280, 150, [24, 120, 360, 850, 1025, 1200]),
            special(30, "Go To Jail", SquareKind::GoToJail),
            street(31, "Pacific Avenue", Green, 300, 200, [26, 130, 390, 900, 1100, 1275]),
            street(32, "North Carolina Avenue", Green, 300, 200, [26, 130, 390, 900, 1100, 1275]),
            special(33, "Community Chest", SquareKind::Community),
            street(34, "Pennsylvania Avenue", Green, 320, 200, [28, 150, 450, 1000, 1200, 1400]),
            railroad(35, "Short Line"),
            special(36, "Chance", SquareKind::Chance),
            street(37, "Park Place", DarkBlue, 350, 200, [35, 175, 500, 1100, 1300, 1500]),
            tax(38, "Luxury Tax", 100),
            street(39, "Boardwalk", DarkBlue, 400, 200, [50, 200, 600, 1400, 1700, 2000]),
        ];
        Self { squares }
    }

    #[must_use]
    pub fn square(&self, id: usize) -> Option<&Square> {
        self.squares.get(id)
    }

    #[must_use]
    pub fn squares(&self) -> &[Square] {
        &self.squares
    }

    /// Every square in a color group, in board order.
    pub fn group_members(&self, group: ColorGroup) -> impl Iterator<Item = &Square> {
        self.squares.iter().filter(move |s| s.group() == Some(group))
    }

    pub fn purchasable(&self) -> impl Iterator<Item = &Square> {
        self.squares.iter().filter(|s| s.kind.is_purchasable())
    }

    /// First square of `kind` strictly ahead of `from`, wrapping past Go.
    #[must_use]
    pub fn nearest(&self, from: usize, kind: SquareKind) -> Option<usize> {
        (1..=BOARD_SIZE)
            .map(|step| (from + step) % BOARD_SIZE)
            .find(|&id| self.squares[id].kind == kind)
    }
}

fn special(id: usize, name: &str, kind: SquareKind) -> Square {
    Square { id, name: name.into(), kind, details: None, tax_amount: None }
}

fn tax(id: usize, name: &str, amount: i64) -> Square {
    Square { id, name: name.into(), kind: SquareKind::Tax, details: None, tax_amount: Some(amount) }
}

fn street(id: usize, name: &str, color: ColorGroup, price: i64, house_cost: i64, rent: [i64; 6]) -> Square {
    Square {
        id,
        name: name.into(),
        kind: SquareKind::Property,
        details: Some(PropertyDetails { price, rent: rent.to_vec(), house_cost, color }),
        tax_amount: None,
    }
}

fn railroad(id: usize, name: &str) -> Square {
    Square {
        id,
        name: name.into(),
        kind: SquareKind::Railroad,
        details: Some(PropertyDetails {
            price: 200,
            rent: vec![25, 50, 100, 200],
            house_cost: 0,
            color: ColorGroup::Railroad,
        }),
        tax_amount: None,
    }
}

fn utility(id: usize, name: &str) -> Square {
    Square {
        id,
        name: name.into(),
        kind: SquareKind::Utility,
        details: Some(PropertyDetails { price: 150, rent: vec![4, 10], house_cost: 0, color: ColorGroup::Utility }),
        tax_amount: None,
    }
}

// =============================================================================
// SHARED INSTANCE
// =============================================================================

static SHARED: OnceLock<Arc<Board>> = OnceLock::new();

/// Install the process-wide board. Returns `false` if one was already set.
pub fn install(board: Board) -> bool {
    SHARED.set(Arc::new(board)).is_ok()
}

/// The process-wide board, defaulting to the standard layout.
#[must_use]
pub fn shared() -> Arc<Board> {
    SHARED.get_or_init(|| Arc::new(Board::standard())).clone()
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
