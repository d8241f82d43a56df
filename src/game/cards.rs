//! Chance and Community Chest decks.
//!
//! Decks are shuffled once per game. A drawn card goes to the back of the
//! deck, except a get-out-of-jail-free card, which stays in the drawer's hand
//! until it is used or forfeited and then goes to the back.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::board::SquareKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckKind {
    Chance,
    CommunityChest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Card {
    /// Advance to a square, collecting the Go bonus when the move wraps.
    Move { target: usize, text: String },
    /// Advance to the next square of a kind (railroad or utility).
    Nearest { target: SquareKind, text: String },
    Back { steps: usize, text: String },
    Money { amount: i64, text: String },
    GoToJail { text: String },
    Repairs { per_house: i64, per_hotel: i64, text: String },
    JailFree { text: String },
    /// Every other solvent player pays the drawer.
    FromPlayers { amount: i64, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deck {
    cards: VecDeque<Card>,
}

impl Deck {
    fn shuffled(mut cards: Vec<Card>) -> Self {
        cards.shuffle(&mut StdRng::from_os_rng());
        Self { cards: cards.into() }
    }

    #[must_use]
    pub fn chance() -> Self {
        Self::shuffled(chance_cards())
    }

    #[must_use]
    pub fn community_chest() -> Self {
        Self::shuffled(community_chest_cards())
    }

    /// Deck in a fixed order, top card first.
    #[must_use]
    pub fn stacked(cards: Vec<Card>) -> Self {
        Self { cards: cards.into() }
    }

    /// Take the top card. Everything except `JailFree` returns to the bottom.
    pub fn draw(&mut self) -> Option<Card> {
        let card = self.cards.pop_front()?;
        if !matches!(card, Card::JailFree { .. }) {
            self.cards.push_back(card.clone());
        }
        Some(card)
    }

    /// Return a held card to the bottom of the deck.
    pub fn put_back(&mut self, card: Card) {
        self.cards.push_back(card);
    }

    /// Take one copy of `card` out of the deck. Used when a rebuilt deck must
    /// not contain cards that players are still holding.
    pub fn withhold(&mut self, card: &Card) -> bool {
        let Some(index) = self.cards.iter().position(|c| c == card) else {
            return false;
        };
        self.cards.remove(index);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

fn mv(target: usize, text: &str) -> Card {
    Card::Move { target, text: text.into() }
}

fn money(amount: i64, text: &str) -> Card {
    Card::Money { amount, text: text.into() }
}

#[must_use]
pub fn chance_cards() -> Vec<Card> {
    vec![
        mv(0, "Advance to Go (Collect $200)"),
        mv(24, "Advance to Illinois Avenue"),
        mv(11, "Advance to St. Charles Place"),
        Card::Nearest { target: SquareKind::Railroad, text: "Advance to the nearest Railroad".into() },
        Card::Nearest { target: SquareKind::Utility, text: "Advance to the nearest Utility".into() },
        Card::Back { steps: 3, text: "Go back 3 spaces".into() },
        money(50, "Bank pays you dividend of $50"),
        money(-15, "Pay poor tax of $15"),
        Card::GoToJail { text: "Go directly to Jail".into() },
        Card::Repairs { per_house: 25, per_hotel: 100, text: "Make general repairs on all your property".into() },
        Card::JailFree { text: "Get out of Jail Free".into() },
    ]
}

#[must_use]
pub fn community_chest_cards() -> Vec<Card> {
    vec![
        mv(0, "Advance to Go (Collect $200)"),
        money(200, "Bank error in your favor. Collect $200"),
        money(100, "Life insurance matures. Collect $100"),
        money(-50, "Doctor's fee. Pay $50"),
        money(-100, "Hospital fees. Pay $100"),
        Card::GoToJail { text: "Go directly to Jail".into() },
        Card::JailFree { text: "Get out of Jail Free".into() },
        Card::FromPlayers { amount: 50, text: "Grand Opera Night. Collect $50 from every player".into() },
    ]
}
