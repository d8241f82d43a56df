//! Dice — the only source of randomness in a turn.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One roll of two six-sided dice. Serializes as `[a, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dice(pub u8, pub u8);

impl Dice {
    #[must_use]
    pub fn sum(self) -> usize {
        usize::from(self.0) + usize::from(self.1)
    }

    #[must_use]
    pub fn is_double(self) -> bool {
        self.0 == self.1
    }
}

/// Source of dice rolls. Production games use `RandomDice`; tests script rolls.
pub trait DiceRoller: Send {
    fn roll(&mut self) -> Dice;
}

pub struct RandomDice {
    rng: StdRng,
}

impl RandomDice {
    #[must_use]
    pub fn new() -> Self {
        Self { rng: StdRng::from_os_rng() }
    }
}

impl Default for RandomDice {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceRoller for RandomDice {
    fn roll(&mut self) -> Dice {
        Dice(self.rng.random_range(1..=6), self.rng.random_range(1..=6))
    }
}
