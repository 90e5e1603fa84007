//! Traits that plug a concrete game into the orchestration core.
//!
//! The coordinator treats outcome resolution as opaque: any type implementing
//! [`GameRules`] can back a league's `game_id`. The parity-guessing game
//! shipped here is the minimal example (two choices, a drawn value, and a
//! compare) and doubles as the reference for the match-result shape.
//!
//! The decision algorithm a Player uses is equally pluggable through
//! [`ParityStrategy`]; orchestration never looks inside it.

use rand::Rng;

use crate::protocol::{Outcome, Parity};

/// Resolution of one match once both choices are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Who won.
    pub winner: Outcome,
    /// The value drawn to decide it, if the rules draw one.
    pub drawn_value: Option<u32>,
}

/// Game-specific outcome resolution, selected per `game_id`.
pub trait GameRules: Send + Sync {
    /// The game type these rules implement.
    fn game_id(&self) -> &str;

    /// Resolves a match from both players' choices.
    fn resolve(&self, choice_a: Parity, choice_b: Parity) -> Resolution;
}

/// The parity-guessing game: draw a value in a configured inclusive range,
/// exactly one correct guesser wins, both-right or both-wrong is a draw.
#[derive(Debug, Clone)]
pub struct ParityRules {
    min: u32,
    max: u32,
}

impl ParityRules {
    /// Rules drawing values from `min..=max`.
    pub fn new(min: u32, max: u32) -> Self {
        assert!(min <= max, "empty draw range");
        ParityRules { min, max }
    }
}

impl GameRules for ParityRules {
    fn game_id(&self) -> &str {
        "parity_guess"
    }

    fn resolve(&self, choice_a: Parity, choice_b: Parity) -> Resolution {
        let drawn = rand::thread_rng().gen_range(self.min..=self.max);
        let parity = Parity::of(drawn);
        let winner = match (choice_a == parity, choice_b == parity) {
            (true, false) => Outcome::PlayerA,
            (false, true) => Outcome::PlayerB,
            _ => Outcome::Draw,
        };
        Resolution {
            winner,
            drawn_value: Some(drawn),
        }
    }
}

/// What a Player consults to make its parity call.
pub trait ParityStrategy: Send {
    /// Picks a call for the upcoming draw.
    fn choose(&mut self) -> Parity;
}

impl ParityStrategy for Box<dyn ParityStrategy> {
    fn choose(&mut self) -> Parity {
        (**self).choose()
    }
}

/// Coin-flip strategy, the harness default.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomParity;

impl ParityStrategy for RandomParity {
    fn choose(&mut self) -> Parity {
        if rand::thread_rng().gen_bool(0.5) {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

/// Always calls the same parity. Handy for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedParity(pub Parity);

impl ParityStrategy for FixedParity {
    fn choose(&mut self) -> Parity {
        self.0
    }
}

#[cfg(test)]
mod game_tests {
    use super::*;

    #[test]
    fn exactly_one_correct_guess_wins() {
        let rules = ParityRules::new(4, 4); // drawn value is always 4, even
        let resolution = rules.resolve(Parity::Even, Parity::Odd);
        assert_eq!(resolution.winner, Outcome::PlayerA);
        assert_eq!(resolution.drawn_value, Some(4));
        let resolution = rules.resolve(Parity::Odd, Parity::Even);
        assert_eq!(resolution.winner, Outcome::PlayerB);
    }

    #[test]
    fn both_right_or_both_wrong_is_a_draw() {
        let rules = ParityRules::new(7, 7);
        assert_eq!(rules.resolve(Parity::Odd, Parity::Odd).winner, Outcome::Draw);
        assert_eq!(rules.resolve(Parity::Even, Parity::Even).winner, Outcome::Draw);
    }

    #[test]
    fn drawn_value_stays_in_range() {
        let rules = ParityRules::new(10, 20);
        for _ in 0..100 {
            let drawn = rules.resolve(Parity::Even, Parity::Even).drawn_value.unwrap();
            assert!((10..=20).contains(&drawn));
        }
    }

    #[test]
    fn rules_are_object_safe() {
        let rules: Box<dyn GameRules> = Box::new(ParityRules::new(1, 100));
        assert_eq!(rules.game_id(), "parity_guess");
    }

    #[test]
    fn fixed_strategy_is_fixed() {
        let mut strategy = FixedParity(Parity::Odd);
        assert_eq!(strategy.choose(), Parity::Odd);
        assert_eq!(strategy.choose(), Parity::Odd);
    }
}
