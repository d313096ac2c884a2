//! Tunable parameters for the agent rules.
//!
//! [`RuleConfig`] bundles every constant a rule reads so the tick cycle
//! and tests can override the defaults. The core crate builds it from the
//! `rules` and `population` sections of `sugarscape-config.yaml`.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sugarscape_types::{AgeRange, Sex};

/// An inclusive range of whole numbers sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformRange {
    /// Smallest value.
    pub min: u32,
    /// Largest value.
    pub max: u32,
}

impl UniformRange {
    /// Create a range. The bounds are swapped if given in reverse.
    pub const fn new(min: u32, max: u32) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Draw a value in `min..=max`.
    pub fn sample(&self, rng: &mut impl Rng) -> u32 {
        let range = Self::new(self.min, self.max);
        rng.random_range(range.min..=range.max)
    }
}

/// Parameters read by the behaviour rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleConfig {
    /// Most sugar an attacker can take from one victim (default: 10).
    pub combat_limit: Decimal,

    /// Interest charged on a loan at its due date (default: 0.10).
    pub interest_rate: Decimal,

    /// Ticks between issuing a loan and its due date (default: 10).
    pub loan_duration: u64,

    /// Range a newborn's `max_age` is drawn from (default: 60--100).
    pub lifespan: UniformRange,

    /// Fertility window for females (default: 12--40).
    pub female_fertility: AgeRange,

    /// Fertility window for males (default: 12--50).
    pub male_fertility: AgeRange,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            combat_limit: Decimal::new(10, 0),
            interest_rate: Decimal::new(10, 2),
            loan_duration: 10,
            lifespan: UniformRange::new(60, 100),
            female_fertility: AgeRange::new(12, 40),
            male_fertility: AgeRange::new(12, 50),
        }
    }
}

impl RuleConfig {
    /// Fertility window for an agent of the given sex.
    pub const fn fertility_for(&self, sex: Sex) -> AgeRange {
        match sex {
            Sex::Female => self.female_fertility,
            Sex::Male => self.male_fertility,
        }
    }
}
