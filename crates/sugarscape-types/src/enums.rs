//! Small enumerations shared across the workspace.

use serde::{Deserialize, Serialize};

/// Biological sex of an agent. Reproduction pairs opposite sexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    /// Female agent.
    Female,
    /// Male agent.
    Male,
}

impl Sex {
    /// The other sex.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Female => Self::Male,
            Self::Male => Self::Female,
        }
    }
}

impl core::fmt::Display for Sex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Female => write!(f, "female"),
            Self::Male => write!(f, "male"),
        }
    }
}

/// Binary faction derived from a majority vote over an agent's culture bits.
///
/// Never stored: see [`BitString::tribe`](crate::BitString::tribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tribe {
    /// Strict majority of culture bits are set.
    Red,
    /// Set bits are not a strict majority (ties land here).
    Blue,
}

impl core::fmt::Display for Tribe {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Blue => write!(f, "blue"),
        }
    }
}
