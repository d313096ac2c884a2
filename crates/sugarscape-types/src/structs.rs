//! Core data structures: grid coordinates, loans, and agent state.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bits::BitString;
use crate::enums::{Sex, Tribe};
use crate::ids::AgentId;

/// A cell coordinate on the sugar grid. `(0, 0)` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl Position {
    /// Construct a position.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to `other`. For cells on a shared axis this is
    /// the number of cardinal steps between them.
    pub const fn distance(self, other: Self) -> u32 {
        self.x
            .abs_diff(other.x)
            .saturating_add(self.y.abs_diff(other.y))
    }

    /// Whether `other` lies on the same row or column.
    pub const fn is_axis_aligned_with(self, other: Self) -> bool {
        self.x == other.x || self.y == other.y
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A single outstanding loan, recorded symmetrically in both agents' books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    /// Principal still owed.
    pub amount: Decimal,
    /// Tick at which repayment is attempted.
    pub time_due: u64,
}

/// An inclusive age window, used for fertility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    /// First age (inclusive) inside the window.
    pub start: u32,
    /// Last age (inclusive) inside the window.
    pub end: u32,
}

impl AgeRange {
    /// Construct a window.
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Whether `age` falls inside the window.
    pub const fn contains(self, age: u32) -> bool {
        age >= self.start && age <= self.end
    }
}

/// Mutable per-agent record.
///
/// Loan books map a counterparty to every loan outstanding with it. The
/// lender's `loans_given` entry and the borrower's `loans_owed` entry always
/// hold the same loans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    /// Stable identifier.
    pub id: AgentId,
    /// Current cell.
    pub position: Position,
    /// Current wealth. May dip below zero after upkeep until the death check.
    pub sugar: Decimal,
    /// Starting endowment; doubles as the personal reproduction threshold.
    pub initial_sugar: Decimal,
    /// Sugar burned per tick.
    pub metabolism: Decimal,
    /// Sight radius along the four cardinal directions.
    pub vision: u32,
    /// Age in ticks.
    pub age: u32,
    /// Age beyond which the agent dies of old age.
    pub max_age: u32,
    /// Biological sex.
    pub sex: Sex,
    /// Ages at which the agent can reproduce.
    pub fertility: AgeRange,
    /// Culture tags, one bit per trait.
    pub culture: BitString,
    /// Offspring, in birth order.
    pub children: Vec<AgentId>,
    /// Total sugar received through inheritance.
    pub total_inheritance_received: Decimal,
    /// Loans this agent has made, keyed by borrower.
    pub loans_given: BTreeMap<AgentId, Vec<Loan>>,
    /// Loans this agent owes, keyed by lender.
    pub loans_owed: BTreeMap<AgentId, Vec<Loan>>,
    /// Disease strains carried. Never shrinks.
    pub diseases: Vec<BitString>,
    /// Immune memory string.
    pub immunity: BitString,
    /// Set once the agent has produced a child this tick.
    pub has_reproduced: bool,
    /// Tick of birth (0 for the seed population).
    pub born_at_tick: u64,
}

impl AgentState {
    /// Faction derived from the culture bits.
    pub fn tribe(&self) -> Tribe {
        self.culture.tribe()
    }

    /// Whether the agent is inside its fertility window.
    pub const fn is_fertile(&self) -> bool {
        self.fertility.contains(self.age)
    }

    /// Whether the agent has aged out of its fertility window.
    pub const fn is_past_fertility(&self) -> bool {
        self.age > self.fertility.end
    }

    /// Whether the agent carries any outstanding debt.
    pub fn has_debt(&self) -> bool {
        self.loans_owed.values().any(|loans| !loans.is_empty())
    }

    /// Number of individual loans this agent is owed.
    pub fn loans_given_count(&self) -> usize {
        self.loans_given.values().map(Vec::len).sum()
    }
}
