//! Per-agent context payload for an external decision oracle.
//!
//! Each tick the engine builds one [`AgentContext`] per living agent: its
//! private state plus everything inside its vision. The oracle answers with
//! one [`Decision`](crate::Decision) per context, in the same order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bits::BitString;
use crate::enums::{Sex, Tribe};
use crate::ids::AgentId;
use crate::structs::Position;

/// Everything one agent knows at the start of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContext {
    /// The agent this context describes.
    pub agent_id: AgentId,
    /// The tick being decided.
    pub tick: u64,
    /// Current cell.
    pub position: Position,
    /// Current wealth.
    pub sugar: Decimal,
    /// Sugar burned per tick.
    pub metabolism: Decimal,
    /// Sight radius.
    pub vision: u32,
    /// Age in ticks.
    pub age: u32,
    /// Age of death by old age.
    pub max_age: u32,
    /// Biological sex.
    pub sex: Sex,
    /// Derived faction.
    pub tribe: Tribe,
    /// Culture tags.
    pub culture: BitString,
    /// Whether the agent is inside its fertility window.
    pub fertile: bool,
    /// Sugar the agent must hold to reproduce.
    pub reproduction_threshold: Decimal,
    /// Outstanding loans this agent made.
    pub loans_given: Vec<LoanSummary>,
    /// Outstanding loans this agent owes.
    pub loans_owed: Vec<LoanSummary>,
    /// Number of disease strains carried.
    pub disease_count: usize,
    /// Cells inside vision along the cardinal axes.
    pub visible_cells: Vec<VisibleCell>,
    /// Agents standing on visible cells.
    pub visible_agents: Vec<VisibleAgent>,
}

/// One loan seen from one side of the books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSummary {
    /// The other party.
    pub counterparty: AgentId,
    /// Principal outstanding.
    pub amount: Decimal,
    /// Tick at which repayment is attempted.
    pub time_due: u64,
}

/// A cell inside an agent's vision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleCell {
    /// Cell coordinate.
    pub position: Position,
    /// Sugar currently on the cell.
    pub sugar: Decimal,
    /// Agent standing on the cell, if any.
    pub occupant: Option<AgentId>,
}

/// Public view of another agent inside vision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleAgent {
    /// The other agent.
    pub id: AgentId,
    /// Its cell.
    pub position: Position,
    /// Its sex.
    pub sex: Sex,
    /// Its faction.
    pub tribe: Tribe,
    /// Its wealth.
    pub sugar: Decimal,
    /// Its age.
    pub age: u32,
    /// Whether it is inside its fertility window.
    pub fertile: bool,
}
