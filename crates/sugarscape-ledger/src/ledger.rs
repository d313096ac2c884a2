//! The append-only sugar ledger.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::trace;

use sugarscape_types::{AgentId, Position};

use crate::LedgerError;
use crate::conservation::{self, ConservationResult, FlowTotals};

/// One side of a sugar movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// Outside the simulation: the origin of new sugar.
    Environment,
    /// The grid as a whole, used for aggregated growback.
    Landscape,
    /// A single grid cell.
    Cell(Position),
    /// A living agent.
    Agent(AgentId),
    /// Outside the simulation: where burned or discarded sugar goes.
    Void,
}

impl Party {
    const fn label(self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Landscape => "landscape",
            Self::Cell(_) => "cell",
            Self::Agent(_) => "agent",
            Self::Void => "void",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cell(pos) => write!(f, "cell {pos}"),
            Self::Agent(id) => write!(f, "agent {id}"),
            other => f.write_str(other.label()),
        }
    }
}

/// How a flow affects the total sugar in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    /// Sugar enters the simulation.
    Source,
    /// Sugar leaves the simulation.
    Sink,
    /// Sugar moves between holders.
    Internal,
}

/// The kind of sugar movement recorded by an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Cells regrow toward capacity.
    Growback,
    /// A negative balance is cleared when its holder dies.
    DebtWriteOff,
    /// Per-tick upkeep burned by an agent.
    Metabolism,
    /// Sugar lost to an uncovered disease.
    DiseasePenalty,
    /// An estate or inheritance remainder with nowhere to go.
    Discard,
    /// An agent collects the sugar on a cell.
    Harvest,
    /// An attacker takes sugar from its victim.
    CombatLoot,
    /// A lender transfers principal to a borrower.
    Loan,
    /// A borrower pays a lender back.
    Repayment,
    /// A dying agent's estate passes to a child.
    Inheritance,
    /// A parent endows a newborn child.
    Endowment,
}

impl FlowKind {
    /// Whether this kind creates, destroys, or moves sugar.
    pub const fn direction(self) -> FlowDirection {
        match self {
            Self::Growback | Self::DebtWriteOff => FlowDirection::Source,
            Self::Metabolism | Self::DiseasePenalty | Self::Discard => FlowDirection::Sink,
            Self::Harvest
            | Self::CombatLoot
            | Self::Loan
            | Self::Repayment
            | Self::Inheritance
            | Self::Endowment => FlowDirection::Internal,
        }
    }

    /// Check that `from` and `to` are the parties this kind moves sugar between.
    fn check_parties(self, from: Party, to: Party) -> Result<(), LedgerError> {
        let (from_ok, from_expected, to_ok, to_expected) = match self {
            Self::Growback => (
                matches!(from, Party::Environment),
                "environment",
                matches!(to, Party::Landscape | Party::Cell(_)),
                "landscape or cell",
            ),
            Self::DebtWriteOff => (
                matches!(from, Party::Environment),
                "environment",
                matches!(to, Party::Agent(_)),
                "agent",
            ),
            Self::Metabolism | Self::DiseasePenalty | Self::Discard => (
                matches!(from, Party::Agent(_)),
                "agent",
                matches!(to, Party::Void),
                "void",
            ),
            Self::Harvest => (
                matches!(from, Party::Cell(_)),
                "cell",
                matches!(to, Party::Agent(_)),
                "agent",
            ),
            Self::CombatLoot
            | Self::Loan
            | Self::Repayment
            | Self::Inheritance
            | Self::Endowment => (
                matches!(from, Party::Agent(_)),
                "agent",
                matches!(to, Party::Agent(_)),
                "agent",
            ),
        };
        if !from_ok {
            return Err(LedgerError::InvalidParty {
                kind: self,
                side: "from",
                expected: from_expected,
                actual: from,
            });
        }
        if !to_ok {
            return Err(LedgerError::InvalidParty {
                kind: self,
                side: "to",
                expected: to_expected,
                actual: to,
            });
        }
        Ok(())
    }
}

/// A single recorded sugar movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Tick in which the movement happened.
    pub tick: u64,
    /// What kind of movement this is.
    pub kind: FlowKind,
    /// Amount moved. Always strictly positive.
    pub quantity: Decimal,
    /// Where the sugar came from.
    pub from: Party,
    /// Where the sugar went.
    pub to: Party,
}

/// Append-only log of every sugar movement in the simulation.
///
/// The ledger enforces two invariants on every entry:
/// 1. Quantities are never negative. Zero-quantity movements are dropped.
/// 2. The parties match the flow kind (e.g. a harvest goes from a cell to
///    an agent).
///
/// The third invariant, conservation, is checked per tick with
/// [`Ledger::verify_conservation`].
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    /// Create a new empty ledger.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Return the number of entries in the ledger.
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return whether the ledger has no entries.
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a sugar movement.
    ///
    /// Returns `true` if an entry was appended. A zero quantity is valid
    /// but appends nothing, so callers can record harvests of empty cells
    /// without checking first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NegativeQuantity`] or
    /// [`LedgerError::InvalidParty`].
    pub fn record(
        &mut self,
        tick: u64,
        kind: FlowKind,
        quantity: Decimal,
        from: Party,
        to: Party,
    ) -> Result<bool, LedgerError> {
        if quantity < Decimal::ZERO {
            return Err(LedgerError::NegativeQuantity { quantity });
        }
        kind.check_parties(from, to)?;
        if quantity.is_zero() {
            return Ok(false);
        }
        trace!(tick, ?kind, %quantity, %from, %to, "Ledger entry");
        self.entries.push(LedgerEntry {
            tick,
            kind,
            quantity,
            from,
            to,
        });
        Ok(true)
    }

    /// Return all entries for a specific tick.
    pub fn entries_for_tick(&self, tick: u64) -> Vec<&LedgerEntry> {
        self.entries.iter().filter(|e| e.tick == tick).collect()
    }

    /// Return all entries that moved sugar from or to `agent`.
    pub fn entries_for_agent(&self, agent: AgentId) -> Vec<&LedgerEntry> {
        let party = Party::Agent(agent);
        self.entries
            .iter()
            .filter(|e| e.from == party || e.to == party)
            .collect()
    }

    /// Return all entries in the ledger.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Sum the flows recorded for `tick` by direction.
    pub fn totals_for_tick(&self, tick: u64) -> Option<FlowTotals> {
        conservation::flow_totals(tick, &self.entries)
    }

    /// Verify the conservation law for `tick` given the total sugar held
    /// by agents and cells before and after the tick.
    pub fn verify_conservation(
        &self,
        tick: u64,
        opening: Decimal,
        closing: Decimal,
    ) -> ConservationResult {
        conservation::verify_conservation(tick, opening, closing, &self.entries)
    }

    /// Drop entries older than `tick`. Returns the number removed.
    pub fn prune_before(&mut self, tick: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.tick >= tick);
        before.saturating_sub(self.entries.len())
    }
}
