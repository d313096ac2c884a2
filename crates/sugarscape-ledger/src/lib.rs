//! Sugar flow ledger for the Sugarscape simulation.
//!
//! Every unit of sugar that moves in a tick is written to the [`Ledger`]
//! as a [`LedgerEntry`]. Entries are classified by [`FlowKind`] into three
//! groups:
//!
//! | Group | Kinds | Effect on total sugar |
//! |-------|-------|-----------------------|
//! | Source | `Growback`, `DebtWriteOff` | increases |
//! | Sink | `Metabolism`, `DiseasePenalty`, `Discard` | decreases |
//! | Internal | `Harvest`, `CombatLoot`, `Loan`, `Repayment`, `Inheritance`, `Endowment` | none |
//!
//! At the end of each tick the conservation law is checked:
//!
//! ```text
//! opening_total + sources - sinks == closing_total
//! ```
//!
//! where the totals are the sum of all agent sugar plus all cell sugar.
//! A violation produces a [`LedgerAnomaly`].
//!
//! ```
//! use sugarscape_ledger::{ConservationResult, FlowKind, Ledger, Party};
//! use sugarscape_types::{AgentId, Position};
//! use rust_decimal::Decimal;
//!
//! let mut ledger = Ledger::new();
//! let cell = Position::new(3, 4);
//! let agent = AgentId::new(1);
//!
//! ledger.record(1, FlowKind::Growback, Decimal::new(2, 0), Party::Environment, Party::Landscape).ok();
//! ledger.record(1, FlowKind::Harvest, Decimal::new(2, 0), Party::Cell(cell), Party::Agent(agent)).ok();
//! ledger.record(1, FlowKind::Metabolism, Decimal::new(1, 0), Party::Agent(agent), Party::Void).ok();
//!
//! // 10 sugar at the start of the tick, +2 grown, -1 burned.
//! let result = ledger.verify_conservation(1, Decimal::new(10, 0), Decimal::new(11, 0));
//! assert_eq!(result, ConservationResult::Balanced);
//! ```

pub mod conservation;
pub mod ledger;

pub use conservation::{ConservationResult, FlowTotals};
pub use ledger::{FlowDirection, FlowKind, Ledger, LedgerEntry, Party};

use rust_decimal::Decimal;

/// Errors that can occur when recording ledger entries.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Quantity must not be negative.
    #[error("ledger entry quantity must be positive, got {quantity}")]
    NegativeQuantity {
        /// The invalid quantity.
        quantity: Decimal,
    },

    /// The parties do not fit the flow kind.
    #[error("invalid party for {kind:?} {side}: expected {expected}, got {actual}")]
    InvalidParty {
        /// The flow being recorded.
        kind: FlowKind,
        /// Which side of the entry ("from" or "to").
        side: &'static str,
        /// The expected party kind.
        expected: &'static str,
        /// The party that was supplied.
        actual: Party,
    },
}

/// A conservation law violation detected at the end of a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAnomaly {
    /// The tick where the anomaly was detected.
    pub tick: u64,
    /// Total implied by the opening total and the recorded flows.
    pub expected: Decimal,
    /// Total actually held by agents and cells.
    pub actual: Decimal,
    /// Human-readable description of the anomaly.
    pub message: String,
}

impl core::fmt::Display for LedgerAnomaly {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.message)
    }
}
