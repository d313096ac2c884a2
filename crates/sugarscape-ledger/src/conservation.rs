//! Conservation law verification.
//!
//! Sugar enters the simulation only through source flows (`Growback`,
//! `DebtWriteOff`) and leaves only through sink flows (`Metabolism`,
//! `DiseasePenalty`, `Discard`). Everything else moves sugar between
//! holders. For each tick T:
//!
//! ```text
//! opening_total(T) + sources(T) - sinks(T) == closing_total(T)
//! ```
//!
//! The totals are measured by the caller (agents plus cells), so the check
//! catches any code path that changes a balance without recording it.

use rust_decimal::Decimal;

use crate::LedgerAnomaly;
use crate::ledger::{FlowDirection, LedgerEntry};

/// The result of a conservation check for a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// The recorded flows explain the change in total sugar.
    Balanced,
    /// Total sugar changed by an amount the ledger does not explain.
    Anomaly(LedgerAnomaly),
}

impl ConservationResult {
    /// Whether the tick balanced.
    pub const fn is_balanced(&self) -> bool {
        matches!(self, Self::Balanced)
    }
}

/// Sum of recorded flows in one tick, grouped by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowTotals {
    /// Sugar created.
    pub sources: Decimal,
    /// Sugar destroyed.
    pub sinks: Decimal,
    /// Sugar moved between holders.
    pub internal: Decimal,
}

impl FlowTotals {
    /// Net change in total sugar implied by these flows.
    pub fn net(&self) -> Option<Decimal> {
        self.sources.checked_sub(self.sinks)
    }
}

/// Sum the flows recorded for `tick`. Returns `None` on overflow.
pub fn flow_totals(tick: u64, entries: &[LedgerEntry]) -> Option<FlowTotals> {
    let mut totals = FlowTotals::default();
    for entry in entries.iter().filter(|e| e.tick == tick) {
        let bucket = match entry.kind.direction() {
            FlowDirection::Source => &mut totals.sources,
            FlowDirection::Sink => &mut totals.sinks,
            FlowDirection::Internal => &mut totals.internal,
        };
        *bucket = bucket.checked_add(entry.quantity)?;
    }
    Some(totals)
}

/// Verify the conservation law for `tick`.
///
/// `opening` and `closing` are the total sugar held by agents and cells
/// before and after the tick.
pub fn verify_conservation(
    tick: u64,
    opening: Decimal,
    closing: Decimal,
    entries: &[LedgerEntry],
) -> ConservationResult {
    let Some(expected) = flow_totals(tick, entries)
        .and_then(|totals| totals.net())
        .and_then(|net| opening.checked_add(net))
    else {
        return ConservationResult::Anomaly(LedgerAnomaly {
            tick,
            expected: Decimal::ZERO,
            actual: closing,
            message: format!("LEDGER_ANOMALY at tick {tick}: arithmetic overflow while summing flows"),
        });
    };

    if expected == closing {
        ConservationResult::Balanced
    } else {
        ConservationResult::Anomaly(LedgerAnomaly {
            tick,
            expected,
            actual: closing,
            message: format!(
                "LEDGER_ANOMALY at tick {tick}: expected total sugar {expected}, found {closing}",
            ),
        })
    }
}
