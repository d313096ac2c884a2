//! Aggregate counters updated by the rules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Running totals over the whole simulation, read by analytics and the
/// tick summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocietyCounters {
    /// Children born.
    pub births: u64,
    /// Agents that died with no sugar left.
    pub deaths_starvation: u64,
    /// Agents that outlived their `max_age`.
    pub deaths_old_age: u64,
    /// Agents killed in combat.
    pub deaths_combat: u64,
    /// Successful attacks.
    pub combat_kills: u64,
    /// Individual inheritance payments to children.
    pub total_inheritances: u64,
    /// Estates that were split among heirs, summed at full value.
    pub total_inheritance_value: Decimal,
    /// Sugar actually credited to heirs.
    pub generational_wealth_transferred: Decimal,
    /// Loans made.
    pub loans_issued: u64,
    /// Loans paid in full.
    pub loans_repaid: u64,
    /// Loans partly paid and reissued.
    pub loans_rolled_over: u64,
    /// Loans cancelled because the lender died without heirs.
    pub loans_forgiven: u64,
    /// Loans passed from a dead lender to a child.
    pub loans_inherited: u64,
    /// Loans cancelled because the borrower died.
    pub debts_extinguished: u64,
    /// Disease strains copied to a neighbour.
    pub disease_transmissions: u64,
    /// Immunity bit flips triggered by uncovered diseases.
    pub immune_responses: u64,
}

impl SocietyCounters {
    /// Total deaths from every cause.
    pub const fn deaths(&self) -> u64 {
        self.deaths_starvation
            .saturating_add(self.deaths_old_age)
            .saturating_add(self.deaths_combat)
    }
}

/// Increment a counter without overflow.
pub(crate) const fn bump(counter: &mut u64) {
    *counter = counter.saturating_add(1);
}
