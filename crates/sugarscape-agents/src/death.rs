//! Death conditions and consequences for agents.
//!
//! Agents die when:
//! - Their sugar is at or below zero (starvation)
//! - Their age exceeds `max_age` (old age)
//! - They lose a fight (combat, resolved immediately by the attacker)
//!
//! A dying agent's loan books are settled first, then any negative balance
//! is written off, then its estate passes to its living children, and
//! finally it is removed from the grid and the population.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use sugarscape_types::{AgentId, AgentState, Position};

use crate::counters::bump;
use crate::credit::{LoanCleanup, clear_loans_on_death};
use crate::error::AgentError;
use crate::inheritance::{InheritanceOutcome, distribute_estate};
use crate::society::Society;

/// The cause of an agent's death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Sugar reached zero or below.
    Starvation,
    /// Age exceeded `max_age`.
    OldAge,
    /// Killed by an attacker.
    Combat,
}

impl core::fmt::Display for DeathCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Starvation => write!(f, "starvation"),
            Self::OldAge => write!(f, "old_age"),
            Self::Combat => write!(f, "combat"),
        }
    }
}

/// Check whether an agent meets a natural death condition.
///
/// Returns `Some(cause)` if the agent should die, `None` if alive.
/// Starvation is reported ahead of old age when both apply.
pub fn check_death(state: &AgentState) -> Option<DeathCause> {
    if state.sugar <= Decimal::ZERO {
        return Some(DeathCause::Starvation);
    }
    if state.age > state.max_age {
        return Some(DeathCause::OldAge);
    }
    None
}

/// Everything that happened when an agent died.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeathRecord {
    /// The agent who died.
    pub agent_id: AgentId,
    /// The cause of death.
    pub cause: DeathCause,
    /// Age at death.
    pub final_age: u32,
    /// Cell the agent was removed from.
    pub position: Position,
    /// Negative balance written off before inheritance.
    pub written_off: Decimal,
    /// How the loan books were settled.
    pub loans: LoanCleanup,
    /// How the estate was distributed.
    pub inheritance: InheritanceOutcome,
}

/// Children of `id` that are alive and not themselves in `dying`, in
/// birth order.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`].
pub fn living_heirs(
    society: &Society,
    id: AgentId,
    dying: &BTreeSet<AgentId>,
) -> Result<Vec<AgentId>, AgentError> {
    Ok(society
        .agent(id)?
        .children
        .iter()
        .copied()
        .filter(|child| society.is_alive(*child) && !dying.contains(child))
        .collect())
}

/// Run the full death path for one agent.
///
/// `dying` lists every agent dying in the same pass; none of them can
/// inherit.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state.
pub fn process_death(
    society: &mut Society,
    id: AgentId,
    cause: DeathCause,
    dying: &BTreeSet<AgentId>,
) -> Result<DeathRecord, AgentError> {
    let heirs = living_heirs(society, id, dying)?;
    let loans = clear_loans_on_death(society, id, heirs.first().copied())?;
    let written_off = society.write_off_deficit(id)?;
    let inheritance = distribute_estate(society, id, &heirs)?;
    let removed = society.remove_agent(id)?;

    let counters = &mut society.counters;
    match cause {
        DeathCause::Starvation => bump(&mut counters.deaths_starvation),
        DeathCause::OldAge => bump(&mut counters.deaths_old_age),
        DeathCause::Combat => bump(&mut counters.deaths_combat),
    }

    info!(
        tick = society.tick,
        agent_id = %id,
        %cause,
        age = removed.age,
        estate = %inheritance.estate,
        heirs = inheritance.heirs.len(),
        "Agent died"
    );

    Ok(DeathRecord {
        agent_id: id,
        cause,
        final_age: removed.age,
        position: removed.position,
        written_off,
        loans,
        inheritance,
    })
}

/// Find every agent meeting a natural death condition and process them
/// in id order.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state.
pub fn process_deaths(society: &mut Society) -> Result<Vec<DeathRecord>, AgentError> {
    let doomed: Vec<(AgentId, DeathCause)> = society
        .population
        .iter()
        .filter_map(|agent| check_death(agent).map(|cause| (agent.id, cause)))
        .collect();
    let dying: BTreeSet<AgentId> = doomed.iter().map(|(id, _)| *id).collect();

    let mut records = Vec::with_capacity(doomed.len());
    for (id, cause) in doomed {
        records.push(process_death(society, id, cause, &dying)?);
    }
    Ok(records)
}
