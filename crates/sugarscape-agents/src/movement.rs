//! Foraging movement.
//!
//! An agent looks along the four cardinal directions up to its vision and
//! considers every unoccupied cell it sees plus its own cell. It picks the
//! cell with the most sugar, preferring nearer cells on a tie and choosing
//! uniformly among cells still tied. It then moves there, harvests the
//! whole cell, pays its metabolism, and ages by one tick.

use rand::Rng;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use tracing::debug;

use sugarscape_ledger::FlowKind;
use sugarscape_types::{AgentId, Position};

use crate::error::AgentError;
use crate::society::Society;

/// What happened when an agent moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// The agent that moved.
    pub agent_id: AgentId,
    /// Cell at the start of the move.
    pub from: Position,
    /// Cell at the end of the move.
    pub to: Position,
    /// Sugar collected from `to`.
    pub harvested: Decimal,
    /// Sugar burned by metabolism.
    pub upkeep: Decimal,
}

/// Cells the agent may move to, with their distance. The agent's own
/// cell comes first at distance 0.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`].
pub fn candidate_cells(society: &Society, id: AgentId) -> Result<Vec<(Position, u32)>, AgentError> {
    let agent = society.agent(id)?;
    let mut candidates = vec![(agent.position, 0)];
    candidates.extend(
        society
            .grid
            .cardinal_cells(agent.position, agent.vision)
            .into_iter()
            .filter(|(pos, _)| !society.grid.is_occupied(*pos)),
    );
    Ok(candidates)
}

/// Pick the rule-based destination for an agent.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`].
pub fn best_destination(
    society: &Society,
    id: AgentId,
    rng: &mut impl Rng,
) -> Result<Position, AgentError> {
    let candidates = candidate_cells(society, id)?;
    let scored: Vec<(Position, u32, Decimal)> = candidates
        .into_iter()
        .map(|(pos, dist)| {
            let sugar = society.grid.sugar_at(pos).unwrap_or(Decimal::ZERO);
            (pos, dist, sugar)
        })
        .collect();

    let Some(best_sugar) = scored.iter().map(|&(_, _, s)| s).max() else {
        return Ok(society.agent(id)?.position);
    };
    let richest: Vec<&(Position, u32, Decimal)> =
        scored.iter().filter(|(_, _, s)| *s == best_sugar).collect();
    let nearest = richest.iter().map(|&&(_, d, _)| d).min().unwrap_or(0);
    let tied: Vec<Position> = richest
        .into_iter()
        .filter(|(_, d, _)| *d == nearest)
        .map(|&(pos, _, _)| pos)
        .collect();

    match tied.choose(rng) {
        Some(&pos) => Ok(pos),
        None => Ok(society.agent(id)?.position),
    }
}

/// Whether `target` is a cell the agent may move to this tick.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`].
pub fn is_legal_destination(
    society: &Society,
    id: AgentId,
    target: Position,
) -> Result<bool, AgentError> {
    Ok(candidate_cells(society, id)?
        .iter()
        .any(|(pos, _)| *pos == target))
}

/// Burn the agent's metabolism and advance its age.
///
/// # Errors
///
/// Returns [`AgentError::AgentNotFound`] or a ledger error.
pub fn pay_upkeep(society: &mut Society, id: AgentId) -> Result<Decimal, AgentError> {
    let metabolism = society.agent(id)?.metabolism;
    society.burn(FlowKind::Metabolism, id, metabolism)?;
    let agent = society.agent_mut(id)?;
    agent.age = agent.age.saturating_add(1);
    Ok(metabolism)
}

/// Move the agent to `target`, harvest it, and pay upkeep.
///
/// The caller is responsible for checking that `target` is legal.
///
/// # Errors
///
/// Returns a world error if `target` is occupied by someone else.
pub fn resolve_move(
    society: &mut Society,
    id: AgentId,
    target: Position,
) -> Result<MoveOutcome, AgentError> {
    let from = society.agent(id)?.position;
    society.grid.relocate(id, from, target)?;
    society.agent_mut(id)?.position = target;
    let harvested = society.harvest(id, target)?;
    let upkeep = pay_upkeep(society, id)?;
    debug!(
        tick = society.tick,
        agent_id = %id,
        %from,
        to = %target,
        %harvested,
        "Agent moved"
    );
    Ok(MoveOutcome {
        agent_id: id,
        from,
        to: target,
        harvested,
        upkeep,
    })
}

/// Rule-based foraging: pick the best cell and move there.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state.
pub fn forage(society: &mut Society, id: AgentId, rng: &mut impl Rng) -> Result<MoveOutcome, AgentError> {
    let target = best_destination(society, id, rng)?;
    resolve_move(society, id, target)
}

/// Move to a requested cell, falling back to the rule-based choice when
/// the request is missing or illegal.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state.
pub fn forage_towards(
    society: &mut Society,
    id: AgentId,
    requested: Option<Position>,
    rng: &mut impl Rng,
) -> Result<MoveOutcome, AgentError> {
    if let Some(target) = requested {
        if is_legal_destination(society, id, target)? {
            return resolve_move(society, id, target);
        }
        debug!(
            tick = society.tick,
            agent_id = %id,
            requested = %target,
            "Requested cell is not reachable, using rule-based destination"
        );
    }
    forage(society, id, rng)
}

/// Stay on the current cell: harvest it and pay upkeep.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state.
pub fn stay(society: &mut Society, id: AgentId) -> Result<MoveOutcome, AgentError> {
    let here = society.agent(id)?.position;
    resolve_move(society, id, here)
}
