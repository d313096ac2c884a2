//! Combat between tribes.
//!
//! ## Combat flow
//!
//! 1. The attacker scans agents within vision for targets of the other
//!    tribe holding strictly less sugar than itself.
//! 2. Each target is scored by the reward it yields:
//!    `min(victim sugar, combat_limit) + sugar on the victim's cell`.
//!    The highest reward wins, then the nearest target, then a uniform
//!    random pick.
//! 3. The attacker takes its capped loot, the victim dies (its remaining
//!    estate follows the normal death path), and the attacker moves onto
//!    the vacated cell, harvests it, and pays metabolism.
//!
//! An agent that fights does not also forage that tick.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use tracing::{debug, info};

use sugarscape_ledger::FlowKind;
use sugarscape_types::{AgentId, Position};

use crate::counters::bump;
use crate::death::{DeathCause, DeathRecord, process_death};
use crate::error::{AgentError, overflow};
use crate::movement::pay_upkeep;
use crate::society::Society;

/// A potential victim and what attacking it would yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombatTarget {
    /// The potential victim.
    pub id: AgentId,
    /// Its cell.
    pub position: Position,
    /// Cardinal distance from the attacker.
    pub distance: u32,
    /// Capped loot plus the sugar on its cell.
    pub reward: Decimal,
}

/// The outcome of a successful attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatOutcome {
    /// The agent that attacked.
    pub attacker: AgentId,
    /// Cell the attacker left.
    pub from: Position,
    /// Cell the attacker now occupies (the victim's former cell).
    pub to: Position,
    /// Sugar taken from the victim.
    pub loot: Decimal,
    /// Sugar harvested from the victim's cell.
    pub site_sugar: Decimal,
    /// Metabolism paid by the attacker.
    pub upkeep: Decimal,
    /// The victim's death.
    pub victim: DeathRecord,
}

fn capped_loot(victim_sugar: Decimal, limit: Decimal) -> Decimal {
    victim_sugar.max(Decimal::ZERO).min(limit)
}

/// Every agent the attacker may attack right now, in neighbour order.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state or overflow.
pub fn eligible_targets(
    society: &Society,
    attacker: AgentId,
) -> Result<Vec<CombatTarget>, AgentError> {
    let me = society.agent(attacker)?;
    let tribe = me.tribe();
    let limit = society.config.combat_limit;
    let mut targets = Vec::new();
    for (id, position, distance) in society.grid.agents_in_vision(me.position, me.vision) {
        let other = society.agent(id)?;
        if other.tribe() == tribe || other.sugar >= me.sugar {
            continue;
        }
        let site = society.grid.sugar_at(position).unwrap_or(Decimal::ZERO);
        let reward = capped_loot(other.sugar, limit)
            .checked_add(site)
            .ok_or_else(|| overflow("combat reward"))?;
        targets.push(CombatTarget {
            id,
            position,
            distance,
            reward,
        });
    }
    Ok(targets)
}

/// Whether `target` is currently a legal victim for `attacker`.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state.
pub fn is_eligible_target(
    society: &Society,
    attacker: AgentId,
    target: AgentId,
) -> Result<bool, AgentError> {
    Ok(eligible_targets(society, attacker)?
        .iter()
        .any(|t| t.id == target))
}

/// Pick the rule-based victim, if any.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state.
pub fn choose_target(
    society: &Society,
    attacker: AgentId,
    rng: &mut impl Rng,
) -> Result<Option<AgentId>, AgentError> {
    let targets = eligible_targets(society, attacker)?;
    let Some(best) = targets.iter().map(|t| t.reward).max() else {
        return Ok(None);
    };
    let richest: Vec<&CombatTarget> = targets.iter().filter(|t| t.reward == best).collect();
    let nearest = richest.iter().map(|t| t.distance).min().unwrap_or(0);
    let tied: Vec<AgentId> = richest
        .into_iter()
        .filter(|t| t.distance == nearest)
        .map(|t| t.id)
        .collect();
    Ok(tied.choose(rng).copied())
}

/// Carry out an attack on `victim`.
///
/// The caller is responsible for checking eligibility.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state or overflow.
pub fn resolve_attack(
    society: &mut Society,
    attacker: AgentId,
    victim: AgentId,
) -> Result<CombatOutcome, AgentError> {
    let from = society.agent(attacker)?.position;
    let target = society.agent(victim)?;
    let to = target.position;
    let loot = capped_loot(target.sugar, society.config.combat_limit);

    society.transfer(FlowKind::CombatLoot, victim, attacker, loot)?;
    let victim_record = process_death(
        society,
        victim,
        DeathCause::Combat,
        &BTreeSet::from([victim]),
    )?;

    society.grid.relocate(attacker, from, to)?;
    society.agent_mut(attacker)?.position = to;
    let site_sugar = society.harvest(attacker, to)?;
    let upkeep = pay_upkeep(society, attacker)?;
    bump(&mut society.counters.combat_kills);

    info!(
        tick = society.tick,
        %attacker,
        %victim,
        %loot,
        %site_sugar,
        "Combat kill"
    );

    Ok(CombatOutcome {
        attacker,
        from,
        to,
        loot,
        site_sugar,
        upkeep,
        victim: victim_record,
    })
}

/// Rule-based combat: attack the best target if there is one.
///
/// Returns `None` when nothing is eligible; the agent should forage.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state.
pub fn attack(
    society: &mut Society,
    attacker: AgentId,
    rng: &mut impl Rng,
) -> Result<Option<CombatOutcome>, AgentError> {
    match choose_target(society, attacker, rng)? {
        Some(victim) => resolve_attack(society, attacker, victim).map(Some),
        None => Ok(None),
    }
}

/// Attack a named target if it is eligible.
///
/// Returns `None` when it is not; the agent should forage.
///
/// # Errors
///
/// Returns [`AgentError`] on inconsistent state.
pub fn attack_target(
    society: &mut Society,
    attacker: AgentId,
    victim: AgentId,
) -> Result<Option<CombatOutcome>, AgentError> {
    if !society.is_alive(victim) || !is_eligible_target(society, attacker, victim)? {
        debug!(
            tick = society.tick,
            %attacker,
            %victim,
            "Requested combat target is not eligible"
        );
        return Ok(None);
    }
    resolve_attack(society, attacker, victim).map(Some)
}
