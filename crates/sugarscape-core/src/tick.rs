//! Tick cycle: the per-tick rule engine that drives the Sugarscape simulation.
//!
//! Each tick runs through these phases, in order:
//!
//! 1. **Growback** -- every cell regrows toward its capacity; per-tick
//!    reproduction flags are cleared.
//! 2. **Decision** -- the [`DecisionSource`] prepares decisions. An oracle
//!    receives one context per living agent, in this tick's movement order.
//! 3. **Combat / Movement** -- agents act in a seeded random order. A
//!    successful attack replaces movement for the attacker; otherwise the
//!    agent forages (or stays put when the oracle says not to move).
//! 4. **Reproduction** -- gated partner pairing and childbirth.
//! 5. **Culture** -- each agent flips at most one tag bit per neighbour.
//! 6. **Credit** -- due loans are settled for every borrower, then gated
//!    lending runs.
//! 7. **Disease** -- immune response, then transmission to neighbours.
//! 8. **Death** -- starvation and old age, with loan cleanup and inheritance.
//! 9. **Audit** -- the sugar ledger is checked against the change in total
//!    sugar held by agents and cells.
//!
//! Phases 3 to 7 each draw a fresh agent order from the simulation RNG, so
//! a run is reproducible from its seed and its decision source outputs.
//! Culture and disease spread in place along that order: a tag or strain
//! received earlier in the phase is passed on again within the same tick.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use sugarscape_agents::credit::{attempt_pay_loans, extend_credit};
use sugarscape_agents::{
    AgentError, BirthRecord, CreditPartners, DeathRecord, Society, SocietyCounters, attack,
    attack_target, forage_towards, immune_response, process_deaths, reproduce, spread_culture,
    stay, transmit_diseases,
};
use sugarscape_ledger::ConservationResult;
use sugarscape_types::{AgentId, DecisionCategory};

use crate::config::{RulesConfig, SimulationConfig};
use crate::decision::{DecisionError, DecisionSource};
use crate::perception::build_contexts;

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A rule failed while resolving one agent.
    #[error("agent error for {agent_id}: {source}")]
    Agent {
        /// The agent being resolved.
        agent_id: AgentId,
        /// The underlying agent error.
        source: AgentError,
    },

    /// A society-wide step failed (growback, death pass, totals).
    #[error("society error: {source}")]
    Society {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },

    /// The decision source failed.
    #[error("decision error: {source}")]
    Decision {
        /// The underlying decision error.
        #[from]
        source: DecisionError,
    },
}

/// Which optional rules run each tick. Movement always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RuleToggles {
    /// Combat before movement.
    pub combat: bool,
    /// Reproduction.
    pub reproduction: bool,
    /// Culture spreading.
    pub culture: bool,
    /// Lending and repayment.
    pub credit: bool,
    /// Immune response and transmission.
    pub disease: bool,
}

impl RuleToggles {
    /// Every rule enabled.
    pub const fn all() -> Self {
        Self {
            combat: true,
            reproduction: true,
            culture: true,
            credit: true,
            disease: true,
        }
    }

    /// Movement only.
    pub const fn none() -> Self {
        Self {
            combat: false,
            reproduction: false,
            culture: false,
            credit: false,
            disease: false,
        }
    }
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self::all()
    }
}

impl From<&RulesConfig> for RuleToggles {
    fn from(rules: &RulesConfig) -> Self {
        Self {
            combat: rules.combat_enabled,
            reproduction: rules.reproduction_enabled,
            culture: rules.culture_enabled,
            credit: rules.credit_enabled,
            disease: rules.disease_enabled,
        }
    }
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone)]
pub struct TickSummary {
    /// The tick number that was executed.
    pub tick: u64,
    /// Number of living agents at end of tick.
    pub agents_alive: usize,
    /// Sugar regrown on the landscape.
    pub grown: Decimal,
    /// Children born this tick.
    pub births: Vec<BirthRecord>,
    /// Agents who died this tick, combat victims first.
    pub deaths: Vec<DeathRecord>,
    /// Successful attacks this tick.
    pub combat_kills: u64,
    /// Loans made this tick.
    pub loans_issued: usize,
    /// Running totals as of the end of the tick.
    pub counters: SocietyCounters,
    /// Whether an oracle batch supplied the decisions.
    pub oracle_used: bool,
    /// Sugar held by agents and cells at end of tick.
    pub total_sugar: Decimal,
    /// Outcome of the ledger audit.
    pub conservation: ConservationResult,
}

/// The mutable simulation state passed through the tick cycle.
#[derive(Debug)]
pub struct SimulationState {
    /// Grid, agents, ledger, counters and rule parameters.
    pub society: Society,
    /// The single RNG stream every stochastic choice draws from.
    pub rng: SmallRng,
    /// Which optional rules run.
    pub toggles: RuleToggles,
    /// Sugar each cell regrows per tick.
    pub growback_rate: Decimal,
    /// Ledger entries older than this many ticks are pruned; 0 keeps all.
    pub ledger_retention_ticks: u64,
}

impl SimulationState {
    /// Wrap a society with every rule enabled and a growback rate of 1.
    pub fn new(society: Society, seed: u64) -> Self {
        Self {
            society,
            rng: SmallRng::seed_from_u64(seed),
            toggles: RuleToggles::all(),
            growback_rate: Decimal::ONE,
            ledger_retention_ticks: 0,
        }
    }

    /// Wrap a society using the world and rules sections of `config`.
    ///
    /// The RNG is seeded from `rng_seed` so callers can consume the config
    /// seed for setup and still hand the tick cycle a reproducible stream.
    pub fn from_config(society: Society, config: &SimulationConfig, rng_seed: u64) -> Self {
        Self {
            society,
            rng: SmallRng::seed_from_u64(rng_seed),
            toggles: RuleToggles::from(&config.rules),
            growback_rate: Decimal::from(config.world.growback_rate),
            ledger_retention_ticks: config.world.ledger_retention_ticks,
        }
    }

    /// Number of living agents.
    pub fn population(&self) -> usize {
        self.society.population.len()
    }
}

/// Outcomes gathered across phases.
#[derive(Debug, Default)]
struct TickLog {
    births: Vec<BirthRecord>,
    deaths: Vec<DeathRecord>,
    combat_kills: u64,
    loans_issued: usize,
}

/// Execute one complete tick of the simulation.
///
/// Advances `state.society.tick` and runs every phase in order. A failed
/// oracle call aborts the tick before any gated rule runs.
///
/// # Errors
///
/// Returns [`TickError::Decision`] when the decision source fails, or an
/// agent/society error on inconsistent state.
pub fn run_tick(
    state: &mut SimulationState,
    source: &mut DecisionSource,
) -> Result<TickSummary, TickError> {
    let tick = state.society.tick.saturating_add(1);
    state.society.tick = tick;
    let opening = state.society.total_sugar()?;
    info!(
        tick,
        agents = state.population(),
        source = source.name(),
        "Tick started"
    );

    // --- Phase 1: Growback ---
    let grown = state.society.grow_back(state.growback_rate)?;
    for agent in state.society.population.iter_mut() {
        agent.has_reproduced = false;
    }

    // --- Phase 2: Decision ---
    let order = state.society.population.shuffled_ids(&mut state.rng);
    let oracle_used = source.is_oracle();
    if oracle_used {
        let contexts = build_contexts(&state.society, &order)?;
        source.begin_tick(tick, &contexts)?;
    }

    let mut log = TickLog::default();

    // --- Phase 3: Combat / Movement ---
    phase_combat_and_movement(state, source, &order, &mut log)?;

    // --- Phase 4: Reproduction ---
    if state.toggles.reproduction {
        phase_reproduction(state, source, &mut log)?;
    }

    // --- Phase 5: Culture ---
    if state.toggles.culture {
        phase_culture(state)?;
    }

    // --- Phase 6: Credit ---
    if state.toggles.credit {
        phase_credit(state, source, &mut log)?;
    }

    // --- Phase 7: Disease ---
    if state.toggles.disease {
        phase_disease(state)?;
    }

    // --- Phase 8: Death ---
    let deaths = process_deaths(&mut state.society)?;
    log.deaths.extend(deaths);

    // --- Phase 9: Audit ---
    let closing = state.society.total_sugar()?;
    let conservation = audit(state, tick, opening, closing);

    let agents_alive = state.population();
    info!(
        tick,
        agents_alive,
        births = log.births.len(),
        deaths = log.deaths.len(),
        combat_kills = log.combat_kills,
        loans_issued = log.loans_issued,
        total_sugar = %closing,
        "Tick completed"
    );

    Ok(TickSummary {
        tick,
        agents_alive,
        grown,
        births: log.births,
        deaths: log.deaths,
        combat_kills: log.combat_kills,
        loans_issued: log.loans_issued,
        counters: state.society.counters.clone(),
        oracle_used,
        total_sugar: closing,
        conservation,
    })
}

fn agent_error(agent_id: AgentId) -> impl FnOnce(AgentError) -> TickError {
    move |source| TickError::Agent { agent_id, source }
}

/// Phase 3: each agent attacks if it can and is allowed to, otherwise moves.
fn phase_combat_and_movement(
    state: &mut SimulationState,
    source: &DecisionSource,
    order: &[AgentId],
    log: &mut TickLog,
) -> Result<(), TickError> {
    for &id in order {
        // Killed earlier in this phase.
        if !state.society.is_alive(id) {
            continue;
        }

        if state.toggles.combat && source.should_act(id, DecisionCategory::Combat) {
            let named = source
                .decision_for(id, DecisionCategory::Combat)
                .and_then(|d| d.combat_target_id);
            let outcome = match named {
                Some(victim) => attack_target(&mut state.society, id, victim),
                None => attack(&mut state.society, id, &mut state.rng),
            }
            .map_err(agent_error(id))?;
            if let Some(outcome) = outcome {
                log.combat_kills = log.combat_kills.saturating_add(1);
                log.deaths.push(outcome.victim);
                continue;
            }
        }

        match source.decision_for(id, DecisionCategory::Move) {
            Some(decision) if decision.relocate => forage_towards(
                &mut state.society,
                id,
                decision.move_target_cell,
                &mut state.rng,
            ),
            _ => stay(&mut state.society, id),
        }
        .map_err(agent_error(id))?;
    }
    debug!(
        tick = state.society.tick,
        kills = log.combat_kills,
        "Combat and movement resolved"
    );
    Ok(())
}

/// Phase 4: gated reproduction, optionally restricted to a named partner.
fn phase_reproduction(
    state: &mut SimulationState,
    source: &DecisionSource,
    log: &mut TickLog,
) -> Result<(), TickError> {
    let order = state.society.population.shuffled_ids(&mut state.rng);
    for id in order {
        if !state.society.is_alive(id) {
            continue;
        }
        let Some(decision) = source
            .decision_for(id, DecisionCategory::Reproduce)
            .filter(|d| d.reproduce)
        else {
            continue;
        };
        let births = reproduce(
            &mut state.society,
            id,
            decision.reproduce_with_id,
            &mut state.rng,
        )
        .map_err(agent_error(id))?;
        log.births.extend(births);
    }
    debug!(
        tick = state.society.tick,
        births = log.births.len(),
        "Reproduction resolved"
    );
    Ok(())
}

/// Phase 5: culture spreading. Not a decision category, so never gated.
fn phase_culture(state: &mut SimulationState) -> Result<(), TickError> {
    let order = state.society.population.shuffled_ids(&mut state.rng);
    let mut flipped: u32 = 0;
    for id in order {
        let changed =
            spread_culture(&mut state.society, id, &mut state.rng).map_err(agent_error(id))?;
        flipped = flipped.saturating_add(changed);
    }
    debug!(tick = state.society.tick, flipped, "Culture resolved");
    Ok(())
}

/// Phase 6: settle due loans for everyone, then gated lending.
fn phase_credit(
    state: &mut SimulationState,
    source: &DecisionSource,
    log: &mut TickLog,
) -> Result<(), TickError> {
    let order = state.society.population.shuffled_ids(&mut state.rng);
    for id in order {
        attempt_pay_loans(&mut state.society, id).map_err(agent_error(id))?;

        let Some(decision) = source
            .decision_for(id, DecisionCategory::Credit)
            .filter(|d| d.credit)
        else {
            continue;
        };
        let partners = decision
            .credit_partner_id
            .map_or(CreditPartners::Neighbours, CreditPartners::Only);
        let issued = extend_credit(&mut state.society, id, partners).map_err(agent_error(id))?;
        log.loans_issued = log.loans_issued.saturating_add(issued.len());
    }
    debug!(
        tick = state.society.tick,
        loans_issued = log.loans_issued,
        "Credit resolved"
    );
    Ok(())
}

/// Phase 7: every agent fights its uncovered diseases, then infects its
/// neighbours.
fn phase_disease(state: &mut SimulationState) -> Result<(), TickError> {
    let order = state.society.population.shuffled_ids(&mut state.rng);
    let mut penalties = Decimal::ZERO;
    for &id in &order {
        let report =
            immune_response(&mut state.society, id, &mut state.rng).map_err(agent_error(id))?;
        penalties = penalties.saturating_add(report.penalty);
    }
    let mut transmitted: u32 = 0;
    for &id in &order {
        let copied = transmit_diseases(&mut state.society, id).map_err(agent_error(id))?;
        transmitted = transmitted.saturating_add(copied);
    }
    debug!(
        tick = state.society.tick,
        %penalties,
        transmitted,
        "Disease resolved"
    );
    Ok(())
}

/// Phase 9: check the ledger against the change in total sugar, then prune
/// old entries.
fn audit(
    state: &mut SimulationState,
    tick: u64,
    opening: Decimal,
    closing: Decimal,
) -> ConservationResult {
    let result = state
        .society
        .ledger
        .verify_conservation(tick, opening, closing);
    if let ConservationResult::Anomaly(anomaly) = &result {
        error!(
            tick,
            expected = %anomaly.expected,
            actual = %anomaly.actual,
            "LEDGER_ANOMALY"
        );
    }

    if state.ledger_retention_ticks > 0 {
        let cutoff = tick.saturating_sub(state.ledger_retention_ticks);
        let pruned = state.society.ledger.prune_before(cutoff);
        if pruned > 0 {
            debug!(tick, pruned, "Ledger pruned");
        }
    }
    result
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use rust_decimal_macros::dec;
    use sugarscape_agents::{AgentBuilder, RuleConfig};
    use sugarscape_types::{BitString, Position, Sex};
    use sugarscape_world::Grid;

    use super::*;

    fn flat_society(width: u32, height: u32, sugar: Decimal) -> Society {
        let mut grid = Grid::new(width, height).unwrap();
        for pos in grid.positions().collect::<Vec<_>>() {
            grid.set_capacity(pos, dec!(4)).unwrap();
            grid.set_sugar(pos, sugar).unwrap();
        }
        Society::new(grid, RuleConfig::default())
    }

    fn movement_only(society: Society) -> SimulationState {
        let mut state = SimulationState::new(society, 7);
        state.toggles = RuleToggles::none();
        state.growback_rate = Decimal::ZERO;
        state
    }

    #[test]
    fn tick_advances_the_clock() {
        let mut state = movement_only(flat_society(3, 3, dec!(1)));
        let mut source = DecisionSource::rule_based();
        let first = run_tick(&mut state, &mut source).unwrap();
        let second = run_tick(&mut state, &mut source).unwrap();
        assert_eq!(first.tick, 1);
        assert_eq!(second.tick, 2);
        assert_eq!(state.society.tick, 2);
        assert!(!first.oracle_used);
    }

    #[test]
    fn empty_world_still_balances() {
        let mut state = SimulationState::new(flat_society(4, 4, dec!(1)), 1);
        let summary = run_tick(&mut state, &mut DecisionSource::rule_based()).unwrap();
        assert_eq!(summary.agents_alive, 0);
        assert_eq!(summary.grown, dec!(16));
        assert!(summary.conservation.is_balanced());
    }

    #[test]
    fn agent_forages_ages_and_pays_upkeep() {
        let mut society = flat_society(5, 1, dec!(0));
        society.grid.set_sugar(Position::new(3, 0), dec!(4)).unwrap();
        let id = AgentId::new(1);
        society
            .add_agent(
                AgentBuilder::new(id, Position::new(0, 0))
                    .vision(3)
                    .endowment(dec!(5))
                    .metabolism(dec!(2))
                    .build(),
            )
            .unwrap();
        let mut state = movement_only(society);

        let summary = run_tick(&mut state, &mut DecisionSource::rule_based()).unwrap();
        let agent = state.society.agent(id).unwrap();
        assert_eq!(agent.position, Position::new(3, 0));
        assert_eq!(agent.sugar, dec!(7));
        assert_eq!(agent.age, 1);
        assert_eq!(state.society.grid.sugar_at(Position::new(3, 0)), Some(dec!(0)));
        assert!(summary.conservation.is_balanced());
    }

    #[test]
    fn starving_agent_dies_at_end_of_tick() {
        let mut society = flat_society(2, 1, dec!(0));
        let id = AgentId::new(1);
        society
            .add_agent(
                AgentBuilder::new(id, Position::new(0, 0))
                    .endowment(dec!(1))
                    .metabolism(dec!(3))
                    .build(),
            )
            .unwrap();
        let mut state = movement_only(society);

        let summary = run_tick(&mut state, &mut DecisionSource::rule_based()).unwrap();
        assert_eq!(summary.agents_alive, 0);
        assert_eq!(summary.deaths.len(), 1);
        assert_eq!(summary.deaths[0].agent_id, id);
        assert_eq!(summary.counters.deaths_starvation, 1);
        // The -2 deficit is written off, so the audit still balances.
        assert!(summary.conservation.is_balanced());
    }

    #[test]
    fn full_rule_set_balances_over_many_ticks() {
        let mut society = flat_society(8, 8, dec!(3));
        for n in 0..12_u32 {
            let sex = if n % 2 == 0 { Sex::Female } else { Sex::Male };
            let culture: BitString = if n % 3 == 0 { "111" } else { "000" }.parse().unwrap();
            society
                .add_agent(
                    AgentBuilder::new(AgentId::new(u64::from(n) + 1), Position::new(n % 8, n / 8 * 3))
                        .sex(sex)
                        .age(20)
                        .vision(2)
                        .endowment(dec!(12))
                        .culture(culture)
                        .immunity(BitString::zeros(8))
                        .diseases(vec!["11".parse().unwrap()])
                        .build(),
                )
                .unwrap();
        }
        let mut state = SimulationState::new(society, 99);
        let mut source = DecisionSource::rule_based();
        for _ in 0..25 {
            let summary = run_tick(&mut state, &mut source).unwrap();
            assert!(
                summary.conservation.is_balanced(),
                "tick {} did not balance: {:?}",
                summary.tick,
                summary.conservation
            );
        }
    }

    #[test]
    fn same_seed_same_history() {
        let build = || {
            let mut society = flat_society(6, 6, dec!(2));
            for n in 0..6_u32 {
                society
                    .add_agent(
                        AgentBuilder::new(AgentId::new(u64::from(n) + 1), Position::new(n, n))
                            .vision(3)
                            .build(),
                    )
                    .unwrap();
            }
            SimulationState::new(society, 1234)
        };
        let mut a = build();
        let mut b = build();
        let mut source = DecisionSource::rule_based();
        for _ in 0..10 {
            run_tick(&mut a, &mut source).unwrap();
            run_tick(&mut b, &mut source).unwrap();
        }
        let positions = |s: &SimulationState| {
            s.society
                .population
                .iter()
                .map(|agent| (agent.id, agent.position, agent.sugar))
                .collect::<Vec<_>>()
        };
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn toggles_follow_rules_config() {
        let rules = RulesConfig {
            combat_enabled: false,
            disease_enabled: false,
            ..RulesConfig::default()
        };
        let toggles = RuleToggles::from(&rules);
        assert!(!toggles.combat);
        assert!(!toggles.disease);
        assert!(toggles.credit);
    }
}
