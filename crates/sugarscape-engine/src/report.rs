//! End-of-run report, printed as JSON on stdout.

use rust_decimal::Decimal;
use serde::Serialize;

use sugarscape_agents::SocietyCounters;
use sugarscape_core::{SimulationEndReason, SimulationResult, SimulationState};
use sugarscape_types::Tribe;

use crate::progress::ProgressLog;

/// Snapshot of how a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalReport {
    /// World seed the run was built from.
    pub seed: u64,
    /// `rule-based` or `external-oracle`.
    pub decision_source: &'static str,
    /// Why the run stopped.
    pub end_reason: SimulationEndReason,
    /// Ticks executed.
    pub total_ticks: u64,
    /// Living agents at the end.
    pub agents_alive: usize,
    /// Largest population seen.
    pub peak_population: usize,
    /// Tick at which that peak was first reached.
    pub peak_tick: u64,
    /// Living agents per tribe.
    pub tribes: TribeCounts,
    /// Sugar held by living agents.
    pub agent_sugar: Decimal,
    /// Sugar held by agents and cells.
    pub total_sugar: Decimal,
    /// Ticks whose ledger audit did not balance.
    pub ledger_anomalies: u64,
    /// Ticks decided by the oracle.
    pub oracle_ticks: u64,
    /// Running totals.
    pub counters: SocietyCounters,
}

/// Living agents per tribe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TribeCounts {
    /// Agents whose culture has a strict majority of set bits.
    pub red: usize,
    /// Everyone else.
    pub blue: usize,
}

impl FinalReport {
    /// Assemble the report from the run result and the final state.
    pub fn new(
        seed: u64,
        decision_source: &'static str,
        result: &SimulationResult,
        state: &SimulationState,
        progress: &ProgressLog,
    ) -> Self {
        let population = &state.society.population;
        let mut tribes = TribeCounts::default();
        for agent in population.iter() {
            match agent.tribe() {
                Tribe::Red => tribes.red = tribes.red.saturating_add(1),
                Tribe::Blue => tribes.blue = tribes.blue.saturating_add(1),
            }
        }
        let agent_sugar: Decimal = population.iter().map(|a| a.sugar).sum();
        let total_sugar = result
            .final_summary
            .as_ref()
            .map_or(agent_sugar, |summary| summary.total_sugar);

        Self {
            seed,
            decision_source,
            end_reason: result.end_reason,
            total_ticks: result.total_ticks,
            agents_alive: population.len(),
            peak_population: progress.peak_population(),
            peak_tick: progress.peak_tick(),
            tribes,
            agent_sugar,
            total_sugar,
            ledger_anomalies: progress.anomalies(),
            oracle_ticks: progress.oracle_ticks(),
            counters: state.society.counters.clone(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use rust_decimal_macros::dec;
    use sugarscape_agents::{AgentBuilder, RuleConfig, Society};
    use sugarscape_core::{DecisionSource, NoOpCallback, RuleToggles, run_simulation};
    use sugarscape_types::{AgentId, BitString, Position};
    use sugarscape_world::Grid;

    use super::*;

    #[test]
    fn report_reflects_final_state() {
        let mut grid = Grid::new(4, 1).unwrap();
        for pos in grid.positions().collect::<Vec<_>>() {
            grid.set_capacity(pos, dec!(1)).unwrap();
            grid.set_sugar(pos, dec!(1)).unwrap();
        }
        let mut society = Society::new(grid, RuleConfig::default());
        for (n, culture) in [(0_u32, "110"), (3, "001")] {
            society
                .add_agent(
                    AgentBuilder::new(AgentId::new(u64::from(n) + 1), Position::new(n, 0))
                        .endowment(dec!(10))
                        .metabolism(dec!(1))
                        .culture(culture.parse::<BitString>().unwrap())
                        .build(),
                )
                .unwrap();
        }
        let mut state = SimulationState::new(society, 8);
        state.toggles = RuleToggles::none();
        let progress = ProgressLog::new(0, 2);
        let result = run_simulation(
            &mut state,
            &mut DecisionSource::rule_based(),
            3,
            &mut NoOpCallback,
        )
        .unwrap();

        let report = FinalReport::new(42, "rule-based", &result, &state, &progress);
        assert_eq!(report.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(report.total_ticks, 3);
        assert_eq!(report.agents_alive, 2);
        assert_eq!(report.peak_population, 2);
        assert_eq!(report.tribes, TribeCounts { red: 1, blue: 1 });
        assert_eq!(report.ledger_anomalies, 0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["end_reason"], "max_ticks_reached");
        assert_eq!(json["decision_source"], "rule-based");
        assert_eq!(json["tribes"]["red"], 1);
    }
}
