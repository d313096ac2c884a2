//! Tick callback that logs periodic progress and tracks run-wide extremes
//! for the final report.

use rust_decimal::Decimal;
use tracing::{info, warn};

use sugarscape_core::{SimulationState, TickCallback, TickSummary};

/// Logs a progress line every `interval` ticks and remembers the peak
/// population and the number of unbalanced ticks.
#[derive(Debug)]
pub struct ProgressLog {
    interval: u64,
    peak_population: usize,
    peak_tick: u64,
    anomalies: u64,
    oracle_ticks: u64,
}

impl ProgressLog {
    /// Create a progress log. An interval of 0 disables the periodic line.
    pub const fn new(interval: u64, initial_population: usize) -> Self {
        Self {
            interval,
            peak_population: initial_population,
            peak_tick: 0,
            anomalies: 0,
            oracle_ticks: 0,
        }
    }

    /// Largest living population seen, including the seed population.
    pub const fn peak_population(&self) -> usize {
        self.peak_population
    }

    /// Tick at which the peak was first reached (0 for the seed population).
    pub const fn peak_tick(&self) -> u64 {
        self.peak_tick
    }

    /// Ticks whose ledger audit did not balance.
    pub const fn anomalies(&self) -> u64 {
        self.anomalies
    }

    /// Ticks decided by an external oracle.
    pub const fn oracle_ticks(&self) -> u64 {
        self.oracle_ticks
    }

    fn due(&self, tick: u64) -> bool {
        tick.checked_rem(self.interval).is_some_and(|r| r == 0)
    }
}

impl TickCallback for ProgressLog {
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState) {
        if summary.agents_alive > self.peak_population {
            self.peak_population = summary.agents_alive;
            self.peak_tick = summary.tick;
        }
        if summary.oracle_used {
            self.oracle_ticks = self.oracle_ticks.saturating_add(1);
        }
        if !summary.conservation.is_balanced() {
            self.anomalies = self.anomalies.saturating_add(1);
            warn!(
                tick = summary.tick,
                anomalies = self.anomalies,
                "Tick did not balance"
            );
        }

        if self.due(summary.tick) {
            let agent_sugar: Decimal = state.society.population.iter().map(|a| a.sugar).sum();
            info!(
                tick = summary.tick,
                agents_alive = summary.agents_alive,
                %agent_sugar,
                total_sugar = %summary.total_sugar,
                births = summary.counters.births,
                deaths = summary.counters.deaths(),
                combat_kills = summary.counters.combat_kills,
                loans_issued = summary.counters.loans_issued,
                "Progress"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;
    use sugarscape_agents::{AgentBuilder, RuleConfig, Society};
    use sugarscape_core::{DecisionSource, RuleToggles, run_tick};
    use sugarscape_types::{AgentId, Position};
    use sugarscape_world::Grid;

    use super::*;

    fn state() -> SimulationState {
        let mut grid = Grid::new(3, 3).unwrap();
        for pos in grid.positions().collect::<Vec<_>>() {
            grid.set_capacity(pos, dec!(2)).unwrap();
            grid.set_sugar(pos, dec!(2)).unwrap();
        }
        let mut society = Society::new(grid, RuleConfig::default());
        society
            .add_agent(
                AgentBuilder::new(AgentId::new(1), Position::new(1, 1))
                    .endowment(dec!(5))
                    .build(),
            )
            .unwrap();
        let mut state = SimulationState::new(society, 5);
        state.toggles = RuleToggles::none();
        state
    }

    #[test]
    fn interval_zero_never_fires() {
        let log = ProgressLog::new(0, 0);
        assert!(!log.due(0));
        assert!(!log.due(50));
    }

    #[test]
    fn interval_fires_on_multiples() {
        let log = ProgressLog::new(10, 0);
        assert!(log.due(10));
        assert!(log.due(20));
        assert!(!log.due(15));
    }

    #[test]
    fn tracks_peak_and_oracle_use() {
        let mut st = state();
        let mut log = ProgressLog::new(1, 0);
        let mut source = DecisionSource::rule_based();
        for _ in 0..3 {
            let summary = run_tick(&mut st, &mut source).unwrap();
            log.on_tick(&summary, &st);
        }
        assert_eq!(log.peak_population(), 1);
        assert_eq!(log.peak_tick(), 1);
        assert_eq!(log.anomalies(), 0);
        assert_eq!(log.oracle_ticks(), 0);
    }
}
