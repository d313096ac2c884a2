//! Bounded simulation loop.
//!
//! [`run_simulation`] wraps [`run_tick`] and stops after `max_ticks` ticks
//! or when the last agent dies, whichever comes first. A tick error stops
//! the run immediately; in particular an oracle failure is never retried
//! at this level.
//!
//! [`run_tick`]: crate::tick::run_tick

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::decision::DecisionSource;
use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationEndReason {
    /// The configured number of ticks completed.
    MaxTicksReached,
    /// No agents are left.
    Extinction,
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Callback invoked after each tick completes.
pub trait TickCallback {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

impl<F> TickCallback for F
where
    F: FnMut(&TickSummary, &SimulationState),
{
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState) {
        self(summary, state);
    }
}

/// Run the simulation loop until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails. Ticks that completed before
/// the failure are not rolled back.
pub fn run_simulation(
    state: &mut SimulationState,
    source: &mut DecisionSource,
    max_ticks: u64,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks,
        agents = state.population(),
        source = source.name(),
        "Simulation starting"
    );

    loop {
        if total_ticks >= max_ticks {
            info!(total_ticks, max_ticks, "Tick limit reached");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::MaxTicksReached,
                final_summary: last_summary,
                total_ticks,
            });
        }

        let summary = tick::run_tick(state, source)?;
        total_ticks = total_ticks.saturating_add(1);

        callback.on_tick(&summary, state);

        if summary.agents_alive == 0 {
            info!(tick = summary.tick, "All agents dead -- extinction");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::Extinction,
                final_summary: Some(summary),
                total_ticks,
            });
        }

        last_summary = Some(summary);
    }
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    let summary = result.final_summary.as_ref();
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = summary.map(|s| s.tick),
        final_agents_alive = summary.map(|s| s.agents_alive),
        births = summary.map(|s| s.counters.births),
        deaths = summary.map(|s| s.counters.deaths()),
        combat_kills = summary.map(|s| s.counters.combat_kills),
        loans_issued = summary.map(|s| s.counters.loans_issued),
        "Simulation ended"
    );
}
