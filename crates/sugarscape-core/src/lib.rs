//! Tick cycle, decision sources, and orchestration for the Sugarscape simulation.
//!
//! This crate owns the per-tick rule engine: growback, decisions,
//! combat/movement, reproduction, culture, credit, disease, death, and the
//! ledger audit, run in that order.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `sugarscape-config.yaml` into
//!   strongly-typed structs.
//! - [`decision`] -- [`DecisionSource`]: rule-based or external oracle, and
//!   the `should_act` gate every rule consults.
//! - [`perception`] -- Per-agent context assembly for the oracle.
//! - [`runner`] -- Bounded run loop ([`run_simulation`]).
//! - [`tick`] -- The per-tick engine loop ([`run_tick`]).
//!
//! [`DecisionSource`]: decision::DecisionSource
//! [`run_simulation`]: runner::run_simulation
//! [`run_tick`]: tick::run_tick

pub mod config;
pub mod decision;
pub mod perception;
pub mod runner;
pub mod tick;

pub use config::{ConfigError, SimulationConfig};
pub use decision::{DecisionError, DecisionSource, OracleSource};
pub use runner::{
    NoOpCallback, RunnerError, SimulationEndReason, SimulationResult, TickCallback,
    log_simulation_end, run_simulation,
};
pub use tick::{RuleToggles, SimulationState, TickError, TickSummary, run_tick};
