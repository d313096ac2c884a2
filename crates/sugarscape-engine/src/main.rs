//! Sugarscape simulation binary.
//!
//! Wires the configuration, landscape, seed population and decision source
//! together and runs the tick cycle until the tick limit or extinction.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`SUGARSCAPE_CONFIG`, else `sugarscape-config.yaml`,
//!    else defaults)
//! 2. Initialize structured logging (`RUST_LOG` overrides `logging.level`)
//! 3. Validate the configuration
//! 4. Generate the landscape and spawn the seed population
//! 5. Select the decision source (rule-based, or the external oracle when
//!    `oracle.enabled` is set)
//! 6. Run the simulation loop
//! 7. Log the end of the run and print the final report as JSON

mod error;
mod progress;
mod report;
mod spawner;

use std::path::PathBuf;

use anyhow::Context as _;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use sugarscape_core::config::LoggingConfig;
use sugarscape_core::{
    DecisionSource, SimulationConfig, SimulationResult, SimulationState, log_simulation_end,
    run_simulation,
};
use sugarscape_oracle::OracleClient;

use crate::error::EngineError;
use crate::progress::ProgressLog;
use crate::report::FinalReport;

fn main() -> anyhow::Result<()> {
    // 1. Load configuration. Logging is not up yet, so failures surface
    //    through the returned error.
    let (config, loaded_from) = load_config().context("failed to load configuration")?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("sugarscape-engine starting");
    match &loaded_from {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        seed = config.world.seed,
        width = config.world.width,
        height = config.world.height,
        max_ticks = config.world.max_ticks,
        initial_agents = config.population.initial_agents,
        oracle = config.oracle.enabled,
        "Simulation parameters"
    );

    // 3. Validate.
    config.validate().context("invalid configuration")?;

    // 4-6. Build and run.
    let outcome = run(&config).context("simulation failed")?;

    // 7. Report.
    log_simulation_end(&outcome.result);
    let report = FinalReport::new(
        config.world.seed,
        outcome.source_name,
        &outcome.result,
        &outcome.state,
        &outcome.progress,
    );
    let json = serde_json::to_string_pretty(&report).context("failed to encode final report")?;
    println!("{json}");

    info!(
        end_reason = ?outcome.result.end_reason,
        total_ticks = outcome.result.total_ticks,
        "sugarscape-engine shutdown complete"
    );
    Ok(())
}

/// Everything `main` needs after the loop stops.
struct RunOutcome {
    result: SimulationResult,
    state: SimulationState,
    progress: ProgressLog,
    source_name: &'static str,
}

/// Build the world, pick the decision source, and run the loop.
fn run(config: &SimulationConfig) -> Result<RunOutcome, EngineError> {
    // Setup and the tick cycle draw from separate streams, both derived
    // from the world seed.
    let mut setup_rng = SmallRng::seed_from_u64(config.world.seed);
    let spawned = spawner::build_society(config, &mut setup_rng)?;
    let tick_seed: u64 = setup_rng.random();

    let mut source = decision_source(config)?;
    let source_name = source.name();

    let mut state = SimulationState::from_config(spawned.society, config, tick_seed);
    info!(
        agents = spawned.agents.len(),
        strains = spawned.strains.len(),
        source = source_name,
        "Simulation state assembled, entering tick loop"
    );

    let mut progress = ProgressLog::new(config.logging.progress_interval, state.population());
    let result = run_simulation(
        &mut state,
        &mut source,
        config.world.max_ticks,
        &mut progress,
    )?;

    Ok(RunOutcome {
        result,
        state,
        progress,
        source_name,
    })
}

/// Load the simulation configuration.
///
/// Reads the path from `SUGARSCAPE_CONFIG`, falling back to
/// `sugarscape-config.yaml` in the working directory. A missing file means
/// defaults; the returned path is `None` in that case.
fn load_config() -> Result<(SimulationConfig, Option<PathBuf>), EngineError> {
    let path = SimulationConfig::resolve_path();
    if path.exists() {
        let config = SimulationConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        // Env overrides still apply to the oracle section.
        Ok((SimulationConfig::parse("")?, None))
    }
}

/// Install the global tracing subscriber.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Rule-based decisions unless the oracle is enabled.
fn decision_source(config: &SimulationConfig) -> Result<DecisionSource, EngineError> {
    if !config.oracle.enabled {
        info!("Using rule-based decisions");
        return Ok(DecisionSource::rule_based());
    }
    let client = OracleClient::from_config(&config.oracle, config.rule_summary())?;
    info!(
        max_attempts = client.max_attempts(),
        "Using external decision oracle"
    );
    Ok(DecisionSource::oracle(client))
}
