//! Configuration loading and typed config structures for the Sugarscape simulation.
//!
//! The canonical configuration lives in `sugarscape-config.yaml` at the
//! project root (override the path with `SUGARSCAPE_CONFIG`). The structs
//! below mirror the YAML layout; every field has a default, so an empty
//! file is a valid configuration.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;

use sugarscape_agents::{RuleConfig, UniformRange};
use sugarscape_oracle::{OracleConfig, RuleSummary};
use sugarscape_types::AgeRange;
use sugarscape_world::Peak;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "sugarscape-config.yaml";

/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "SUGARSCAPE_CONFIG";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but cannot be used.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Grid, seed, and run length.
    #[serde(default)]
    pub world: WorldConfig,

    /// Seed population parameters.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Rule toggles and economic constants.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Disease strain pool and immunity sizes.
    #[serde(default)]
    pub disease: DiseaseConfig,

    /// External decision oracle.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `ORACLE_API_KEY`, `ORACLE_API_URL` and `ORACLE_MODEL` override the
    /// oracle section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.oracle.apply_env();
        Ok(config)
    }

    /// The config path to load: `SUGARSCAPE_CONFIG` if set, otherwise
    /// [`DEFAULT_CONFIG_PATH`].
    pub fn resolve_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
    }

    /// Reject values that parse but would make the run meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.width == 0 || self.world.height == 0 {
            return Err(ConfigError::Invalid {
                field: "world.width",
                reason: format!(
                    "grid must be at least 1x1, got {}x{}",
                    self.world.width, self.world.height
                ),
            });
        }
        let cells = u64::from(self.world.width).saturating_mul(u64::from(self.world.height));
        if u64::from(self.population.initial_agents) > cells {
            return Err(ConfigError::Invalid {
                field: "population.initial_agents",
                reason: format!(
                    "{} agents do not fit on {cells} cells",
                    self.population.initial_agents
                ),
            });
        }
        if self.disease.strain_length > self.disease.immunity_length {
            return Err(ConfigError::Invalid {
                field: "disease.strain_length",
                reason: format!(
                    "strains of length {} can never be covered by an immunity string of length {}",
                    self.disease.strain_length, self.disease.immunity_length
                ),
            });
        }
        if self.rules.combat_limit < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "rules.combat_limit",
                reason: "must not be negative".to_owned(),
            });
        }
        if self.rules.interest_rate < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "rules.interest_rate",
                reason: "must not be negative".to_owned(),
            });
        }
        Ok(())
    }

    /// Parameters read by the behaviour rules.
    pub fn rule_config(&self) -> RuleConfig {
        RuleConfig {
            combat_limit: self.rules.combat_limit,
            interest_rate: self.rules.interest_rate,
            loan_duration: self.rules.loan_duration,
            lifespan: self.population.max_age,
            female_fertility: self.population.female_fertility,
            male_fertility: self.population.male_fertility,
        }
    }

    /// Rule constants quoted to the decision oracle.
    pub const fn rule_summary(&self) -> RuleSummary {
        RuleSummary {
            combat_limit: self.rules.combat_limit,
            interest_rate: self.rules.interest_rate,
            loan_duration: self.rules.loan_duration,
        }
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Grid columns.
    #[serde(default = "default_side")]
    pub width: u32,

    /// Grid rows.
    #[serde(default = "default_side")]
    pub height: u32,

    /// Ticks to run before stopping.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Sugar each cell regrows per tick, up to its capacity.
    #[serde(default = "default_growback_rate")]
    pub growback_rate: u32,

    /// Capacity at the summit of a peak.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u32,

    /// Sugar hills.
    #[serde(default = "default_peaks")]
    pub peaks: Vec<Peak>,

    /// Ledger entries older than this many ticks are dropped.
    #[serde(default = "default_ledger_retention_ticks")]
    pub ledger_retention_ticks: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            width: default_side(),
            height: default_side(),
            max_ticks: default_max_ticks(),
            growback_rate: default_growback_rate(),
            max_capacity: default_max_capacity(),
            peaks: default_peaks(),
            ledger_retention_ticks: default_ledger_retention_ticks(),
        }
    }
}

/// Seed population parameters. Ranges are inclusive and sampled uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PopulationConfig {
    /// Agents placed at start.
    #[serde(default = "default_initial_agents")]
    pub initial_agents: u32,

    /// Vision radius.
    #[serde(default = "default_vision")]
    pub vision: UniformRange,

    /// Sugar burned per tick.
    #[serde(default = "default_metabolism")]
    pub metabolism: UniformRange,

    /// Age at the start of the run.
    #[serde(default = "default_initial_age")]
    pub initial_age: UniformRange,

    /// Age of death. Also used for newborns.
    #[serde(default = "default_max_age")]
    pub max_age: UniformRange,

    /// Starting sugar, which is also the reproduction threshold.
    #[serde(default = "default_initial_sugar")]
    pub initial_sugar: UniformRange,

    /// Fertility window for females.
    #[serde(default = "default_female_fertility")]
    pub female_fertility: AgeRange,

    /// Fertility window for males.
    #[serde(default = "default_male_fertility")]
    pub male_fertility: AgeRange,

    /// Culture bits per agent.
    #[serde(default = "default_culture_length")]
    pub culture_length: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            initial_agents: default_initial_agents(),
            vision: default_vision(),
            metabolism: default_metabolism(),
            initial_age: default_initial_age(),
            max_age: default_max_age(),
            initial_sugar: default_initial_sugar(),
            female_fertility: default_female_fertility(),
            male_fertility: default_male_fertility(),
            culture_length: default_culture_length(),
        }
    }
}

/// Rule toggles and economic constants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RulesConfig {
    /// Cross-tribe combat (replaces movement for the attacker).
    #[serde(default = "default_true")]
    pub combat_enabled: bool,

    /// Sexual reproduction.
    #[serde(default = "default_true")]
    pub reproduction_enabled: bool,

    /// Culture tag spreading.
    #[serde(default = "default_true")]
    pub culture_enabled: bool,

    /// Lending and borrowing.
    #[serde(default = "default_true")]
    pub credit_enabled: bool,

    /// Disease transmission and immune response.
    #[serde(default = "default_true")]
    pub disease_enabled: bool,

    /// Most sugar taken from one combat victim.
    #[serde(default = "default_combat_limit")]
    pub combat_limit: Decimal,

    /// Interest charged at a loan's due date.
    #[serde(default = "default_interest_rate")]
    pub interest_rate: Decimal,

    /// Ticks from issue to due date.
    #[serde(default = "default_loan_duration")]
    pub loan_duration: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            combat_enabled: true,
            reproduction_enabled: true,
            culture_enabled: true,
            credit_enabled: true,
            disease_enabled: true,
            combat_limit: default_combat_limit(),
            interest_rate: default_interest_rate(),
            loan_duration: default_loan_duration(),
        }
    }
}

/// Disease model sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DiseaseConfig {
    /// Distinct strains in the pool.
    #[serde(default = "default_strain_count")]
    pub strain_count: usize,

    /// Bits per strain.
    #[serde(default = "default_strain_length")]
    pub strain_length: usize,

    /// Bits in each immunity string.
    #[serde(default = "default_immunity_length")]
    pub immunity_length: usize,

    /// Strains given to each seed agent.
    #[serde(default = "default_initial_infections")]
    pub initial_infections: usize,
}

impl Default for DiseaseConfig {
    fn default() -> Self {
        Self {
            strain_count: default_strain_count(),
            strain_length: default_strain_length(),
            immunity_length: default_immunity_length(),
            initial_infections: default_initial_infections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,

    /// Ticks between progress lines; 0 turns them off.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            progress_interval: default_progress_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

const fn default_side() -> u32 {
    50
}

const fn default_max_ticks() -> u64 {
    500
}

const fn default_growback_rate() -> u32 {
    1
}

const fn default_max_capacity() -> u32 {
    4
}

fn default_peaks() -> Vec<Peak> {
    vec![
        Peak {
            x: 15,
            y: 15,
            radius: 20,
        },
        Peak {
            x: 35,
            y: 35,
            radius: 20,
        },
    ]
}

const fn default_ledger_retention_ticks() -> u64 {
    50
}

const fn default_initial_agents() -> u32 {
    100
}

const fn default_vision() -> UniformRange {
    UniformRange::new(1, 6)
}

const fn default_metabolism() -> UniformRange {
    UniformRange::new(1, 4)
}

const fn default_initial_age() -> UniformRange {
    UniformRange::new(0, 40)
}

const fn default_max_age() -> UniformRange {
    UniformRange::new(60, 100)
}

const fn default_initial_sugar() -> UniformRange {
    UniformRange::new(5, 25)
}

const fn default_female_fertility() -> AgeRange {
    AgeRange::new(12, 40)
}

const fn default_male_fertility() -> AgeRange {
    AgeRange::new(12, 50)
}

const fn default_culture_length() -> usize {
    11
}

const fn default_true() -> bool {
    true
}

const fn default_combat_limit() -> Decimal {
    Decimal::TEN
}

fn default_interest_rate() -> Decimal {
    Decimal::new(10, 2)
}

const fn default_loan_duration() -> u64 {
    10
}

const fn default_strain_count() -> usize {
    10
}

const fn default_strain_length() -> usize {
    10
}

const fn default_immunity_length() -> usize {
    50
}

const fn default_initial_infections() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_progress_interval() -> u64 {
    50
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.width, 50);
        assert_eq!(config.world.peaks.len(), 2);
        assert_eq!(config.population.initial_agents, 100);
        assert_eq!(config.rules.interest_rate, dec!(0.10));
        assert_eq!(config.disease.immunity_length, 50);
        assert!(!config.oracle.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  seed: 123
  width: 20
  height: 10
  max_ticks: 50
  growback_rate: 2
  max_capacity: 6
  peaks:
    - { x: 5, y: 5, radius: 8 }
  ledger_retention_ticks: 5

population:
  initial_agents: 12
  vision: { min: 2, max: 3 }
  metabolism: { min: 1, max: 1 }
  initial_age: { min: 10, max: 20 }
  max_age: { min: 70, max: 90 }
  initial_sugar: { min: 10, max: 10 }
  female_fertility: { start: 15, end: 35 }
  male_fertility: { start: 15, end: 45 }
  culture_length: 5

rules:
  combat_enabled: false
  credit_enabled: false
  combat_limit: 4
  interest_rate: 0.05
  loan_duration: 3

disease:
  strain_count: 3
  strain_length: 4
  immunity_length: 12
  initial_infections: 1

oracle:
  enabled: true
  backend: anthropic
  model: "test-model"
  max_attempts: 2

logging:
  level: "debug"
  json: true
  progress_interval: 10
"#;

        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_else(SimulationConfig::default);

        assert_eq!(config.world.seed, 123);
        assert_eq!(config.world.width, 20);
        assert_eq!(config.world.peaks.len(), 1);
        assert_eq!(config.population.vision, UniformRange::new(2, 3));
        assert_eq!(config.population.initial_age, UniformRange::new(10, 20));
        assert_eq!(config.population.female_fertility, AgeRange::new(15, 35));
        assert!(!config.rules.combat_enabled);
        assert!(config.rules.reproduction_enabled);
        assert_eq!(config.rules.interest_rate, dec!(0.05));
        assert_eq!(config.disease.strain_length, 4);
        assert!(config.oracle.enabled);
        assert_eq!(config.oracle.max_attempts, 2);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.logging.progress_interval, 10);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "world:\n  seed: 7\n";
        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_else(SimulationConfig::default);

        assert_eq!(config.world.seed, 7);
        assert_eq!(config.world.max_ticks, 500);
        assert_eq!(config.population.initial_agents, 100);
    }

    #[test]
    fn partial_rules_section_keeps_default_interest() {
        let yaml = "rules:\n  combat_limit: 3\n";
        let config = SimulationConfig::parse(yaml).ok().unwrap_or_default();
        assert_eq!(config.rules.combat_limit, dec!(3));
        assert_eq!(config.rules.interest_rate, dec!(0.10));
        assert_eq!(config.rule_summary().interest_rate, dec!(0.10));
    }

    #[test]
    fn parse_empty_yaml() {
        let config = SimulationConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn rule_config_projects_sections() {
        let yaml = "rules:\n  combat_limit: 3\n  loan_duration: 4\npopulation:\n  max_age: { min: 50, max: 55 }\n";
        let config = SimulationConfig::parse(yaml).ok().unwrap_or_default();
        let rules = config.rule_config();
        assert_eq!(rules.combat_limit, dec!(3));
        assert_eq!(rules.loan_duration, 4);
        assert_eq!(rules.lifespan, UniformRange::new(50, 55));
        assert_eq!(config.rule_summary().combat_limit, dec!(3));
    }

    #[test]
    fn overcrowded_population_is_rejected() {
        let yaml = "world:\n  width: 2\n  height: 2\npopulation:\n  initial_agents: 5\n";
        let config = SimulationConfig::parse(yaml).ok().unwrap_or_default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "population.initial_agents",
                ..
            })
        ));
    }

    #[test]
    fn uncoverable_strains_are_rejected() {
        let yaml = "disease:\n  strain_length: 8\n  immunity_length: 4\n";
        let config = SimulationConfig::parse(yaml).ok().unwrap_or_default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(DEFAULT_CONFIG_PATH);
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "project config should parse: {config:?}");
            if let Ok(config) = config {
                assert!(config.validate().is_ok());
            }
        }
    }
}
