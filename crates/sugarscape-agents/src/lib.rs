//! Agent population and behaviour rules for the Sugarscape simulation.
//!
//! This crate contains the rule layer -- everything that mutates agents and
//! cells during a tick, without knowing where decisions come from. It sits
//! between `sugarscape-world` (the grid) and `sugarscape-core` (tick
//! ordering and decision sources).
//!
//! Every rule operates on a [`Society`], which bundles the grid, the agents,
//! the sugar ledger, the aggregate counters and the rule parameters. All
//! sugar movement goes through [`Society::transfer`], [`Society::harvest`]
//! and [`Society::burn`], so the ledger always reflects the state.
//!
//! # Modules
//!
//! - [`combat`] -- Cross-tribe attacks on weaker visible agents
//! - [`config`] -- Rule parameters ([`RuleConfig`])
//! - [`counters`] -- Aggregate counters ([`SocietyCounters`])
//! - [`credit`] -- Lending, repayment, rollover and loan cleanup on death
//! - [`culture`] -- Culture tag propagation to adjacent agents
//! - [`death`] -- Death conditions and consequences ([`DeathCause`], [`DeathRecord`])
//! - [`disease`] -- Immune response and disease transmission
//! - [`error`] -- Error types for all agent operations ([`AgentError`])
//! - [`inheritance`] -- Estate division among living children
//! - [`movement`] -- Foraging and spatial tie-breaking
//! - [`population`] -- Agent container and builder ([`Population`], [`AgentBuilder`])
//! - [`reproduction`] -- Partner pairing and offspring placement
//! - [`society`] -- The mutable simulation state shared by every rule ([`Society`])

pub mod combat;
pub mod config;
pub mod counters;
pub mod credit;
pub mod culture;
pub mod death;
pub mod disease;
pub mod error;
pub mod inheritance;
pub mod movement;
pub mod population;
pub mod reproduction;
pub mod society;

// Re-export primary types at crate root for convenience.
pub use combat::{CombatOutcome, CombatTarget, attack, attack_target};
pub use config::{RuleConfig, UniformRange};
pub use counters::SocietyCounters;
pub use credit::{CreditPartners, IssuedLoan, LoanCleanup, RepaymentSummary};
pub use culture::spread_culture;
pub use death::{DeathCause, DeathRecord, check_death, process_deaths};
pub use disease::{ImmuneReport, generate_strains, immune_response, transmit_diseases};
pub use error::AgentError;
pub use inheritance::InheritanceOutcome;
pub use movement::{MoveOutcome, forage, forage_towards, stay};
pub use population::{AgentBuilder, Population};
pub use reproduction::{BirthRecord, reproduce};
pub use society::Society;
