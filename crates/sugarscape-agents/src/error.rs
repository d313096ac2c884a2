//! Error types for the sugarscape-agents crate.
//!
//! Rule resolution never panics. Inconsistent state (an id that is not in
//! the population, a grid cell that disagrees with an agent's position)
//! and checked-arithmetic overflow surface here instead.

use sugarscape_ledger::LedgerError;
use sugarscape_types::AgentId;
use sugarscape_world::WorldError;

/// Errors that can occur while resolving agent rules.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// An arithmetic overflow occurred during a sugar computation.
    #[error("arithmetic overflow in sugar computation: {context}")]
    ArithmeticOverflow {
        /// Description of what was being computed.
        context: String,
    },

    /// Agent with the given ID is not in the population.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// An agent with this ID is already in the population.
    #[error("duplicate agent id: {0}")]
    DuplicateAgent(AgentId),

    /// A grid operation failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// A ledger entry was rejected.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Build an [`AgentError::ArithmeticOverflow`] for `context`.
pub(crate) fn overflow(context: &str) -> AgentError {
    AgentError::ArithmeticOverflow {
        context: context.to_owned(),
    }
}
