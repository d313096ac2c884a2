//! Error types for the `sugarscape-world` crate.

use rust_decimal::Decimal;
use sugarscape_types::{AgentId, Position};

/// Errors that can occur during grid operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The grid must have at least one row and one column.
    #[error("invalid grid dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The number of supplied capacities does not match the grid size.
    #[error("expected {expected} cell capacities, got {actual}")]
    CapacityMismatch {
        /// Cells in the grid.
        expected: usize,
        /// Capacities supplied.
        actual: usize,
    },

    /// The position lies outside the grid.
    #[error("position {0} is outside the grid")]
    OutOfBounds(Position),

    /// The cell already holds another agent.
    #[error("cell {position} is occupied by agent {occupant}")]
    CellOccupied {
        /// The contested cell.
        position: Position,
        /// The agent already there.
        occupant: AgentId,
    },

    /// The agent is not standing on the given cell.
    #[error("agent {agent} is not at {position}")]
    NotOccupant {
        /// The agent.
        agent: AgentId,
        /// The cell it was expected on.
        position: Position,
    },

    /// A sugar amount would break `0 <= sugar <= capacity`.
    #[error("sugar amount {amount} is invalid for cell {position} (capacity {capacity})")]
    InvalidSugar {
        /// The cell.
        position: Position,
        /// The rejected amount.
        amount: Decimal,
        /// The cell's capacity.
        capacity: Decimal,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,
}
