//! The sugar grid: cells as a dense row-major array.
//!
//! [`Grid`] is the world container consumed by the rule engine. It answers
//! the spatial questions the rules ask (which cells can this agent see,
//! which neighbours are adjacent, is a cell free) and keeps the occupancy
//! index that makes those questions cheap.
//!
//! Vision is cardinal only: an agent sees `vision` cells north, east, south,
//! and west of itself, and nothing on the diagonals. Occupied cells do not
//! block sight. Queries return cells in direction order N, E, S, W and,
//! within a direction, nearest first. Callers that need a deterministic
//! "neighbour order" rely on that.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sugarscape_types::{AgentId, Position};

use crate::error::WorldError;

/// A single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Maximum regrowable sugar.
    pub capacity: Decimal,
    /// Sugar currently on the cell, `0 <= sugar <= capacity`.
    pub sugar: Decimal,
    /// The agent standing here, if any.
    pub occupant: Option<AgentId>,
}

impl Cell {
    /// A full cell with the given capacity and no occupant.
    pub const fn full(capacity: Decimal) -> Self {
        Self {
            capacity,
            sugar: capacity,
            occupant: None,
        }
    }
}

/// The four cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Decreasing `y`.
    North,
    /// Increasing `x`.
    East,
    /// Increasing `y`.
    South,
    /// Decreasing `x`.
    West,
}

impl Direction {
    /// All directions in query order.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];
}

/// A finite, non-wrapping grid of sugar cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create a grid of empty, zero-capacity cells.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] if either side is zero or
    /// the cell count does not fit in memory.
    pub fn new(width: u32, height: u32) -> Result<Self, WorldError> {
        let count = cell_count(width, height)?;
        Ok(Self {
            width,
            height,
            cells: vec![Cell::full(Decimal::ZERO); count],
        })
    }

    /// Create a grid whose cells start full at the given capacities,
    /// supplied in row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidDimensions`] for a zero-sized grid and
    /// [`WorldError::CapacityMismatch`] if the slice length is wrong.
    pub fn from_capacities(
        width: u32,
        height: u32,
        capacities: &[Decimal],
    ) -> Result<Self, WorldError> {
        let count = cell_count(width, height)?;
        if capacities.len() != count {
            return Err(WorldError::CapacityMismatch {
                expected: count,
                actual: capacities.len(),
            });
        }
        Ok(Self {
            width,
            height,
            cells: capacities.iter().copied().map(Cell::full).collect(),
        })
    }

    /// Grid width in cells.
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Whether `pos` lies inside the grid.
    pub const fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Row-major index of `pos`.
    fn index(&self, pos: Position) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        let row = usize::try_from(pos.y).ok()?;
        let col = usize::try_from(pos.x).ok()?;
        let width = usize::try_from(self.width).ok()?;
        row.checked_mul(width)?.checked_add(col)
    }

    /// Immutable access to a cell.
    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        self.index(pos).and_then(|i| self.cells.get(i))
    }

    /// Mutable access to a cell.
    pub fn cell_mut(&mut self, pos: Position) -> Option<&mut Cell> {
        self.index(pos).and_then(|i| self.cells.get_mut(i))
    }

    fn cell_or_err(&self, pos: Position) -> Result<&Cell, WorldError> {
        self.cell(pos).ok_or(WorldError::OutOfBounds(pos))
    }

    fn cell_mut_or_err(&mut self, pos: Position) -> Result<&mut Cell, WorldError> {
        self.cell_mut(pos).ok_or(WorldError::OutOfBounds(pos))
    }

    /// Every position, row-major.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Position::new(x, y)))
    }

    // -------------------------------------------------------------------
    // Sugar
    // -------------------------------------------------------------------

    /// Sugar currently on `pos`, or `None` outside the grid.
    pub fn sugar_at(&self, pos: Position) -> Option<Decimal> {
        self.cell(pos).map(|c| c.sugar)
    }

    /// Overwrite the sugar on a cell.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] or [`WorldError::InvalidSugar`]
    /// if the amount is negative or above the cell's capacity.
    pub fn set_sugar(&mut self, pos: Position, amount: Decimal) -> Result<(), WorldError> {
        let cell = self.cell_mut_or_err(pos)?;
        if amount < Decimal::ZERO || amount > cell.capacity {
            return Err(WorldError::InvalidSugar {
                position: pos,
                amount,
                capacity: cell.capacity,
            });
        }
        cell.sugar = amount;
        Ok(())
    }

    /// Set a cell's capacity, clamping current sugar down to it.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] or [`WorldError::InvalidSugar`]
    /// for a negative capacity.
    pub fn set_capacity(&mut self, pos: Position, capacity: Decimal) -> Result<(), WorldError> {
        let cell = self.cell_mut_or_err(pos)?;
        if capacity < Decimal::ZERO {
            return Err(WorldError::InvalidSugar {
                position: pos,
                amount: capacity,
                capacity,
            });
        }
        cell.capacity = capacity;
        cell.sugar = cell.sugar.min(capacity);
        Ok(())
    }

    /// Take all sugar from a cell, leaving it at zero.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`].
    pub fn harvest(&mut self, pos: Position) -> Result<Decimal, WorldError> {
        let cell = self.cell_mut_or_err(pos)?;
        let taken = cell.sugar;
        cell.sugar = Decimal::ZERO;
        Ok(taken)
    }

    /// Regrow every cell by `rate`, capped at capacity. Returns the total
    /// sugar added across the grid.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ArithmeticOverflow`] if a sum overflows.
    pub fn grow_back(&mut self, rate: Decimal) -> Result<Decimal, WorldError> {
        let mut grown = Decimal::ZERO;
        if rate <= Decimal::ZERO {
            return Ok(grown);
        }
        for cell in &mut self.cells {
            let target = cell
                .sugar
                .checked_add(rate)
                .ok_or(WorldError::ArithmeticOverflow)?
                .min(cell.capacity);
            let delta = target
                .checked_sub(cell.sugar)
                .ok_or(WorldError::ArithmeticOverflow)?;
            if delta > Decimal::ZERO {
                cell.sugar = target;
                grown = grown
                    .checked_add(delta)
                    .ok_or(WorldError::ArithmeticOverflow)?;
            }
        }
        debug!(%rate, %grown, "Growback applied");
        Ok(grown)
    }

    /// Total sugar lying on the grid.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ArithmeticOverflow`] if the sum overflows.
    pub fn total_sugar(&self) -> Result<Decimal, WorldError> {
        self.cells.iter().try_fold(Decimal::ZERO, |acc, cell| {
            acc.checked_add(cell.sugar)
                .ok_or(WorldError::ArithmeticOverflow)
        })
    }

    // -------------------------------------------------------------------
    // Occupancy
    // -------------------------------------------------------------------

    /// The agent on `pos`, if any.
    pub fn occupant(&self, pos: Position) -> Option<AgentId> {
        self.cell(pos).and_then(|c| c.occupant)
    }

    /// Whether `pos` holds an agent. Cells outside the grid count as
    /// occupied so they are never chosen as destinations.
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.cell(pos).is_none_or(|c| c.occupant.is_some())
    }

    /// Put an agent on an empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`] or [`WorldError::CellOccupied`].
    pub fn place(&mut self, agent: AgentId, pos: Position) -> Result<(), WorldError> {
        let cell = self.cell_mut_or_err(pos)?;
        if let Some(occupant) = cell.occupant {
            return Err(WorldError::CellOccupied {
                position: pos,
                occupant,
            });
        }
        cell.occupant = Some(agent);
        Ok(())
    }

    /// Clear a cell's occupant, returning who was there.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::OutOfBounds`].
    pub fn vacate(&mut self, pos: Position) -> Result<Option<AgentId>, WorldError> {
        Ok(self.cell_mut_or_err(pos)?.occupant.take())
    }

    /// Move an agent between cells. Moving onto its own cell is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotOccupant`] if the agent is not on `from`,
    /// or [`WorldError::CellOccupied`] if `to` holds someone else.
    pub fn relocate(
        &mut self,
        agent: AgentId,
        from: Position,
        to: Position,
    ) -> Result<(), WorldError> {
        if self.cell_or_err(from)?.occupant != Some(agent) {
            return Err(WorldError::NotOccupant {
                agent,
                position: from,
            });
        }
        if from == to {
            return Ok(());
        }
        self.place(agent, to)?;
        self.cell_mut_or_err(from)?.occupant = None;
        Ok(())
    }

    // -------------------------------------------------------------------
    // Spatial queries
    // -------------------------------------------------------------------

    /// The cell `steps` cells from `pos` in `direction`, if inside the grid.
    pub fn step(&self, pos: Position, direction: Direction, steps: u32) -> Option<Position> {
        let next = match direction {
            Direction::North => Position::new(pos.x, pos.y.checked_sub(steps)?),
            Direction::East => Position::new(pos.x.checked_add(steps)?, pos.y),
            Direction::South => Position::new(pos.x, pos.y.checked_add(steps)?),
            Direction::West => Position::new(pos.x.checked_sub(steps)?, pos.y),
        };
        self.contains(next).then_some(next)
    }

    /// Cells reachable from `pos` by moving purely horizontally or purely
    /// vertically `1..=vision` steps, with their distance. Excludes `pos`.
    pub fn cardinal_cells(&self, pos: Position, vision: u32) -> Vec<(Position, u32)> {
        let mut out = Vec::new();
        for direction in Direction::ALL {
            for steps in 1..=vision {
                match self.step(pos, direction, steps) {
                    Some(cell) => out.push((cell, steps)),
                    None => break,
                }
            }
        }
        out
    }

    /// The von Neumann neighbours of `pos` that lie inside the grid.
    pub fn adjacent_cells(&self, pos: Position) -> Vec<Position> {
        Direction::ALL
            .iter()
            .filter_map(|d| self.step(pos, *d, 1))
            .collect()
    }

    /// Unoccupied von Neumann neighbours of `pos`.
    pub fn empty_adjacent_cells(&self, pos: Position) -> Vec<Position> {
        self.adjacent_cells(pos)
            .into_iter()
            .filter(|p| !self.is_occupied(*p))
            .collect()
    }

    /// Agents standing within `vision` cardinal steps of `pos`, with their
    /// cell and distance, in neighbour order.
    pub fn agents_in_vision(&self, pos: Position, vision: u32) -> Vec<(AgentId, Position, u32)> {
        self.cardinal_cells(pos, vision)
            .into_iter()
            .filter_map(|(cell, distance)| {
                self.occupant(cell).map(|agent| (agent, cell, distance))
            })
            .collect()
    }

    /// Agents on the von Neumann neighbours of `pos`, in neighbour order.
    pub fn adjacent_agents(&self, pos: Position) -> Vec<AgentId> {
        self.adjacent_cells(pos)
            .into_iter()
            .filter_map(|p| self.occupant(p))
            .collect()
    }
}

/// Number of cells in a `width x height` grid.
fn cell_count(width: u32, height: u32) -> Result<usize, WorldError> {
    let invalid = || WorldError::InvalidDimensions { width, height };
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    let w = usize::try_from(width).map_err(|_overflow| invalid())?;
    let h = usize::try_from(height).map_err(|_overflow| invalid())?;
    w.checked_mul(h).ok_or_else(invalid)
}
