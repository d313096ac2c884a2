//! Capacity generation for the classic Sugarscape terrain.
//!
//! Capacity falls off in concentric bands around one or more peaks:
//!
//! ```text
//! capacity(cell) = max over peaks of
//!     max_capacity - floor(distance(cell, peak) * max_capacity / radius)
//! ```
//!
//! where `distance` is the integer square root of the squared Euclidean
//! distance. Every cell starts full.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use sugarscape_types::Position;

use crate::error::WorldError;
use crate::grid::Grid;

/// A sugar hill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peak {
    /// Column of the summit.
    pub x: u32,
    /// Row of the summit.
    pub y: u32,
    /// Distance at which capacity reaches zero.
    pub radius: u32,
}

/// Capacity contributed by one peak at `pos`.
fn peak_capacity(peak: &Peak, pos: Position, max_capacity: u32) -> u32 {
    if peak.radius == 0 {
        return if pos.x == peak.x && pos.y == peak.y {
            max_capacity
        } else {
            0
        };
    }
    let dx = u64::from(pos.x.abs_diff(peak.x));
    let dy = u64::from(pos.y.abs_diff(peak.y));
    let squared = dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy));
    let distance = squared.isqrt();
    let falloff = distance
        .saturating_mul(u64::from(max_capacity))
        .checked_div(u64::from(peak.radius))
        .unwrap_or(u64::MAX);
    let falloff = u32::try_from(falloff).unwrap_or(u32::MAX);
    max_capacity.saturating_sub(falloff)
}

/// Build a full grid whose capacities follow the given peaks.
///
/// # Errors
///
/// Returns [`WorldError::InvalidDimensions`] for a zero-sized grid.
pub fn generate_landscape(
    width: u32,
    height: u32,
    peaks: &[Peak],
    max_capacity: u32,
) -> Result<Grid, WorldError> {
    let mut grid = Grid::new(width, height)?;
    let positions: Vec<Position> = grid.positions().collect();
    for pos in positions {
        let capacity = peaks
            .iter()
            .map(|peak| peak_capacity(peak, pos, max_capacity))
            .max()
            .unwrap_or(0);
        let capacity = Decimal::from(capacity);
        grid.set_capacity(pos, capacity)?;
        grid.set_sugar(pos, capacity)?;
    }
    info!(
        width,
        height,
        peaks = peaks.len(),
        max_capacity,
        total_sugar = %grid.total_sugar()?,
        "Landscape generated"
    );
    Ok(grid)
}
