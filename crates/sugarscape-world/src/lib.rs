//! The sugar landscape for the Sugarscape simulation.
//!
//! This crate is the spatial container the rule engine runs on: a finite,
//! non-wrapping 2D grid whose cells hold a regrowable amount of sugar and at
//! most one agent.
//!
//! # Modules
//!
//! - [`error`] -- Error types for grid operations.
//! - [`grid`] -- [`Grid`] and [`Cell`]: sugar get/set, growback, occupancy,
//!   and cardinal-direction vision queries.
//! - [`landscape`] -- Peak-based capacity generation for the classic
//!   two-hill map.

pub mod error;
pub mod grid;
pub mod landscape;

pub use error::WorldError;
pub use grid::{Cell, Direction, Grid};
pub use landscape::{Peak, generate_landscape};
