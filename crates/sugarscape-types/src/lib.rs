//! Shared type definitions for the Sugarscape simulation.
//!
//! Every crate in the workspace depends on this one. It holds the plain data
//! the rule engine, the world grid, the ledger, and the decision oracle all
//! agree on. Nothing here performs I/O or owns simulation logic beyond small
//! invariant-preserving helpers.
//!
//! # Modules
//!
//! - [`bits`] -- Fixed-width [`BitString`] with subsequence search and
//!   single-bit flips (culture tags, diseases, immunity).
//! - [`decision`] -- [`Decision`] and [`DecisionCategory`], the per-agent
//!   record a decision source yields each tick.
//! - [`enums`] -- [`Sex`] and [`Tribe`].
//! - [`ids`] -- Strongly-typed [`AgentId`].
//! - [`perception`] -- [`AgentContext`], the payload sent to an external
//!   decision oracle.
//! - [`structs`] -- [`Position`], [`Loan`], [`AgeRange`], and the mutable
//!   [`AgentState`] record.

pub mod bits;
pub mod decision;
pub mod enums;
pub mod ids;
pub mod perception;
pub mod structs;

pub use bits::BitString;
pub use decision::{Decision, DecisionCategory};
pub use enums::{Sex, Tribe};
pub use ids::AgentId;
pub use perception::{AgentContext, LoanSummary, VisibleAgent, VisibleCell};
pub use structs::{AgeRange, AgentState, Loan, Position};
