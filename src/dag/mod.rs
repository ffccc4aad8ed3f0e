// src/dag/mod.rs

//! Task graph and schedule arithmetic.
//!
//! - [`graph`] holds the adjacency view of a blueprint or of a project's
//!   coded tasks, keyed by task code.
//! - [`schedule`] is the pure date arithmetic that turns prerequisite end
//!   dates into a planned start and a normative deadline.

pub mod graph;
pub mod schedule;

pub use graph::DagGraph;
pub use schedule::{PrerequisiteSummary, Schedule};
