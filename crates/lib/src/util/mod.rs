//! Shared utilities.
//!
//! Path helpers used by the planner and the actions, plus test helpers.

pub mod path;
