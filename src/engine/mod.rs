//! Execution engine for dirsync
//!
//! The engine orchestrates:
//! 1. Planning - Build resources from config, filtered by target
//! 2. Diffing - Compare the directory against the configuration
//! 3. Executing - Apply changes with parallelism and per-entity locks

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::run;
pub use planner::{build_plan, teardown};
