// src/plan/mod.rs

//! Planner output: the task graph handed to the scheduler.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate dependency arrays and build [`TaskGraph`]s (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    parse_duration, Plan, RawPlan, RawTask, RunnerSection, Task, TaskGraph, TaskPayload,
};
