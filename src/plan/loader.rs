// src/plan/loader.rs

use std::fs;
use std::path::Path;

use crate::errors::Result;
use crate::plan::model::{Plan, RawPlan};

/// Load a planner output file and return the raw, unvalidated [`RawPlan`].
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to also
/// check the dependency arrays.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawPlan> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let plan: RawPlan = toml::from_str(&contents)?;

    Ok(plan)
}

/// Load a planner output file and validate it.
///
/// - Reads TOML.
/// - Checks dependency index ranges, the `required_for` transpose and
///   acyclicity per phase.
/// - Checks `[config]` values.
///
/// Task kinds are checked later, against the registry, when the graph is
/// loaded into the orchestrator.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Plan> {
    let raw = load_from_path(&path)?;
    let plan = Plan::try_from(raw)?;
    Ok(plan)
}
