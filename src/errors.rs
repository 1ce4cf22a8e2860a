// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskGraphError {
    #[error("Plan error: {0}")]
    PlanError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown task kind: {0}")]
    UnknownKind(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("Scheduler busy: {0}")]
    SchedulerBusy(String),

    #[error("Task cannot be resumed: {0}")]
    NotResumable(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskGraphError>;
