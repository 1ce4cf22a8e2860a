// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the two phase schedulers, stepped by the [`Orchestrator`] state machine
//! - the [`Interrupt`] channel that wakes a waiting step
//! - the outbound queue of [`UpdateBatch`]es and the host-side [`TaskBoard`]
//!
//! The state machine lives in [`core`]; the async host used by the binary is
//! implemented in [`runtime`].

use std::fmt;

use crate::exec::Artifact;
use crate::types::{Phase, TaskUpdate};

/// Orchestrator state: `Idle → PreparingSchedulers → ExecutingSetup →
/// ExecutingProgram → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    Idle,
    PreparingSchedulers,
    ExecutingSetup,
    ExecutingProgram,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::PreparingSchedulers => "preparing schedulers",
            SchedulerState::ExecutingSetup => "executing setup",
            SchedulerState::ExecutingProgram => "executing program",
        };
        f.write_str(s)
    }
}

/// One flush worth of progress from a single phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBatch {
    pub phase: Phase,
    /// At most one entry per task, with its latest status.
    pub updates: Vec<TaskUpdate>,
    /// Artifacts published since the previous flush.
    pub artifacts: Vec<Artifact>,
}

pub mod board;
pub mod core;
pub mod interrupt;
pub mod runtime;

pub use board::{BoardCounts, BoardRow, TaskBoard};
pub use core::Orchestrator;
pub use interrupt::{Interrupt, InterruptListener};
pub use runtime::{RunSummary, Runtime, RuntimeOptions};
