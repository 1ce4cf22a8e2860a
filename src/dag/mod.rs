// src/dag/mod.rs

//! Per-phase scheduling.
//!
//! - [`rank_queue`] is the indexed min-heap of tasks by unresolved
//!   dependency count.
//! - [`status_set`] provides the bitsets for scheduled/completed/failed.
//! - [`scheduler`] contains the [`PhaseScheduler`] that launches ready tasks
//!   and folds their outcomes back in.
//! - [`task_info`] holds per-task bookkeeping.
//! - [`scheduler_step`] defines the result type of a scheduling round.

pub mod rank_queue;
pub mod scheduler;
pub mod scheduler_step;
pub mod status_set;
pub mod task_info;

pub use rank_queue::RankQueue;
pub use scheduler::PhaseScheduler;
pub use scheduler_step::RoundReport;
pub use status_set::StatusSet;
pub use task_info::TaskEntry;
