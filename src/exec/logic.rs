// src/exec/logic.rs

//! The pluggable per-task behaviour invoked by the phase scheduler.

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

use crate::exec::context::TaskContext;
use crate::types::{TaskBlocker, TaskStatus};

/// How a successful `execute` settled.
///
/// Failures are reported by returning `Err` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Skipped,
    /// Waiting on something outside the graph; the task stays scheduled until
    /// the host resumes it.
    Blocked(TaskBlocker),
    /// Work continues elsewhere; the task stays scheduled.
    Running,
    /// The logic gave no verdict. Treated like a failure by the scheduler.
    Pending,
}

impl Outcome {
    pub fn status(self) -> TaskStatus {
        match self {
            Outcome::Completed => TaskStatus::Completed,
            Outcome::Skipped => TaskStatus::Skipped,
            Outcome::Blocked(_) => TaskStatus::Blocked,
            Outcome::Running => TaskStatus::Running,
            Outcome::Pending => TaskStatus::Pending,
        }
    }

    pub fn blocker(self) -> Option<TaskBlocker> {
        match self {
            Outcome::Blocked(blocker) => Some(blocker),
            _ => None,
        }
    }
}

/// Future returned by [`TaskLogic::execute`].
///
/// It is spawned onto the Tokio runtime, so it must own everything it uses.
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<Outcome>> + Send + 'static>>;

/// Contract implemented once per task kind.
///
/// Task logic never touches scheduler state: it reads its [`TaskContext`] and
/// reports back only through hook return values.
pub trait TaskLogic: Send {
    /// Called once when the schedulers are prepared, for tasks that still
    /// need to run. An error marks the task `Failed`.
    fn prepare(&mut self, _ctx: &TaskContext) -> Result<()> {
        Ok(())
    }

    /// Called right before launch, only for tasks that are actually launched
    /// in this round. An error marks the task `Failed` and it is not launched.
    fn will_execute(&mut self, _ctx: &TaskContext) -> Result<()> {
        Ok(())
    }

    /// Start the asynchronous work.
    ///
    /// Called again when the host resumes a `Blocked` task.
    fn execute(&mut self, ctx: TaskContext) -> TaskFuture;
}
