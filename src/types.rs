// src/types.rs

//! Core vocabulary shared by the planner model, the schedulers and the host.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Application-defined tag selecting the task logic (e.g. `"command"`,
/// `"drop_table"`). Resolved through the [`crate::exec::TaskRegistry`].
pub type TaskKind = String;

/// One of the two strictly ordered sub-runs of a task graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Setup,
    Program,
}

impl Phase {
    fn bit(self) -> u32 {
        match self {
            Phase::Setup => 0,
            Phase::Program => 1,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => f.write_str("setup"),
            Phase::Program => f.write_str("program"),
        }
    }
}

/// Lifecycle status of a task.
///
/// `Completed`, `Skipped` and `Failed` are terminal within a run. `Blocked`
/// may return to `Running` when the host resumes the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Blocked,
    Skipped,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Skipped | TaskStatus::Failed
        )
    }

    /// Terminal and non-failing: dependents may rely on it.
    pub fn is_resolved(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Skipped)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "blocked" => Ok(TaskStatus::Blocked),
            "skipped" => Ok(TaskStatus::Skipped),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("invalid task status: {other}")),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Reason code attached to a `Blocked` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskBlocker {
    Dependency,
    UserInteraction,
    HttpRequest,
}

/// Stable task identifier encoding `(phase, index-within-phase)`.
///
/// The phase lives in the lowest bit, the index in the remaining bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u32);

impl TaskHandle {
    pub fn new(phase: Phase, index: usize) -> Self {
        debug_assert!(index < (1usize << 31), "task index exceeds handle range");
        TaskHandle(((index as u32) << 1) | phase.bit())
    }

    pub fn phase(self) -> Phase {
        if self.0 & 1 == 0 {
            Phase::Setup
        } else {
            Phase::Program
        }
    }

    pub fn index(self) -> usize {
        (self.0 >> 1) as usize
    }

    /// Raw encoded value, e.g. for hosts that key their own tables by integer.
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.phase(), self.index())
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Status record emitted to the host after each scheduling round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskUpdate {
    pub handle: TaskHandle,
    pub status: TaskStatus,
    pub blocker: Option<TaskBlocker>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trips_phase_and_index() {
        let h = TaskHandle::new(Phase::Program, 42);
        assert_eq!(h.phase(), Phase::Program);
        assert_eq!(h.index(), 42);
        assert_eq!(h.to_string(), "program#42");

        let s = TaskHandle::new(Phase::Setup, 0);
        assert_eq!(s.phase(), Phase::Setup);
        assert_eq!(s.index(), 0);
        assert_ne!(s, TaskHandle::new(Phase::Program, 0));
    }

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!("Completed".parse::<TaskStatus>(), Ok(TaskStatus::Completed));
        assert_eq!(" skipped ".parse::<TaskStatus>(), Ok(TaskStatus::Skipped));
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn terminal_and_resolved_statuses() {
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Failed.is_resolved());
        assert!(TaskStatus::Skipped.is_resolved());
        assert!(!TaskStatus::Blocked.is_terminal());
    }
}
