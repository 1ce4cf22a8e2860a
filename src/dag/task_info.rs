// src/dag/task_info.rs

//! Per-task bookkeeping owned by a phase scheduler.

use std::fmt;

use chrono::Utc;

use crate::exec::TaskLogic;
use crate::plan::Task;
use crate::types::{TaskBlocker, TaskStatus, TaskUpdate};

/// A task together with its logic instance and the last state the host saw.
pub struct TaskEntry {
    pub task: Task,
    /// `None` for tasks that never need to run (already resolved or failed
    /// while building their logic).
    pub(crate) logic: Option<Box<dyn TaskLogic>>,
    reported: (TaskStatus, Option<TaskBlocker>),
}

impl fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEntry")
            .field("task", &self.task)
            .field("has_logic", &self.logic.is_some())
            .field("reported", &self.reported)
            .finish()
    }
}

impl TaskEntry {
    pub fn new(task: Task) -> Self {
        let reported = (task.status, task.blocker);
        Self {
            task,
            logic: None,
            reported,
        }
    }

    pub fn set_status(&mut self, status: TaskStatus, blocker: Option<TaskBlocker>) {
        self.task.status = status;
        self.task.blocker = blocker;
        self.task.time_last_update = Utc::now();
    }

    pub fn mark_scheduled(&mut self) {
        let now = Utc::now();
        self.task.status = TaskStatus::Running;
        self.task.blocker = None;
        self.task.time_scheduled = Some(now);
        self.task.time_last_update = now;
    }

    /// Returns an update when the state differs from what was last reported.
    pub fn take_update(&mut self) -> Option<TaskUpdate> {
        let current = (self.task.status, self.task.blocker);
        if current == self.reported {
            return None;
        }
        self.reported = current;
        Some(TaskUpdate {
            handle: self.task.handle,
            status: current.0,
            blocker: current.1,
        })
    }
}
