#![allow(dead_code)]

use taskgraph::plan::{RawPlan, RawTask, RunnerSection, TaskGraph};
use taskgraph::types::TaskStatus;

/// Builder for `TaskGraph` to simplify test setup.
pub struct TaskGraphBuilder {
    plan: RawPlan,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlan {
                config: RunnerSection::default(),
                setup: Vec::new(),
                program: Vec::new(),
            },
        }
    }

    pub fn setup(mut self, task: RawTask) -> Self {
        self.plan.setup.push(task);
        self
    }

    pub fn program(mut self, task: RawTask) -> Self {
        self.plan.program.push(task);
        self
    }

    pub fn fail_fast(mut self, val: bool) -> Self {
        self.plan.config.fail_fast = val;
        self
    }

    pub fn cancel_after(mut self, duration: &str) -> Self {
        self.plan.config.cancel_after = Some(duration.to_string());
        self
    }

    pub fn raw(self) -> RawPlan {
        self.plan
    }

    pub fn build(self) -> TaskGraph {
        TaskGraph::from_raw(self.plan.setup, self.plan.program)
            .expect("Failed to build valid task graph from builder")
    }
}

impl Default for TaskGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RawTask`.
pub struct RawTaskBuilder {
    task: RawTask,
}

impl RawTaskBuilder {
    pub fn new(kind: &str) -> Self {
        Self {
            task: RawTask::new(kind),
        }
    }

    pub fn after(mut self, dep: usize) -> Self {
        self.task.depends_on.push(dep);
        self
    }

    pub fn required_for(mut self, dependents: &[usize]) -> Self {
        self.task.required_for = Some(dependents.to_vec());
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = Some(name.to_string());
        self
    }

    pub fn script(mut self, script: &str) -> Self {
        self.task.script = Some(script.to_string());
        self
    }

    pub fn build(self) -> RawTask {
        self.task
    }
}

/// Shorthand for `RawTaskBuilder::new(kind).build()`.
pub fn task(kind: &str) -> RawTask {
    RawTaskBuilder::new(kind).build()
}

/// Shorthand for a task of `kind` depending on `deps`.
pub fn task_after(kind: &str, deps: &[usize]) -> RawTask {
    deps.iter()
        .fold(RawTaskBuilder::new(kind), |b, &dep| b.after(dep))
        .build()
}
