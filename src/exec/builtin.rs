// src/exec/builtin.rs

//! Task kinds that ship with the binary.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::exec::command::CommandLogic;
use crate::exec::context::TaskContext;
use crate::exec::logic::{Outcome, TaskFuture, TaskLogic};
use crate::exec::registry::TaskRegistry;
use crate::plan::{parse_duration, Task};

/// Kinds whose work happens entirely in the planner; at run time they only
/// need to resolve so that dependents become eligible.
pub const PASSTHROUGH_KINDS: &[&str] = &[
    "noop",
    "drop_blob",
    "drop_input",
    "drop_table",
    "drop_view",
    "drop_viz",
    "unset",
    "set",
];

/// Completes immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogic;

impl TaskLogic for NoopLogic {
    fn execute(&mut self, ctx: TaskContext) -> TaskFuture {
        Box::pin(async move {
            debug!(task = %ctx.handle(), "passthrough task resolved");
            Ok(Outcome::Completed)
        })
    }
}

/// Sleeps for the duration written in the task's `script` (e.g. `"250ms"`).
#[derive(Debug, Clone, Copy)]
pub struct DelayLogic {
    duration: Duration,
}

impl DelayLogic {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_task(task: &Task) -> Result<Self> {
        let raw = task
            .payload
            .script
            .as_deref()
            .ok_or_else(|| anyhow!("delay task {} needs a duration in `script`", task.handle))?;
        let duration = parse_duration(raw)
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("delay task {}", task.handle))?;
        Ok(Self::new(duration))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl TaskLogic for DelayLogic {
    fn execute(&mut self, ctx: TaskContext) -> TaskFuture {
        let duration = self.duration;
        Box::pin(async move {
            debug!(task = %ctx.handle(), ?duration, "delay task sleeping");
            tokio::time::sleep(duration).await;
            Ok(Outcome::Completed)
        })
    }
}

/// Register `command`, `delay`, and every passthrough kind.
pub fn register_builtins(registry: &mut TaskRegistry) -> &mut TaskRegistry {
    for &kind in PASSTHROUGH_KINDS {
        registry.register(kind, |_task: &Task| -> Result<Box<dyn TaskLogic>> {
            Ok(Box::new(NoopLogic))
        });
    }

    registry
        .register("command", |task: &Task| -> Result<Box<dyn TaskLogic>> {
            Ok(Box::new(CommandLogic::from_task(task)))
        })
        .register("delay", |task: &Task| -> Result<Box<dyn TaskLogic>> {
            Ok(Box::new(DelayLogic::from_task(task)?))
        })
}
