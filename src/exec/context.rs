// src/exec/context.rs

//! What task logic gets to see: its payload, an immutable snapshot of
//! already-resolved outputs, and a write-only pending-diff buffer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::plan::{Task, TaskPayload};
use crate::types::TaskHandle;

/// A value published by task logic (e.g. a created table name, a fetched
/// URL, a chart spec).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub producer: TaskHandle,
    pub key: String,
    pub value: String,
}

/// Artifacts that have been flushed, keyed by producing task.
pub type ResolvedOutputs = HashMap<TaskHandle, Vec<Artifact>>;

/// Pending-diff buffer shared by every task of a run.
///
/// Task logic appends through [`TaskContext::publish`]; the orchestrator
/// drains it on every flush.
#[derive(Debug, Clone, Default)]
pub struct DiffBuffer {
    inner: Arc<Mutex<Vec<Artifact>>>,
}

impl DiffBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, artifact: Artifact) {
        self.lock().push(artifact);
    }

    pub fn drain(&self) -> Vec<Artifact> {
        std::mem::take(&mut *self.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panicking publisher cannot leave the Vec half-written, so poisoning
    // is ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<Artifact>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Per-run state shared by both phase schedulers.
///
/// Owned by the orchestrator and only advanced inside its step function.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    diff: DiffBuffer,
    resolved: Arc<ResolvedOutputs>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diff(&self) -> &DiffBuffer {
        &self.diff
    }

    pub fn resolved(&self) -> &ResolvedOutputs {
        &self.resolved
    }

    /// Move pending artifacts into the resolved outputs and return them.
    ///
    /// Snapshots already handed to running tasks are unaffected.
    pub fn absorb_pending(&mut self) -> Vec<Artifact> {
        let pending = self.diff.drain();
        if !pending.is_empty() {
            let resolved = Arc::make_mut(&mut self.resolved);
            for artifact in pending.iter() {
                resolved
                    .entry(artifact.producer)
                    .or_default()
                    .push(artifact.clone());
            }
        }
        pending
    }

    /// Build the context handed to the hooks of `task`.
    pub fn task_context(&self, task: &Task) -> TaskContext {
        let phase = task.handle.phase();
        TaskContext {
            handle: task.handle,
            payload: Arc::clone(&task.payload),
            dependencies: task
                .depends_on
                .iter()
                .map(|&dep| TaskHandle::new(phase, dep))
                .collect(),
            resolved: Arc::clone(&self.resolved),
            diff: self.diff.clone(),
        }
    }
}

/// Context passed to every task-logic hook.
///
/// Cheap to clone; `execute` futures take it by value.
#[derive(Debug, Clone)]
pub struct TaskContext {
    handle: TaskHandle,
    payload: Arc<TaskPayload>,
    dependencies: Vec<TaskHandle>,
    resolved: Arc<ResolvedOutputs>,
    diff: DiffBuffer,
}

impl TaskContext {
    pub fn handle(&self) -> TaskHandle {
        self.handle
    }

    pub fn payload(&self) -> &TaskPayload {
        &self.payload
    }

    /// Handles of this task's `depends_on` entries.
    pub fn dependencies(&self) -> &[TaskHandle] {
        &self.dependencies
    }

    /// Resolved outputs of any task, as of the moment this context was built.
    pub fn output_of(&self, handle: TaskHandle) -> Option<&[Artifact]> {
        self.resolved.get(&handle).map(Vec::as_slice)
    }

    /// Resolved outputs of this task's direct dependencies.
    pub fn dependency_outputs(&self) -> impl Iterator<Item = &Artifact> + '_ {
        self.dependencies
            .iter()
            .filter_map(|dep| self.resolved.get(dep))
            .flatten()
    }

    /// Append an artifact to the run's pending diff.
    pub fn publish(&self, key: impl Into<String>, value: impl Into<String>) {
        self.diff.push(Artifact {
            producer: self.handle,
            key: key.into(),
            value: value.into(),
        });
    }
}
