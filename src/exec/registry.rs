// src/exec/registry.rs

//! Static `kind -> factory` lookup used when the schedulers are prepared.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;

use crate::errors::TaskGraphError;
use crate::exec::logic::TaskLogic;
use crate::plan::{Task, TaskGraph};
use crate::types::TaskKind;

/// Builds the logic instance for one task.
pub type LogicFactory = Box<dyn Fn(&Task) -> Result<Box<dyn TaskLogic>> + Send + Sync>;

/// Registry of task-logic factories, filled once at startup.
#[derive(Default)]
pub struct TaskRegistry {
    factories: BTreeMap<TaskKind, LogicFactory>,
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<TaskKind>, factory: F) -> &mut Self
    where
        F: Fn(&Task) -> Result<Box<dyn TaskLogic>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Check that every task kind of `graph` has a factory.
    pub fn check_graph(&self, graph: &TaskGraph) -> crate::errors::Result<()> {
        match graph.iter().find(|task| !self.contains(&task.kind)) {
            Some(task) => Err(TaskGraphError::UnknownKind(format!(
                "task {} has kind '{}' which has no registered logic",
                task.handle, task.kind
            ))),
            None => Ok(()),
        }
    }

    /// Build the logic instance for `task`.
    pub fn resolve(&self, task: &Task) -> crate::errors::Result<Box<dyn TaskLogic>> {
        let factory = self.factories.get(&task.kind).ok_or_else(|| {
            TaskGraphError::UnknownKind(format!("{} (task {})", task.kind, task.handle))
        })?;
        factory(task).map_err(TaskGraphError::from)
    }
}
