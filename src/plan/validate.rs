// src/plan/validate.rs

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, TaskGraphError};
use crate::plan::model::{Plan, RawPlan, RawTask, Task, TaskGraph, TaskPayload};
use crate::types::{Phase, TaskHandle};

impl TryFrom<RawPlan> for Plan {
    type Error = TaskGraphError;

    fn try_from(raw: RawPlan) -> std::result::Result<Self, Self::Error> {
        raw.config
            .cancel_after()
            .map_err(|e| TaskGraphError::PlanError(format!("[config].cancel_after: {e}")))?;
        let graph = TaskGraph::from_raw(raw.setup, raw.program)?;
        Ok(Plan {
            config: raw.config,
            graph,
        })
    }
}

impl TaskGraph {
    /// Validate both phases of planner output and build the task records.
    ///
    /// Violations are caller errors and are reported before any task runs.
    pub fn from_raw(setup: Vec<RawTask>, program: Vec<RawTask>) -> Result<Self> {
        let now = Utc::now();
        let setup = build_phase(Phase::Setup, setup, now)?;
        let program = build_phase(Phase::Program, program, now)?;
        Ok(TaskGraph::new_unchecked(setup, program))
    }
}

fn build_phase(phase: Phase, raw: Vec<RawTask>, now: DateTime<Utc>) -> Result<Vec<Task>> {
    validate_kinds(phase, &raw)?;
    validate_dependencies(phase, &raw)?;
    let required_for = resolve_required_for(phase, &raw)?;
    validate_acyclic(phase, &raw)?;

    let tasks = raw
        .into_iter()
        .zip(required_for)
        .enumerate()
        .map(|(index, (task, required_for))| Task {
            handle: TaskHandle::new(phase, index),
            kind: task.kind,
            status: task.status,
            blocker: None,
            depends_on: task.depends_on,
            required_for,
            payload: Arc::new(TaskPayload {
                origin_statement: task.origin_statement,
                object_id: task.object_id,
                qualified_name: task.name,
                script: task.script,
            }),
            time_created: now,
            time_scheduled: None,
            time_last_update: now,
        })
        .collect();

    Ok(tasks)
}

fn validate_kinds(phase: Phase, raw: &[RawTask]) -> Result<()> {
    for (index, task) in raw.iter().enumerate() {
        if task.kind.trim().is_empty() {
            return Err(TaskGraphError::PlanError(format!(
                "{phase} task {index} has an empty `kind`"
            )));
        }
    }
    Ok(())
}

fn validate_dependencies(phase: Phase, raw: &[RawTask]) -> Result<()> {
    let len = raw.len();
    for (index, task) in raw.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for &dep in task.depends_on.iter() {
            if dep >= len {
                return Err(TaskGraphError::PlanError(format!(
                    "{phase} task {index} has unknown dependency {dep} in `depends_on` ({len} tasks in phase)"
                )));
            }
            if dep == index {
                return Err(TaskGraphError::PlanError(format!(
                    "{phase} task {index} cannot depend on itself"
                )));
            }
            if !seen.insert(dep) {
                return Err(TaskGraphError::PlanError(format!(
                    "{phase} task {index} lists dependency {dep} more than once"
                )));
            }
        }
    }
    Ok(())
}

/// Derive the transpose of `depends_on` and check it against any explicit
/// `required_for` arrays.
fn resolve_required_for(phase: Phase, raw: &[RawTask]) -> Result<Vec<Vec<usize>>> {
    let mut transpose: Vec<Vec<usize>> = vec![Vec::new(); raw.len()];
    for (index, task) in raw.iter().enumerate() {
        for &dep in task.depends_on.iter() {
            transpose[dep].push(index);
        }
    }

    let mut resolved = Vec::with_capacity(raw.len());
    for (index, (task, derived)) in raw.iter().zip(transpose).enumerate() {
        match &task.required_for {
            None => resolved.push(derived),
            Some(given) => {
                let given_set: BTreeSet<usize> = given.iter().copied().collect();
                let derived_set: BTreeSet<usize> = derived.iter().copied().collect();
                if given_set.len() != given.len() || given_set != derived_set {
                    return Err(TaskGraphError::PlanError(format!(
                        "{phase} task {index}: `required_for` {given:?} is not the transpose of `depends_on` (expected {derived:?})"
                    )));
                }
                resolved.push(given.clone());
            }
        }
    }

    Ok(resolved)
}

fn validate_acyclic(phase: Phase, raw: &[RawTask]) -> Result<()> {
    // Edge direction: dependency -> dependent.
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();

    for index in 0..raw.len() {
        graph.add_node(index);
    }

    for (index, task) in raw.iter().enumerate() {
        for &dep in task.depends_on.iter() {
            graph.add_edge(dep, index, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TaskGraphError::DagCycle(format!(
            "cycle detected in {phase} phase involving task {}",
            cycle.node_id()
        ))),
    }
}
