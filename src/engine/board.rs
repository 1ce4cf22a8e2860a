// src/engine/board.rs

//! Host-side view of a run, rebuilt from [`UpdateBatch`]es only.

use std::collections::BTreeMap;

use crate::engine::UpdateBatch;
use crate::exec::Artifact;
use crate::plan::TaskGraph;
use crate::types::{TaskBlocker, TaskHandle, TaskKind, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRow {
    pub kind: TaskKind,
    pub name: Option<String>,
    pub status: TaskStatus,
    pub blocker: Option<TaskBlocker>,
}

/// Status counts over every task on the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardCounts {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Pending, running or blocked.
    pub unfinished: usize,
}

/// Per-handle status table the host keeps in sync with the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    rows: BTreeMap<TaskHandle, BoardRow>,
    artifacts: Vec<Artifact>,
}

impl TaskBoard {
    /// Seed the board with the initial statuses of `graph`.
    pub fn from_graph(graph: &TaskGraph) -> Self {
        let rows = graph
            .iter()
            .map(|task| {
                (
                    task.handle,
                    BoardRow {
                        kind: task.kind.clone(),
                        name: task.payload.qualified_name.clone(),
                        status: task.status,
                        blocker: task.blocker,
                    },
                )
            })
            .collect();
        Self {
            rows,
            artifacts: Vec::new(),
        }
    }

    pub fn apply(&mut self, batch: UpdateBatch) {
        for update in batch.updates {
            if let Some(row) = self.rows.get_mut(&update.handle) {
                row.status = update.status;
                row.blocker = update.blocker;
            }
        }
        self.artifacts.extend(batch.artifacts);
    }

    pub fn status(&self, handle: TaskHandle) -> Option<TaskStatus> {
        self.rows.get(&handle).map(|row| row.status)
    }

    pub fn row(&self, handle: TaskHandle) -> Option<&BoardRow> {
        self.rows.get(&handle)
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn counts(&self) -> BoardCounts {
        let mut counts = BoardCounts::default();
        for row in self.rows.values() {
            match row.status {
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Skipped => counts.skipped += 1,
                TaskStatus::Pending | TaskStatus::Running | TaskStatus::Blocked => {
                    counts.unfinished += 1
                }
            }
        }
        counts
    }
}
