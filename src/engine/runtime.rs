// src/engine/runtime.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::board::{BoardCounts, TaskBoard};
use crate::engine::core::Orchestrator;
use crate::engine::{SchedulerState, UpdateBatch};
use crate::errors::Result;
use crate::exec::TaskRegistry;
use crate::plan::{Plan, RunnerSection};

/// Host-level policies layered on top of the orchestrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Fire the interrupt and stop stepping after this long.
    pub cancel_after: Option<Duration>,
    /// Stop stepping after the first observed failure.
    pub fail_fast: bool,
    /// Treat Ctrl-C as a cancel request.
    pub handle_ctrl_c: bool,
}

impl RuntimeOptions {
    pub fn from_section(section: &RunnerSection) -> Result<Self> {
        let cancel_after = section
            .cancel_after()
            .map_err(crate::errors::TaskGraphError::PlanError)?;
        Ok(Self {
            cancel_after,
            fail_fast: section.fail_fast,
            handle_ctrl_c: true,
        })
    }
}

/// Final tally of a run, as seen by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub unfinished: usize,
    /// The host stopped stepping before the orchestrator went idle.
    pub cancelled: bool,
}

impl RunSummary {
    fn from_counts(counts: BoardCounts, cancelled: bool) -> Self {
        Self {
            completed: counts.completed,
            failed: counts.failed,
            skipped: counts.skipped,
            unfinished: counts.unfinished,
            cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

/// Drives one task graph to completion.
///
/// Steps the orchestrator, drains its update queue into a [`TaskBoard`] after
/// every step, and turns Ctrl-C, `cancel_after` and `fail_fast` into a
/// decision to stop stepping.
#[derive(Debug)]
pub struct Runtime {
    orchestrator: Orchestrator,
    updates_rx: mpsc::UnboundedReceiver<UpdateBatch>,
    board: TaskBoard,
    options: RuntimeOptions,
    cancelled: Arc<AtomicBool>,
}

impl Runtime {
    pub fn new(plan: Plan, registry: Arc<TaskRegistry>, options: RuntimeOptions) -> Result<Self> {
        let (mut orchestrator, updates_rx) = Orchestrator::new(registry);
        let board = TaskBoard::from_graph(&plan.graph);
        orchestrator.load(plan.graph)?;

        Ok(Self {
            orchestrator,
            updates_rx,
            board,
            options,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    /// Main loop: step until idle or until the host decides to stop.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!("taskgraph runtime started");
        let watchers = self.spawn_cancel_watchers();

        let mut stopped_early = false;
        loop {
            let state = self.orchestrator.step().await;
            self.drain_updates();

            if self.cancelled.load(Ordering::SeqCst) {
                warn!(?state, "cancel requested; stopping");
                stopped_early = true;
                break;
            }
            if self.options.fail_fast && self.board.counts().failed > 0 {
                warn!(?state, "task failed and fail_fast is set; stopping");
                stopped_early = true;
                break;
            }
            if state == SchedulerState::Idle {
                break;
            }
        }

        for watcher in watchers {
            watcher.abort();
        }

        if stopped_early {
            self.orchestrator.shutdown();
            self.drain_updates();
        }

        let cancelled = self.cancelled.load(Ordering::SeqCst);
        let summary = RunSummary::from_counts(self.board.counts(), cancelled);
        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            unfinished = summary.unfinished,
            cancelled = summary.cancelled,
            "runtime exiting"
        );
        Ok(summary)
    }

    fn drain_updates(&mut self) {
        while let Ok(batch) = self.updates_rx.try_recv() {
            debug!(
                phase = %batch.phase,
                updates = batch.updates.len(),
                artifacts = batch.artifacts.len(),
                "applying update batch"
            );
            self.board.apply(batch);
        }
    }

    /// Background tasks that set the cancel flag and fire the interrupt so a
    /// waiting step wakes up.
    fn spawn_cancel_watchers(&self) -> Vec<JoinHandle<()>> {
        let mut watchers = Vec::new();

        if self.options.handle_ctrl_c {
            let interrupt = self.orchestrator.interrupt_handle();
            let cancelled = Arc::clone(&self.cancelled);
            watchers.push(tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                info!("Ctrl+C received; cancelling run");
                cancelled.store(true, Ordering::SeqCst);
                interrupt.interrupt();
            }));
        }

        if let Some(after) = self.options.cancel_after {
            let interrupt = self.orchestrator.interrupt_handle();
            let cancelled = Arc::clone(&self.cancelled);
            watchers.push(tokio::spawn(async move {
                tokio::time::sleep(after).await;
                info!(?after, "cancel_after elapsed; cancelling run");
                cancelled.store(true, Ordering::SeqCst);
                interrupt.interrupt();
            }));
        }

        watchers
    }
}
