// src/dag/scheduler.rs

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::dag::rank_queue::RankQueue;
use crate::dag::scheduler_step::RoundReport;
use crate::dag::status_set::StatusSet;
use crate::dag::task_info::TaskEntry;
use crate::engine::InterruptListener;
use crate::errors::{Result, TaskGraphError};
use crate::exec::{ExecutionContext, Outcome, TaskContext, TaskRegistry};
use crate::plan::Task;
use crate::types::{Phase, TaskHandle, TaskStatus, TaskUpdate};

/// Completion report sent by a launched `execute` future.
#[derive(Debug)]
struct TaskSettled {
    index: usize,
    result: anyhow::Result<Outcome>,
}

/// Runs the tasks of one phase in dependency order.
///
/// It is responsible for:
/// - tracking each task's rank (unresolved dependencies) in a [`RankQueue`]
/// - launching every rank-zero task of a round concurrently
/// - folding settled operations back into the scheduled/completed/failed sets
/// - starving dependents of failed tasks
/// - batching status changes for the host
///
/// All state is owned here and only touched from the orchestrator's step;
/// task logic sees snapshots through [`TaskContext`].
#[derive(Debug)]
pub struct PhaseScheduler {
    phase: Phase,
    entries: Vec<TaskEntry>,
    queue: RankQueue,
    scheduled: StatusSet,
    completed: StatusSet,
    failed: StatusSet,
    in_flight: Vec<Option<AbortHandle>>,
    settled_tx: mpsc::UnboundedSender<TaskSettled>,
    settled_rx: mpsc::UnboundedReceiver<TaskSettled>,
    interrupt: InterruptListener,
    /// Indices touched since the last flush, in touch order.
    dirty: Vec<usize>,
    started: bool,
}

impl PhaseScheduler {
    pub fn new(phase: Phase, interrupt: InterruptListener) -> Self {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        Self {
            phase,
            entries: Vec::new(),
            queue: RankQueue::new(),
            scheduled: StatusSet::default(),
            completed: StatusSet::default(),
            failed: StatusSet::default(),
            in_flight: Vec::new(),
            settled_tx,
            settled_rx,
            interrupt,
            dirty: Vec::new(),
            started: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Seed the queue with this phase's tasks and run their `prepare` hooks.
    ///
    /// - `Completed`/`Skipped` tasks are resolved right away, without logic.
    /// - `Failed` tasks are recorded as failed and never scheduled.
    /// - Everything else gets a logic instance from `registry` and its
    ///   `prepare` hook; an error there marks the task `Failed`.
    pub fn prepare(&mut self, tasks: Vec<Task>, registry: &TaskRegistry, exec: &ExecutionContext) {
        let len = tasks.len();

        self.queue.build(
            tasks
                .iter()
                .map(|task| (task.handle.index(), task.depends_on.len() as u32)),
        );
        self.scheduled.reset(len);
        self.completed.reset(len);
        self.failed.reset(len);
        self.in_flight = (0..len).map(|_| None).collect();
        self.entries = tasks.into_iter().map(TaskEntry::new).collect();
        self.dirty.clear();
        self.started = false;

        for index in 0..len {
            match self.entries[index].task.status {
                TaskStatus::Completed | TaskStatus::Skipped => self.finalize(index),
                TaskStatus::Failed => {
                    self.failed.insert(index);
                }
                _ => self.prepare_one(index, registry, exec),
            }
        }

        info!(
            phase = %self.phase,
            tasks = len,
            resolved = self.completed.len(),
            failed = self.failed.len(),
            "phase prepared"
        );
    }

    fn prepare_one(&mut self, index: usize, registry: &TaskRegistry, exec: &ExecutionContext) {
        let entry = &mut self.entries[index];
        let ctx = exec.task_context(&entry.task);

        let prepared = registry
            .resolve(&entry.task)
            .map_err(anyhow::Error::from)
            .and_then(|mut logic| {
                logic.prepare(&ctx)?;
                Ok(logic)
            });

        match prepared {
            Ok(logic) => entry.logic = Some(logic),
            Err(err) => {
                warn!(task = %entry.task.handle, error = %format!("{err:#}"), "task prepare failed");
                self.mark_failed(index);
            }
        }
    }

    /// Launch every task currently at rank zero.
    ///
    /// `will_execute` runs for the whole round before any `execute` is
    /// launched, and all launches happen before anything is awaited.
    pub fn schedule_next(&mut self, exec: &ExecutionContext) -> RoundReport {
        if !self.started {
            // Fires from before this phase started (e.g. during setup) are stale.
            self.interrupt.mark_seen();
            self.started = true;
        }

        let mut report = RoundReport::default();
        let mut ready = Vec::new();

        while self.queue.top_rank() == Some(0) {
            let Some(index) = self.queue.pop() else { break };

            if self.failed.contains(index) {
                continue;
            }
            if self.completed.contains(index) || self.entries[index].task.status.is_resolved() {
                self.finalize(index);
                report.finalized.push(index);
                continue;
            }

            let entry = &mut self.entries[index];
            let ctx = exec.task_context(&entry.task);
            let checked = match entry.logic.as_mut() {
                Some(logic) => logic.will_execute(&ctx),
                None => Err(anyhow!("task has no logic instance")),
            };

            match checked {
                Ok(()) => ready.push((index, ctx)),
                Err(err) => {
                    warn!(task = %entry.task.handle, error = %format!("{err:#}"), "task will_execute failed");
                    self.mark_failed(index);
                    report.failed.push(index);
                }
            }
        }

        for (index, ctx) in ready {
            self.entries[index].mark_scheduled();
            self.dirty.push(index);
            self.scheduled.insert(index);
            self.launch(index, ctx);
            report.launched.push(index);
        }

        if !report.is_empty() {
            debug!(
                phase = %self.phase,
                launched = ?report.launched,
                finalized = ?report.finalized,
                failed = ?report.failed,
                "round scheduled"
            );
        }

        report
    }

    fn launch(&mut self, index: usize, ctx: TaskContext) {
        let handle = self.entries[index].task.handle;
        let Some(logic) = self.entries[index].logic.as_mut() else {
            return;
        };
        let fut = logic.execute(ctx);

        // The inner task may panic or be aborted; the outer one always reports.
        let inner = tokio::spawn(fut);
        let abort = inner.abort_handle();
        let tx = self.settled_tx.clone();
        tokio::spawn(async move {
            let result = match inner.await {
                Ok(result) => result,
                Err(err) if err.is_panic() => Err(anyhow!("task {handle} panicked")),
                Err(_) => Err(anyhow!("task {handle} was aborted")),
            };
            let _ = tx.send(TaskSettled { index, result });
        });

        self.in_flight[index] = Some(abort);
        debug!(task = %handle, "task launched");
    }

    /// Wait for the first in-flight operation to settle or for an interrupt.
    ///
    /// Returns whether this phase may still have work: a task still scheduled
    /// or a task at rank zero waiting for the next round. Tasks starved by a
    /// failed dependency do not count.
    pub async fn await_next(&mut self) -> bool {
        if !self.work_left() {
            self.report_starved();
            return false;
        }
        if self.queue.top_rank() == Some(0) {
            return true;
        }

        tokio::select! {
            settled = self.settled_rx.recv() => {
                if let Some(settled) = settled {
                    self.on_settled(settled);
                }
            }
            _ = self.interrupt.fired() => {
                debug!(phase = %self.phase, "phase woken by interrupt");
                return true;
            }
        }

        // Fold in whatever else already settled so the round sees it.
        while let Ok(settled) = self.settled_rx.try_recv() {
            self.on_settled(settled);
        }

        let more = self.work_left();
        if !more {
            self.report_starved();
        }
        more
    }

    fn on_settled(&mut self, settled: TaskSettled) {
        let TaskSettled { index, result } = settled;
        let Some(slot) = self.in_flight.get_mut(index) else {
            return;
        };
        *slot = None;

        if !self.scheduled.contains(index) {
            debug!(phase = %self.phase, index, "ignoring settlement of unscheduled task");
            return;
        }

        let handle = self.entries[index].task.handle;
        match result {
            Ok(outcome @ (Outcome::Completed | Outcome::Skipped)) => {
                self.entries[index].set_status(outcome.status(), None);
                self.dirty.push(index);
                self.finalize(index);
                debug!(task = %handle, status = %outcome.status(), "task resolved");
            }
            Ok(outcome @ (Outcome::Blocked(_) | Outcome::Running)) => {
                self.entries[index].set_status(outcome.status(), outcome.blocker());
                self.dirty.push(index);
                debug!(task = %handle, status = %outcome.status(), "task parked until resumed");
            }
            Ok(Outcome::Pending) => {
                warn!(task = %handle, "task settled without a verdict; marking it failed");
                self.mark_failed(index);
            }
            Err(err) => {
                warn!(task = %handle, error = %format!("{err:#}"), "task execution failed");
                self.mark_failed(index);
            }
        }
    }

    /// Relaunch `execute` for a parked (`Blocked` or `Running`) task.
    pub fn resume(&mut self, index: usize, exec: &ExecutionContext) -> Result<()> {
        let parked = self.scheduled.contains(index)
            && self.in_flight.get(index).is_some_and(Option::is_none)
            && matches!(
                self.entries[index].task.status,
                TaskStatus::Blocked | TaskStatus::Running
            );
        if !parked {
            return Err(TaskGraphError::NotResumable(format!(
                "{} is not parked in the {} phase",
                TaskHandle::new(self.phase, index),
                self.phase
            )));
        }

        let entry = &mut self.entries[index];
        let ctx = exec.task_context(&entry.task);
        entry.set_status(TaskStatus::Running, None);
        self.dirty.push(index);
        info!(task = %entry.task.handle, "resuming task");
        self.launch(index, ctx);
        Ok(())
    }

    /// One update per task whose state changed since the previous flush, in
    /// first-touch order.
    pub fn flush_updates(&mut self) -> Vec<TaskUpdate> {
        let mut seen = StatusSet::with_capacity(self.entries.len());
        let mut updates = Vec::new();
        for index in std::mem::take(&mut self.dirty) {
            if !seen.insert(index) {
                continue;
            }
            if let Some(update) = self.entries[index].take_update() {
                updates.push(update);
            }
        }
        updates
    }

    /// Abort every in-flight operation. Returns how many were running.
    pub fn abort_in_flight(&mut self) -> usize {
        let mut aborted = 0;
        for slot in self.in_flight.iter_mut() {
            if let Some(abort) = slot.take() {
                abort.abort();
                aborted += 1;
            }
        }
        aborted
    }

    /// Resolve `index`: record it completed and lower its dependents' ranks.
    /// Idempotent.
    fn finalize(&mut self, index: usize) {
        if !self.completed.insert(index) {
            return;
        }
        self.scheduled.remove(index);
        for &dependent in &self.entries[index].task.required_for {
            self.queue.decrement_rank(dependent);
        }
    }

    fn mark_failed(&mut self, index: usize) {
        self.scheduled.remove(index);
        self.failed.insert(index);
        self.entries[index].set_status(TaskStatus::Failed, None);
        self.dirty.push(index);
    }

    fn report_starved(&self) {
        let starved: Vec<TaskHandle> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                !self.completed.contains(*index)
                    && !self.failed.contains(*index)
                    && !self.scheduled.contains(*index)
            })
            .map(|(_, entry)| entry.task.handle)
            .collect();

        if !starved.is_empty() {
            warn!(
                phase = %self.phase,
                count = starved.len(),
                tasks = ?starved,
                "tasks left unscheduled behind failed dependencies"
            );
        }
    }

    /// Whether a task is still scheduled or a rank-zero task awaits a round.
    pub fn work_left(&self) -> bool {
        !self.scheduled.is_empty() || self.queue.top_rank() == Some(0)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.entries.get(index).map(|entry| &entry.task)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}
