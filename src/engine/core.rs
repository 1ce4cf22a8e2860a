// src/engine/core.rs

//! Two-phase orchestrator state machine.
//!
//! The orchestrator owns both [`PhaseScheduler`]s and the run's
//! [`ExecutionContext`]. Each call to [`Orchestrator::step`] performs exactly
//! one transition, so the host can interleave scheduler progress with its own
//! work (draining updates, watching signals, resuming blocked tasks).
//!
//! Progress leaves through a plain outbound queue of [`UpdateBatch`]es; nothing
//! else is observable from outside besides [`Orchestrator::state`].

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::dag::PhaseScheduler;
use crate::engine::interrupt::Interrupt;
use crate::engine::{SchedulerState, UpdateBatch};
use crate::errors::{Result, TaskGraphError};
use crate::exec::{ExecutionContext, TaskRegistry};
use crate::plan::{Task, TaskGraph};
use crate::types::{Phase, TaskHandle};

pub struct Orchestrator {
    state: SchedulerState,
    registry: Arc<TaskRegistry>,
    interrupt: Interrupt,
    setup: PhaseScheduler,
    program: PhaseScheduler,
    exec: ExecutionContext,
    /// Graph loaded but not prepared yet.
    staged: Option<TaskGraph>,
    updates_tx: mpsc::UnboundedSender<UpdateBatch>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("registry", &self.registry)
            .field("setup_tasks", &self.setup.len())
            .field("program_tasks", &self.program.len())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an idle orchestrator and the receiving end of its update queue.
    pub fn new(registry: Arc<TaskRegistry>) -> (Self, mpsc::UnboundedReceiver<UpdateBatch>) {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let interrupt = Interrupt::new();
        let orchestrator = Self {
            state: SchedulerState::Idle,
            registry,
            setup: PhaseScheduler::new(Phase::Setup, interrupt.listener()),
            program: PhaseScheduler::new(Phase::Program, interrupt.listener()),
            interrupt,
            exec: ExecutionContext::new(),
            staged: None,
            updates_tx,
        };
        (orchestrator, updates_rx)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Handle to the interrupt both phases wait on.
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn execution_context(&self) -> &ExecutionContext {
        &self.exec
    }

    /// Start a run of `graph`. Only allowed while `Idle`.
    ///
    /// Every task kind must be registered; nothing runs otherwise.
    pub fn load(&mut self, graph: TaskGraph) -> Result<()> {
        if self.state != SchedulerState::Idle {
            return Err(TaskGraphError::SchedulerBusy(format!(
                "cannot load a task graph while {}",
                self.state
            )));
        }
        self.registry.check_graph(&graph)?;

        self.setup = PhaseScheduler::new(Phase::Setup, self.interrupt.listener());
        self.program = PhaseScheduler::new(Phase::Program, self.interrupt.listener());
        self.exec = ExecutionContext::new();
        info!(tasks = graph.len(), "task graph loaded");
        self.staged = Some(graph);
        self.state = SchedulerState::PreparingSchedulers;
        Ok(())
    }

    /// Perform one state transition and return the resulting state.
    ///
    /// While executing a phase, one step is one `schedule_next`/`await_next`
    /// round pair, each followed by a flush.
    pub async fn step(&mut self) -> SchedulerState {
        match self.state {
            SchedulerState::Idle => {}
            SchedulerState::PreparingSchedulers => self.prepare_schedulers(),
            SchedulerState::ExecutingSetup => {
                let more = run_round(
                    &mut self.setup,
                    &mut self.exec,
                    &self.updates_tx,
                )
                .await;
                if !more {
                    info!(
                        completed = self.setup.completed_count(),
                        failed = self.setup.failed_count(),
                        "setup phase finished"
                    );
                    self.state = SchedulerState::ExecutingProgram;
                }
            }
            SchedulerState::ExecutingProgram => {
                let more = run_round(
                    &mut self.program,
                    &mut self.exec,
                    &self.updates_tx,
                )
                .await;
                if !more {
                    info!(
                        completed = self.program.completed_count(),
                        failed = self.program.failed_count(),
                        "program phase finished"
                    );
                    self.state = SchedulerState::Idle;
                }
            }
        }
        self.state
    }

    /// Step until the orchestrator is back to `Idle`.
    pub async fn run_to_idle(&mut self) {
        while self.step().await != SchedulerState::Idle {}
    }

    fn prepare_schedulers(&mut self) {
        let Some(graph) = self.staged.take() else {
            self.state = SchedulerState::Idle;
            return;
        };
        let (setup, program) = graph.into_parts();

        self.setup.prepare(setup, &self.registry, &self.exec);
        self.program.prepare(program, &self.registry, &self.exec);
        flush(&mut self.setup, &mut self.exec, &self.updates_tx);
        flush(&mut self.program, &mut self.exec, &self.updates_tx);

        self.state = SchedulerState::ExecutingSetup;
    }

    /// Relaunch a task that settled as `Blocked` or `Running`.
    ///
    /// Its new `Running` status goes out with the next flush.
    pub fn resume(&mut self, handle: TaskHandle) -> Result<()> {
        let executing = match handle.phase() {
            Phase::Setup => self.state == SchedulerState::ExecutingSetup,
            Phase::Program => self.state == SchedulerState::ExecutingProgram,
        };
        if !executing {
            return Err(TaskGraphError::NotResumable(format!(
                "{handle}: its phase is not executing ({})",
                self.state
            )));
        }
        let scheduler = match handle.phase() {
            Phase::Setup => &mut self.setup,
            Phase::Program => &mut self.program,
        };
        scheduler.resume(handle.index(), &self.exec)
    }

    /// Abort in-flight work of both phases and return to `Idle`.
    ///
    /// Used by hosts that decided to stop after an interrupt. Returns how many
    /// operations were aborted.
    pub fn shutdown(&mut self) -> usize {
        let aborted = self.setup.abort_in_flight() + self.program.abort_in_flight();
        flush(&mut self.setup, &mut self.exec, &self.updates_tx);
        flush(&mut self.program, &mut self.exec, &self.updates_tx);
        self.staged = None;
        self.state = SchedulerState::Idle;
        info!(aborted, "orchestrator shut down");
        aborted
    }

    pub fn scheduler(&self, phase: Phase) -> &PhaseScheduler {
        match phase {
            Phase::Setup => &self.setup,
            Phase::Program => &self.program,
        }
    }

    pub fn task(&self, handle: TaskHandle) -> Option<&Task> {
        self.scheduler(handle.phase()).task(handle.index())
    }
}

async fn run_round(
    scheduler: &mut PhaseScheduler,
    exec: &mut ExecutionContext,
    updates_tx: &mpsc::UnboundedSender<UpdateBatch>,
) -> bool {
    scheduler.schedule_next(exec);
    flush(scheduler, exec, updates_tx);
    let more = scheduler.await_next().await;
    flush(scheduler, exec, updates_tx);
    more
}

/// Emit one batch with the phase's changed statuses plus every artifact
/// published since the previous flush.
fn flush(
    scheduler: &mut PhaseScheduler,
    exec: &mut ExecutionContext,
    updates_tx: &mpsc::UnboundedSender<UpdateBatch>,
) {
    let updates = scheduler.flush_updates();
    let artifacts = exec.absorb_pending();
    if updates.is_empty() && artifacts.is_empty() {
        return;
    }

    let batch = UpdateBatch {
        phase: scheduler.phase(),
        updates,
        artifacts,
    };
    if updates_tx.send(batch).is_err() {
        debug!("update receiver dropped; discarding batch");
    }
}
