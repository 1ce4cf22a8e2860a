// tests/orchestrator_scenarios.rs

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use taskgraph::engine::{Orchestrator, SchedulerState, TaskBoard, UpdateBatch};
use taskgraph::errors::TaskGraphError;
use taskgraph::plan::TaskGraph;
use taskgraph::types::{Phase, TaskBlocker, TaskHandle, TaskStatus};
use taskgraph_test_utils::builders::{task, task_after, RawTaskBuilder, TaskGraphBuilder};
use taskgraph_test_utils::fake_logic::{fake_registry, Recorder, TaskEvent};
use taskgraph_test_utils::{init_tracing, with_timeout};

fn program(index: usize) -> TaskHandle {
    TaskHandle::new(Phase::Program, index)
}

fn setup(index: usize) -> TaskHandle {
    TaskHandle::new(Phase::Setup, index)
}

fn start(recorder: &Recorder, graph: TaskGraph) -> (Orchestrator, mpsc::UnboundedReceiver<UpdateBatch>) {
    let (mut orch, rx) = Orchestrator::new(Arc::new(fake_registry(recorder)));
    orch.load(graph).unwrap();
    (orch, rx)
}

/// Step through preparation and an empty setup phase.
async fn step_into_program(orch: &mut Orchestrator) {
    while orch.state() != SchedulerState::ExecutingProgram {
        assert_ne!(orch.step().await, SchedulerState::Idle, "run ended early");
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<UpdateBatch>) -> Vec<UpdateBatch> {
    let mut batches = Vec::new();
    while let Ok(batch) = rx.try_recv() {
        batches.push(batch);
    }
    batches
}

fn status(orch: &Orchestrator, handle: TaskHandle) -> TaskStatus {
    orch.task(handle).unwrap().status
}

#[tokio::test]
async fn chain_runs_dependents_after_their_dependency() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new()
        .program(task("ok"))
        .program(task_after("ok", &[0]))
        .program(task_after("ok", &[0]))
        .build();
    let (mut orch, _rx) = start(&recorder, graph);

    with_timeout(async {
        step_into_program(&mut orch).await;

        // Round 1: only A.
        assert_eq!(orch.step().await, SchedulerState::ExecutingProgram);
        assert_eq!(recorder.started(), vec![program(0)]);
        assert_eq!(status(&orch, program(0)), TaskStatus::Completed);

        // Round 2: B and C together.
        orch.run_to_idle().await;
    })
    .await;

    let second_round: HashSet<_> = recorder.started()[1..].iter().copied().collect();
    assert_eq!(second_round, HashSet::from([program(1), program(2)]));
    assert_eq!(recorder.peak_concurrency(), 2);
    for index in 0..3 {
        assert_eq!(status(&orch, program(index)), TaskStatus::Completed);
    }
}

#[tokio::test]
async fn failed_task_starves_its_dependents() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new()
        .program(task("fails"))
        .program(task_after("ok", &[0]))
        .program(task_after("ok", &[1]))
        .program(task("ok"))
        .build();
    let (mut orch, mut rx) = start(&recorder, graph);

    with_timeout(orch.run_to_idle()).await;

    assert_eq!(orch.state(), SchedulerState::Idle);
    assert_eq!(status(&orch, program(0)), TaskStatus::Failed);
    assert_eq!(status(&orch, program(1)), TaskStatus::Pending);
    assert_eq!(status(&orch, program(2)), TaskStatus::Pending);
    assert_eq!(status(&orch, program(3)), TaskStatus::Completed);

    let started = recorder.started_set();
    assert!(!started.contains(&program(1)));
    assert!(!started.contains(&program(2)));

    // Starved tasks never show up in the update stream.
    let touched: HashSet<_> = drain(&mut rx)
        .into_iter()
        .flat_map(|b| b.updates)
        .map(|u| u.handle)
        .collect();
    assert!(!touched.contains(&program(1)));
}

#[tokio::test]
async fn independent_tasks_finish_in_one_round() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new()
        .program(task("ok"))
        .program(task("ok"))
        .program(task("ok"))
        .build();
    let (mut orch, _rx) = start(&recorder, graph);

    with_timeout(async {
        step_into_program(&mut orch).await;
        assert_eq!(orch.step().await, SchedulerState::Idle);
    })
    .await;

    for index in 0..3 {
        assert_eq!(status(&orch, program(index)), TaskStatus::Completed);
    }
    assert_eq!(recorder.peak_concurrency(), 3);
}

#[tokio::test]
async fn independent_tasks_run_concurrently() {
    init_tracing();
    // Deadlocks unless all four are in flight at once.
    let recorder = Recorder::with_barrier(4);
    let mut builder = TaskGraphBuilder::new();
    for _ in 0..4 {
        builder = builder.program(task("barrier"));
    }
    let (mut orch, _rx) = start(&recorder, builder.build());

    with_timeout(orch.run_to_idle()).await;
    assert_eq!(recorder.finished().len(), 4);
}

#[tokio::test]
async fn setup_resolves_before_any_program_task() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new()
        .setup(task("slow"))
        .setup(task("fails"))
        .program(task("ok"))
        .build();
    let (mut orch, _rx) = start(&recorder, graph);

    with_timeout(orch.run_to_idle()).await;

    let events = recorder.events();
    let position = |event: TaskEvent| events.iter().position(|e| *e == event).unwrap();
    let program_start = position(TaskEvent::Started(program(0)));
    assert!(position(TaskEvent::Finished(setup(0))) < program_start);
    assert!(position(TaskEvent::Finished(setup(1))) < program_start);

    assert_eq!(status(&orch, setup(1)), TaskStatus::Failed);
    assert_eq!(status(&orch, program(0)), TaskStatus::Completed);
}

#[tokio::test]
async fn already_resolved_tasks_are_not_executed() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new()
        .program(RawTaskBuilder::new("ok").status(TaskStatus::Completed).build())
        .program(task_after("ok", &[0]))
        .program(RawTaskBuilder::new("fails").status(TaskStatus::Skipped).build())
        .program(task_after("ok", &[1, 2]))
        .program(RawTaskBuilder::new("ok").status(TaskStatus::Failed).build())
        .program(task_after("ok", &[4]))
        .build();
    let (mut orch, mut rx) = start(&recorder, graph);

    with_timeout(orch.run_to_idle()).await;

    assert_eq!(recorder.started_set(), HashSet::from([program(1), program(3)]));
    assert_eq!(recorder.times_started(program(1)), 1);
    assert_eq!(recorder.times_started(program(3)), 1);

    // The skipped dependency counts once; task 3 still waits for task 1.
    let events = recorder.events();
    let position = |event: TaskEvent| events.iter().position(|e| *e == event).unwrap();
    assert!(position(TaskEvent::Finished(program(1))) < position(TaskEvent::Started(program(3))));

    assert_eq!(status(&orch, program(0)), TaskStatus::Completed);
    assert_eq!(status(&orch, program(2)), TaskStatus::Skipped);
    assert_eq!(status(&orch, program(3)), TaskStatus::Completed);
    assert_eq!(status(&orch, program(5)), TaskStatus::Pending);

    // Unchanged statuses are never reported.
    let touched: HashSet<_> = drain(&mut rx)
        .into_iter()
        .flat_map(|b| b.updates)
        .map(|u| u.handle)
        .collect();
    assert_eq!(touched, HashSet::from([program(1), program(3)]));
}

#[tokio::test]
async fn hook_failures_mark_tasks_failed_without_running_them() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new()
        .program(task("fails_prepare"))
        .program(task("fails_will_execute"))
        .program(task("panics"))
        .program(task("pending"))
        .program(task("ok"))
        .build();
    let (mut orch, _rx) = start(&recorder, graph);

    with_timeout(orch.run_to_idle()).await;

    for index in 0..4 {
        assert_eq!(status(&orch, program(index)), TaskStatus::Failed, "task {index}");
    }
    assert_eq!(status(&orch, program(4)), TaskStatus::Completed);
    let started = recorder.started_set();
    assert!(!started.contains(&program(0)));
    assert!(!started.contains(&program(1)));
    assert!(started.contains(&program(2)));
}

#[tokio::test]
async fn skipped_outcome_unblocks_dependents() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new()
        .program(task("skips"))
        .program(task_after("ok", &[0]))
        .build();
    let (mut orch, _rx) = start(&recorder, graph);

    with_timeout(orch.run_to_idle()).await;

    assert_eq!(status(&orch, program(0)), TaskStatus::Skipped);
    assert_eq!(status(&orch, program(1)), TaskStatus::Completed);
}

#[tokio::test]
async fn updates_are_deduplicated_per_flush() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new()
        .program(task("ok"))
        .program(task("ok"))
        .program(task_after("ok", &[0, 1]))
        .build();
    let (mut orch, mut rx) = start(&recorder, graph.clone());
    let mut board = TaskBoard::from_graph(&graph);

    with_timeout(orch.run_to_idle()).await;

    let batches = drain(&mut rx);
    assert!(!batches.is_empty());
    for batch in batches {
        assert_eq!(batch.phase, Phase::Program);
        let handles: Vec<_> = batch.updates.iter().map(|u| u.handle).collect();
        let unique: HashSet<_> = handles.iter().collect();
        assert_eq!(unique.len(), handles.len(), "duplicate handle in {handles:?}");
        board.apply(batch);
    }

    assert_eq!(board.counts().completed, 3);
    assert_eq!(board.counts().unfinished, 0);
    // One artifact per fake task that ran.
    assert_eq!(board.artifacts().len(), 3);
    assert_eq!(orch.execution_context().resolved().len(), 3);
}

#[tokio::test]
async fn interrupt_wakes_step_without_aborting_work() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new().program(task("slow")).build();
    let (mut orch, _rx) = start(&recorder, graph);

    with_timeout(async {
        step_into_program(&mut orch).await;

        let interrupt = orch.interrupt_handle();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            interrupt.interrupt();
        });

        assert_eq!(orch.step().await, SchedulerState::ExecutingProgram);
        assert_eq!(status(&orch, program(0)), TaskStatus::Running);
        assert_eq!(orch.scheduler(Phase::Program).in_flight_count(), 1);

        orch.run_to_idle().await;
    })
    .await;

    assert_eq!(status(&orch, program(0)), TaskStatus::Completed);
    assert_eq!(recorder.times_started(program(0)), 1);
}

#[tokio::test]
async fn blocked_task_completes_after_resume() {
    init_tracing();
    let recorder = Recorder::new();
    let graph = TaskGraphBuilder::new()
        .setup(task("ok"))
        .program(task("blocks"))
        .program(task_after("ok", &[0]))
        .build();
    let (mut orch, mut rx) = start(&recorder, graph);

    with_timeout(async {
        step_into_program(&mut orch).await;
        assert!(matches!(
            orch.resume(setup(0)),
            Err(TaskGraphError::NotResumable(_))
        ));

        assert_eq!(orch.step().await, SchedulerState::ExecutingProgram);
        let blocked = orch.task(program(0)).unwrap();
        assert_eq!(blocked.status, TaskStatus::Blocked);
        assert_eq!(blocked.blocker, Some(TaskBlocker::UserInteraction));
        assert!(matches!(
            orch.resume(program(1)),
            Err(TaskGraphError::NotResumable(_))
        ));

        orch.resume(program(0)).unwrap();
        orch.run_to_idle().await;
    })
    .await;

    assert_eq!(recorder.times_started(program(0)), 2);
    assert_eq!(status(&orch, program(0)), TaskStatus::Completed);
    assert_eq!(status(&orch, program(1)), TaskStatus::Completed);

    let statuses: Vec<_> = drain(&mut rx)
        .into_iter()
        .flat_map(|b| b.updates)
        .filter(|u| u.handle == program(0))
        .map(|u| u.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            TaskStatus::Running,
            TaskStatus::Blocked,
            TaskStatus::Running,
            TaskStatus::Completed
        ]
    );
}

#[tokio::test]
async fn load_rejects_busy_orchestrator_and_unknown_kinds() {
    init_tracing();
    let recorder = Recorder::new();
    let (mut orch, _rx) = Orchestrator::new(Arc::new(fake_registry(&recorder)));

    let unknown = TaskGraphBuilder::new().program(task("teleport")).build();
    assert!(matches!(
        orch.load(unknown),
        Err(TaskGraphError::UnknownKind(_))
    ));
    assert_eq!(orch.state(), SchedulerState::Idle);

    let graph = TaskGraphBuilder::new().program(task("ok")).build();
    orch.load(graph.clone()).unwrap();
    assert_eq!(orch.state(), SchedulerState::PreparingSchedulers);
    assert!(matches!(
        orch.load(graph.clone()),
        Err(TaskGraphError::SchedulerBusy(_))
    ));

    with_timeout(orch.run_to_idle()).await;

    // Idle again: the next graph is a fresh run.
    orch.load(graph).unwrap();
    with_timeout(orch.run_to_idle()).await;
    assert_eq!(recorder.started().len(), 2);
}

#[tokio::test]
async fn idle_step_is_a_no_op() {
    let recorder = Recorder::new();
    let (mut orch, mut rx) = Orchestrator::new(Arc::new(fake_registry(&recorder)));
    assert_eq!(orch.step().await, SchedulerState::Idle);
    assert!(drain(&mut rx).is_empty());
}
