use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};
use tokio::sync::Barrier;
use taskgraph::exec::{Outcome, TaskContext, TaskFuture, TaskLogic, TaskRegistry};
use taskgraph::plan::Task;
use taskgraph::types::{TaskBlocker, TaskHandle};

/// What a fake task did, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEvent {
    Started(TaskHandle),
    Finished(TaskHandle),
}

#[derive(Debug, Default)]
struct RecorderState {
    events: Vec<TaskEvent>,
    running: usize,
    peak: usize,
}

/// Shared recorder handed to every fake task.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    state: Arc<Mutex<RecorderState>>,
    barrier: Option<Arc<Barrier>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `barrier` tasks wait until `n` of them are running at once.
    pub fn with_barrier(n: usize) -> Self {
        Self {
            state: Arc::default(),
            barrier: Some(Arc::new(Barrier::new(n))),
        }
    }

    fn start(&self, handle: TaskHandle) {
        let mut state = self.state.lock().unwrap();
        state.events.push(TaskEvent::Started(handle));
        state.running += 1;
        state.peak = state.peak.max(state.running);
    }

    fn finish(&self, handle: TaskHandle) {
        let mut state = self.state.lock().unwrap();
        state.events.push(TaskEvent::Finished(handle));
        state.running -= 1;
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn started(&self) -> Vec<TaskHandle> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Started(h) => Some(h),
                TaskEvent::Finished(_) => None,
            })
            .collect()
    }

    pub fn started_set(&self) -> HashSet<TaskHandle> {
        self.started().into_iter().collect()
    }

    pub fn finished(&self) -> Vec<TaskHandle> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Finished(h) => Some(h),
                TaskEvent::Started(_) => None,
            })
            .collect()
    }

    /// Highest number of fake tasks running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.state.lock().unwrap().peak
    }

    pub fn times_started(&self, handle: TaskHandle) -> usize {
        self.started().iter().filter(|&&h| h == handle).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Ok,
    Skips,
    Fails,
    FailsWillExecute,
    FailsPrepare,
    Pending,
    Panics,
    /// Blocked on the first run, completed once resumed.
    Blocks,
    Barrier,
    Slow,
}

struct FakeLogic {
    behaviour: Behaviour,
    recorder: Recorder,
    runs: usize,
}

impl TaskLogic for FakeLogic {
    fn prepare(&mut self, ctx: &TaskContext) -> anyhow::Result<()> {
        if self.behaviour == Behaviour::FailsPrepare {
            bail!("fake prepare failure for {}", ctx.handle());
        }
        Ok(())
    }

    fn will_execute(&mut self, ctx: &TaskContext) -> anyhow::Result<()> {
        if self.behaviour == Behaviour::FailsWillExecute {
            bail!("fake will_execute failure for {}", ctx.handle());
        }
        Ok(())
    }

    fn execute(&mut self, ctx: TaskContext) -> TaskFuture {
        self.runs += 1;
        let behaviour = self.behaviour;
        let recorder = self.recorder.clone();
        let first_run = self.runs == 1;

        Box::pin(async move {
            let handle = ctx.handle();
            recorder.start(handle);

            let outcome = match behaviour {
                Behaviour::Ok | Behaviour::FailsPrepare | Behaviour::FailsWillExecute => {
                    tokio::task::yield_now().await;
                    ctx.publish("ran", handle.to_string());
                    Ok(Outcome::Completed)
                }
                Behaviour::Skips => Ok(Outcome::Skipped),
                Behaviour::Fails => Err(anyhow!("fake failure for {handle}")),
                Behaviour::Pending => Ok(Outcome::Pending),
                Behaviour::Panics => panic!("fake panic for {handle}"),
                Behaviour::Blocks if first_run => {
                    Ok(Outcome::Blocked(TaskBlocker::UserInteraction))
                }
                Behaviour::Blocks => Ok(Outcome::Completed),
                Behaviour::Barrier => {
                    if let Some(barrier) = recorder.barrier.as_ref() {
                        barrier.wait().await;
                    }
                    Ok(Outcome::Completed)
                }
                Behaviour::Slow => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Outcome::Completed)
                }
            };

            recorder.finish(handle);
            outcome
        })
    }
}

const KINDS: &[(&str, Behaviour)] = &[
    ("ok", Behaviour::Ok),
    ("skips", Behaviour::Skips),
    ("fails", Behaviour::Fails),
    ("fails_will_execute", Behaviour::FailsWillExecute),
    ("fails_prepare", Behaviour::FailsPrepare),
    ("pending", Behaviour::Pending),
    ("panics", Behaviour::Panics),
    ("blocks", Behaviour::Blocks),
    ("barrier", Behaviour::Barrier),
    ("slow", Behaviour::Slow),
];

/// Registry with one fake kind per behaviour, all reporting to `recorder`:
/// `ok`, `skips`, `fails`, `fails_will_execute`, `fails_prepare`, `pending`,
/// `panics`, `blocks`, `barrier`, `slow`.
pub fn fake_registry(recorder: &Recorder) -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    for &(kind, behaviour) in KINDS {
        let recorder = recorder.clone();
        registry.register(kind, move |_task: &Task| -> anyhow::Result<Box<dyn TaskLogic>> {
            Ok(Box::new(FakeLogic {
                behaviour,
                recorder: recorder.clone(),
                runs: 0,
            }))
        });
    }
    registry
}
