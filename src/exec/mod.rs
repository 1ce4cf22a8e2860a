// src/exec/mod.rs

//! Task-logic layer.
//!
//! - [`logic`] defines the [`TaskLogic`] contract and the [`Outcome`] a task
//!   settles with.
//! - [`context`] holds what task logic may read (resolved outputs) and write
//!   (the pending-diff buffer).
//! - [`registry`] maps a task `kind` to a factory building its logic.
//! - [`command`] and [`builtin`] provide the kinds the binary ships with.

pub mod builtin;
pub mod command;
pub mod context;
pub mod logic;
pub mod registry;

pub use builtin::{register_builtins, DelayLogic, NoopLogic};
pub use command::CommandLogic;
pub use context::{Artifact, DiffBuffer, ExecutionContext, ResolvedOutputs, TaskContext};
pub use logic::{Outcome, TaskFuture, TaskLogic};
pub use registry::{LogicFactory, TaskRegistry};
