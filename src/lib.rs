// src/lib.rs

pub mod cli;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::CliArgs;
use crate::engine::{RunSummary, Runtime, RuntimeOptions};
use crate::exec::{register_builtins, TaskRegistry};
use crate::plan::{load_and_validate, Plan};
use crate::types::Phase;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and validation
/// - the registry of built-in task kinds
/// - the orchestrator host and its cancel policies
///
/// Returns `None` for `--dry-run`.
pub async fn run(args: CliArgs) -> Result<Option<RunSummary>> {
    let plan_path = PathBuf::from(&args.plan);
    let plan = load_and_validate(&plan_path)
        .with_context(|| format!("loading plan {}", plan_path.display()))?;

    let mut registry = TaskRegistry::new();
    register_builtins(&mut registry);
    registry.check_graph(&plan.graph)?;

    if args.dry_run {
        print_dry_run(&plan);
        return Ok(None);
    }

    info!(
        plan = %plan_path.display(),
        setup = plan.graph.tasks(Phase::Setup).len(),
        program = plan.graph.tasks(Phase::Program).len(),
        "starting run"
    );

    let options = RuntimeOptions::from_section(&plan.config)?;
    let runtime = Runtime::new(plan, Arc::new(registry), options)?;
    let summary = runtime.run().await?;

    println!(
        "completed: {}  skipped: {}  failed: {}  unfinished: {}{}",
        summary.completed,
        summary.skipped,
        summary.failed,
        summary.unfinished,
        if summary.cancelled { "  (cancelled)" } else { "" }
    );

    Ok(Some(summary))
}

fn print_dry_run(plan: &Plan) {
    println!("taskgraph dry run");
    if let Some(after) = plan.config.cancel_after.as_deref() {
        println!("  cancel_after = {after}");
    }
    println!("  fail_fast = {}", plan.config.fail_fast);

    for phase in [Phase::Setup, Phase::Program] {
        let tasks = plan.graph.tasks(phase);
        println!();
        println!("[{phase}] {} task(s)", tasks.len());
        for task in tasks {
            let name = task.payload.qualified_name.as_deref().unwrap_or("-");
            println!(
                "  {} {:<12} {:<10} {:<24} after {:?}",
                task.handle, task.kind, task.status, name, task.depends_on
            );
        }
    }
}
