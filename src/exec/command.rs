// src/exec/command.rs

//! `command` task logic: run the task's `script` through the platform shell.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::context::TaskContext;
use crate::exec::logic::{Outcome, TaskFuture, TaskLogic};
use crate::plan::Task;

/// Stdout lines of the form `::publish key=value` become artifacts.
const PUBLISH_PATTERN: &str = r"^::publish\s+([A-Za-z0-9_.\-]+)=(.*)$";

fn publish_regex() -> Result<Regex> {
    Regex::new(PUBLISH_PATTERN).context("compiling publish pattern")
}

/// Runs `script` with `sh -c` (`cmd /C` on Windows).
///
/// - Exit status zero completes the task, anything else fails it.
/// - stderr is logged at debug level.
/// - stdout `::publish key=value` lines are published to the run's diff,
///   other lines are logged at debug level.
#[derive(Debug, Clone, Default)]
pub struct CommandLogic {
    script: Option<String>,
}

impl CommandLogic {
    pub fn from_task(task: &Task) -> Self {
        Self {
            script: task.payload.script.clone(),
        }
    }
}

impl TaskLogic for CommandLogic {
    fn will_execute(&mut self, ctx: &TaskContext) -> Result<()> {
        match self.script.as_deref() {
            Some(script) if !script.trim().is_empty() => Ok(()),
            _ => bail!("command task {} has no `script` to run", ctx.handle()),
        }
    }

    fn execute(&mut self, ctx: TaskContext) -> TaskFuture {
        let script = self.script.clone().unwrap_or_default();
        Box::pin(run_command(script, ctx))
    }
}

async fn run_command(script: String, ctx: TaskContext) -> Result<Outcome> {
    let handle = ctx.handle();
    let publish = publish_regex()?;
    info!(task = %handle, cmd = %script, "starting task process");

    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&script);
        c
    };

    for (key, value) in dependency_env(&ctx) {
        cmd.env(key, value);
    }

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task {handle}"))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            while let Ok(Some(line)) = read_lossy_line(&mut reader, &mut buf).await {
                debug!(task = %handle, "stderr: {}", line);
            }
        });
    }

    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        while let Some(line) = read_lossy_line(&mut reader, &mut buf)
            .await
            .with_context(|| format!("reading stdout of task {handle}"))?
        {
            match publish.captures(&line) {
                Some(caps) => ctx.publish(&caps[1], caps[2].trim()),
                None => debug!(task = %handle, "stdout: {}", line),
            }
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of task {handle}"))?;

    let code = status.code().unwrap_or(-1);
    info!(
        task = %handle,
        exit_code = code,
        success = status.success(),
        "task process exited"
    );

    if !status.success() {
        bail!("command exited with code {code}");
    }

    Ok(Outcome::Completed)
}

/// Next line of process output. Invalid UTF-8 is replaced, not rejected.
async fn read_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf.as_slice());
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Dependency artifacts exposed as `TASKGRAPH_<KEY>` environment variables.
fn dependency_env(ctx: &TaskContext) -> Vec<(String, String)> {
    ctx.dependency_outputs()
        .map(|artifact| {
            let key: String = artifact
                .key
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect();
            (format!("TASKGRAPH_{key}"), artifact.value.clone())
        })
        .collect()
}
