// src/plan/model.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::{Phase, TaskBlocker, TaskHandle, TaskKind, TaskStatus};

/// Planner output as read from a TOML file.
///
/// ```toml
/// [config]
/// cancel_after = "30s"
///
/// [[setup]]
/// kind = "drop_table"
/// name = "main.weather"
///
/// [[program]]
/// kind = "command"
/// script = "echo weather"
///
/// [[program]]
/// kind = "command"
/// script = "echo chart"
/// depends_on = [0]
/// ```
///
/// This type is *unvalidated*; convert it into a [`Plan`] with
/// `Plan::try_from(raw)` (or use [`crate::plan::load_and_validate`]).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPlan {
    /// Host behaviour from `[config]`.
    #[serde(default)]
    pub config: RunnerSection,

    /// Setup tasks from `[[setup]]`, in index order.
    #[serde(default)]
    pub setup: Vec<RawTask>,

    /// Program tasks from `[[program]]`, in index order.
    #[serde(default)]
    pub program: Vec<RawTask>,
}

/// `[config]` section: decisions the host layers on top of the scheduler.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunnerSection {
    /// Interrupt the run and stop stepping once this duration elapsed
    /// (e.g. `"30s"`). There is no timeout when unset.
    #[serde(default)]
    pub cancel_after: Option<String>,

    /// Stop stepping as soon as the host observes a failed task.
    #[serde(default)]
    pub fail_fast: bool,
}

impl RunnerSection {
    /// Parsed `cancel_after`, if any.
    pub fn cancel_after(&self) -> std::result::Result<Option<Duration>, String> {
        self.cancel_after.as_deref().map(parse_duration).transpose()
    }
}

/// One `[[setup]]` / `[[program]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTask {
    /// Task kind, resolved to task logic through the registry.
    pub kind: TaskKind,

    /// Initial status; planners mark unchanged work `completed`/`skipped`.
    #[serde(default)]
    pub status: TaskStatus,

    /// Phase-local indices that must resolve before this task may run.
    #[serde(default)]
    pub depends_on: Vec<usize>,

    /// Reverse edges. Derived when omitted; must be the exact transpose of
    /// `depends_on` when present.
    #[serde(default)]
    pub required_for: Option<Vec<usize>>,

    #[serde(default)]
    pub origin_statement: Option<usize>,

    #[serde(default)]
    pub object_id: Option<u64>,

    /// Qualified object name (`schema.name`).
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub script: Option<String>,
}

impl RawTask {
    pub fn new(kind: impl Into<TaskKind>) -> Self {
        Self {
            kind: kind.into(),
            status: TaskStatus::Pending,
            depends_on: Vec::new(),
            required_for: None,
            origin_statement: None,
            object_id: None,
            name: None,
            script: None,
        }
    }
}

/// Opaque payload forwarded to task logic. The scheduler never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPayload {
    pub origin_statement: Option<usize>,
    pub object_id: Option<u64>,
    pub qualified_name: Option<String>,
    pub script: Option<String>,
}

/// A validated execution unit.
///
/// Status, blocker and the scheduling timestamps are owned by the phase
/// scheduler once the task has been handed to it.
#[derive(Debug, Clone)]
pub struct Task {
    pub handle: TaskHandle,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub blocker: Option<TaskBlocker>,
    pub depends_on: Vec<usize>,
    pub required_for: Vec<usize>,
    pub payload: Arc<TaskPayload>,
    pub time_created: DateTime<Utc>,
    pub time_scheduled: Option<DateTime<Utc>>,
    pub time_last_update: DateTime<Utc>,
}

/// Both phases of a validated task graph.
///
/// Construct through `TaskGraph::from_raw` (see `plan::validate`), which
/// checks index ranges, the `required_for` transpose and acyclicity.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    setup: Vec<Task>,
    program: Vec<Task>,
}

impl TaskGraph {
    pub(crate) fn new_unchecked(setup: Vec<Task>, program: Vec<Task>) -> Self {
        Self { setup, program }
    }

    pub fn tasks(&self, phase: Phase) -> &[Task] {
        match phase {
            Phase::Setup => &self.setup,
            Phase::Program => &self.program,
        }
    }

    pub fn task(&self, handle: TaskHandle) -> Option<&Task> {
        self.tasks(handle.phase()).get(handle.index())
    }

    /// All tasks, setup phase first.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.setup.iter().chain(self.program.iter())
    }

    pub fn len(&self) -> usize {
        self.setup.len() + self.program.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_parts(self) -> (Vec<Task>, Vec<Task>) {
        (self.setup, self.program)
    }
}

/// A validated planner file: host config plus task graph.
#[derive(Debug, Clone)]
pub struct Plan {
    pub config: RunnerSection,
    pub graph: TaskGraph,
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("18446744073709551615h").is_err());
        assert!(parse_duration("307445734561825861m").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());
    }

    #[test]
    fn largest_representable_minutes_are_accepted() {
        let max_minutes = u64::MAX / 60;
        assert_eq!(
            parse_duration(&format!("{max_minutes}m")),
            Ok(Duration::from_secs(max_minutes * 60))
        );
    }

    #[test]
    fn runner_section_without_timeout() {
        let section = RunnerSection::default();
        assert_eq!(section.cancel_after(), Ok(None));
        assert!(!section.fail_fast);
    }
}
