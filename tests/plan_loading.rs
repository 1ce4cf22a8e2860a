// tests/plan_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use taskgraph::errors::TaskGraphError;
use taskgraph::plan::{load_and_validate, load_from_path};
use taskgraph::types::{Phase, TaskHandle, TaskStatus};

fn plan_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_a_full_plan() {
    let file = plan_file(
        r#"
[config]
cancel_after = "30s"
fail_fast = true

[[setup]]
kind = "drop_table"
name = "main.weather"
origin_statement = 0
object_id = 7

[[program]]
kind = "command"
name = "weather"
script = "echo fetch"
required_for = [1]

[[program]]
kind = "noop"
depends_on = [0]
status = "completed"
"#,
    );

    let plan = load_and_validate(file.path()).unwrap();
    assert!(plan.config.fail_fast);
    assert_eq!(plan.config.cancel_after().unwrap(), Some(Duration::from_secs(30)));

    let setup = plan.graph.tasks(Phase::Setup);
    assert_eq!(setup.len(), 1);
    assert_eq!(setup[0].payload.qualified_name.as_deref(), Some("main.weather"));
    assert_eq!(setup[0].payload.object_id, Some(7));

    let program = plan.graph.tasks(Phase::Program);
    assert_eq!(program[0].required_for, vec![1]);
    assert_eq!(program[1].depends_on, vec![0]);
    assert_eq!(program[1].status, TaskStatus::Completed);
    assert_eq!(program[1].handle, TaskHandle::new(Phase::Program, 1));
    assert_eq!(program[0].payload.script.as_deref(), Some("echo fetch"));
}

#[test]
fn empty_file_is_an_empty_plan() {
    let file = plan_file("");
    let plan = load_and_validate(file.path()).unwrap();
    assert!(plan.graph.is_empty());
    assert!(!plan.config.fail_fast);
}

#[test]
fn required_for_must_be_the_transpose() {
    let file = plan_file(
        r#"
[[program]]
kind = "noop"
required_for = []

[[program]]
kind = "noop"
depends_on = [0]
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, TaskGraphError::PlanError(_)), "{err}");
}

#[test]
fn cycles_are_rejected() {
    let file = plan_file(
        r#"
[[setup]]
kind = "noop"
depends_on = [1]

[[setup]]
kind = "noop"
depends_on = [0]
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, TaskGraphError::DagCycle(_)), "{err}");
}

#[test]
fn out_of_range_dependency_is_rejected() {
    let file = plan_file(
        r#"
[[program]]
kind = "noop"
depends_on = [3]
"#,
    );
    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, TaskGraphError::PlanError(_)), "{err}");
}

#[test]
fn dependencies_do_not_cross_phases() {
    // Index 1 exists in setup but not in program.
    let file = plan_file(
        r#"
[[setup]]
kind = "noop"

[[setup]]
kind = "noop"

[[program]]
kind = "noop"
depends_on = [1]
"#,
    );
    assert!(load_and_validate(file.path()).is_err());
}

#[test]
fn bad_status_and_bad_duration_are_reported() {
    let bad_status = plan_file(
        r#"
[[program]]
kind = "noop"
status = "done"
"#,
    );
    assert!(matches!(
        load_from_path(bad_status.path()),
        Err(TaskGraphError::TomlError(_))
    ));

    let bad_duration = plan_file(
        r#"
[config]
cancel_after = "soon"
"#,
    );
    assert!(matches!(
        load_and_validate(bad_duration.path()),
        Err(TaskGraphError::PlanError(_))
    ));

    let overflowing_duration = plan_file(
        r#"
[config]
cancel_after = "18446744073709551615h"
"#,
    );
    assert!(matches!(
        load_and_validate(overflowing_duration.path()),
        Err(TaskGraphError::PlanError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("Taskgraph.toml")).unwrap_err();
    assert!(matches!(err, TaskGraphError::IoError(_)));
}
