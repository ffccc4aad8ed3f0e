use std::io::Write;

use storeflow::config::{load_and_validate, ValidationMode};
use storeflow::errors::WorkflowError;
use storeflow::types::{KnownTask, TemplateId};
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_loads_with_templates() {
    let file = write_config(
        r#"
[engine]
channel_capacity = 16
max_concurrent_jobs = 2

[validation]
mode = "aggregate"

[status]
construction_keywords = ["fit-out"]

[[task]]
code = "SURVEY"
name = "Site survey"
duration_days = 2
responsible_role = "site_manager"

[[task]]
code = "DESIGN"
name = "Design"
duration = 3
depends_on = ["SURVEY"]
requires = [{ document = "Floor plan", extensions = [".dwg"] }]

[template.7]
name = "Small format"

[[template.7.task]]
code = "SURVEY"
name = "Quick survey"
duration_days = 1
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.engine.channel_capacity, 16);
    assert_eq!(cfg.engine.max_concurrent_jobs, 2);
    assert_eq!(cfg.validation.mode, ValidationMode::Aggregate);
    assert_eq!(cfg.status.construction_keywords, vec!["fit-out".to_string()]);

    let legacy = cfg.catalog.legacy();
    assert_eq!(legacy.len(), 2);
    assert_eq!(legacy.definition("DESIGN").unwrap().duration_days, 3);
    assert!(legacy.definition("DESIGN").unwrap().requires.is_some());

    let small = cfg.catalog.template(TemplateId(7)).unwrap();
    assert_eq!(small.name(), "Small format");
    assert!(cfg.catalog.template(TemplateId(8)).is_none());
}

#[test]
fn empty_task_list_falls_back_to_store_opening() {
    let file = write_config("[validation]\nmode = \"fail_fast\"\n");
    let cfg = load_and_validate(file.path()).unwrap();

    let legacy = cfg.catalog.legacy();
    assert_eq!(legacy.len(), KnownTask::ALL.len());
    assert!(legacy.contains(KnownTask::TotalBudget.code()));
}

#[test]
fn dependency_cycle_is_a_structured_error() {
    let file = write_config(
        r#"
[[task]]
code = "A"
name = "A"
duration_days = 1
depends_on = ["B"]

[[task]]
code = "B"
name = "B"
duration_days = 1
depends_on = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(WorkflowError::DagCycle(msg)) => {
            assert!(msg.contains('A') || msg.contains('B'));
        }
        other => panic!("expected DagCycle, got {other:?}"),
    }
}

#[test]
fn unknown_dependency_is_a_config_error() {
    let file = write_config(
        r#"
[[task]]
code = "A"
name = "A"
duration_days = 1
depends_on = ["MISSING"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(WorkflowError::ConfigError(msg)) => assert!(msg.contains("MISSING"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn zero_duration_and_bad_codes_are_rejected() {
    let zero = write_config("[[task]]\ncode = \"A\"\nname = \"A\"\nduration_days = 0\n");
    assert!(matches!(
        load_and_validate(zero.path()),
        Err(WorkflowError::ConfigError(_))
    ));

    let bad_code = write_config("[[task]]\ncode = \"A B\"\nname = \"A\"\nduration_days = 1\n");
    assert!(matches!(
        load_and_validate(bad_code.path()),
        Err(WorkflowError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_and_validate(dir.path().join("Storeflow.toml"));
    assert!(matches!(result, Err(WorkflowError::IoError(_))));
}
