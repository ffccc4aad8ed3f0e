mod common;

use chrono::NaiveDate;
use common::*;
use storeflow::config::ValidationMode;
use storeflow::errors::WorkflowError;
use storeflow::store::{MemoryStore, TaskStore};
use storeflow::task::{Evidence, EvidenceField, NewTask};
use storeflow::types::{KnownTask, TaskStatus};
use storeflow::workflow::{Missing, Requirement};

#[tokio::test]
async fn rejected_completion_writes_nothing() {
    init_tracing();
    let h = Harness::new(store_opening());
    let project = h.create_project().await;
    let prep = h.task(project.id, KnownTask::PrepAudit.code());
    let saves = h.store.save_count();

    let err = h
        .service
        .update_task_status(prep.id, TaskStatus::Completed, None, day(1, 11))
        .unwrap_err();

    match &err {
        WorkflowError::Validation(failure) => {
            assert_eq!(failure.missing.len(), 1);
            assert_eq!(err.to_string(), "Field 'Planned audit date' is required");
        }
        other => panic!("expected a validation failure, got {other:?}"),
    }
    assert!(err.is_retryable());
    assert_eq!(h.store.save_count(), saves);
    assert_eq!(h.task(project.id, KnownTask::PrepAudit.code()), prep);

    h.shutdown().await;
}

#[tokio::test]
async fn completion_passes_once_evidence_and_documents_are_in() {
    init_tracing();
    let h = Harness::new(store_opening());
    let project = h.create_project().await;

    let mut prep = h.task(project.id, KnownTask::PrepAudit.code());
    prep.evidence.planned_audit_date = NaiveDate::from_ymd_opt(2024, 1, 15);
    prep.evidence.project_folder_link = Some("https://files.example/store-12".into());
    let prep = h.service.update_task(prep, None, day(1, 10)).unwrap();
    h.settle().await;

    let err = h
        .service
        .update_task_status(prep.id, TaskStatus::Completed, None, day(1, 11))
        .unwrap_err();
    assert_eq!(err.to_string(), "Document required: Technical plan");

    h.store.add_document(project.id, "Technical plan", "plan.pdf");
    h.complete(project.id, KnownTask::PrepAudit.code(), 1, 11).await;

    let audit = h.task(project.id, KnownTask::Audit.code());
    assert_eq!(audit.status, TaskStatus::Assigned);
    assert_eq!(audit.planned_start_date, Some(day(1, 12)));

    h.shutdown().await;
}

#[tokio::test]
async fn aggregate_mode_lists_every_gap() {
    init_tracing();
    let config = ConfigFileBuilder::new()
        .validation(ValidationMode::Aggregate)
        .build();
    let h = Harness::new(config);
    let project = h.create_project().await;
    h.store.add_document(project.id, "Measured plan", "plan.pdf");

    let contour = h.task(project.id, KnownTask::Contour.code());

    let err = h
        .service
        .update_task_status(contour.id, TaskStatus::Completed, None, day(1, 20))
        .unwrap_err();
    let WorkflowError::Validation(failure) = err else {
        panic!("expected a validation failure");
    };

    assert_eq!(failure.missing.len(), 4);
    assert!(matches!(failure.missing[0], Missing::Field { .. }));
    assert_eq!(
        failure.missing[2],
        Missing::DocumentFormat {
            doc_type: "Measured plan".into(),
            extensions: vec![".dwg".into()],
        }
    );

    h.shutdown().await;
}

#[tokio::test]
async fn authored_requirements_replace_builtin_ones() {
    init_tracing();
    let store = MemoryStore::new();
    let config = ConfigFileBuilder::new()
        .with_task(
            DefinitionBuilder::new(KnownTask::TotalBudget.code(), 1)
                .requires(Requirement::document_with_ext("Signed budget", &["pdf"]))
                .build(),
        )
        .build();
    let h = Harness::with_store(store, config);
    let project = h.create_project().await;
    h.store.add_document(project.id, "Signed budget", "BUDGET.PDF");

    // The built-in rule would ask for the total budget amount.
    let done = h.complete(project.id, KnownTask::TotalBudget.code(), 1, 12).await;
    assert_eq!(done.status, TaskStatus::Completed);

    h.shutdown().await;
}

#[tokio::test]
async fn ad_hoc_tasks_are_never_gated() {
    init_tracing();
    let h = Harness::new(store_opening());
    let project = h.create_project().await;

    let task = h
        .service
        .create_task(
            NewTask {
                project_id: project.id,
                name: "Order keys".into(),
                ..NewTask::default()
            },
            None,
            day(1, 10),
        )
        .unwrap();
    let done = h
        .service
        .update_task_status(task.id, TaskStatus::Completed, None, day(1, 11))
        .unwrap();

    assert_eq!(done.actual_completion_date, Some(day(1, 11)));
    h.shutdown().await;
}

#[tokio::test]
async fn creating_a_gated_task_as_completed_needs_its_evidence() {
    init_tracing();
    let h = Harness::new(store_opening());
    let project = h.create_project().await;
    let before = h.tasks(project.id).len();

    let budget = |evidence: Evidence| NewTask {
        project_id: project.id,
        code: Some(code(KnownTask::TotalBudget.code())),
        name: "Total budget (re-issued)".into(),
        status: Some(TaskStatus::Completed),
        evidence,
        ..NewTask::default()
    };

    let err = h
        .service
        .create_task(budget(Evidence::default()), None, day(1, 12))
        .unwrap_err();
    let WorkflowError::Validation(failure) = err else {
        panic!("expected a validation failure");
    };
    assert!(matches!(
        failure.missing[..],
        [Missing::Field {
            field: EvidenceField::TotalBudgetNoVat,
            ..
        }]
    ));
    assert_eq!(h.store.load_tasks_by_project(project.id).unwrap().len(), before);

    let mut evidence = Evidence::default();
    evidence.total_budget_no_vat = Some(1_250_000.0);
    let task = h
        .service
        .create_task(budget(evidence), None, day(1, 12))
        .unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.actual_completion_date, Some(day(1, 12)));

    h.shutdown().await;
}
