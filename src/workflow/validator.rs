// src/workflow/validator.rs

//! Completion gate: checks a task's evidence fields and the project's
//! documents before it may move to `completed`.

use std::fmt;

use tracing::debug;

use crate::config::model::ValidationMode;
use crate::errors::{Result, WorkflowError};
use crate::store::DocumentStore;
use crate::task::{EvidenceField, ProjectTask};
use crate::types::{TaskCode, TaskId};
use crate::workflow::rules::{Requirement, RuleTable};

/// A single unmet requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Field { field: EvidenceField, label: String },
    Document { doc_type: String },
    DocumentFormat { doc_type: String, extensions: Vec<String> },
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Field { label, .. } => write!(f, "Field '{label}' is required"),
            Missing::Document { doc_type } => write!(f, "Document required: {doc_type}"),
            Missing::DocumentFormat {
                doc_type,
                extensions,
            } => write!(
                f,
                "Document '{doc_type}' must have format: {}",
                extensions.join(", ")
            ),
        }
    }
}

/// Why a task may not be completed yet.
///
/// In fail-fast mode `missing` holds exactly one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub task: TaskId,
    pub code: TaskCode,
    pub missing: Vec<Missing>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for m in &self.missing {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{m}")?;
            first = false;
        }
        Ok(())
    }
}

/// Runs the rule table for one task against its evidence and the document
/// store.
#[derive(Debug, Clone, Copy)]
pub struct CompletionValidator<'a> {
    documents: &'a dyn DocumentStore,
    rules: &'a RuleTable,
    mode: ValidationMode,
}

impl<'a> CompletionValidator<'a> {
    pub fn new(documents: &'a dyn DocumentStore, rules: &'a RuleTable, mode: ValidationMode) -> Self {
        Self {
            documents,
            rules,
            mode,
        }
    }

    /// `Ok(())` when the task may be completed.
    ///
    /// Tasks without a code, and codes without a rule, always pass. Document
    /// lookups that fail surface as [`WorkflowError::Persistence`].
    pub fn validate(&self, task: &ProjectTask) -> Result<()> {
        if self.mode == ValidationMode::Off {
            return Ok(());
        }
        let Some(code) = &task.code else {
            return Ok(());
        };

        let mut missing = Vec::new();
        for req in self.rules.requirements(code) {
            if let Some(m) = self.check(task, &req)? {
                missing.push(m);
                if self.mode == ValidationMode::FailFast {
                    break;
                }
            }
        }

        if missing.is_empty() {
            return Ok(());
        }
        debug!(task = %task.id, code = %code, missing = missing.len(), "completion rejected");
        Err(WorkflowError::Validation(ValidationFailure {
            task: task.id,
            code: code.clone(),
            missing,
        }))
    }

    fn check(&self, task: &ProjectTask, req: &Requirement) -> Result<Option<Missing>> {
        match req {
            Requirement::Field { field, label } => {
                if field.is_present(&task.evidence) {
                    Ok(None)
                } else {
                    Ok(Some(Missing::Field {
                        field: *field,
                        label: label.clone().unwrap_or_else(|| field.label().to_string()),
                    }))
                }
            }
            Requirement::Document {
                document,
                extensions,
            } if extensions.is_empty() => {
                let exists = self
                    .documents
                    .document_exists(task.project_id, document)
                    .map_err(WorkflowError::Persistence)?;
                Ok((!exists).then(|| Missing::Document {
                    doc_type: document.clone(),
                }))
            }
            Requirement::Document {
                document,
                extensions,
            } => {
                let docs = self
                    .documents
                    .documents_of_type(task.project_id, document)
                    .map_err(WorkflowError::Persistence)?;
                if docs.is_empty() {
                    return Ok(Some(Missing::Document {
                        doc_type: document.clone(),
                    }));
                }
                let ok = docs
                    .iter()
                    .any(|doc| has_allowed_extension(&doc.file_name, extensions));
                Ok((!ok).then(|| Missing::DocumentFormat {
                    doc_type: document.clone(),
                    extensions: extensions.clone(),
                }))
            }
        }
    }
}

/// Case-insensitive suffix match. Extensions may be given with or without
/// the leading dot.
pub fn has_allowed_extension(file_name: &str, extensions: &[String]) -> bool {
    let name = file_name.to_lowercase();
    extensions.iter().any(|ext| {
        let ext = ext.trim().to_lowercase();
        if ext.starts_with('.') {
            name.ends_with(&ext)
        } else {
            name.ends_with(&format!(".{ext}"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::task::Evidence;
    use crate::types::{KnownTask, ProjectId, TaskStatus};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn task(code: KnownTask, evidence: Evidence) -> ProjectTask {
        ProjectTask {
            id: TaskId(7),
            project_id: ProjectId(1),
            code: Some(code.into()),
            name: code.to_string(),
            task_type: "user_task".into(),
            stage: None,
            responsible_role: None,
            responsible_user: None,
            depends_on: Vec::new(),
            duration_days: 1,
            status: TaskStatus::InProgress,
            is_active: true,
            planned_start_date: None,
            normative_deadline: Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap(),
            actual_completion_date: None,
            created_at: None,
            updated_at: None,
            started_at: None,
            completed_at: None,
            order: 0,
            evidence,
            version: 1,
        }
    }

    fn layout_evidence() -> Evidence {
        Evidence {
            layout_agreement_date: NaiveDate::from_ymd_opt(2024, 1, 10),
            ..Evidence::default()
        }
    }

    #[test]
    fn fail_fast_reports_first_missing_field() {
        let store = MemoryStore::new();
        let rules = RuleTable::builtin();
        let v = CompletionValidator::new(&store, &rules, ValidationMode::FailFast);

        let err = v.validate(&task(KnownTask::PrepAudit, Evidence::default())).unwrap_err();
        let WorkflowError::Validation(failure) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(failure.missing.len(), 1);
        assert_eq!(failure.to_string(), "Field 'Planned audit date' is required");
    }

    #[test]
    fn aggregate_reports_everything() {
        let store = MemoryStore::new();
        let rules = RuleTable::builtin();
        let v = CompletionValidator::new(&store, &rules, ValidationMode::Aggregate);

        let err = v.validate(&task(KnownTask::PrepAudit, Evidence::default())).unwrap_err();
        let WorkflowError::Validation(failure) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(failure.missing.len(), 3);
        assert!(matches!(&failure.missing[2], Missing::Document { doc_type } if doc_type == "Technical plan"));
    }

    #[test]
    fn extension_allow_list_is_case_insensitive() {
        let store = MemoryStore::new();
        let rules = RuleTable::builtin();
        let v = CompletionValidator::new(&store, &rules, ValidationMode::FailFast);
        let t = task(KnownTask::Layout, layout_evidence());

        store.add_document(ProjectId(1), "Technological layout (DWG)", "plan.pdf");
        let err = v.validate(&t).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Document 'Technological layout (DWG)' must have format: .dwg"
        );

        store.add_document(ProjectId(1), "Technological layout (DWG)", "PLAN.DWG");
        store.add_document(ProjectId(1), "Technological layout (PDF)", "plan.Pdf");
        assert!(v.validate(&t).is_ok());
    }

    #[test]
    fn uncoded_and_unruled_tasks_pass() {
        let store = MemoryStore::new();
        let rules = RuleTable::builtin();
        let v = CompletionValidator::new(&store, &rules, ValidationMode::FailFast);

        let mut adhoc = task(KnownTask::TotalBudget, Evidence::default());
        adhoc.code = None;
        assert!(v.validate(&adhoc).is_ok());
        assert!(v.validate(&task(KnownTask::AlcoholLicense, Evidence::default())).is_ok());

        let off = CompletionValidator::new(&store, &rules, ValidationMode::Off);
        assert!(off.validate(&task(KnownTask::TotalBudget, Evidence::default())).is_ok());
    }

    #[test]
    fn extension_helper_accepts_bare_extensions() {
        assert!(has_allowed_extension("budget.XLSX", &["xlsx".to_string()]));
        assert!(!has_allowed_extension("budget.xlsx.bak", &[".xlsx".to_string()]));
    }
}
