// src/task.rs

//! Project task instances and their evidence fields.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dag::schedule;
use crate::types::{ProjectId, TaskCode, TaskId, TaskStatus, UserId};

/// Concrete task of one project.
///
/// Invariants maintained by the engine:
/// - `status == Completed` implies `actual_completion_date.is_some()`;
/// - `status == Waiting` implies `!is_active`;
/// - `is_active` mirrors [`TaskStatus::implies_active`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectTask {
    pub id: TaskId,
    pub project_id: ProjectId,
    /// Blueprint code. Ad-hoc tasks may have none, which keeps them out of
    /// the recompute pass.
    pub code: Option<TaskCode>,
    pub name: String,
    pub task_type: String,
    pub stage: Option<String>,
    pub responsible_role: Option<String>,
    pub responsible_user: Option<UserId>,
    /// Prerequisite codes, copied from the blueprint at creation time.
    pub depends_on: Vec<TaskCode>,
    pub duration_days: u32,
    pub status: TaskStatus,
    pub is_active: bool,
    pub planned_start_date: Option<DateTime<Utc>>,
    pub normative_deadline: DateTime<Utc>,
    pub actual_completion_date: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Display order within the project.
    pub order: u32,
    #[serde(default)]
    pub evidence: Evidence,
    /// Optimistic concurrency token, bumped by the store on every save.
    #[serde(default)]
    pub version: u64,
}

impl ProjectTask {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Not completed and past its normative deadline.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed() && now > self.normative_deadline
    }

    /// End date used when this task is a prerequisite.
    pub fn effective_end(&self) -> DateTime<Utc> {
        schedule::effective_end(
            self.status,
            self.actual_completion_date,
            self.normative_deadline,
        )
    }

    /// Change status, keeping `is_active` and the lifecycle timestamps in
    /// step.
    ///
    /// Every completion stamps a fresh actual date; leaving `Completed`
    /// clears it.
    pub fn transition(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if self.status == TaskStatus::Completed && status != TaskStatus::Completed {
            self.actual_completion_date = None;
            self.completed_at = None;
        }
        self.status = status;
        self.is_active = status.implies_active();
        self.updated_at = Some(now);

        match status {
            TaskStatus::Completed => {
                self.actual_completion_date = Some(now);
                self.completed_at = Some(now);
            }
            TaskStatus::InProgress if self.started_at.is_none() => {
                self.started_at = Some(now);
            }
            _ => {}
        }
    }

    /// Human-readable label for logs: the code when present, else the name.
    pub fn label(&self) -> &str {
        self.code
            .as_ref()
            .map(TaskCode::as_str)
            .unwrap_or(self.name.as_str())
    }
}

/// Input for creating an ad-hoc task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub project_id: ProjectId,
    pub code: Option<TaskCode>,
    pub name: String,
    pub task_type: Option<String>,
    pub stage: Option<String>,
    /// Responsible party: resolved as a user name first, then as a role.
    pub responsible: Option<String>,
    pub responsible_user: Option<UserId>,
    pub depends_on: Vec<TaskCode>,
    /// Defaults to one day.
    pub duration_days: Option<u32>,
    /// Explicit initial status; derived from `depends_on` when absent.
    pub status: Option<TaskStatus>,
    /// Display order; appended after the last task when absent.
    pub order: Option<u32>,
    pub evidence: Evidence,
}

/// Task-type-specific evidence collected while working on a task.
///
/// Only the completion validator reads these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub planned_audit_date: Option<NaiveDate>,
    pub project_folder_link: Option<String>,
    pub actual_audit_date: Option<NaiveDate>,
    pub alcohol_license_eligibility: Option<String>,
    pub waste_docs_link: Option<String>,
    pub waste_agreement_date: Option<NaiveDate>,
    pub waste_registry_date: Option<NaiveDate>,
    pub contour_agreement_date: Option<NaiveDate>,
    pub visualization_agreement_date: Option<NaiveDate>,
    pub logistics_nbkp_eligibility: Option<String>,
    pub layout_agreement_date: Option<NaiveDate>,
    pub equipment_cost_no_vat: Option<f64>,
    pub security_budget_no_vat: Option<f64>,
    pub rsr_budget_no_vat: Option<f64>,
    pub pis_budget_no_vat: Option<f64>,
    pub total_budget_no_vat: Option<f64>,
}

/// Kind of value an evidence field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Date,
    Text,
    Amount,
}

/// Names one field of [`Evidence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceField {
    PlannedAuditDate,
    ProjectFolderLink,
    ActualAuditDate,
    AlcoholLicenseEligibility,
    WasteDocsLink,
    WasteAgreementDate,
    WasteRegistryDate,
    ContourAgreementDate,
    VisualizationAgreementDate,
    LogisticsNbkpEligibility,
    LayoutAgreementDate,
    EquipmentCostNoVat,
    SecurityBudgetNoVat,
    RsrBudgetNoVat,
    PisBudgetNoVat,
    TotalBudgetNoVat,
}

impl EvidenceField {
    pub fn kind(self) -> FieldKind {
        use EvidenceField::*;
        match self {
            PlannedAuditDate | ActualAuditDate | WasteAgreementDate | WasteRegistryDate
            | ContourAgreementDate | VisualizationAgreementDate | LayoutAgreementDate => {
                FieldKind::Date
            }
            ProjectFolderLink | AlcoholLicenseEligibility | WasteDocsLink
            | LogisticsNbkpEligibility => FieldKind::Text,
            EquipmentCostNoVat | SecurityBudgetNoVat | RsrBudgetNoVat | PisBudgetNoVat
            | TotalBudgetNoVat => FieldKind::Amount,
        }
    }

    /// Default user-facing label.
    pub fn label(self) -> &'static str {
        use EvidenceField::*;
        match self {
            PlannedAuditDate => "Planned audit date",
            ProjectFolderLink => "Project folder link",
            ActualAuditDate => "Actual audit date",
            AlcoholLicenseEligibility => "Alcohol license eligibility",
            WasteDocsLink => "Waste site documents link",
            WasteAgreementDate => "Waste site agreement date",
            WasteRegistryDate => "Waste registry entry date",
            ContourAgreementDate => "Contour agreement date",
            VisualizationAgreementDate => "Visualization agreement date",
            LogisticsNbkpEligibility => "NBKP eligibility",
            LayoutAgreementDate => "Layout agreement date",
            EquipmentCostNoVat => "Equipment cost excl. VAT",
            SecurityBudgetNoVat => "Security budget excl. VAT",
            RsrBudgetNoVat => "Repair works budget excl. VAT",
            PisBudgetNoVat => "Fixtures and signage budget excl. VAT",
            TotalBudgetNoVat => "Total budget excl. VAT",
        }
    }

    /// Whether `evidence` carries a usable value for this field: dates set,
    /// strings non-blank, amounts set.
    pub fn is_present(self, evidence: &Evidence) -> bool {
        use EvidenceField::*;
        let text = |s: &Option<String>| s.as_deref().is_some_and(|s| !s.trim().is_empty());
        match self {
            PlannedAuditDate => evidence.planned_audit_date.is_some(),
            ProjectFolderLink => text(&evidence.project_folder_link),
            ActualAuditDate => evidence.actual_audit_date.is_some(),
            AlcoholLicenseEligibility => text(&evidence.alcohol_license_eligibility),
            WasteDocsLink => text(&evidence.waste_docs_link),
            WasteAgreementDate => evidence.waste_agreement_date.is_some(),
            WasteRegistryDate => evidence.waste_registry_date.is_some(),
            ContourAgreementDate => evidence.contour_agreement_date.is_some(),
            VisualizationAgreementDate => evidence.visualization_agreement_date.is_some(),
            LogisticsNbkpEligibility => text(&evidence.logistics_nbkp_eligibility),
            LayoutAgreementDate => evidence.layout_agreement_date.is_some(),
            EquipmentCostNoVat => evidence.equipment_cost_no_vat.is_some(),
            SecurityBudgetNoVat => evidence.security_budget_no_vat.is_some(),
            RsrBudgetNoVat => evidence.rsr_budget_no_vat.is_some(),
            PisBudgetNoVat => evidence.pis_budget_no_vat.is_some(),
            TotalBudgetNoVat => evidence.total_budget_no_vat.is_some(),
        }
    }
}

impl fmt::Display for EvidenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
