// src/types.rs

//! Identifiers, task/project status enums and task codes shared across the
//! crate.
//!
//! Strings only appear at the TOML / persistence boundary; inside the engine
//! everything is one of these closed types.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Primary key of a project.
    ProjectId
);
id_type!(
    /// Primary key of a project task.
    TaskId
);
id_type!(
    /// Primary key of a user who can be made responsible for tasks.
    UserId
);
id_type!(
    /// Primary key of a project template (a per-project-type blueprint).
    TemplateId
);

/// Lifecycle state of a single project task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Blocked on at least one prerequisite that is not completed yet.
    Waiting,
    Assigned,
    InProgress,
    Review,
    Completed,
    Expired,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Assigned
    }
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Completed => "completed",
            TaskStatus::Expired => "expired",
        }
    }

    /// `is_active` mirrors "assigned or later".
    pub fn implies_active(self) -> bool {
        !matches!(self, TaskStatus::Waiting)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "waiting" => Ok(TaskStatus::Waiting),
            "assigned" => Ok(TaskStatus::Assigned),
            "in_progress" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "completed" => Ok(TaskStatus::Completed),
            "expired" => Ok(TaskStatus::Expired),
            other => Err(format!("invalid task status: {other}")),
        }
    }
}

/// Project-level status, derived from the state of the project's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Created,
    PrepAudit,
    ObjectAudit,
    AlcoholLicense,
    WasteSite,
    PlanningContour,
    Visualization,
    Logistics,
    Layout,
    EquipmentBudget,
    SecurityBudget,
    RsrBudget,
    PisBudget,
    TotalBudget,
    /// Construction / renovation works are under way.
    Construction,
    /// The store is open; terminal success.
    Opened,
    Closed,
    Archived,
    Failed,
}

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::Created
    }
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 19] = [
        ProjectStatus::Created,
        ProjectStatus::PrepAudit,
        ProjectStatus::ObjectAudit,
        ProjectStatus::AlcoholLicense,
        ProjectStatus::WasteSite,
        ProjectStatus::PlanningContour,
        ProjectStatus::Visualization,
        ProjectStatus::Logistics,
        ProjectStatus::Layout,
        ProjectStatus::EquipmentBudget,
        ProjectStatus::SecurityBudget,
        ProjectStatus::RsrBudget,
        ProjectStatus::PisBudget,
        ProjectStatus::TotalBudget,
        ProjectStatus::Construction,
        ProjectStatus::Opened,
        ProjectStatus::Closed,
        ProjectStatus::Archived,
        ProjectStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Created => "created",
            ProjectStatus::PrepAudit => "prep_audit",
            ProjectStatus::ObjectAudit => "object_audit",
            ProjectStatus::AlcoholLicense => "alcohol_license",
            ProjectStatus::WasteSite => "waste_site",
            ProjectStatus::PlanningContour => "planning_contour",
            ProjectStatus::Visualization => "visualization",
            ProjectStatus::Logistics => "logistics",
            ProjectStatus::Layout => "layout",
            ProjectStatus::EquipmentBudget => "equipment_budget",
            ProjectStatus::SecurityBudget => "security_budget",
            ProjectStatus::RsrBudget => "rsr_budget",
            ProjectStatus::PisBudget => "pis_budget",
            ProjectStatus::TotalBudget => "total_budget",
            ProjectStatus::Construction => "construction",
            ProjectStatus::Opened => "opened",
            ProjectStatus::Closed => "closed",
            ProjectStatus::Archived => "archived",
            ProjectStatus::Failed => "failed",
        }
    }

    /// Statuses that an automatic refresh must never overwrite.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProjectStatus::Opened
                | ProjectStatus::Closed
                | ProjectStatus::Archived
                | ProjectStatus::Failed
        )
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ProjectStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("invalid project status: {wanted}"))
    }
}

/// Graph key of a task definition.
///
/// Codes are validated on construction (non-empty, ASCII letters, digits,
/// `-` and `_` only) so typos surface when a blueprint is loaded rather than
/// as silently dangling dependency edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskCode(String);

impl TaskCode {
    pub fn new(code: impl Into<String>) -> Result<Self, String> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err("task code must not be empty".to_string());
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(format!("task code '{trimmed}' contains invalid character {bad:?}"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The built-in store-opening task this code names, if any.
    pub fn known(&self) -> Option<KnownTask> {
        KnownTask::from_code(&self.0)
    }
}

impl fmt::Display for TaskCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TaskCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TaskCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaskCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TaskCode::new(value)
    }
}

impl TryFrom<&str> for TaskCode {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        TaskCode::new(value)
    }
}

impl From<TaskCode> for String {
    fn from(code: TaskCode) -> Self {
        code.0
    }
}

impl From<KnownTask> for TaskCode {
    fn from(task: KnownTask) -> Self {
        TaskCode(task.code().to_string())
    }
}

impl PartialEq<KnownTask> for TaskCode {
    fn eq(&self, other: &KnownTask) -> bool {
        self.0 == other.code()
    }
}

/// The tasks of the standard store-opening workflow.
///
/// Declaration order is the canonical stage order used by the project
/// status deriver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KnownTask {
    PrepAudit,
    Audit,
    AlcoholLicense,
    Waste,
    Contour,
    Visualization,
    Logistics,
    Layout,
    BudgetEquipment,
    BudgetSecurity,
    BudgetRsr,
    BudgetPis,
    TotalBudget,
}

impl KnownTask {
    pub const ALL: [KnownTask; 13] = [
        KnownTask::PrepAudit,
        KnownTask::Audit,
        KnownTask::AlcoholLicense,
        KnownTask::Waste,
        KnownTask::Contour,
        KnownTask::Visualization,
        KnownTask::Logistics,
        KnownTask::Layout,
        KnownTask::BudgetEquipment,
        KnownTask::BudgetSecurity,
        KnownTask::BudgetRsr,
        KnownTask::BudgetPis,
        KnownTask::TotalBudget,
    ];

    pub fn code(self) -> &'static str {
        match self {
            KnownTask::PrepAudit => "TASK-PREP-AUDIT",
            KnownTask::Audit => "TASK-AUDIT",
            KnownTask::AlcoholLicense => "TASK-ALCO-LIC",
            KnownTask::Waste => "TASK-WASTE",
            KnownTask::Contour => "TASK-CONTOUR",
            KnownTask::Visualization => "TASK-VISUALIZATION",
            KnownTask::Logistics => "TASK-LOGISTICS",
            KnownTask::Layout => "TASK-LAYOUT",
            KnownTask::BudgetEquipment => "TASK-BUDGET-EQUIP",
            KnownTask::BudgetSecurity => "TASK-BUDGET-SECURITY",
            KnownTask::BudgetRsr => "TASK-BUDGET-RSR",
            KnownTask::BudgetPis => "TASK-BUDGET-PIS",
            KnownTask::TotalBudget => "TASK-TOTAL-BUDGET",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        KnownTask::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Project status reported while this task is the one being worked on.
    pub fn project_status(self) -> ProjectStatus {
        match self {
            KnownTask::PrepAudit => ProjectStatus::PrepAudit,
            KnownTask::Audit => ProjectStatus::ObjectAudit,
            KnownTask::AlcoholLicense => ProjectStatus::AlcoholLicense,
            KnownTask::Waste => ProjectStatus::WasteSite,
            KnownTask::Contour => ProjectStatus::PlanningContour,
            KnownTask::Visualization => ProjectStatus::Visualization,
            KnownTask::Logistics => ProjectStatus::Logistics,
            KnownTask::Layout => ProjectStatus::Layout,
            KnownTask::BudgetEquipment => ProjectStatus::EquipmentBudget,
            KnownTask::BudgetSecurity => ProjectStatus::SecurityBudget,
            KnownTask::BudgetRsr => ProjectStatus::RsrBudget,
            KnownTask::BudgetPis => ProjectStatus::PisBudget,
            KnownTask::TotalBudget => ProjectStatus::TotalBudget,
        }
    }
}

impl fmt::Display for KnownTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_code_rejects_whitespace_and_empty() {
        assert!(TaskCode::new("").is_err());
        assert!(TaskCode::new("TASK AUDIT").is_err());
        assert_eq!(TaskCode::new("  TASK-AUDIT ").unwrap().as_str(), "TASK-AUDIT");
    }

    #[test]
    fn known_codes_round_trip_through_task_code() {
        for task in KnownTask::ALL {
            let code = TaskCode::from(task);
            assert_eq!(code.known(), Some(task));
        }
        assert_eq!(TaskCode::new("CUSTOM-1").unwrap().known(), None);
    }

    #[test]
    fn status_parsing_accepts_loose_spelling() {
        assert_eq!("In Progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!("in-progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert!("done".parse::<TaskStatus>().is_err());
        assert_eq!("opened".parse::<ProjectStatus>(), Ok(ProjectStatus::Opened));
    }

    #[test]
    fn only_waiting_is_inactive() {
        assert!(!TaskStatus::Waiting.implies_active());
        assert!(TaskStatus::Assigned.implies_active());
        assert!(TaskStatus::Completed.implies_active());
    }
}
