// src/project.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ProjectId, ProjectStatus, TemplateId};

/// A store-opening project.
///
/// `status` is derived from the project's tasks and persisted for fast reads;
/// it may lag behind the tasks until the next background refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    /// Blueprint the project was generated from; `None` means the legacy list.
    pub template_id: Option<TemplateId>,
    pub status: ProjectStatus,
    /// Anchor date for the planned start of dependency-free tasks.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`crate::workflow::WorkflowService::create_project`].
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub template_id: Option<TemplateId>,
    pub created_at: DateTime<Utc>,
}

impl NewProject {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            template_id: None,
            created_at,
        }
    }

    pub fn with_template(mut self, id: TemplateId) -> Self {
        self.template_id = Some(id);
        self
    }
}

/// Completed share of a project's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectProgress {
    pub total: usize,
    pub completed: usize,
    /// `completed / total * 100`, or 0 for a project without tasks.
    pub percent: f64,
}

impl ProjectProgress {
    pub fn new(total: usize, completed: usize) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        Self {
            total,
            completed,
            percent,
        }
    }
}

/// Persisted vs derived status of one project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub project_id: ProjectId,
    pub current: ProjectStatus,
    pub suggested: ProjectStatus,
    /// Whether a refresh would change the persisted status. Always false for
    /// terminal statuses.
    pub needs_update: bool,
    pub progress: ProjectProgress,
    pub overdue: usize,
}
