// src/workflow/status.rs

//! Project status deriver.
//!
//! [`derive_status`] is pure; [`refresh_status`] applies it to a stored
//! project and [`status_report`] compares the two without writing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::model::StatusSection;
use crate::errors::{Result, WorkflowError};
use crate::notify::{ActivityEntry, ActivityKind};
use crate::project::{ProjectProgress, StatusReport};
use crate::task::ProjectTask;
use crate::types::{KnownTask, ProjectId, ProjectStatus, TaskCode, TaskStatus, UserId};
use crate::workflow::EngineContext;

/// Task code → project status, in canonical stage order, plus the keywords
/// that mark construction work.
#[derive(Debug, Clone)]
pub struct StatusTable {
    stages: HashMap<TaskCode, (usize, ProjectStatus)>,
    keywords: Vec<String>,
}

impl StatusTable {
    /// Store-opening stages in [`KnownTask::ALL`] order.
    pub fn builtin(keywords: &[String]) -> Self {
        let stages = KnownTask::ALL
            .iter()
            .enumerate()
            .map(|(pos, task)| (TaskCode::from(*task), (pos, task.project_status())))
            .collect();
        Self {
            stages,
            keywords: lowercase(keywords),
        }
    }

    pub fn from_section(section: &StatusSection) -> Self {
        if section.stages.is_empty() {
            return Self::builtin(&section.construction_keywords);
        }
        let stages = section
            .stages
            .iter()
            .enumerate()
            .map(|(pos, row)| (row.code.clone(), (pos, row.status)))
            .collect();
        Self {
            stages,
            keywords: lowercase(&section.construction_keywords),
        }
    }

    fn stage_of(&self, task: &ProjectTask) -> Option<(usize, ProjectStatus)> {
        task.code.as_ref().and_then(|c| self.stages.get(c)).copied()
    }

    fn is_construction(&self, task: &ProjectTask) -> bool {
        let name = task.name.to_lowercase();
        self.keywords.iter().any(|k| name.contains(k.as_str()))
    }
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::from_section(&StatusSection::default())
    }
}

fn lowercase(words: &[String]) -> Vec<String> {
    words.iter().map(|w| w.trim().to_lowercase()).collect()
}

/// Aggregate status of a project from its tasks.
///
/// In priority order:
/// 1. no tasks: `created`;
/// 2. the earliest stage among in-progress mapped tasks;
/// 3. every task completed: `opened`;
/// 4. an in-progress or completed task whose name contains a construction
///    keyword: `construction`;
/// 5. the latest stage among completed mapped tasks, else `created`.
pub fn derive_status(tasks: &[ProjectTask], table: &StatusTable) -> ProjectStatus {
    if tasks.is_empty() {
        return ProjectStatus::Created;
    }

    let earliest_in_progress = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress)
        .filter_map(|t| table.stage_of(t))
        .min_by_key(|(pos, _)| *pos);
    if let Some((_, status)) = earliest_in_progress {
        return status;
    }

    if tasks.iter().all(ProjectTask::is_completed) {
        return ProjectStatus::Opened;
    }

    let construction = tasks.iter().any(|t| {
        matches!(t.status, TaskStatus::InProgress | TaskStatus::Completed)
            && table.is_construction(t)
    });
    if construction {
        return ProjectStatus::Construction;
    }

    tasks
        .iter()
        .filter(|t| t.is_completed())
        .filter_map(|t| table.stage_of(t))
        .max_by_key(|(pos, _)| *pos)
        .map(|(_, status)| status)
        .unwrap_or(ProjectStatus::Created)
}

pub fn progress(tasks: &[ProjectTask]) -> ProjectProgress {
    let completed = tasks.iter().filter(|t| t.is_completed()).count();
    ProjectProgress::new(tasks.len(), completed)
}

/// Persist the derived status of a project if it changed.
///
/// Terminal statuses (`opened`, `closed`, `archived`, `failed`) are never
/// overwritten. Returns the new status when one was written.
pub fn refresh_status(
    ctx: &EngineContext,
    project_id: ProjectId,
    actor: Option<UserId>,
    now: DateTime<Utc>,
) -> Result<Option<ProjectStatus>> {
    let project = ctx
        .store
        .load_project(project_id)
        .map_err(WorkflowError::from_store)?
        .ok_or(WorkflowError::ProjectNotFound(project_id))?;

    if project.status.is_terminal() {
        debug!(project = %project_id, status = %project.status, "terminal status; not refreshing");
        return Ok(None);
    }

    let tasks = ctx
        .store
        .load_tasks_by_project(project_id)
        .map_err(WorkflowError::from_store)?;
    let derived = derive_status(&tasks, &ctx.status_table);
    if derived == project.status {
        return Ok(None);
    }

    ctx.store
        .update_project_status(project_id, derived)
        .map_err(WorkflowError::from_store)?;

    info!(project = %project_id, from = %project.status, to = %derived, "project status updated");
    ctx.activity.record(
        ActivityEntry::system(
            project_id,
            None,
            ActivityKind::ProjectStatusChanged {
                from: project.status,
                to: derived,
            },
        )
        .by(actor)
        .at(now),
    );
    Ok(Some(derived))
}

/// Current vs derived status, progress and overdue count. Read-only.
pub fn status_report(
    ctx: &EngineContext,
    project_id: ProjectId,
    now: DateTime<Utc>,
) -> Result<StatusReport> {
    let project = ctx
        .store
        .load_project(project_id)
        .map_err(WorkflowError::from_store)?
        .ok_or(WorkflowError::ProjectNotFound(project_id))?;
    let tasks = ctx
        .store
        .load_tasks_by_project(project_id)
        .map_err(WorkflowError::from_store)?;

    let suggested = derive_status(&tasks, &ctx.status_table);
    Ok(StatusReport {
        project_id,
        current: project.status,
        suggested,
        needs_update: !project.status.is_terminal() && suggested != project.status,
        progress: progress(&tasks),
        overdue: tasks.iter().filter(|t| t.is_overdue(now)).count(),
    })
}
