// src/workflow/service.rs

//! Synchronous entry points used by the CRUD layer.
//!
//! Every mutation is written on the caller's thread; recompute and status
//! refresh are handed to the dispatcher and never awaited here.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::model::Blueprint;
use crate::dag::{PrerequisiteSummary, Schedule};
use crate::engine::{DispatchHandle, JobRequest, Trigger};
use crate::errors::{Result, WorkflowError};
use crate::notify::{ActivityEntry, ActivityKind};
use crate::project::{NewProject, Project, StatusReport};
use crate::task::{NewTask, ProjectTask};
use crate::types::{ProjectId, ProjectStatus, TaskCode, TaskId, TaskStatus, UserId};
use crate::workflow::generator::generate_tasks;
use crate::workflow::recompute::{self, RecomputeReport};
use crate::workflow::rules::RuleTable;
use crate::workflow::validator::CompletionValidator;
use crate::workflow::{status, EngineContext};

const DEFAULT_DURATION_DAYS: u32 = 1;

#[derive(Debug, Clone)]
pub struct WorkflowService {
    ctx: EngineContext,
    dispatcher: DispatchHandle,
}

impl WorkflowService {
    pub fn new(ctx: EngineContext, dispatcher: DispatchHandle) -> Self {
        Self { ctx, dispatcher }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn dispatcher(&self) -> &DispatchHandle {
        &self.dispatcher
    }

    /// Insert a project and generate its tasks in one transaction.
    ///
    /// Nothing is written when the template is unknown or any insert fails.
    pub fn create_project(
        &self,
        new: NewProject,
        actor: Option<UserId>,
    ) -> Result<(Project, Vec<ProjectTask>)> {
        let blueprint = match new.template_id {
            Some(id) => self
                .ctx
                .config
                .catalog
                .template(id)
                .ok_or(WorkflowError::TemplateNotFound(id))?,
            None => self.ctx.config.catalog.legacy(),
        };

        let mut tx = self.ctx.store.begin().map_err(WorkflowError::from_store)?;
        let project = tx
            .insert_project(Project {
                id: ProjectId(0),
                name: new.name,
                template_id: new.template_id,
                status: ProjectStatus::Created,
                created_at: new.created_at,
                updated_at: new.created_at,
            })
            .map_err(|e| WorkflowError::Persistence(e.context("inserting project")))?;

        let tasks = generate_tasks(tx.as_mut(), &project, blueprint, self.ctx.directory.as_ref())?;
        tx.commit().map_err(WorkflowError::from_store)?;

        info!(
            project = %project.id,
            blueprint = blueprint.name(),
            tasks = tasks.len(),
            "project created"
        );
        self.ctx.activity.record(
            ActivityEntry::system(
                project.id,
                None,
                ActivityKind::ProjectCreated { tasks: tasks.len() },
            )
            .by(actor)
            .at(project.created_at),
        );

        self.enqueue(JobRequest {
            project: project.id,
            recompute: false,
            refresh_status: true,
            trigger: Trigger::ProjectCreated,
            actor,
        });
        Ok((project, tasks))
    }

    /// Move a task to `status`.
    ///
    /// Completing a task runs the completion validator first; a rejection
    /// leaves the stored task untouched. Setting the status a task already
    /// has is a no-op.
    pub fn update_task_status(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<ProjectTask> {
        let mut task = self.load_task(task_id)?;
        let from = task.status;
        if from == status {
            debug!(task = task.label(), status = %status, "status unchanged");
            return Ok(task);
        }

        if status == TaskStatus::Completed {
            let project = self.load_project(task.project_id)?;
            self.ensure_completable(&project, &task)?;
        }

        task.transition(status, now);
        task.version = self
            .ctx
            .store
            .save_task(&task)
            .map_err(WorkflowError::from_store)?;

        info!(
            project = %task.project_id,
            task = task.label(),
            from = %from,
            to = %status,
            "task status changed"
        );
        self.ctx.activity.record(
            ActivityEntry::system(
                task.project_id,
                Some(task.id),
                ActivityKind::TaskStatusChanged { from, to: status },
            )
            .by(actor)
            .at(now),
        );

        self.enqueue(JobRequest {
            project: task.project_id,
            recompute: task.code.is_some(),
            refresh_status: true,
            trigger: Trigger::StatusChanged {
                task: task.id,
                code: task.code.clone(),
                status,
            },
            actor,
        });
        Ok(task)
    }

    /// Add an ad-hoc task to an existing project.
    ///
    /// The responsible party is looked up as a user name, then as a role.
    /// An initial `Completed` status passes the completion gate first.
    /// The task is appended after the project's last task and scheduled
    /// behind whichever of its prerequisites exist.
    pub fn create_task(
        &self,
        new: NewTask,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<ProjectTask> {
        let project = self.load_project(new.project_id)?;
        let existing = self
            .ctx
            .store
            .load_tasks_by_project(project.id)
            .map_err(WorkflowError::from_store)?;

        let (responsible_user, resolved_role) = match new.responsible_user {
            Some(user) => (Some(user), None),
            None => self.resolve_responsible(new.responsible.as_deref()),
        };

        let order = new.order.unwrap_or_else(|| {
            existing
                .iter()
                .map(|t| t.order)
                .max()
                .map_or(0, |max| max + 1)
        });
        let duration_days = new.duration_days.unwrap_or(DEFAULT_DURATION_DAYS);

        let prereqs = PrerequisiteSummary::collect(&new.depends_on, |code| {
            existing
                .iter()
                .find(|t| t.code.as_ref().map(TaskCode::as_str) == Some(code))
        });
        let schedule = prereqs
            .schedule(duration_days)
            .unwrap_or_else(|| Schedule::starting_at(project.created_at, duration_days));

        let status = new.status.unwrap_or(if new.depends_on.is_empty() {
            TaskStatus::Assigned
        } else {
            TaskStatus::Waiting
        });

        let mut task = ProjectTask {
            id: TaskId(0),
            project_id: project.id,
            code: new.code,
            name: new.name,
            task_type: new.task_type.unwrap_or_else(|| "user_task".to_string()),
            stage: new.stage,
            responsible_role: resolved_role,
            responsible_user,
            depends_on: new.depends_on,
            duration_days,
            status,
            is_active: status.implies_active(),
            planned_start_date: Some(schedule.planned_start),
            normative_deadline: schedule.normative_deadline,
            actual_completion_date: None,
            created_at: Some(now),
            updated_at: None,
            started_at: None,
            completed_at: None,
            order,
            evidence: new.evidence,
            version: 0,
        };
        if status == TaskStatus::Completed {
            self.ensure_completable(&project, &task)?;
        }
        task.transition(status, now);

        let task = self
            .ctx
            .store
            .insert_task(task)
            .map_err(WorkflowError::from_store)?;

        info!(
            project = %project.id,
            task = task.label(),
            status = %task.status,
            order = task.order,
            "task created"
        );
        self.ctx.activity.record(
            ActivityEntry::system(project.id, Some(task.id), ActivityKind::TaskCreated)
                .by(actor)
                .at(now),
        );

        self.enqueue(JobRequest {
            project: project.id,
            recompute: true,
            refresh_status: true,
            trigger: Trigger::TaskCreated(task.id),
            actor,
        });
        Ok(task)
    }

    /// Save edits to a task's non-status fields.
    ///
    /// `task.version` must be the version the caller loaded. Status and the
    /// lifecycle timestamps are kept from the stored row; use
    /// [`WorkflowService::update_task_status`] to change them.
    pub fn update_task(
        &self,
        mut task: ProjectTask,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<ProjectTask> {
        let stored = self.load_task(task.id)?;
        if task.status != stored.status {
            warn!(
                task = task.label(),
                requested = %task.status,
                stored = %stored.status,
                "status changes are ignored by update_task"
            );
        }

        task.project_id = stored.project_id;
        task.status = stored.status;
        task.is_active = stored.is_active;
        task.actual_completion_date = stored.actual_completion_date;
        task.started_at = stored.started_at;
        task.completed_at = stored.completed_at;
        task.created_at = stored.created_at;
        task.updated_at = Some(now);

        task.version = self
            .ctx
            .store
            .save_task(&task)
            .map_err(WorkflowError::from_store)?;

        debug!(project = %task.project_id, task = task.label(), "task updated");
        self.ctx.activity.record(
            ActivityEntry::system(task.project_id, Some(task.id), ActivityKind::TaskUpdated)
                .by(actor)
                .at(now),
        );

        self.enqueue(JobRequest {
            project: task.project_id,
            recompute: true,
            refresh_status: true,
            trigger: Trigger::TaskEdited(task.id),
            actor,
        });
        Ok(task)
    }

    pub fn status_report(&self, project_id: ProjectId, now: DateTime<Utc>) -> Result<StatusReport> {
        status::status_report(&self.ctx, project_id, now)
    }

    /// Run a recompute pass on the caller's task instead of the dispatcher.
    pub async fn recompute_now(
        &self,
        project_id: ProjectId,
        now: DateTime<Utc>,
    ) -> Result<RecomputeReport> {
        recompute::recompute(&self.ctx, project_id, None, now).await
    }

    /// Refresh the persisted project status on the caller's task.
    pub fn refresh_now(
        &self,
        project_id: ProjectId,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<Option<ProjectStatus>> {
        status::refresh_status(&self.ctx, project_id, actor, now)
    }

    /// Resolve once every background job requested so far has finished.
    pub async fn wait_idle(&self) -> Result<()> {
        self.dispatcher.wait_idle().await
    }

    fn enqueue(&self, req: JobRequest) {
        let project = req.project;
        if !self.dispatcher.request(req) {
            debug!(project = %project, "background job not queued; next trigger catches up");
        }
    }

    fn load_project(&self, id: ProjectId) -> Result<Project> {
        self.ctx
            .store
            .load_project(id)
            .map_err(WorkflowError::from_store)?
            .ok_or(WorkflowError::ProjectNotFound(id))
    }

    fn load_task(&self, id: TaskId) -> Result<ProjectTask> {
        self.ctx
            .store
            .load_task(id)
            .map_err(WorkflowError::from_store)?
            .ok_or(WorkflowError::TaskNotFound(id))
    }

    fn blueprint_of(&self, project: &Project) -> Option<&Blueprint> {
        self.ctx.config.catalog.resolve(project.template_id)
    }

    /// Run the completion gate for `task` under its project's blueprint.
    fn ensure_completable(&self, project: &Project, task: &ProjectTask) -> Result<()> {
        let rules = self
            .blueprint_of(project)
            .map(RuleTable::for_blueprint)
            .unwrap_or_default();
        CompletionValidator::new(
            self.ctx.documents.as_ref(),
            &rules,
            self.ctx.config.validation.mode,
        )
        .validate(task)
    }

    /// Name first, then role. Lookup errors leave the task unassigned.
    fn resolve_responsible(&self, responsible: Option<&str>) -> (Option<UserId>, Option<String>) {
        let Some(who) = responsible.map(str::trim).filter(|s| !s.is_empty()) else {
            return (None, None);
        };

        match self.ctx.directory.find_by_name(who) {
            Ok(Some(user)) => return (Some(user.id), None),
            Ok(None) => {}
            Err(err) => warn!(responsible = who, error = %err, "user lookup by name failed"),
        }

        match self.ctx.directory.find_by_role(who) {
            Ok(Some(user)) => (Some(user.id), Some(who.to_string())),
            Ok(None) => {
                debug!(responsible = who, "no user or role matches; task left unassigned");
                (None, Some(who.to_string()))
            }
            Err(err) => {
                warn!(responsible = who, error = %err, "user lookup by role failed");
                (None, None)
            }
        }
    }
}
