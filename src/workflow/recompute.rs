// src/workflow/recompute.rs

//! Recompute pass: reschedules open tasks behind their prerequisites and
//! activates waiting tasks whose prerequisites are all completed.
//!
//! The pass is split like the dispatcher:
//! - [`plan_recompute`] is a pure, single linear walk over the task list
//!   that applies the changes in memory and reports which tasks moved;
//! - [`recompute`] loads the tasks, runs the plan, then persists, notifies
//!   and records activity for each changed task.
//!
//! The walk follows the blueprint's authored order, then the coded tasks the
//! blueprint does not know (ad-hoc tasks with a code) in dependency order.
//! Completed tasks are never touched. A second run over an unchanged task
//! set plans nothing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::model::Blueprint;
use crate::dag::{DagGraph, PrerequisiteSummary};
use crate::errors::{Result, WorkflowError};
use crate::notify::{ActivityEntry, ActivityKind, AssignmentNotice};
use crate::project::Project;
use crate::task::ProjectTask;
use crate::types::{ProjectId, TaskCode, TaskStatus};
use crate::workflow::EngineContext;

/// One task changed by a recompute walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    /// Index into the task slice given to [`plan_recompute`].
    pub index: usize,
    /// Previous `(planned_start, normative_deadline)` when the dates moved.
    pub rescheduled_from: Option<(Option<DateTime<Utc>>, DateTime<Utc>)>,
    /// Whether the task went from `waiting` to `assigned`.
    pub activated: bool,
}

/// Outcome of one [`recompute`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    pub project: Option<ProjectId>,
    /// Coded tasks the walk looked at.
    pub visited: usize,
    pub rescheduled: usize,
    pub activated: usize,
    /// Successful saves.
    pub saved: usize,
    /// Saves that failed and were skipped.
    pub failed: usize,
}

impl RecomputeReport {
    pub fn is_noop(&self) -> bool {
        self.saved == 0 && self.failed == 0
    }
}

/// Order in which coded tasks are visited: blueprint order first, then the
/// remaining coded tasks in dependency order (ties broken by slice order).
///
/// When several tasks share a code only the first one is visited.
pub fn walk_order(tasks: &[ProjectTask], blueprint: Option<&Blueprint>) -> Vec<usize> {
    let index = code_index(tasks);
    let mut order = Vec::with_capacity(index.len());

    if let Some(bp) = blueprint {
        for def in bp.definitions() {
            if let Some(&i) = index.get(def.code.as_str()) {
                order.push(i);
            }
        }
    }

    let extras: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter_map(|(i, t)| {
            let code = t.code.as_ref()?;
            let first = index.get(code.as_str()) == Some(&i);
            let in_blueprint = blueprint.is_some_and(|bp| bp.contains(code.as_str()));
            (first && !in_blueprint).then_some(i)
        })
        .collect();

    if !extras.is_empty() {
        let graph = DagGraph::from_edges(extras.iter().filter_map(|&i| {
            let t = &tasks[i];
            t.code.clone().map(|c| (c, t.depends_on.clone()))
        }));
        for code in graph.topological_order() {
            if let Some(&i) = index.get(code.as_str()) {
                order.push(i);
            }
        }
    }

    order
}

fn code_index(tasks: &[ProjectTask]) -> HashMap<TaskCode, usize> {
    let mut index = HashMap::with_capacity(tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        if let Some(code) = &task.code {
            index.entry(code.clone()).or_insert(i);
        }
    }
    index
}

/// Run one recompute walk over `tasks` in memory.
///
/// For every open coded task with at least one resolvable prerequisite:
/// - the planned start and deadline are recomputed from the prerequisites'
///   effective end dates and updated when they moved to another day;
/// - a `waiting` task whose prerequisites are all completed becomes
///   `assigned`, active, with `started_at = now`.
///
/// Later tasks in the walk see the updated dates of earlier ones, so a
/// topologically ordered walk converges in one pass.
pub fn plan_recompute(
    tasks: &mut [ProjectTask],
    blueprint: Option<&Blueprint>,
    now: DateTime<Utc>,
) -> Vec<PlannedChange> {
    let index = code_index(tasks);
    let mut changes = Vec::new();

    for i in walk_order(tasks, blueprint) {
        let task = &tasks[i];
        if task.is_completed() || task.depends_on.is_empty() {
            continue;
        }

        let prereqs = PrerequisiteSummary::collect(&task.depends_on, |code| {
            index.get(code).map(|&j| &tasks[j])
        });
        let Some(schedule) = prereqs.schedule(task.duration_days) else {
            continue;
        };

        let task = &mut tasks[i];
        let mut change = PlannedChange {
            index: i,
            rescheduled_from: None,
            activated: false,
        };

        if schedule.differs_from(task.planned_start_date, task.normative_deadline) {
            change.rescheduled_from = Some((task.planned_start_date, task.normative_deadline));
            task.planned_start_date = Some(schedule.planned_start);
            task.normative_deadline = schedule.normative_deadline;
            task.updated_at = Some(now);
        }

        if prereqs.all_completed && task.status == TaskStatus::Waiting {
            task.transition(TaskStatus::Assigned, now);
            task.started_at = Some(now);
            change.activated = true;
        }

        if change.rescheduled_from.is_some() || change.activated {
            changes.push(change);
        }
    }

    changes
}

/// Recompute a project's schedule and activation state and persist the
/// result.
///
/// A failed save is logged and the walk carries on with the next task; the
/// next trigger for the project picks it up again. Only loading the project
/// or its tasks can fail the whole run.
pub async fn recompute(
    ctx: &EngineContext,
    project_id: ProjectId,
    trigger: Option<&TaskCode>,
    now: DateTime<Utc>,
) -> Result<RecomputeReport> {
    let project = ctx
        .store
        .load_project(project_id)
        .map_err(WorkflowError::from_store)?
        .ok_or(WorkflowError::ProjectNotFound(project_id))?;

    let blueprint = ctx.config.catalog.resolve(project.template_id);
    if blueprint.is_none() {
        warn!(
            project = %project_id,
            template = ?project.template_id,
            "project template is not configured; walking tasks in dependency order only"
        );
    }

    let mut tasks = ctx
        .store
        .load_tasks_by_project(project_id)
        .map_err(WorkflowError::from_store)?;

    let visited = walk_order(&tasks, blueprint).len();
    let changes = plan_recompute(&mut tasks, blueprint, now);

    let mut report = RecomputeReport {
        project: Some(project_id),
        visited,
        ..RecomputeReport::default()
    };

    debug!(
        project = %project_id,
        trigger = trigger.map(TaskCode::as_str).unwrap_or("-"),
        visited,
        changes = changes.len(),
        "recompute planned"
    );

    for change in changes {
        let task = &mut tasks[change.index];
        match ctx.store.save_task(task) {
            Ok(version) => {
                task.version = version;
                report.saved += 1;
            }
            Err(err) => {
                warn!(
                    project = %project_id,
                    task = task.label(),
                    error = %format!("{err:#}"),
                    "failed to save recomputed task; continuing"
                );
                report.failed += 1;
                continue;
            }
        }

        if let Some((old_start, old_deadline)) = change.rescheduled_from {
            report.rescheduled += 1;
            info!(
                project = %project_id,
                task = task.label(),
                start_from = %old_start.map(|d| d.date_naive().to_string()).unwrap_or_else(|| "n/a".into()),
                start_to = ?task.planned_start_date.map(|d| d.date_naive()),
                deadline_from = %old_deadline.date_naive(),
                deadline_to = %task.normative_deadline.date_naive(),
                "task rescheduled"
            );
            if let Some(planned_start) = task.planned_start_date {
                ctx.activity.record(
                    ActivityEntry::system(
                        project_id,
                        Some(task.id),
                        ActivityKind::TaskRescheduled {
                            planned_start,
                            normative_deadline: task.normative_deadline,
                        },
                    )
                    .at(now),
                );
            }
        }

        if change.activated {
            report.activated += 1;
            info!(project = %project_id, task = task.label(), "task activated");
            ctx.activity.record(
                ActivityEntry::system(project_id, Some(task.id), ActivityKind::TaskActivated)
                    .at(now),
            );
            notify_assignment(ctx, &project, task).await;
        }
    }

    if !report.is_noop() {
        info!(
            project = %project_id,
            rescheduled = report.rescheduled,
            activated = report.activated,
            failed = report.failed,
            "recompute finished"
        );
    }
    Ok(report)
}

/// Fire-and-forget from the caller's point of view: failures are logged.
pub(crate) async fn notify_assignment(ctx: &EngineContext, project: &Project, task: &ProjectTask) {
    let Some(user) = task.responsible_user else {
        debug!(task = task.label(), "no responsible user; skipping assignment notice");
        return;
    };

    let notice = AssignmentNotice {
        user,
        task: task.id,
        task_name: task.name.clone(),
        project: project.id,
        project_name: project.name.clone(),
    };

    if let Err(err) = ctx.notifier.notify_assignment(notice).await {
        warn!(
            project = %project.id,
            task = task.label(),
            user = %user,
            error = %err,
            "failed to send assignment notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::TaskDefinition;
    use crate::task::Evidence;
    use crate::types::TaskId;
    use chrono::TimeZone;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn code(s: &str) -> TaskCode {
        TaskCode::new(s).unwrap()
    }

    fn task(id: u64, c: &str, days: u32, deps: &[&str], status: TaskStatus) -> ProjectTask {
        ProjectTask {
            id: TaskId(id),
            project_id: ProjectId(1),
            code: Some(code(c)),
            name: c.into(),
            task_type: "user_task".into(),
            stage: None,
            responsible_role: None,
            responsible_user: None,
            depends_on: deps.iter().map(|d| code(d)).collect(),
            duration_days: days,
            status,
            is_active: status.implies_active(),
            planned_start_date: Some(at(1)),
            normative_deadline: at(1 + days),
            actual_completion_date: None,
            created_at: None,
            updated_at: None,
            started_at: None,
            completed_at: None,
            order: id as u32,
            evidence: Evidence::default(),
            version: 1,
        }
    }

    fn complete(t: &mut ProjectTask, day: u32) {
        t.status = TaskStatus::Completed;
        t.actual_completion_date = Some(at(day));
    }

    fn blueprint(defs: &[(&str, &[&str])]) -> Blueprint {
        Blueprint::new_unchecked(
            "t",
            defs.iter()
                .map(|(c, deps)| TaskDefinition {
                    depends_on: deps.iter().map(|d| code(d)).collect(),
                    ..TaskDefinition::new(code(c), *c, 1)
                })
                .collect(),
        )
    }

    #[test]
    fn diamond_activates_only_when_both_parents_complete() {
        let bp = blueprint(&[("A", &[]), ("B", &[]), ("C", &["A", "B"])]);
        let mut tasks = vec![
            task(1, "A", 1, &[], TaskStatus::Assigned),
            task(2, "B", 1, &[], TaskStatus::Assigned),
            task(3, "C", 2, &["A", "B"], TaskStatus::Waiting),
        ];

        complete(&mut tasks[0], 5);
        plan_recompute(&mut tasks, Some(&bp), at(5));
        assert_eq!(tasks[2].status, TaskStatus::Waiting);

        complete(&mut tasks[1], 8);
        let changes = plan_recompute(&mut tasks, Some(&bp), at(8));
        assert_eq!(changes.len(), 1);
        assert!(changes[0].activated);
        assert_eq!(tasks[2].planned_start_date, Some(at(9)));
        assert_eq!(tasks[2].normative_deadline, at(11));
        assert_eq!(tasks[2].status, TaskStatus::Assigned);
        assert!(tasks[2].is_active);
        assert_eq!(tasks[2].started_at, Some(at(8)));
    }

    #[test]
    fn second_walk_plans_nothing() {
        let bp = blueprint(&[("A", &[]), ("B", &["A"]), ("C", &["B"])]);
        let mut tasks = vec![
            task(1, "A", 3, &[], TaskStatus::Assigned),
            task(2, "B", 1, &["A"], TaskStatus::Waiting),
            task(3, "C", 1, &["B"], TaskStatus::Waiting),
        ];
        complete(&mut tasks[0], 2);

        assert_eq!(plan_recompute(&mut tasks, Some(&bp), at(2)).len(), 2);
        assert!(plan_recompute(&mut tasks, Some(&bp), at(3)).is_empty());
        assert_eq!(tasks[2].planned_start_date, Some(at(5)));
    }

    #[test]
    fn completed_tasks_are_frozen() {
        let bp = blueprint(&[("A", &[]), ("B", &["A"])]);
        let mut tasks = vec![
            task(1, "A", 1, &[], TaskStatus::Assigned),
            task(2, "B", 1, &["A"], TaskStatus::Completed),
        ];
        tasks[1].actual_completion_date = Some(at(1));
        let before = tasks[1].clone();
        complete(&mut tasks[0], 20);

        assert!(plan_recompute(&mut tasks, Some(&bp), at(20)).is_empty());
        assert_eq!(tasks[1], before);
    }

    #[test]
    fn non_topological_order_lags_one_step() {
        let bp = blueprint(&[("C", &["B"]), ("B", &["A"]), ("A", &[])]);
        let mut tasks = vec![
            task(1, "A", 1, &[], TaskStatus::Assigned),
            task(2, "B", 1, &["A"], TaskStatus::Waiting),
            task(3, "C", 1, &["B"], TaskStatus::Waiting),
        ];
        complete(&mut tasks[0], 10);

        plan_recompute(&mut tasks, Some(&bp), at(10));
        assert_eq!(tasks[1].planned_start_date, Some(at(11)));
        assert_eq!(tasks[2].planned_start_date, Some(at(3)));

        plan_recompute(&mut tasks, Some(&bp), at(10));
        assert_eq!(tasks[2].planned_start_date, Some(at(13)));
    }

    #[test]
    fn extra_coded_tasks_are_walked_after_the_blueprint() {
        let bp = blueprint(&[("A", &[])]);
        let mut tasks = vec![
            task(1, "A", 1, &[], TaskStatus::Assigned),
            task(2, "X2", 1, &["X1"], TaskStatus::Waiting),
            task(3, "X1", 2, &["A"], TaskStatus::Waiting),
        ];
        let mut uncoded = task(4, "Z", 1, &["A"], TaskStatus::Waiting);
        uncoded.code = None;
        tasks.push(uncoded);

        assert_eq!(walk_order(&tasks, Some(&bp)), vec![0, 2, 1]);

        complete(&mut tasks[0], 4);
        plan_recompute(&mut tasks, Some(&bp), at(4));
        assert_eq!(tasks[2].status, TaskStatus::Assigned);
        assert_eq!(tasks[1].planned_start_date, Some(at(8)));
        assert_eq!(tasks[3].status, TaskStatus::Waiting);
    }
}
