// src/workflow/generator.rs

//! Task generator: turns a blueprint into a project's task instances.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::model::{Blueprint, TaskDefinition};
use crate::dag::{PrerequisiteSummary, Schedule};
use crate::errors::{Result, WorkflowError};
use crate::project::Project;
use crate::store::{StoreTransaction, UserDirectory};
use crate::task::{Evidence, ProjectTask};
use crate::types::{TaskCode, TaskId, TaskStatus, UserId};

/// Create one task per definition of `blueprint`, inside `tx`.
///
/// Definitions are walked in authored order. Each task is scheduled after
/// the tasks created earlier in this pass that it depends on; tasks without
/// prerequisites start at `project.created_at` and are assigned right away.
///
/// Any insert failure is returned as-is and the caller is expected to drop
/// the transaction, which discards the tasks inserted so far.
pub fn generate_tasks(
    tx: &mut (dyn StoreTransaction + '_),
    project: &Project,
    blueprint: &Blueprint,
    directory: &dyn UserDirectory,
) -> Result<Vec<ProjectTask>> {
    let mut by_code: HashMap<TaskCode, ProjectTask> = HashMap::with_capacity(blueprint.len());
    let mut created = Vec::with_capacity(blueprint.len());

    for (position, def) in blueprint.definitions().iter().enumerate() {
        let prereqs = PrerequisiteSummary::collect(&def.depends_on, |code| by_code.get(code));
        let schedule = prereqs
            .schedule(def.duration_days)
            .unwrap_or_else(|| Schedule::starting_at(project.created_at, def.duration_days));

        let mut task = instantiate(project, def, schedule, position as u32);
        if task.responsible_user.is_none() {
            task.responsible_user = resolve_by_role(directory, def);
        }

        let task = tx.insert_task(task).map_err(|e| {
            WorkflowError::Persistence(e.context(format!("inserting task {}", def.code)))
        })?;

        debug!(
            project = %project.id,
            task = %def.code,
            status = %task.status,
            start = %schedule.planned_start.date_naive(),
            deadline = %schedule.normative_deadline.date_naive(),
            "generated task"
        );

        by_code.insert(def.code.clone(), task.clone());
        created.push(task);
    }

    Ok(created)
}

fn instantiate(
    project: &Project,
    def: &TaskDefinition,
    schedule: Schedule,
    order: u32,
) -> ProjectTask {
    let status = if def.depends_on.is_empty() {
        TaskStatus::Assigned
    } else {
        TaskStatus::Waiting
    };

    ProjectTask {
        id: TaskId(0),
        project_id: project.id,
        code: Some(def.code.clone()),
        name: def.name.clone(),
        task_type: def.task_type.clone(),
        stage: def.stage.clone(),
        responsible_role: def.responsible_role.clone(),
        responsible_user: def.responsible_user,
        depends_on: def.depends_on.clone(),
        duration_days: def.duration_days,
        status,
        is_active: status.implies_active(),
        planned_start_date: Some(schedule.planned_start),
        normative_deadline: schedule.normative_deadline,
        actual_completion_date: None,
        created_at: Some(project.created_at),
        updated_at: None,
        started_at: None,
        completed_at: None,
        order,
        evidence: Evidence::default(),
        version: 0,
    }
}

/// Best effort: an unknown role or a directory error leaves the task
/// unassigned.
fn resolve_by_role(directory: &dyn UserDirectory, def: &TaskDefinition) -> Option<UserId> {
    let role = def.responsible_role.as_deref().filter(|r| !r.is_empty())?;
    match directory.find_by_role(role) {
        Ok(Some(user)) => Some(user.id),
        Ok(None) => {
            debug!(task = %def.code, role, "no user holds the responsible role");
            None
        }
        Err(err) => {
            warn!(task = %def.code, role, error = %err, "failed to resolve responsible user");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TaskStore};
    use crate::types::{ProjectId, ProjectStatus};
    use chrono::{TimeZone, Utc};

    fn code(s: &str) -> TaskCode {
        TaskCode::new(s).unwrap()
    }

    fn def(c: &str, days: u32, deps: &[&str]) -> TaskDefinition {
        TaskDefinition {
            depends_on: deps.iter().map(|d| code(d)).collect(),
            responsible_role: Some("site_manager".into()),
            ..TaskDefinition::new(code(c), c, days)
        }
    }

    fn project() -> Project {
        let created = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        Project {
            id: ProjectId(0),
            name: "Store 12".into(),
            template_id: None,
            status: ProjectStatus::Created,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn dependency_free_tasks_are_assigned_wherever_they_appear() {
        let store = MemoryStore::new();
        let user = store.add_user("Dana", &["site_manager"]);
        let bp = Blueprint::new_unchecked(
            "t",
            vec![def("A", 2, &[]), def("B", 1, &["A"]), def("C", 3, &[])],
        );

        let mut tx = store.begin().unwrap();
        let p = tx.insert_project(project()).unwrap();
        let tasks = generate_tasks(tx.as_mut(), &p, &bp, &store).unwrap();
        tx.commit().unwrap();

        let statuses: Vec<_> = tasks.iter().map(|t| (t.status, t.is_active)).collect();
        assert_eq!(
            statuses,
            vec![
                (TaskStatus::Assigned, true),
                (TaskStatus::Waiting, false),
                (TaskStatus::Assigned, true),
            ]
        );
        assert!(tasks.iter().all(|t| t.responsible_user == Some(user)));
        assert_eq!(tasks[2].planned_start_date, Some(p.created_at));
        assert_eq!(store.load_tasks_by_project(p.id).unwrap().len(), 3);
    }

    #[test]
    fn insert_failure_discards_the_whole_batch() {
        let store = MemoryStore::new();
        let bp = Blueprint::new_unchecked("t", vec![def("A", 1, &[]), def("B", 1, &["A"])]);
        store.fail_task_inserts_after(1);

        let mut tx = store.begin().unwrap();
        let p = tx.insert_project(project()).unwrap();
        let err = generate_tasks(tx.as_mut(), &p, &bp, &store).unwrap_err();
        drop(tx);

        assert!(matches!(err, WorkflowError::Persistence(_)));
        assert!(store.projects().is_empty());
        assert!(store.load_tasks_by_project(p.id).unwrap().is_empty());
    }
}
