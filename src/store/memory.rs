// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use tracing::trace;

use super::{
    DocumentRef, DocumentStore, StoreTransaction, TaskStore, UserDirectory, UserRef,
    VersionConflict,
};
use crate::project::Project;
use crate::task::ProjectTask;
use crate::types::{ProjectId, ProjectStatus, TaskId, UserId};

#[derive(Debug, Default)]
struct Tables {
    projects: BTreeMap<ProjectId, Project>,
    tasks: BTreeMap<TaskId, ProjectTask>,
}

#[derive(Debug, Default)]
struct Faults {
    /// Fail the insert that would exceed this many successful task inserts.
    task_insert_budget: Option<usize>,
    /// Fail every save of a task with this code.
    failing_save_code: Option<String>,
    /// Bump the stored version of a task with this code right before each
    /// save of it, as if another writer got there first.
    racing_save_code: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: UserRef,
    roles: Vec<String>,
}

/// In-memory implementation of every collaborator trait.
///
/// Cloning yields another handle to the same data, so a test can keep a
/// handle while the engine owns another. Users and documents sit behind
/// their own locks so directory lookups never contend with task writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    documents: Arc<Mutex<HashMap<(ProjectId, String), Vec<DocumentRef>>>>,
    users: Arc<Mutex<Vec<StoredUser>>>,
    faults: Arc<Mutex<Faults>>,
    next_id: Arc<AtomicU64>,
    saves: Arc<AtomicUsize>,
    task_inserts: Arc<AtomicUsize>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| anyhow!("memory store lock poisoned"))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register a user holding the given roles.
    pub fn add_user(&self, name: &str, roles: &[&str]) -> UserId {
        let id = UserId(self.allocate_id());
        let user = StoredUser {
            user: UserRef {
                id,
                name: name.to_string(),
            },
            roles: roles.iter().map(|r| r.to_string()).collect(),
        };
        if let Ok(mut users) = self.users.lock() {
            users.push(user);
        }
        id
    }

    /// Attach a document of `doc_type` to a project.
    pub fn add_document(&self, project: ProjectId, doc_type: &str, file_name: &str) {
        if let Ok(mut docs) = self.documents.lock() {
            docs.entry((project, doc_type.to_string()))
                .or_default()
                .push(DocumentRef {
                    file_name: file_name.to_string(),
                });
        }
    }

    /// Make the task insert after `successful` further inserts fail.
    pub fn fail_task_inserts_after(&self, successful: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            let done = self.task_inserts.load(Ordering::SeqCst);
            faults.task_insert_budget = Some(done + successful);
        }
    }

    /// Make every save of a task with `code` lose to a concurrent writer.
    pub fn race_saves_for(&self, code: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.racing_save_code = Some(code.to_string());
        }
    }

    /// Make every save of a task with `code` fail.
    pub fn fail_saves_for(&self, code: &str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing_save_code = Some(code.to_string());
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            *faults = Faults::default();
        }
    }

    /// Number of successful [`TaskStore::save_task`] calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Every project, in id order.
    pub fn projects(&self) -> Vec<Project> {
        self.tables
            .lock()
            .map(|t| t.projects.values().cloned().collect())
            .unwrap_or_default()
    }


    fn check_insert_budget(&self) -> Result<()> {
        let faults = lock(&self.faults)?;
        let done = self.task_inserts.load(Ordering::SeqCst);
        if let Some(budget) = faults.task_insert_budget {
            if done >= budget {
                bail!("injected failure: task insert #{} rejected", done + 1);
            }
        }
        Ok(())
    }

    fn prepare_task(&self, mut task: ProjectTask) -> Result<ProjectTask> {
        self.check_insert_budget()?;
        self.task_inserts.fetch_add(1, Ordering::SeqCst);
        task.id = TaskId(self.allocate_id());
        task.version = 1;
        Ok(task)
    }
}

impl TaskStore for MemoryStore {
    fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(lock(&self.tables)?.projects.get(&id).cloned())
    }

    fn load_tasks_by_project(&self, id: ProjectId) -> Result<Vec<ProjectTask>> {
        let tables = lock(&self.tables)?;
        let mut tasks: Vec<ProjectTask> = tables
            .tasks
            .values()
            .filter(|t| t.project_id == id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.order, t.id));
        Ok(tasks)
    }

    fn load_task(&self, id: TaskId) -> Result<Option<ProjectTask>> {
        Ok(lock(&self.tables)?.tasks.get(&id).cloned())
    }

    fn save_task(&self, task: &ProjectTask) -> Result<u64> {
        let racing = {
            let faults = lock(&self.faults)?;
            if let (Some(failing), Some(code)) = (&faults.failing_save_code, &task.code) {
                if failing == code.as_str() {
                    bail!("injected failure: save of task {code} rejected");
                }
            }
            matches!(
                (&faults.racing_save_code, &task.code),
                (Some(racing), Some(code)) if racing == code.as_str()
            )
        };

        let mut tables = lock(&self.tables)?;
        let stored = tables
            .tasks
            .get_mut(&task.id)
            .ok_or_else(|| anyhow!("task {} does not exist", task.id))?;
        if racing {
            stored.version += 1;
        }

        if stored.version != task.version {
            return Err(VersionConflict {
                task: task.id,
                expected: task.version,
                found: stored.version,
            }
            .into());
        }

        let version = task.version + 1;
        *stored = ProjectTask {
            version,
            ..task.clone()
        };
        self.saves.fetch_add(1, Ordering::SeqCst);
        trace!(task = %task.id, version, "saved task");
        Ok(version)
    }

    fn insert_task(&self, task: ProjectTask) -> Result<ProjectTask> {
        let task = self.prepare_task(task)?;
        let mut tables = lock(&self.tables)?;
        if !tables.projects.contains_key(&task.project_id) {
            bail!("project {} does not exist", task.project_id);
        }
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    fn update_project_status(&self, id: ProjectId, status: ProjectStatus) -> Result<()> {
        let mut tables = lock(&self.tables)?;
        let project = tables
            .projects
            .get_mut(&id)
            .ok_or_else(|| anyhow!("project {id} does not exist"))?;
        project.status = status;
        Ok(())
    }

    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>> {
        Ok(Box::new(MemoryTransaction {
            store: self,
            projects: Vec::new(),
            tasks: Vec::new(),
        }))
    }
}

/// Inserts are staged locally and applied under one lock on commit.
struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    projects: Vec<Project>,
    tasks: Vec<ProjectTask>,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn insert_project(&mut self, mut project: Project) -> Result<Project> {
        project.id = ProjectId(self.store.allocate_id());
        self.projects.push(project.clone());
        Ok(project)
    }

    fn insert_task(&mut self, task: ProjectTask) -> Result<ProjectTask> {
        let task = self.store.prepare_task(task)?;
        self.tasks.push(task.clone());
        Ok(task)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction {
            store,
            projects,
            tasks,
        } = *self;

        let mut tables = lock(&store.tables)?;
        for task in &tasks {
            let known = tables.projects.contains_key(&task.project_id)
                || projects.iter().any(|p| p.id == task.project_id);
            if !known {
                bail!("task {} references unknown project {}", task.id, task.project_id);
            }
        }
        for project in projects {
            tables.projects.insert(project.id, project);
        }
        for task in tasks {
            tables.tasks.insert(task.id, task);
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn document_exists(&self, project: ProjectId, doc_type: &str) -> Result<bool> {
        let docs = lock(&self.documents)?;
        Ok(docs
            .get(&(project, doc_type.to_string()))
            .is_some_and(|d| !d.is_empty()))
    }

    fn documents_of_type(&self, project: ProjectId, doc_type: &str) -> Result<Vec<DocumentRef>> {
        let docs = lock(&self.documents)?;
        Ok(docs
            .get(&(project, doc_type.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

impl UserDirectory for MemoryStore {
    fn find_by_role(&self, role: &str) -> Result<Option<UserRef>> {
        let users = lock(&self.users)?;
        Ok(users
            .iter()
            .find(|u| u.roles.iter().any(|r| r == role))
            .map(|u| u.user.clone()))
    }

    fn find_by_name(&self, name: &str) -> Result<Option<UserRef>> {
        let users = lock(&self.users)?;
        Ok(users
            .iter()
            .find(|u| u.user.name.eq_ignore_ascii_case(name.trim()))
            .map(|u| u.user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Evidence;
    use crate::types::TaskStatus;
    use chrono::{TimeZone, Utc};

    fn project() -> Project {
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        Project {
            id: ProjectId(0),
            name: "p".into(),
            template_id: None,
            status: ProjectStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }

    fn task(project_id: ProjectId) -> ProjectTask {
        ProjectTask {
            id: TaskId(0),
            project_id,
            code: None,
            name: "t".into(),
            task_type: "user_task".into(),
            stage: None,
            responsible_role: None,
            responsible_user: None,
            depends_on: Vec::new(),
            duration_days: 1,
            status: TaskStatus::Assigned,
            is_active: true,
            planned_start_date: None,
            normative_deadline: Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap(),
            actual_completion_date: None,
            created_at: None,
            updated_at: None,
            started_at: None,
            completed_at: None,
            order: 0,
            evidence: Evidence::default(),
            version: 0,
        }
    }

    #[test]
    fn dropped_transaction_leaves_nothing_behind() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().unwrap();
            let p = tx.insert_project(project()).unwrap();
            tx.insert_task(task(p.id)).unwrap();
        }
        assert!(store.projects().is_empty());
    }

    #[test]
    fn stale_save_is_a_version_conflict() {
        let store = MemoryStore::new();
        let mut tx = store.begin().unwrap();
        let p = tx.insert_project(project()).unwrap();
        let t = tx.insert_task(task(p.id)).unwrap();
        tx.commit().unwrap();

        let mut fresh = store.load_task(t.id).unwrap().unwrap();
        fresh.version = store.save_task(&fresh).unwrap();
        assert_eq!(fresh.version, 2);

        let err = store.save_task(&t).unwrap_err();
        let conflict = err.downcast_ref::<VersionConflict>().unwrap();
        assert_eq!((conflict.expected, conflict.found), (1, 2));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn directory_lookups() {
        let store = MemoryStore::new();
        let id = store.add_user("Dana", &["site_manager"]);
        assert_eq!(store.find_by_role("site_manager").unwrap().unwrap().id, id);
        assert_eq!(store.find_by_name("dana").unwrap().unwrap().id, id);
        assert!(store.find_by_role("auditor").unwrap().is_none());
    }
}
