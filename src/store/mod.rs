// src/store/mod.rs

//! Collaborator interfaces the engine talks to: task/project persistence,
//! evidence documents and the user directory.
//!
//! All of them return `anyhow::Result`, like the rest of the IO edges; the
//! engine wraps their failures into [`crate::errors::WorkflowError`].
//! [`memory::MemoryStore`] implements all three in memory.

use std::fmt::Debug;

use anyhow::Result;
use thiserror::Error;

use crate::project::Project;
use crate::task::ProjectTask;
use crate::types::{ProjectId, ProjectStatus, TaskId, UserId};

pub mod memory;

pub use memory::MemoryStore;

/// Raised by [`TaskStore::save_task`] when the stored row has moved on since
/// the caller loaded it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("version conflict on task {task}: expected {expected}, found {found}")]
pub struct VersionConflict {
    pub task: TaskId,
    pub expected: u64,
    pub found: u64,
}

/// Persistence of projects and their tasks.
pub trait TaskStore: Send + Sync + Debug {
    fn load_project(&self, id: ProjectId) -> Result<Option<Project>>;

    /// Every task of a project, in `order` then id order.
    fn load_tasks_by_project(&self, id: ProjectId) -> Result<Vec<ProjectTask>>;

    fn load_task(&self, id: TaskId) -> Result<Option<ProjectTask>>;

    /// Overwrite a task row.
    ///
    /// `task.version` must equal the stored version, otherwise the save is
    /// rejected with a [`VersionConflict`]. Returns the new version.
    fn save_task(&self, task: &ProjectTask) -> Result<u64>;

    /// Insert a single task outside a transaction. The store assigns `id`
    /// and `version`.
    fn insert_task(&self, task: ProjectTask) -> Result<ProjectTask>;

    fn update_project_status(&self, id: ProjectId, status: ProjectStatus) -> Result<()>;

    /// Open a transaction. Dropping it without calling
    /// [`StoreTransaction::commit`] discards every insert made through it.
    fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>>;
}

/// All-or-nothing batch of inserts.
pub trait StoreTransaction: Send {
    /// Insert a project; the store assigns `id`.
    fn insert_project(&mut self, project: Project) -> Result<Project>;

    /// Insert a task; the store assigns `id` and `version`.
    fn insert_task(&mut self, task: ProjectTask) -> Result<ProjectTask>;

    fn commit(self: Box<Self>) -> Result<()>;
}

/// A stored evidence document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub file_name: String,
}

/// Evidence documents attached to projects, grouped by a type label.
pub trait DocumentStore: Send + Sync + Debug {
    fn document_exists(&self, project: ProjectId, doc_type: &str) -> Result<bool>;

    fn documents_of_type(&self, project: ProjectId, doc_type: &str) -> Result<Vec<DocumentRef>>;
}

/// A user that can be made responsible for tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: UserId,
    pub name: String,
}

/// Lookup of responsible users.
pub trait UserDirectory: Send + Sync + Debug {
    /// Some user holding `role`, if any.
    fn find_by_role(&self, role: &str) -> Result<Option<UserRef>>;

    fn find_by_name(&self, name: &str) -> Result<Option<UserRef>>;
}
