// src/notify/activity.rs

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::types::{ProjectId, ProjectStatus, TaskId, TaskStatus, UserId};

/// What happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityKind {
    ProjectCreated { tasks: usize },
    TaskCreated,
    TaskUpdated,
    TaskStatusChanged { from: TaskStatus, to: TaskStatus },
    TaskRescheduled {
        planned_start: DateTime<Utc>,
        normative_deadline: DateTime<Utc>,
    },
    TaskActivated,
    ProjectStatusChanged { from: ProjectStatus, to: ProjectStatus },
}

/// One audit-trail record.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    pub project: ProjectId,
    pub task: Option<TaskId>,
    /// `None` for changes made by the engine itself.
    pub actor: Option<UserId>,
    pub kind: ActivityKind,
    pub at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn system(project: ProjectId, task: Option<TaskId>, kind: ActivityKind) -> Self {
        Self {
            project,
            task,
            actor: None,
            kind,
            at: Utc::now(),
        }
    }

    pub fn by(mut self, actor: Option<UserId>) -> Self {
        self.actor = actor;
        self
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }
}

/// Audit trail of status and date changes. Not needed for correctness, so
/// recording is infallible from the engine's point of view.
pub trait ActivityLog: Send + Sync + Debug {
    fn record(&self, entry: ActivityEntry);
}

/// Writes each entry as a structured log line.
#[derive(Debug, Clone, Default)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn record(&self, entry: ActivityEntry) {
        let task = entry.task.map(|t| t.to_string()).unwrap_or_default();
        match &entry.kind {
            ActivityKind::TaskStatusChanged { from, to } => {
                info!(project = %entry.project, task = %task, %from, %to, "task status changed");
            }
            ActivityKind::ProjectStatusChanged { from, to } => {
                info!(project = %entry.project, %from, %to, "project status changed");
            }
            other => info!(project = %entry.project, task = %task, activity = ?other, "activity"),
        }
    }
}

/// Keeps entries in memory; cloned handles share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemoryActivityLog {
    entries: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ActivityLog for MemoryActivityLog {
    fn record(&self, entry: ActivityEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}
