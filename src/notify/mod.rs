// src/notify/mod.rs

//! Outbound side effects: assignment notifications and the activity log.
//!
//! The engine talks to a [`Notifier`] instead of a concrete transport. This
//! keeps delivery out of the scheduling code and lets tests record what was
//! sent.
//!
//! [`LogNotifier`] only logs, which is what the CLI uses.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::errors::Result;
use crate::types::{ProjectId, TaskId, UserId};

pub mod activity;

pub use activity::{ActivityEntry, ActivityKind, ActivityLog, MemoryActivityLog, TracingActivityLog};

/// "You have been assigned a task."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentNotice {
    pub user: UserId,
    pub task: TaskId,
    pub task_name: String,
    pub project: ProjectId,
    pub project_name: String,
}

/// Delivery of assignment notices.
///
/// Delivery is fire-and-forget from the engine's point of view: an error is
/// logged by the caller and never fails the operation that triggered it.
pub trait Notifier: Send + Sync + Debug {
    fn notify_assignment(
        &self,
        notice: AssignmentNotice,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_assignment(
        &self,
        notice: AssignmentNotice,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            info!(
                user = %notice.user,
                task = %notice.task,
                project = %notice.project,
                "assigned '{}' in '{}'",
                notice.task_name,
                notice.project_name
            );
            Ok(())
        })
    }
}
