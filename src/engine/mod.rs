// src/engine/mod.rs

//! Background dispatcher for recompute and status-refresh jobs.
//!
//! This module ties together:
//! - the per-project pending-job queue (what happens when requests arrive
//!   while a job for the same project is running)
//! - the pure dispatch core that decides which jobs may start
//! - the async shell that receives requests, spawns jobs and reports idle
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::types::{ProjectId, TaskCode, TaskId, TaskStatus, UserId};

/// Why a job was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    ProjectCreated,
    /// A task changed status. `code` is `None` for ad-hoc tasks.
    StatusChanged {
        task: TaskId,
        code: Option<TaskCode>,
        status: TaskStatus,
    },
    TaskCreated(TaskId),
    TaskEdited(TaskId),
}

impl Trigger {
    /// Code of the task behind the trigger, if any.
    pub fn code(&self) -> Option<&TaskCode> {
        match self {
            Trigger::StatusChanged { code, .. } => code.as_ref(),
            _ => None,
        }
    }
}

/// A request for background work on one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub project: ProjectId,
    pub recompute: bool,
    pub refresh_status: bool,
    pub trigger: Trigger,
    pub actor: Option<UserId>,
}

/// Work to run for one project. Several requests for the same project
/// coalesce into one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectJob {
    pub project: ProjectId,
    pub recompute: bool,
    pub refresh_status: bool,
    pub triggers: Vec<Trigger>,
    /// Actor of the latest request.
    pub actor: Option<UserId>,
}

impl ProjectJob {
    pub fn from_request(req: JobRequest) -> Self {
        Self {
            project: req.project,
            recompute: req.recompute,
            refresh_status: req.refresh_status,
            triggers: vec![req.trigger],
            actor: req.actor,
        }
    }

    /// Fold another request for the same project into this job.
    pub fn merge(&mut self, req: JobRequest) {
        debug_assert_eq!(self.project, req.project);
        self.recompute |= req.recompute;
        self.refresh_status |= req.refresh_status;
        if !self.triggers.contains(&req.trigger) {
            self.triggers.push(req.trigger);
        }
        if req.actor.is_some() {
            self.actor = req.actor;
        }
    }

    /// Code of the first coded trigger, used for logging.
    pub fn trigger_code(&self) -> Option<&TaskCode> {
        self.triggers.iter().find_map(Trigger::code)
    }
}

/// Events flowing into the dispatch core.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Requested(JobRequest),
    /// The job for `project` finished, successfully or not.
    JobFinished { project: ProjectId },
    /// Stop once every running and pending job has finished.
    ShutdownRequested,
}

pub mod core;
pub mod queue;
pub mod runtime;

pub use self::core::{DispatchCommand, DispatchCore, DispatchStep};
pub use queue::PendingJobs;
pub use runtime::{DispatchHandle, Dispatcher};
