// src/engine/core.rs

//! Pure dispatch core.
//!
//! This module contains a synchronous, deterministic state machine that
//! consumes [`DispatchEvent`]s and produces:
//! - an updated core state (pending and running jobs)
//! - a list of commands describing which jobs the IO shell should start
//!
//! The async shell (`engine::runtime::Dispatcher`) is responsible for:
//! - reading requests from the channel
//! - spawning jobs and reporting their completion
//! - answering idle waiters and shutdown
//!
//! The core has no channels, no Tokio types and performs no IO.

use std::collections::HashSet;

use tracing::debug;

use super::queue::PendingJobs;
use super::{DispatchEvent, ProjectJob};
use crate::types::ProjectId;

/// Command produced by the core, executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchCommand {
    /// Run this job in the background.
    Start(ProjectJob),
}

/// Decision returned by the core after handling one event.
#[derive(Debug, Clone)]
pub struct DispatchStep {
    pub commands: Vec<DispatchCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

/// Pure dispatcher state.
///
/// Invariants:
/// - at most one job per project is running;
/// - at most `max_concurrent` jobs are running in total;
/// - at most one job per project is pending.
#[derive(Debug)]
pub struct DispatchCore {
    pending: PendingJobs,
    running: HashSet<ProjectId>,
    max_concurrent: usize,
    shutting_down: bool,
}

impl DispatchCore {
    /// `max_concurrent` is clamped to at least 1.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            pending: PendingJobs::new(),
            running: HashSet::new(),
            max_concurrent: max_concurrent.max(1),
            shutting_down: false,
        }
    }

    /// No job running and none pending.
    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.pending.is_empty()
    }

    pub fn running(&self) -> usize {
        self.running.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_running(&self, project: ProjectId) -> bool {
        self.running.contains(&project)
    }

    /// Handle one event, returning the jobs to start.
    pub fn step(&mut self, event: DispatchEvent) -> DispatchStep {
        match event {
            DispatchEvent::Requested(req) => {
                if self.shutting_down {
                    debug!(project = %req.project, "dispatcher shutting down; request ignored");
                } else {
                    self.pending.record(req);
                }
            }
            DispatchEvent::JobFinished { project } => {
                if !self.running.remove(&project) {
                    debug!(project = %project, "finish reported for a project with no running job");
                }
            }
            DispatchEvent::ShutdownRequested => {
                self.shutting_down = true;
            }
        }

        let commands = self.fill_slots();
        DispatchStep {
            commands,
            keep_running: !(self.shutting_down && self.is_idle()),
        }
    }

    fn fill_slots(&mut self) -> Vec<DispatchCommand> {
        let mut commands = Vec::new();
        while self.running.len() < self.max_concurrent {
            let Some(job) = self.pending.take_ready(&self.running) else {
                break;
            };
            self.running.insert(job.project);
            commands.push(DispatchCommand::Start(job));
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{JobRequest, Trigger};

    fn request(project: u64) -> DispatchEvent {
        DispatchEvent::Requested(JobRequest {
            project: ProjectId(project),
            recompute: true,
            refresh_status: true,
            trigger: Trigger::ProjectCreated,
            actor: None,
        })
    }

    fn started(step: &DispatchStep) -> Vec<ProjectId> {
        step.commands
            .iter()
            .map(|DispatchCommand::Start(job)| job.project)
            .collect()
    }

    #[test]
    fn same_project_is_serialised_and_coalesced() {
        let mut core = DispatchCore::new(4);
        assert_eq!(started(&core.step(request(1))), vec![ProjectId(1)]);

        assert!(started(&core.step(request(1))).is_empty());
        assert!(started(&core.step(request(1))).is_empty());
        assert_eq!(core.pending(), 1);

        let step = core.step(DispatchEvent::JobFinished { project: ProjectId(1) });
        assert_eq!(started(&step), vec![ProjectId(1)]);

        core.step(DispatchEvent::JobFinished { project: ProjectId(1) });
        assert!(core.is_idle());
    }

    #[test]
    fn concurrency_is_bounded() {
        let mut core = DispatchCore::new(2);
        core.step(request(1));
        core.step(request(2));
        assert!(started(&core.step(request(3))).is_empty());
        assert_eq!(core.running(), 2);

        let step = core.step(DispatchEvent::JobFinished { project: ProjectId(2) });
        assert_eq!(started(&step), vec![ProjectId(3)]);
        assert!(core.is_running(ProjectId(1)));
    }

    #[test]
    fn shutdown_drains_before_stopping() {
        let mut core = DispatchCore::new(1);
        core.step(request(1));
        core.step(request(2));

        let step = core.step(DispatchEvent::ShutdownRequested);
        assert!(step.keep_running);
        assert!(started(&core.step(request(3))).is_empty());

        let step = core.step(DispatchEvent::JobFinished { project: ProjectId(1) });
        assert_eq!(started(&step), vec![ProjectId(2)]);
        assert!(step.keep_running);

        let step = core.step(DispatchEvent::JobFinished { project: ProjectId(2) });
        assert!(!step.keep_running);
    }
}
