// src/engine/queue.rs

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use super::{JobRequest, ProjectJob};
use crate::types::ProjectId;

/// Jobs waiting to start, at most one per project.
///
/// Semantics:
/// - A request for a project with no pending job creates one, queued behind
///   the projects already waiting (FIFO across projects).
/// - A request for a project that already has a pending job is merged into
///   it. Recompute and refresh are idempotent re-reads of current state, so
///   one follow-up run covers any number of requests that arrived while the
///   previous job for the project was running.
/// - [`PendingJobs::take_ready`] skips projects that currently have a job
///   running, which is what serialises work per project.
#[derive(Debug, Default)]
pub struct PendingJobs {
    order: VecDeque<ProjectId>,
    jobs: HashMap<ProjectId, ProjectJob>,
}

impl PendingJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no pending jobs.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn contains(&self, project: ProjectId) -> bool {
        self.jobs.contains_key(&project)
    }

    /// Record a request, coalescing it with the project's pending job.
    pub fn record(&mut self, req: JobRequest) {
        let project = req.project;
        match self.jobs.get_mut(&project) {
            Some(job) => {
                job.merge(req);
                debug!(
                    project = %project,
                    triggers = job.triggers.len(),
                    "merged request into pending job"
                );
            }
            None => {
                self.jobs.insert(project, ProjectJob::from_request(req));
                self.order.push_back(project);
                debug!(project = %project, pending = self.order.len(), "queued new job");
            }
        }
    }

    /// Remove and return the oldest pending job whose project is not in
    /// `running`.
    pub fn take_ready(&mut self, running: &HashSet<ProjectId>) -> Option<ProjectJob> {
        let pos = self.order.iter().position(|p| !running.contains(p))?;
        let project = self.order.remove(pos)?;
        self.jobs.remove(&project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Trigger;
    use crate::types::TaskId;

    fn req(project: u64, recompute: bool, trigger: Trigger) -> JobRequest {
        JobRequest {
            project: ProjectId(project),
            recompute,
            refresh_status: true,
            trigger,
            actor: None,
        }
    }

    #[test]
    fn requests_for_one_project_coalesce() {
        let mut q = PendingJobs::new();
        q.record(req(1, false, Trigger::ProjectCreated));
        q.record(req(1, true, Trigger::TaskCreated(TaskId(5))));
        q.record(req(1, true, Trigger::TaskCreated(TaskId(5))));

        assert_eq!(q.len(), 1);
        let job = q.take_ready(&HashSet::new()).unwrap();
        assert!(job.recompute && job.refresh_status);
        assert_eq!(job.triggers.len(), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn running_projects_are_skipped() {
        let mut q = PendingJobs::new();
        q.record(req(1, true, Trigger::ProjectCreated));
        q.record(req(2, true, Trigger::ProjectCreated));

        let running: HashSet<_> = [ProjectId(1)].into_iter().collect();
        assert_eq!(q.take_ready(&running).unwrap().project, ProjectId(2));
        assert!(q.take_ready(&running).is_none());
        assert!(q.contains(ProjectId(1)));
    }
}
