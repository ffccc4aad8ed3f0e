use std::sync::Arc;

use chrono::{DateTime, Utc};

use storeflow::config::ConfigFile;
use storeflow::engine::{DispatchHandle, Dispatcher};
use storeflow::notify::MemoryActivityLog;
use storeflow::project::{NewProject, Project};
use storeflow::store::{MemoryStore, TaskStore};
use storeflow::task::ProjectTask;
use storeflow::types::{ProjectId, TaskStatus};
use storeflow::workflow::{EngineContext, WorkflowService};
use tokio::task::JoinHandle;

use crate::{code, day, RecordingNotifier};

/// A workflow service on an in-memory store with a running dispatcher.
///
/// Must be created inside a Tokio runtime.
pub struct Harness {
    pub store: MemoryStore,
    pub notifier: RecordingNotifier,
    pub activity: Arc<MemoryActivityLog>,
    pub service: WorkflowService,
    pub dispatcher: DispatchHandle,
    join: JoinHandle<()>,
}

impl Harness {
    pub fn new(config: ConfigFile) -> Self {
        Self::with_store(MemoryStore::new(), config)
    }

    /// Use a store that already has users or documents registered.
    pub fn with_store(store: MemoryStore, config: ConfigFile) -> Self {
        let notifier = RecordingNotifier::new();
        let activity = Arc::new(MemoryActivityLog::new());
        let engine = config.engine;
        let ctx = EngineContext::in_memory(&store, config)
            .with_notifier(Arc::new(notifier.clone()))
            .with_activity(activity.clone());
        let (dispatcher, join) = Dispatcher::spawn(ctx.clone(), engine);
        let service = WorkflowService::new(ctx, dispatcher.clone());
        Self {
            store,
            notifier,
            activity,
            service,
            dispatcher,
            join,
        }
    }

    /// Create a project on the legacy blueprint, created on 2024-01-10.
    pub async fn create_project(&self) -> Project {
        self.create_project_on(day(1, 10)).await
    }

    pub async fn create_project_on(&self, created: DateTime<Utc>) -> Project {
        let (project, _) = self
            .service
            .create_project(NewProject::new("Store 12", created), None)
            .expect("project creation");
        self.settle().await;
        project
    }

    /// Wait until every queued background job has run.
    pub async fn settle(&self) {
        crate::with_timeout(self.service.wait_idle())
            .await
            .expect("dispatcher is running");
    }

    pub fn tasks(&self, project: ProjectId) -> Vec<ProjectTask> {
        self.store.load_tasks_by_project(project).expect("load tasks")
    }

    pub fn task(&self, project: ProjectId, task_code: &str) -> ProjectTask {
        let wanted = code(task_code);
        self.tasks(project)
            .into_iter()
            .find(|t| t.code.as_ref() == Some(&wanted))
            .unwrap_or_else(|| panic!("no task {task_code} in project {project}"))
    }

    /// Complete `task_code` at midnight of `2024-month-d` and let the engine
    /// settle.
    pub async fn complete(&self, project: ProjectId, task_code: &str, month: u32, d: u32) -> ProjectTask {
        let task = self.task(project, task_code);
        let done = self
            .service
            .update_task_status(task.id, TaskStatus::Completed, None, day(month, d))
            .unwrap_or_else(|e| panic!("completing {task_code}: {e}"));
        self.settle().await;
        done
    }

    /// Stop the dispatcher and wait for it to exit.
    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
        crate::with_timeout(self.join)
            .await
            .expect("dispatcher task panicked");
    }
}
