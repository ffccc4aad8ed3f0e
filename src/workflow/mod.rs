// src/workflow/mod.rs

//! The workflow engine proper.
//!
//! - `generator`: blueprint → task instances for a new project.
//! - `validator` + `rules`: completion gate.
//! - `recompute`: reschedule and activate tasks after a change.
//! - `status`: derive the project's aggregate status.
//! - `service`: the synchronous entry points callers use, which enqueue the
//!   background work on the dispatcher.

use std::sync::Arc;

use crate::config::model::ConfigFile;
use crate::notify::{ActivityLog, LogNotifier, Notifier, TracingActivityLog};
use crate::store::{DocumentStore, MemoryStore, TaskStore, UserDirectory};

pub mod generator;
pub mod recompute;
pub mod rules;
pub mod service;
pub mod status;
pub mod validator;

pub use generator::generate_tasks;
pub use recompute::{plan_recompute, recompute, RecomputeReport};
pub use rules::{Requirement, RuleTable};
pub use service::WorkflowService;
pub use status::{derive_status, refresh_status, status_report, StatusTable};
pub use validator::{CompletionValidator, Missing, ValidationFailure};

/// Everything the engine needs to run, shared between the service and the
/// background jobs.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub store: Arc<dyn TaskStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub directory: Arc<dyn UserDirectory>,
    pub notifier: Arc<dyn Notifier>,
    pub activity: Arc<dyn ActivityLog>,
    pub config: Arc<ConfigFile>,
    pub status_table: Arc<StatusTable>,
}

impl EngineContext {
    pub fn new(
        store: Arc<dyn TaskStore>,
        documents: Arc<dyn DocumentStore>,
        directory: Arc<dyn UserDirectory>,
        config: ConfigFile,
    ) -> Self {
        let status_table = StatusTable::from_section(&config.status);
        Self {
            store,
            documents,
            directory,
            notifier: Arc::new(LogNotifier),
            activity: Arc::new(TracingActivityLog),
            config: Arc::new(config),
            status_table: Arc::new(status_table),
        }
    }

    /// Context backed entirely by one [`MemoryStore`].
    pub fn in_memory(store: &MemoryStore, config: ConfigFile) -> Self {
        let shared = Arc::new(store.clone());
        Self::new(shared.clone(), shared.clone(), shared, config)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_activity(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = activity;
        self
    }
}
