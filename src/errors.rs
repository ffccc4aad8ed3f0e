// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::store::VersionConflict;
use crate::types::{ProjectId, TaskId, TemplateId};
use crate::workflow::validator::ValidationFailure;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cycle detected in task blueprint: {0}")]
    DagCycle(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Template not found: {0}")]
    TemplateNotFound(TemplateId),

    /// A completion was rejected by the completion validator. This is a
    /// user-facing, retryable condition rather than a system fault.
    #[error("{0}")]
    Validation(ValidationFailure),

    #[error("task {} was modified concurrently (expected version {}, found {})", .0.task, .0.expected, .0.found)]
    Conflict(VersionConflict),

    #[error("Persistence error: {0:#}")]
    Persistence(anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Wrap an error coming out of a persistence collaborator.
    ///
    /// Optimistic-lock failures are surfaced as [`WorkflowError::Conflict`];
    /// everything else becomes [`WorkflowError::Persistence`].
    pub fn from_store(err: anyhow::Error) -> Self {
        match err.downcast::<VersionConflict>() {
            Ok(conflict) => WorkflowError::Conflict(conflict),
            Err(other) => WorkflowError::Persistence(other),
        }
    }

    /// Whether the caller may retry the same request after fixing its input
    /// or reloading state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Validation(_) | WorkflowError::Conflict(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WorkflowError>;
