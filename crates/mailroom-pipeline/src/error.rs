//! Error types for the pipeline.

use mailroom_core::error::MailroomError;

use crate::state_machine::RunState;

/// Errors raised by a pipeline run or by rule-set loading.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed rule set or a rule that cannot be evaluated.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A required action parameter could not be resolved.
    #[error("Required parameter '{param}' is unresolved (source '{source_path}')")]
    Binding { param: String, source_path: String },
    /// The action-execution boundary failed or reported a non-success result.
    #[error("Action '{action}' failed: {cause}")]
    Execution {
        action: String,
        #[source]
        cause: MailroomError,
    },
    /// A failure record could not be saved.
    #[error("Failure record could not be persisted: {0}")]
    Persistence(#[source] MailroomError),
}

impl PipelineError {
    /// Stable tag stored alongside failure records.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Binding { .. } => "binding",
            PipelineError::Execution { .. } => "execution",
            PipelineError::Persistence(_) => "persistence",
        }
    }
}

/// Rejection from the intake queue.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Intake queue is full")]
    QueueFull,
    #[error("Intake is shut down")]
    Closed,
}

/// A run state transition outside the allowed graph.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid run transition: {0} -> {1}")]
pub struct InvalidTransition(pub RunState, pub RunState);
