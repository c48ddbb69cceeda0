//! Traits for the external collaborators of the pipeline.
//!
//! Implementations must be safe for concurrent calls: the orchestrator runs
//! many messages at once against a single shared instance.

use async_trait::async_trait;

use crate::error::MailroomError;
use crate::types::{ActionResult, BoundParams, FailureRecord};

/// Executes a named downstream action (a stored procedure call).
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute `name` with the given bound parameters.
    ///
    /// A returned `ActionResult` with `success == false` is treated by the
    /// caller as a failed execution, the same as an `Err`.
    async fn execute(&self, name: &str, params: &BoundParams)
        -> Result<ActionResult, MailroomError>;
}

/// Persists failure records for later inspection.
#[async_trait]
pub trait FailureStore: Send + Sync {
    async fn persist(&self, record: &FailureRecord) -> Result<(), MailroomError>;
}
