//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use mailroom_pipeline::{Intake, RuleSet};
use mailroom_storage::SqliteFailureStore;

/// Shared application state.
///
/// Cheap to clone; every field is a handle.
#[derive(Clone)]
pub struct AppState {
    /// Submit side of the pipeline queue.
    pub intake: Intake,
    /// The rule set the pipeline was started with.
    pub rules: Arc<RuleSet>,
    /// Failure records, read back for `/failures`.
    pub failures: Arc<SqliteFailureStore>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(intake: Intake, rules: Arc<RuleSet>, failures: Arc<SqliteFailureStore>) -> Self {
        Self {
            intake,
            rules,
            failures,
            start_time: Instant::now(),
        }
    }
}
