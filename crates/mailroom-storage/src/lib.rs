//! Mailroom storage crate - SQLite persistence for the pipeline boundaries.
//!
//! Provides a WAL-mode SQLite database with migrations, the stored-procedure
//! executors behind the action-execution boundary, and the failure-record
//! store behind the failure-persistence boundary.

pub mod db;
pub mod executor;
pub mod failures;
pub mod migrations;

pub use db::Database;
pub use executor::{format_exec, ActionLogRow, LoggingActionExecutor, SqliteActionExecutor};
pub use failures::SqliteFailureStore;
