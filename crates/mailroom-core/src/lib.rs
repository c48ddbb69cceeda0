//! Shared types, configuration and boundary traits for the mailroom pipeline.

pub mod boundary;
pub mod config;
pub mod error;
pub mod types;

pub use boundary::{ActionExecutor, FailureStore};
pub use config::MailroomConfig;
pub use error::{MailroomError, Result};
pub use types::*;
