//! Mailroom API crate - axum HTTP intake and inspection routes.
//!
//! `POST /process-message` queues a message and answers `202 Accepted`
//! before the pipeline runs. The remaining routes expose health, the loaded
//! rule set, and recorded failures.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
