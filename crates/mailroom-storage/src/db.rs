//! SQLite handle shared by the action log and the failure store.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::info;

use mailroom_core::error::MailroomError;

use crate::migrations;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
                       PRAGMA synchronous = NORMAL;
                       PRAGMA busy_timeout = 5000;";

fn storage_err(what: &str) -> impl FnOnce(rusqlite::Error) -> MailroomError + '_ {
    move |e| MailroomError::Storage(format!("{}: {}", what, e))
}

/// One migrated SQLite connection behind a mutex.
///
/// Pipeline runs are short and write one row each, so a single serialized
/// connection is enough for every run in the process.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database file at `path`, creating it and its parent
    /// directory if needed, then bring the schema up to date.
    pub fn new(path: &Path) -> Result<Self, MailroomError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(storage_err("Failed to open database"))?;
        conn.execute_batch(PRAGMAS)
            .map_err(storage_err("Failed to configure database"))?;
        info!(path = %path.display(), "SQLite database ready");

        Self::migrated(conn)
    }

    /// Private in-memory database; used by tests and benches.
    pub fn in_memory() -> Result<Self, MailroomError> {
        let conn = Connection::open_in_memory()
            .map_err(storage_err("Failed to open in-memory database"))?;
        Self::migrated(conn)
    }

    fn migrated(conn: Connection) -> Result<Self, MailroomError> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.with_conn(migrations::run_migrations)?;
        Ok(db)
    }

    /// Run `f` while holding the connection lock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, MailroomError>
    where
        F: FnOnce(&Connection) -> Result<T, MailroomError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| MailroomError::Storage("Database mutex poisoned".to_string()))?;
        f(&conn)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
