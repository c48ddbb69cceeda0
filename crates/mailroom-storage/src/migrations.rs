//! Database schema migrations.
//!
//! Applies the schema for the action log, failure records, and the
//! schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use mailroom_core::error::MailroomError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), MailroomError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| MailroomError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MailroomError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: action log and failure records.
fn apply_v1(conn: &Connection) -> Result<(), MailroomError> {
    conn.execute_batch(
        "
        -- Every stored-procedure call handed to the SQLite executor.
        CREATE TABLE IF NOT EXISTS action_log (
            id              TEXT PRIMARY KEY NOT NULL,
            action_name     TEXT NOT NULL,
            params_json     TEXT NOT NULL DEFAULT '{}',
            executed_at     INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_name
            ON action_log (action_name, executed_at DESC);

        -- Failed pipeline runs awaiting manual review.
        CREATE TABLE IF NOT EXISTS failure_records (
            id              TEXT PRIMARY KEY NOT NULL,
            channel_id      TEXT NOT NULL,
            body            TEXT NOT NULL,
            intent_id       TEXT,
            error_kind      TEXT NOT NULL,
            error_message   TEXT NOT NULL,
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_failure_records_created
            ON failure_records (created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_failure_records_intent
            ON failure_records (intent_id)
            WHERE intent_id IS NOT NULL;

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| MailroomError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_failure_records_allow_missing_intent() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO failure_records (id, channel_id, body, intent_id, error_kind, error_message, created_at)
             VALUES ('f-1', 'email', 'hola', NULL, 'configuration', 'bad rule', 1700000000)",
            [],
        )
        .unwrap();

        let intent: Option<String> = conn
            .query_row(
                "SELECT intent_id FROM failure_records WHERE id = 'f-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(intent, None);
    }

    #[test]
    fn test_action_log_requires_name() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO action_log (id, action_name, executed_at) VALUES ('a-1', NULL, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
