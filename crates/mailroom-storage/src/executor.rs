//! Action-execution backends.
//!
//! `SqliteActionExecutor` records every stored-procedure call in the
//! `action_log` table. `LoggingActionExecutor` renders the call as an
//! `EXEC` statement and only logs it.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use mailroom_core::boundary::ActionExecutor;
use mailroom_core::error::MailroomError;
use mailroom_core::types::{ActionResult, BoundParams, Timestamp};

use crate::db::Database;

/// Render a call as `EXEC name @a='x', @b=NULL`.
///
/// Single quotes inside values are doubled.
pub fn format_exec(name: &str, params: &BoundParams) -> String {
    if params.is_empty() {
        return format!("EXEC {}", name);
    }
    let rendered: Vec<String> = params
        .iter()
        .map(|(key, value)| match value {
            Some(v) => format!("{}='{}'", key, v.replace('\'', "''")),
            None => format!("{}=NULL", key),
        })
        .collect();
    format!("EXEC {} {}", name, rendered.join(", "))
}

/// A row of the `action_log` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLogRow {
    pub id: Uuid,
    pub action_name: String,
    pub params: BoundParams,
    pub executed_at: Timestamp,
}

/// Executor that persists each call to the `action_log` table.
pub struct SqliteActionExecutor {
    db: Arc<Database>,
}

impl SqliteActionExecutor {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Most recent calls, newest first.
    pub fn recent(&self, limit: u64) -> Result<Vec<ActionLogRow>, MailroomError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, action_name, params_json, executed_at
                     FROM action_log
                     ORDER BY executed_at DESC, rowid DESC
                     LIMIT ?1",
                )
                .map_err(|e| MailroomError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })
                .map_err(|e| MailroomError::Storage(e.to_string()))?;

            let mut out = Vec::new();
            for row in rows {
                let (id, action_name, params_json, executed_at) =
                    row.map_err(|e| MailroomError::Storage(e.to_string()))?;
                out.push(ActionLogRow {
                    id: Uuid::parse_str(&id)
                        .map_err(|e| MailroomError::Storage(format!("Invalid UUID: {}", e)))?,
                    action_name,
                    params: serde_json::from_str(&params_json)?,
                    executed_at: Timestamp(executed_at),
                });
            }
            Ok(out)
        })
    }

    /// Total number of logged calls.
    pub fn count(&self) -> Result<u64, MailroomError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM action_log", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(|e| MailroomError::Storage(e.to_string()))
        })
    }
}

#[async_trait]
impl ActionExecutor for SqliteActionExecutor {
    async fn execute(
        &self,
        name: &str,
        params: &BoundParams,
    ) -> Result<ActionResult, MailroomError> {
        let params_json = serde_json::to_string(params)?;
        let rows = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO action_log (id, action_name, params_json, executed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    name,
                    params_json,
                    Timestamp::now().0,
                ],
            )
            .map_err(|e| MailroomError::Execution(format!("Failed to execute {}: {}", name, e)))
        })?;

        tracing::info!(action = name, params = params.len(), "Stored procedure executed");

        Ok(ActionResult {
            success: true,
            message: format_exec(name, params),
            rows_affected: Some(rows as u64),
        })
    }
}

/// Executor that only logs the rendered `EXEC` statement.
#[derive(Debug, Default)]
pub struct LoggingActionExecutor;

#[async_trait]
impl ActionExecutor for LoggingActionExecutor {
    async fn execute(
        &self,
        name: &str,
        params: &BoundParams,
    ) -> Result<ActionResult, MailroomError> {
        let statement = format_exec(name, params);
        tracing::info!(action = name, "{}", statement);
        Ok(ActionResult::ok(statement))
    }
}
