//! SQLite-backed failure record store.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use mailroom_core::boundary::FailureStore;
use mailroom_core::error::MailroomError;
use mailroom_core::types::{FailureRecord, IncomingMessage, Timestamp};

use crate::db::Database;

/// Persists failure records to the `failure_records` table.
pub struct SqliteFailureStore {
    db: Arc<Database>,
}

impl SqliteFailureStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Most recent failure records, newest first.
    pub fn list_recent(&self, limit: u64) -> Result<Vec<FailureRecord>, MailroomError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, channel_id, body, intent_id, error_kind, error_message, created_at
                     FROM failure_records
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?1",
                )
                .map_err(|e| MailroomError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![limit], |row| Ok(row_to_record(row)))
                .map_err(|e| MailroomError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let record = row.map_err(|e| MailroomError::Storage(e.to_string()))??;
                records.push(record);
            }
            Ok(records)
        })
    }

    /// Total number of stored failure records.
    pub fn count(&self) -> Result<u64, MailroomError> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM failure_records", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(|e| MailroomError::Storage(e.to_string()))
        })
    }
}

#[async_trait]
impl FailureStore for SqliteFailureStore {
    async fn persist(&self, record: &FailureRecord) -> Result<(), MailroomError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO failure_records
                    (id, channel_id, body, intent_id, error_kind, error_message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    record.id.to_string(),
                    record.original_message.channel_id,
                    record.original_message.body,
                    record.detected_intent,
                    record.error_kind,
                    record.error_message,
                    record.timestamp.0,
                ],
            )
            .map_err(|e| MailroomError::Storage(format!("Failed to save failure record: {}", e)))?;
            Ok(())
        })
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<FailureRecord, MailroomError> {
    let get_err = |e: rusqlite::Error| MailroomError::Storage(e.to_string());
    let id: String = row.get(0).map_err(get_err)?;
    Ok(FailureRecord {
        id: Uuid::parse_str(&id)
            .map_err(|e| MailroomError::Storage(format!("Invalid UUID: {}", e)))?,
        original_message: IncomingMessage {
            channel_id: row.get(1).map_err(get_err)?,
            body: row.get(2).map_err(get_err)?,
        },
        detected_intent: row.get(3).map_err(get_err)?,
        error_kind: row.get(4).map_err(get_err)?,
        error_message: row.get(5).map_err(get_err)?,
        timestamp: Timestamp(row.get(6).map_err(get_err)?),
    })
}
