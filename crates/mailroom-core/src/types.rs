use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Messages
// =============================================================================

/// A free-text message handed over by the intake boundary.
///
/// Immutable once created; the pipeline passes it by value and the failure
/// recorder stores it verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub channel_id: String,
    pub body: String,
}

impl IncomingMessage {
    pub fn new(channel_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            body: body.into(),
        }
    }

    /// Metadata view of the message, used for `_meta.` parameter sources.
    pub fn meta(&self) -> MessageMeta<'_> {
        MessageMeta {
            channel_id: &self.channel_id,
        }
    }
}

/// Message metadata addressable from rule parameter maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageMeta<'a> {
    pub channel_id: &'a str,
}

impl<'a> MessageMeta<'a> {
    /// Field names accepted after the `_meta.` prefix.
    pub const FIELDS: &'static [&'static str] = &["channel_id"];

    /// Look up a metadata field by name.
    pub fn field(&self, name: &str) -> Option<&'a str> {
        match name {
            "channel_id" => Some(self.channel_id),
            _ => None,
        }
    }
}

// =============================================================================
// Action execution
// =============================================================================

/// Parameters bound for a single action call.
///
/// `None` is an explicit "no value" (SQL `NULL`), never an empty string.
pub type BoundParams = BTreeMap<String, Option<String>>;

/// Result reported by the action-execution boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub rows_affected: Option<u64>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            rows_affected: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            rows_affected: None,
        }
    }
}

// =============================================================================
// Failure records
// =============================================================================

/// Snapshot of a failed pipeline run, kept for manual follow-up.
///
/// Created once per failed run and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: Uuid,
    pub original_message: IncomingMessage,
    pub detected_intent: Option<String>,
    /// Stable tag of the error kind (`binding`, `execution`, ...).
    pub error_kind: String,
    pub error_message: String,
    pub timestamp: Timestamp,
}

impl FailureRecord {
    pub fn new(
        original_message: IncomingMessage,
        detected_intent: Option<String>,
        error_kind: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_message,
            detected_intent,
            error_kind: error_kind.into(),
            error_message: error_message.into(),
            timestamp: Timestamp::now(),
        }
    }
}

// =============================================================================
// Newtype Wrappers - Temporal
// =============================================================================

/// Unix timestamp in seconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}
