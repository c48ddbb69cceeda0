//! Route handler functions for all API endpoints.
//!
//! Each handler extracts its parameters via axum extractors, talks to the
//! intake queue or storage through AppState, and returns JSON.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mailroom_core::types::{FailureRecord, IncomingMessage};
use mailroom_pipeline::IntentRule;

use crate::error::ApiError;
use crate::state::AppState;

/// Acknowledgement text returned for every accepted message.
pub const ACCEPTED_MESSAGE: &str = "Request accepted and is being processed.";

// =============================================================================
// Request / query types
// =============================================================================

/// Request body for POST /process-message.
#[derive(Debug, Deserialize)]
pub struct ProcessMessageRequest {
    pub channel_id: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct FailuresParams {
    pub limit: Option<u64>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub message: String,
    pub message_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub rules_loaded: usize,
    pub queued_messages: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParamSummary {
    pub source: String,
    pub required: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RuleSummary {
    pub intent_id: String,
    pub keywords: Vec<String>,
    pub min_match_count: usize,
    pub priority_flag: Option<String>,
    pub extraction_strategy: String,
    pub action_type: String,
    pub action_name: String,
    pub params: BTreeMap<String, ParamSummary>,
}

impl From<&IntentRule> for RuleSummary {
    fn from(rule: &IntentRule) -> Self {
        Self {
            intent_id: rule.intent_id.clone(),
            keywords: rule.keywords.clone(),
            min_match_count: rule.min_match_count,
            priority_flag: rule.priority_flag.clone(),
            extraction_strategy: rule.extraction_strategy.to_string(),
            action_type: rule.target_action.action_type.to_string(),
            action_name: rule.target_action.name.clone(),
            params: rule
                .target_action
                .params_map
                .iter()
                .map(|(name, binding)| {
                    (
                        name.clone(),
                        ParamSummary {
                            source: binding.source.to_string(),
                            required: binding.required,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RulesResponse {
    pub rules: Vec<RuleSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailureView {
    pub id: Uuid,
    pub channel_id: String,
    pub body: String,
    pub detected_intent: Option<String>,
    pub error_kind: String,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}

impl From<FailureRecord> for FailureView {
    fn from(record: FailureRecord) -> Self {
        Self {
            id: record.id,
            channel_id: record.original_message.channel_id,
            body: record.original_message.body,
            detected_intent: record.detected_intent,
            error_kind: record.error_kind,
            error_message: record.error_message,
            created_at: record.timestamp.to_datetime(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FailuresResponse {
    pub failures: Vec<FailureView>,
    pub total: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /process-message - queue a message and acknowledge immediately.
///
/// The pipeline outcome is never reported here; failures show up in
/// `/failures`.
pub async fn process_message(
    State(state): State<AppState>,
    Json(req): Json<ProcessMessageRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    if req.channel_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "'channel_id' must not be empty".to_string(),
        ));
    }

    let ack = state
        .intake
        .submit(IncomingMessage::new(req.channel_id, req.body))
        .map_err(|e| {
            tracing::warn!("Message rejected: {}", e);
            ApiError::from(e)
        })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            message: ACCEPTED_MESSAGE.to_string(),
            message_id: ack.message_id,
        }),
    ))
}

/// GET /health - liveness plus queue and rule-set figures.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.intake.is_closed() {
        "shutting_down"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        rules_loaded: state.rules.len(),
        queued_messages: state.intake.queued(),
        queue_capacity: state.intake.queue_capacity(),
    })
}

/// GET /rules - loaded rules in evaluation order.
pub async fn rules(State(state): State<AppState>) -> Json<RulesResponse> {
    Json(RulesResponse {
        rules: state.rules.iter().map(RuleSummary::from).collect(),
    })
}

/// GET /failures - most recent failure records, newest first.
pub async fn failures(
    State(state): State<AppState>,
    Query(params): Query<FailuresParams>,
) -> Result<Json<FailuresResponse>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);

    let records = state.failures.list_recent(limit)?;
    let total = state.failures.count()?;

    Ok(Json(FailuresResponse {
        failures: records.into_iter().map(FailureView::from).collect(),
        total,
    }))
}
