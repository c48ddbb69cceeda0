//! Integration tests for the Mailroom API.
//!
//! Each test builds its own router over an in-memory database and the
//! shipped rule file, and drives it with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use mailroom_api::create_router;
use mailroom_api::handlers::{
    AcceptedResponse, FailuresResponse, HealthResponse, RulesResponse, ACCEPTED_MESSAGE,
};
use mailroom_api::state::AppState;
use mailroom_core::types::{FailureRecord, IncomingMessage};
use mailroom_core::FailureStore;
use mailroom_pipeline::{intake, IntakeWorker, Orchestrator, RuleSet};
use mailroom_storage::{Database, SqliteActionExecutor, SqliteFailureStore};

// =============================================================================
// Helpers
// =============================================================================

const SHIPPED_RULES: &str = include_str!("../../../intent_rules.json");

struct TestApp {
    state: AppState,
    executor: Arc<SqliteActionExecutor>,
    failures: Arc<SqliteFailureStore>,
    worker: Option<IntakeWorker>,
}

impl TestApp {
    fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    /// Start the intake worker in the background.
    fn start_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            tokio::spawn(worker.run());
        }
    }
}

fn make_app(queue_capacity: usize) -> TestApp {
    let db = Arc::new(Database::in_memory().unwrap());
    let executor = Arc::new(SqliteActionExecutor::new(Arc::clone(&db)));
    let failures = Arc::new(SqliteFailureStore::new(db));
    let rules = Arc::new(RuleSet::from_json_str(SHIPPED_RULES).unwrap());

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&rules),
        executor.clone(),
        failures.clone(),
    ));
    let (intake, worker) = intake::channel(orchestrator, queue_capacity, 4);

    TestApp {
        state: AppState::new(intake, rules, failures.clone()),
        executor,
        failures,
        worker: Some(worker),
    }
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

/// Read full response body bytes.
async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

/// Poll until `check` holds or the timeout expires.
async fn wait_for<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// =============================================================================
// POST /process-message
// =============================================================================

#[tokio::test]
async fn test_process_message_returns_202() {
    let app = make_app(16);
    let resp = app
        .router()
        .oneshot(post_json(
            "/process-message",
            r#"{"channel_id": "email", "body": "Hola, solicito factura para el pedido ORD-12345. Mi RFC es ABC123456789"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let bytes = body_bytes(resp).await;
    let ack: AcceptedResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(ack.message, ACCEPTED_MESSAGE);
    assert_eq!(ack.message, "Request accepted and is being processed.");
}

#[tokio::test]
async fn test_accepted_message_is_dispatched() {
    let mut app = make_app(16);
    app.start_worker();

    let resp = app
        .router()
        .oneshot(post_json(
            "/process-message",
            r#"{"channel_id": "email", "body": "Hola, solicito factura para el pedido ORD-12345. Mi RFC es ABC123456789"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let executor = app.executor.clone();
    wait_for(move || executor.count().unwrap() == 1).await;

    let log = app.executor.recent(1).unwrap();
    assert_eq!(log[0].action_name, "sp_finance_process_invoice_request");
    assert_eq!(log[0].params["@order_ref"].as_deref(), Some("ORD-12345"));
    assert_eq!(log[0].params["@client_rfc"].as_deref(), Some("ABC123456789"));
    assert_eq!(log[0].params["@request_source"].as_deref(), Some("email"));
}

#[tokio::test]
async fn test_failed_run_is_still_accepted_and_recorded() {
    let mut app = make_app(16);
    app.start_worker();

    let resp = app
        .router()
        .oneshot(post_json(
            "/process-message",
            r#"{"channel_id": "chat", "body": "Quiero mi factura, por favor."}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let failures = app.failures.clone();
    wait_for(move || failures.count().unwrap() == 1).await;

    let resp = app.router().oneshot(get("/failures")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body_bytes(resp).await;
    let list: FailuresResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(list.total, 1);
    assert_eq!(list.failures[0].channel_id, "chat");
    assert_eq!(list.failures[0].body, "Quiero mi factura, por favor.");
    assert_eq!(list.failures[0].detected_intent.as_deref(), Some("INTENT_INVOICE_REQ"));
    assert_eq!(list.failures[0].error_kind, "binding");
    assert_eq!(app.executor.count().unwrap(), 0);
}

#[tokio::test]
async fn test_unmatched_message_is_accepted_without_trace() {
    let mut app = make_app(16);
    app.start_worker();

    let resp = app
        .router()
        .oneshot(post_json(
            "/process-message",
            r#"{"channel_id": "chat", "body": "Hola, ¿a qué hora abren mañana?"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    // Follow with a message that does leave a trace, then check the first left none.
    app.router()
        .oneshot(post_json(
            "/process-message",
            r#"{"channel_id": "chat", "body": "factura ORD-1 ABC123456789"}"#,
        ))
        .await
        .unwrap();
    let executor = app.executor.clone();
    wait_for(move || executor.count().unwrap() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(app.executor.count().unwrap(), 1);
    assert_eq!(app.failures.count().unwrap(), 0);
}

#[tokio::test]
async fn test_blank_channel_is_rejected() {
    let app = make_app(16);
    let resp = app
        .router()
        .oneshot(post_json(
            "/process-message",
            r#"{"channel_id": "  ", "body": "factura"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = body_bytes(resp).await;
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "bad_request");
    assert_eq!(app.state.intake.queued(), 0);
}

#[tokio::test]
async fn test_missing_field_is_rejected() {
    let app = make_app(16);
    let resp = app
        .router()
        .oneshot(post_json("/process-message", r#"{"channel_id": "email"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = make_app(16);
    let resp = app
        .router()
        .oneshot(post_json("/process-message", "{ not json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_content_type_is_rejected() {
    let app = make_app(16);
    let resp = app
        .router()
        .oneshot(
            Request::post("/process-message")
                .body(Body::from(r#"{"channel_id": "email", "body": "x"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_full_queue_returns_503() {
    let app = make_app(1);
    let body = r#"{"channel_id": "email", "body": "factura ORD-1"}"#;

    let first = app
        .router()
        .oneshot(post_json("/process-message", body))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let second = app
        .router()
        .oneshot(post_json("/process-message", body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
    let bytes = body_bytes(second).await;
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["error"], "service_unavailable");
}

#[tokio::test]
async fn test_closed_intake_returns_503() {
    let mut app = make_app(4);
    drop(app.worker.take());

    let resp = app
        .router()
        .oneshot(post_json(
            "/process-message",
            r#"{"channel_id": "email", "body": "factura"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Inspection routes
// =============================================================================

#[tokio::test]
async fn test_health_reports_rules_and_queue() {
    let app = make_app(8);
    let resp = app.router().oneshot(get("/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body_bytes(resp).await;
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.rules_loaded, 3);
    assert_eq!(health.queued_messages, 0);
    assert_eq!(health.queue_capacity, 8);
}

#[tokio::test]
async fn test_rules_in_evaluation_order() {
    let app = make_app(8);
    let resp = app.router().oneshot(get("/rules")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body_bytes(resp).await;
    let rules: RulesResponse = serde_json::from_slice(&bytes).unwrap();
    let ids: Vec<&str> = rules.rules.iter().map(|r| r.intent_id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["INTENT_INVOICE_REQ", "INTENT_ORDER_STATUS", "INTENT_CANCEL_ORDER"]
    );

    let invoice = &rules.rules[0];
    assert_eq!(invoice.action_type, "stored_procedure");
    assert_eq!(invoice.action_name, "sp_finance_process_invoice_request");
    assert_eq!(invoice.extraction_strategy, "regex_simple");
    assert_eq!(invoice.params["@request_source"].source, "_meta.channel_id");
    assert!(invoice.params["@request_source"].required);

    let status = &rules.rules[1];
    assert!(!status.params["@raw_text"].required);
}

#[tokio::test]
async fn test_failures_empty() {
    let app = make_app(8);
    let resp = app.router().oneshot(get("/failures")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body_bytes(resp).await;
    let list: FailuresResponse = serde_json::from_slice(&bytes).unwrap();
    assert!(list.failures.is_empty());
    assert_eq!(list.total, 0);
}

#[tokio::test]
async fn test_failures_limit() {
    let app = make_app(8);
    for i in 0..5 {
        let record = FailureRecord::new(
            IncomingMessage::new("email", format!("mensaje {}", i)),
            None,
            "execution",
            "boom",
        );
        app.failures.persist(&record).await.unwrap();
    }

    let resp = app.router().oneshot(get("/failures?limit=2")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body_bytes(resp).await;
    let list: FailuresResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(list.failures.len(), 2);
    assert_eq!(list.total, 5);

    let resp = app.router().oneshot(get("/failures?limit=0")).await.unwrap();
    let list: FailuresResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(list.failures.len(), 1);
}

#[tokio::test]
async fn test_failures_invalid_limit() {
    let app = make_app(8);
    let resp = app
        .router()
        .oneshot(get("/failures?limit=abc"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = make_app(8);
    let resp = app.router().oneshot(get("/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
