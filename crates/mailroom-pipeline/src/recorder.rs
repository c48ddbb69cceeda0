//! Failure recording, the terminal step of the error path.

use std::sync::Arc;

use mailroom_core::boundary::FailureStore;
use mailroom_core::types::{FailureRecord, IncomingMessage};
use tracing::{error, info};

use crate::error::PipelineError;

/// Builds failure records and hands them to the failure store.
pub struct FailureRecorder {
    store: Arc<dyn FailureStore>,
}

impl FailureRecorder {
    pub fn new(store: Arc<dyn FailureStore>) -> Self {
        Self { store }
    }

    /// Build and persist a record for a failed run.
    ///
    /// Never fails. If the store rejects the record the persistence error is
    /// logged and `None` is returned; the record is otherwise returned as
    /// saved.
    pub async fn record(
        &self,
        message: &IncomingMessage,
        intent_id: Option<&str>,
        err: &PipelineError,
    ) -> Option<FailureRecord> {
        let record = FailureRecord::new(
            message.clone(),
            intent_id.map(str::to_string),
            err.kind(),
            err.to_string(),
        );

        match self.store.persist(&record).await {
            Ok(()) => {
                info!(
                    record_id = %record.id,
                    intent_id = intent_id.unwrap_or("-"),
                    error_kind = err.kind(),
                    "Failure recorded"
                );
                Some(record)
            }
            Err(e) => {
                let e = PipelineError::Persistence(e);
                error!(
                    record_id = %record.id,
                    channel_id = %message.channel_id,
                    intent_id = intent_id.unwrap_or("-"),
                    original_error = %err,
                    "{}",
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailroom_core::error::MailroomError;
    use std::sync::Mutex;

    /// In-memory store; optionally rejects every record.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub records: Mutex<Vec<FailureRecord>>,
        pub unavailable: bool,
    }

    impl MemoryStore {
        pub fn unavailable() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                unavailable: true,
            }
        }

        pub fn len(&self) -> usize {
            self.records.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl FailureStore for MemoryStore {
        async fn persist(&self, record: &FailureRecord) -> Result<(), MailroomError> {
            if self.unavailable {
                return Err(MailroomError::Storage("database is locked".to_string()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn binding_error() -> PipelineError {
        PipelineError::Binding {
            param: "@order_ref".to_string(),
            source_path: "extracted_order_id".to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_keeps_message_verbatim() {
        let store = Arc::new(MemoryStore::default());
        let recorder = FailureRecorder::new(store.clone());
        let message = IncomingMessage::new("chat", "  Quiero mi factura\n");

        let record = recorder
            .record(&message, Some("INTENT_INVOICE_REQ"), &binding_error())
            .await
            .unwrap();

        assert_eq!(record.original_message, message);
        assert_eq!(record.detected_intent.as_deref(), Some("INTENT_INVOICE_REQ"));
        assert_eq!(record.error_kind, "binding");
        assert!(record.error_message.contains("@order_ref"));
        assert_eq!(store.records.lock().unwrap().as_slice(), &[record]);
    }

    #[tokio::test]
    async fn test_record_without_intent() {
        let store = Arc::new(MemoryStore::default());
        let recorder = FailureRecorder::new(store.clone());
        let err = PipelineError::Configuration("bad rule".to_string());

        let record = recorder
            .record(&IncomingMessage::new("email", "x"), None, &err)
            .await
            .unwrap();

        assert_eq!(record.detected_intent, None);
        assert_eq!(record.error_kind, "configuration");
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::unavailable());
        let recorder = FailureRecorder::new(store.clone());

        let record = recorder
            .record(&IncomingMessage::new("email", "x"), None, &binding_error())
            .await;

        assert!(record.is_none());
        assert_eq!(store.len(), 0);
    }
}
