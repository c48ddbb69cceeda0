//! Intake queue: acknowledge immediately, process in the background.
//!
//! [`Intake`] is the cheap, cloneable submit side handed to the network
//! layer. [`IntakeWorker`] owns the receive side and runs each accepted
//! message on its own task, bounded by a semaphore. Runs are independent;
//! no completion order is guaranteed across messages.

use std::sync::Arc;

use mailroom_core::types::{IncomingMessage, Timestamp};
use serde::Serialize;
use tokio::sync::{mpsc, Notify, Semaphore};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::IntakeError;
use crate::orchestrator::Orchestrator;

/// Receipt returned to the caller as soon as a message is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub message_id: Uuid,
    pub accepted_at: Timestamp,
}

struct WorkItem {
    id: Uuid,
    message: IncomingMessage,
}

/// Submit side of the intake queue.
#[derive(Clone)]
pub struct Intake {
    tx: mpsc::Sender<WorkItem>,
}

impl Intake {
    /// Queue a message without waiting for it to be processed.
    pub fn submit(&self, message: IncomingMessage) -> Result<Acknowledgement, IntakeError> {
        let ack = Acknowledgement {
            message_id: Uuid::new_v4(),
            accepted_at: Timestamp::now(),
        };
        self.tx
            .try_send(WorkItem {
                id: ack.message_id,
                message,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => IntakeError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => IntakeError::Closed,
            })?;
        debug!(message_id = %ack.message_id, "Message accepted");
        Ok(ack)
    }

    /// Messages waiting in the queue, not counting runs in flight.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn queue_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Signals an [`IntakeWorker`] to stop taking new messages.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

/// Receive side of the intake queue.
pub struct IntakeWorker {
    rx: mpsc::Receiver<WorkItem>,
    orchestrator: Arc<Orchestrator>,
    permits: Arc<Semaphore>,
    max_concurrent_runs: u32,
    shutdown: Arc<Notify>,
}

/// Create a connected intake queue and worker.
///
/// `queue_capacity` is clamped to at least 1, `max_concurrent_runs` to
/// `1..=`[`max_run_limit`].
pub fn channel(
    orchestrator: Arc<Orchestrator>,
    queue_capacity: usize,
    max_concurrent_runs: usize,
) -> (Intake, IntakeWorker) {
    let limit = max_concurrent_runs.clamp(1, max_run_limit() as usize);
    if limit != max_concurrent_runs {
        warn!(
            requested = max_concurrent_runs,
            limit, "max_concurrent_runs out of range, clamped"
        );
    }
    let max_concurrent_runs = u32::try_from(limit).unwrap_or(u32::MAX);

    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let worker = IntakeWorker {
        rx,
        orchestrator,
        permits: Arc::new(Semaphore::new(max_concurrent_runs as usize)),
        max_concurrent_runs,
        shutdown: Arc::new(Notify::new()),
    };
    (Intake { tx }, worker)
}

/// Largest concurrent-run limit a worker accepts.
///
/// Shutdown waits by taking every permit back in one `acquire_many`, which
/// counts in `u32`.
pub fn max_run_limit() -> u32 {
    u32::try_from(Semaphore::MAX_PERMITS).unwrap_or(u32::MAX)
}

impl IntakeWorker {
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    /// Process messages until shut down or until every [`Intake`] is dropped.
    ///
    /// On shutdown the queue is closed, messages already accepted are still
    /// processed, and the call returns once every run has finished.
    pub async fn run(mut self) {
        info!(
            max_concurrent_runs = self.max_concurrent_runs,
            "Intake worker started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => break,
                item = self.rx.recv() => match item {
                    Some(item) => self.start_run(item).await,
                    None => break,
                },
            }
        }

        self.rx.close();
        let mut drained = 0usize;
        while let Some(item) = self.rx.recv().await {
            self.start_run(item).await;
            drained += 1;
        }
        if drained > 0 {
            info!(drained, "Queued messages drained");
        }

        // Every permit back means every run has finished.
        let _ = self
            .permits
            .acquire_many(self.max_concurrent_runs)
            .await;
        info!("Intake worker stopped");
    }

    async fn start_run(&self, item: WorkItem) {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        let span = info_span!(
            "pipeline_run",
            message_id = %item.id,
            channel_id = %item.message.channel_id
        );

        tokio::spawn(
            async move {
                let report = orchestrator.run(item.message).await;
                debug!(final_state = %report.final_state(), "Run finished");
                drop(permit);
            }
            .instrument(span),
        );
    }
}
