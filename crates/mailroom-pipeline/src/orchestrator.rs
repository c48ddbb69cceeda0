//! Pipeline orchestrator.
//!
//! Sequences classification, extraction and dispatch for one message and
//! routes any stage error into the failure recorder. Every run ends in
//! exactly one of: completed dispatch, no match, recorded failure.

use std::sync::Arc;

use mailroom_core::boundary::{ActionExecutor, FailureStore};
use mailroom_core::types::{ActionResult, IncomingMessage};
use tracing::{debug, error, info, warn};

use crate::classifier::classify;
use crate::dispatcher::Dispatcher;
use crate::error::PipelineError;
use crate::extractor::EntityExtractor;
use crate::recorder::FailureRecorder;
use crate::rules::RuleSet;
use crate::state_machine::{RunPath, RunState};

/// Terminal outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The matched rule's action executed successfully.
    Completed {
        intent_id: String,
        action: String,
        result: ActionResult,
    },
    /// No rule reached its threshold. Nothing was dispatched or recorded.
    NoMatch,
    /// A stage failed and the failure went to the recorder.
    Recorded {
        intent_id: Option<String>,
        error_kind: &'static str,
        error_message: String,
        /// False when the failure store itself rejected the record.
        persisted: bool,
    },
}

/// What happened to a message, with the states it passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub path: Vec<RunState>,
}

impl RunReport {
    pub fn final_state(&self) -> RunState {
        self.path.last().copied().unwrap_or(RunState::Received)
    }
}

/// Runs messages through the pipeline against a shared, read-only rule set.
pub struct Orchestrator {
    rules: Arc<RuleSet>,
    extractor: EntityExtractor,
    dispatcher: Dispatcher,
    recorder: FailureRecorder,
}

impl Orchestrator {
    pub fn new(
        rules: Arc<RuleSet>,
        executor: Arc<dyn ActionExecutor>,
        failure_store: Arc<dyn FailureStore>,
    ) -> Self {
        Self {
            rules,
            extractor: EntityExtractor::new(),
            dispatcher: Dispatcher::new(executor),
            recorder: FailureRecorder::new(failure_store),
        }
    }

    pub fn rules(&self) -> &Arc<RuleSet> {
        &self.rules
    }

    /// Process one message to a terminal state. Never returns an error;
    /// failures are reported through the recorder and the returned report.
    pub async fn run(&self, message: IncomingMessage) -> RunReport {
        let mut path = RunPath::new();
        let mut intent_id = None;

        let outcome = match self.process(&message, &mut path, &mut intent_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                step(&mut path, RunState::Failed);
                warn!(
                    channel_id = %message.channel_id,
                    intent_id = intent_id.as_deref().unwrap_or("-"),
                    error_kind = err.kind(),
                    "Pipeline run failed: {}",
                    err
                );
                let persisted = self
                    .recorder
                    .record(&message, intent_id.as_deref(), &err)
                    .await
                    .is_some();
                step(&mut path, RunState::Recorded);
                RunOutcome::Recorded {
                    intent_id,
                    error_kind: err.kind(),
                    error_message: err.to_string(),
                    persisted,
                }
            }
        };

        RunReport {
            outcome,
            path: path.into_states(),
        }
    }

    async fn process(
        &self,
        message: &IncomingMessage,
        path: &mut RunPath,
        intent_id: &mut Option<String>,
    ) -> Result<RunOutcome, PipelineError> {
        step(path, RunState::Classifying);
        let matched = classify(&message.body, &self.rules);
        let rule = match matched.matched_rule {
            Some(rule) => rule,
            None => {
                step(path, RunState::NoMatch);
                info!(channel_id = %message.channel_id, "No intent matched");
                return Ok(RunOutcome::NoMatch);
            }
        };
        *intent_id = Some(rule.intent_id.clone());

        step(path, RunState::Extracting);
        let entities =
            self.extractor
                .extract(&message.body, message.meta(), rule.extraction_strategy);

        step(path, RunState::Dispatching);
        let result = self
            .dispatcher
            .dispatch(&rule.target_action, &entities, message.meta())
            .await?;

        step(path, RunState::Completed);
        info!(
            channel_id = %message.channel_id,
            intent_id = %rule.intent_id,
            action = %rule.target_action.name,
            "Action dispatched"
        );
        debug!(result = %result.message, "Action result");

        Ok(RunOutcome::Completed {
            intent_id: rule.intent_id.clone(),
            action: rule.target_action.name.clone(),
            result,
        })
    }
}

fn step(path: &mut RunPath, next: RunState) {
    if let Err(e) = path.advance(next) {
        error!("{}", e);
    }
}
