//! Rule-driven classification and dispatch pipeline.
//!
//! Classifies free-text messages against an ordered keyword rule set,
//! extracts entities, binds them onto a stored-procedure call, and records
//! every failed run for later inspection.

pub mod classifier;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod intake;
pub mod orchestrator;
pub mod recorder;
pub mod rules;
pub mod state_machine;

pub use classifier::{classify, MatchResult};
pub use dispatcher::Dispatcher;
pub use error::{IntakeError, InvalidTransition, PipelineError};
pub use extractor::{EntityExtractor, EntityMap, ExtractionStrategy};
pub use intake::{Acknowledgement, Intake, IntakeWorker, ShutdownHandle};
pub use orchestrator::{Orchestrator, RunOutcome, RunReport};
pub use recorder::FailureRecorder;
pub use rules::{ActionDescriptor, ActionType, IntentRule, ParamBinding, RuleSet, SourcePath};
pub use state_machine::RunState;
