//! Pipeline run state machine with validated transitions.
//!
//! Received -> Classifying -> Extracting -> Dispatching -> Completed
//! Classifying -> NoMatch
//! Received/Classifying/Extracting/Dispatching -> Failed -> Recorded
//!
//! Completed, NoMatch and Recorded are terminal. Nothing leads back to
//! Classifying, so a run is never retried.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvalidTransition;

/// States of a single pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Received,
    Classifying,
    Extracting,
    Dispatching,
    Completed,
    NoMatch,
    Failed,
    Recorded,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::NoMatch | RunState::Recorded
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Received => write!(f, "received"),
            RunState::Classifying => write!(f, "classifying"),
            RunState::Extracting => write!(f, "extracting"),
            RunState::Dispatching => write!(f, "dispatching"),
            RunState::Completed => write!(f, "completed"),
            RunState::NoMatch => write!(f, "no_match"),
            RunState::Failed => write!(f, "failed"),
            RunState::Recorded => write!(f, "recorded"),
        }
    }
}

/// Validate that a run state transition is allowed.
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), InvalidTransition> {
    let valid = matches!(
        (from, to),
        (RunState::Received, RunState::Classifying)
            | (RunState::Classifying, RunState::Extracting)
            | (RunState::Classifying, RunState::NoMatch)
            | (RunState::Extracting, RunState::Dispatching)
            | (RunState::Dispatching, RunState::Completed)
            | (RunState::Received, RunState::Failed)
            | (RunState::Classifying, RunState::Failed)
            | (RunState::Extracting, RunState::Failed)
            | (RunState::Dispatching, RunState::Failed)
            | (RunState::Failed, RunState::Recorded)
    );

    if valid {
        Ok(())
    } else {
        Err(InvalidTransition(from, to))
    }
}

/// Ordered list of states a run passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPath {
    states: Vec<RunState>,
}

impl RunPath {
    pub fn new() -> Self {
        Self {
            states: vec![RunState::Received],
        }
    }

    pub fn current(&self) -> RunState {
        self.states.last().copied().unwrap_or(RunState::Received)
    }

    /// Move to `next`, rejecting transitions outside the graph.
    pub fn advance(&mut self, next: RunState) -> Result<(), InvalidTransition> {
        validate_transition(self.current(), next)?;
        tracing::trace!(from = %self.current(), to = %next, "Run state transition");
        self.states.push(next);
        Ok(())
    }

    pub fn states(&self) -> &[RunState] {
        &self.states
    }

    pub fn into_states(self) -> Vec<RunState> {
        self.states
    }
}

impl Default for RunPath {
    fn default() -> Self {
        Self::new()
    }
}
