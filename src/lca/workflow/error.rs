// SPDX-License-Identifier: MIT

//! Workflow error taxonomy
//!
//! - [`ValidationError`] - the graph is malformed; raised by `compile`, never at run time
//! - [`StepError`] - a single step invocation failed
//! - [`WorkflowError`] - the terminal outcome of a run that did not complete

use crate::adk::agent::LoopError;
use crate::adk::error::ExternalCallFailure;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Step '{0}' is declared more than once")]
    DuplicateStep(String),

    #[error("Graph has no entry step")]
    NoEntry,

    #[error("Entry step '{0}' is not declared")]
    UnknownEntry(String),

    #[error("Entry step '{step}' cannot have prerequisites: {prerequisites:?}")]
    EntryHasPrerequisites {
        step: String,
        prerequisites: Vec<String>,
    },

    #[error("'{from}' references unknown step '{to}'")]
    UnknownStepReference { from: String, to: String },

    #[error("Router on '{from}' has no route for outcome '{outcome}'")]
    UnmappedOutcome { from: String, outcome: String },

    #[error("Step '{0}' is not reachable from the entry steps")]
    UnreachableStep(String),

    #[error("Static edges form a cycle through '{0}'")]
    CyclicUnconditionalPath(String),

    #[error("Prerequisites form a cycle through '{0}'")]
    CyclicPrerequisites(String),

    #[error("Field '{field}' is overwritten by several steps: {steps:?}")]
    AmbiguousWriter { field: String, steps: Vec<String> },
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    External(#[from] ExternalCallFailure),

    #[error("step cancelled")]
    Cancelled,

    #[error("missing input field '{0}'")]
    MissingInput(String),

    #[error("invalid input field '{field}': {source}")]
    InvalidInput {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode step output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<LoopError> for StepError {
    fn from(err: LoopError) -> Self {
        match err {
            LoopError::External(failure) => StepError::External(failure),
            LoopError::Cancelled { .. } => StepError::Cancelled,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid workflow graph: {0}")]
    Validation(#[from] ValidationError),

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: StepError,
    },

    #[error("Step '{step}' wrote undeclared output field '{field}'")]
    UndeclaredOutputField { step: String, field: String },

    #[error("Workflow incomplete: steps never completed {never_completed:?} (waiting on prerequisites: {waiting:?})")]
    IncompleteWorkflow {
        never_completed: Vec<String>,
        waiting: Vec<String>,
    },

    #[error("Workflow cancelled")]
    Cancelled,

    #[error("Step '{0}' panicked")]
    StepPanicked(String),

    #[error("Final state does not match the expected output: {0}")]
    Output(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Name of the step this error is attributed to, if any
    pub fn step(&self) -> Option<&str> {
        match self {
            WorkflowError::StepFailed { step, .. }
            | WorkflowError::UndeclaredOutputField { step, .. } => Some(step),
            WorkflowError::StepPanicked(step) => Some(step),
            _ => None,
        }
    }
}
