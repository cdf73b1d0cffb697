// SPDX-License-Identifier: MIT

//! Workflow orchestration core
//!
//! - `graph` - steps plus static and routed edges, validated by `compile`
//! - `gate` - fan-in readiness
//! - `engine` - concurrent execution with a single merging loop
//! - `state` - per-field reducers

pub mod engine;
pub mod error;
pub mod gate;
pub mod graph;
pub mod state;
pub mod step;

pub use engine::{Completion, Engine, WorkflowRun};
pub use error::{StepError, ValidationError, WorkflowError};
pub use gate::DependencyGate;
pub use graph::{CompiledGraph, EdgeSpec, GraphBuilder, RouteOutcome, Target};
pub use state::{ReducerType, StateSchema, StateSnapshot, StateUpdate, WorkflowState};
pub use step::{step_fn, Step, StepContext, StepDescriptor};
