// SPDX-License-Identifier: MIT

//! Steps: the units of work scheduled by the engine

use crate::adk::agent::LoopPolicy;
use crate::lca::workflow::error::StepError;
use crate::lca::workflow::state::{StateSnapshot, StateUpdate};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a step invocation gets to see
#[derive(Debug, Clone)]
pub struct StepContext {
    /// The step's declared input fields, as merged so far
    pub snapshot: StateSnapshot,
    /// Bounds for any tool-call loop the step runs
    pub policy: LoopPolicy,
    /// Run-scoped cancellation; checked between loop turns
    pub cancel: CancellationToken,
    /// 1 for the first invocation of this step in the run, 2 for the next, ...
    pub iteration: u32,
}

/// A named unit of work producing a partial state update
#[async_trait]
pub trait Step: Send + Sync {
    async fn invoke(&self, ctx: StepContext) -> Result<StateUpdate, StepError>;
}

/// Adapter turning an async closure into a [`Step`]
pub struct FnStep<F>(F);

#[async_trait]
impl<F, Fut> Step for FnStep<F>
where
    F: Fn(StepContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<StateUpdate, StepError>> + Send,
{
    async fn invoke(&self, ctx: StepContext) -> Result<StateUpdate, StepError> {
        (self.0)(ctx).await
    }
}

pub fn step_fn<F, Fut>(f: F) -> Arc<dyn Step>
where
    F: Fn(StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateUpdate, StepError>> + Send + 'static,
{
    Arc::new(FnStep(f))
}

/// Immutable declaration of a step inside a graph
#[derive(Clone)]
pub struct StepDescriptor {
    pub name: String,
    pub work: Arc<dyn Step>,
    /// Fields copied into the step's snapshot
    pub inputs: Vec<String>,
    /// Fields the step is allowed to write
    pub outputs: Vec<String>,
    /// Steps that must have completed (and settled) before this one starts
    pub after: Vec<String>,
    /// A failed or skipped optional step does not fail the run
    pub optional: bool,
    /// Overrides the engine's default loop policy
    pub policy: Option<LoopPolicy>,
}

impl StepDescriptor {
    pub fn new(name: &str, work: Arc<dyn Step>) -> Self {
        Self {
            name: name.to_string(),
            work,
            inputs: Vec::new(),
            outputs: Vec::new(),
            after: Vec::new(),
            optional: false,
            policy: None,
        }
    }

    pub fn reads(mut self, fields: &[&str]) -> Self {
        self.inputs.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn writes(mut self, fields: &[&str]) -> Self {
        self.outputs.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn after(mut self, steps: &[&str]) -> Self {
        self.after.extend(steps.iter().map(|s| s.to_string()));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_policy(mut self, policy: LoopPolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

impl fmt::Debug for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("after", &self.after)
            .field("optional", &self.optional)
            .field("policy", &self.policy)
            .finish()
    }
}
