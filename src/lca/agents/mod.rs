// SPDX-License-Identifier: MIT

//! Research steps
//!
//! Every information-gathering step is a [`Researcher`] plugged into
//! [`ResearchStep`], which drives the shared tool-call loop and attaches the
//! collected reference sources to the step's output.

pub mod basic_information;
pub mod component;
pub mod emissions;
pub mod finalize;
pub mod processes;
pub mod supplier;
pub mod technology;

use crate::adk::agent::ToolCallLoop;
use crate::adk::model::Model;
use crate::adk::tool::Tool;
use crate::lca::types::fields;
use crate::lca::workflow::{
    StateSnapshot, StateUpdate, Step, StepContext, StepDescriptor, StepError,
};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub const GET_BASIC_INFO: &str = "getBasicInfo";
pub const GET_COMPONENT: &str = "getComponent";
pub const GET_SUPPLIER: &str = "getSupplier";
pub const GET_TECHNOLOGY: &str = "getTechnology";
pub const GET_PROCESSES: &str = "getProcesses";
pub const GET_EMISSIONS: &str = "getEmissions";
pub const FINALIZE_RESULTS: &str = "finalizeResults";

/// Domain half of a research step: prompts in, structured answer out
pub trait Researcher: Send + Sync + 'static {
    /// Shape the extraction call must produce
    type Output: DeserializeOwned + JsonSchema + Send;

    fn name(&self) -> &'static str;

    /// System prompt for the reasoning calls
    fn instruction(&self) -> &'static str;

    /// System prompt for the final extraction call
    fn extraction_instruction(&self) -> &'static str;

    /// User prompt for this invocation, or `None` when there is nothing to research
    fn prompt(&self, snapshot: &StateSnapshot) -> Result<Option<String>, StepError>;

    /// Turn the extracted answer into the step's state update
    fn into_update(
        &self,
        output: Self::Output,
        snapshot: &StateSnapshot,
    ) -> Result<StateUpdate, StepError>;
}

/// Runs a [`Researcher`] through the tool-call loop
pub struct ResearchStep<R> {
    researcher: R,
    model: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
}

impl<R: Researcher> ResearchStep<R> {
    pub fn new(researcher: R, model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            researcher,
            model,
            tools,
        }
    }

    /// Descriptor with the step's name; callers add inputs and outputs
    pub fn into_descriptor(self) -> StepDescriptor {
        let name = self.researcher.name();
        StepDescriptor::new(name, Arc::new(self))
    }
}

#[async_trait]
impl<R: Researcher> Step for ResearchStep<R> {
    async fn invoke(&self, ctx: StepContext) -> Result<StateUpdate, StepError> {
        let Some(prompt) = self.researcher.prompt(&ctx.snapshot)? else {
            log::info!("{}: nothing to research", self.researcher.name());
            return Ok(StateUpdate::new());
        };

        let tool_loop = ToolCallLoop::new(
            self.researcher.name().to_string(),
            self.researcher.instruction().to_string(),
            self.researcher.extraction_instruction().to_string(),
            self.model.clone(),
            self.tools.clone(),
            ctx.policy,
        );

        let outcome = tool_loop.run::<R::Output>(&prompt, &ctx.cancel).await?;
        let bound = if outcome.forced {
            " (turn bound reached)"
        } else {
            ""
        };
        log::info!(
            "{} finished after {} turns with {} references{}",
            self.researcher.name(),
            outcome.turns,
            outcome.references.len(),
            bound
        );

        let update = self.researcher.into_update(outcome.output, &ctx.snapshot)?;
        Ok(update.with_serialized(fields::REFERENCE_SOURCES, &outcome.references)?)
    }
}

/// `Analyze the product "X" from supplier "Y"`
pub(crate) fn product_prompt(snapshot: &StateSnapshot) -> Result<String, StepError> {
    let product: String = snapshot.require(fields::PRODUCT_NAME)?;
    let supplier: Option<String> = snapshot.optional(fields::SUPPLIER)?;
    Ok(match supplier {
        Some(supplier) => format!(
            "Analyze the product \"{}\" from supplier \"{}\"",
            product, supplier
        ),
        None => format!("Analyze the product \"{}\"", product),
    })
}
