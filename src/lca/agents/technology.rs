// SPDX-License-Identifier: MIT

use super::{product_prompt, ResearchStep, Researcher, GET_TECHNOLOGY};
use crate::adk::model::Model;
use crate::adk::tool::Tool;
use crate::lca::types::fields;
use crate::lca::workflow::{StateSnapshot, StateUpdate, StepDescriptor, StepError};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const INSTRUCTION: &str = "You are an expert assistant specialized in analyzing manufacturing technologies and processes.
When provided with a product name and optional supplier, your task is to:
1. Research the key technological aspects:
   - Manufacturing technologies and methods
   - Production equipment and machinery
   - Process control systems
   - Quality assurance technologies
   - Automation level and smart manufacturing features
2. Gather technical specifications, process efficiency data and environmental control technologies
3. Prioritize technical documentation, industry standards, research publications, patents
   and equipment manufacturer specifications
4. Pay special attention to best available technologies, energy efficiency and environmental performance

Provide detailed, technically accurate information with proper source attribution.
Focus on current and emerging technologies relevant to the product's manufacturing.";

const EXTRACTION: &str = "Summarize the gathered technology information into a clear, structured format.
Cover manufacturing technologies and methods, key equipment, process control and automation,
quality assurance, environmental control technologies and energy efficiency features.
Organize the information from basic technologies to advanced features.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TechnologyAnswer {
    /// Comprehensive technology information
    pub technology_information: String,
}

pub struct TechnologyInformation;

impl Researcher for TechnologyInformation {
    type Output = TechnologyAnswer;

    fn name(&self) -> &'static str {
        GET_TECHNOLOGY
    }

    fn instruction(&self) -> &'static str {
        INSTRUCTION
    }

    fn extraction_instruction(&self) -> &'static str {
        EXTRACTION
    }

    fn prompt(&self, snapshot: &StateSnapshot) -> Result<Option<String>, StepError> {
        product_prompt(snapshot).map(Some)
    }

    fn into_update(
        &self,
        output: TechnologyAnswer,
        _snapshot: &StateSnapshot,
    ) -> Result<StateUpdate, StepError> {
        Ok(StateUpdate::new().with(
            fields::TECHNOLOGY_INFORMATION,
            json!(output.technology_information),
        ))
    }
}

pub fn descriptor(model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> StepDescriptor {
    ResearchStep::new(TechnologyInformation, model, tools)
        .into_descriptor()
        .reads(&[fields::PRODUCT_NAME, fields::SUPPLIER])
        .writes(&[fields::TECHNOLOGY_INFORMATION, fields::REFERENCE_SOURCES])
}
