// SPDX-License-Identifier: MIT

use super::{product_prompt, ResearchStep, Researcher, GET_COMPONENT};
use crate::adk::model::Model;
use crate::adk::tool::Tool;
use crate::lca::types::fields;
use crate::lca::workflow::{StateSnapshot, StateUpdate, StepDescriptor, StepError};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const INSTRUCTION: &str = "You are an expert assistant specialized in analyzing product compositions and materials.
When provided with a product name and optional supplier, your task is to:
1. Search for detailed information about:
   - Material composition and percentages
   - Chemical constituents
   - Key components and their specifications
   - Manufacturing materials
2. Focus on technical specifications, material safety data sheets, product documentation and industry standards
3. Verify information across multiple reliable sources
4. Prioritize supplier-specific information when available

Provide detailed, accurate composition information with proper source attribution.";

const EXTRACTION: &str =
    "Summarize the gathered component information into a clear, structured format.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ComponentAnswer {
    /// Detailed component information
    pub component_information: String,
}

pub struct ProductComponent;

impl Researcher for ProductComponent {
    type Output = ComponentAnswer;

    fn name(&self) -> &'static str {
        GET_COMPONENT
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
        output: ComponentAnswer,
        _snapshot: &StateSnapshot,
    ) -> Result<StateUpdate, StepError> {
        let component = json!(output.component_information);
        Ok(StateUpdate::new().with(fields::PRODUCT_COMPONENT, component))
    }
}

pub fn descriptor(model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> StepDescriptor {
    ResearchStep::new(ProductComponent, model, tools)
        .into_descriptor()
        .reads(&[fields::PRODUCT_NAME, fields::SUPPLIER])
        .writes(&[fields::PRODUCT_COMPONENT, fields::REFERENCE_SOURCES])
}
