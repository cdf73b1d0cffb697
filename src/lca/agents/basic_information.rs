// SPDX-License-Identifier: MIT

use super::{ResearchStep, Researcher, GET_BASIC_INFO};
use crate::adk::model::Model;
use crate::adk::tool::Tool;
use crate::lca::types::fields;
use crate::lca::workflow::{StateSnapshot, StateUpdate, StepDescriptor, StepError};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const INSTRUCTION: &str = "You are an expert assistant specialized in gathering comprehensive product information.
When provided with a product name, your task is to:
1. Search for authoritative sources about the product
2. Focus on gathering:
   - Product classification and category
   - Key characteristics and properties
   - Common applications and uses
   - Industry standards and certifications
3. Ensure information accuracy by cross-referencing multiple sources
4. Prioritize technical and official documentation

Provide clear, factual information with proper source attribution.";

const EXTRACTION: &str =
    "Summarize the gathered product information into a clear, structured format.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct BasicInformationAnswer {
    /// Comprehensive product information
    pub product_information: String,
}

pub struct ProductBasicInformation;

impl Researcher for ProductBasicInformation {
    type Output = BasicInformationAnswer;

    fn name(&self) -> &'static str {
        GET_BASIC_INFO
    }

    fn instruction(&self) -> &'static str {
        INSTRUCTION
    }

    fn extraction_instruction(&self) -> &'static str {
        EXTRACTION
    }

    fn prompt(&self, snapshot: &StateSnapshot) -> Result<Option<String>, StepError> {
        let product: String = snapshot.require(fields::PRODUCT_NAME)?;
        let supplier: Option<String> = snapshot.optional(fields::SUPPLIER)?;
        Ok(Some(format!(
            "Product Name: {}\nSupplier Name: {}",
            product,
            supplier.unwrap_or_default()
        )))
    }

    fn into_update(
        &self,
        output: BasicInformationAnswer,
        _snapshot: &StateSnapshot,
    ) -> Result<StateUpdate, StepError> {
        Ok(StateUpdate::new().with(
            fields::PRODUCT_BASIC_INFORMATION,
            json!(output.product_information),
        ))
    }
}

pub fn descriptor(model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> StepDescriptor {
    ResearchStep::new(ProductBasicInformation, model, tools)
        .into_descriptor()
        .reads(&[fields::PRODUCT_NAME, fields::SUPPLIER])
        .writes(&[fields::PRODUCT_BASIC_INFORMATION, fields::REFERENCE_SOURCES])
}
