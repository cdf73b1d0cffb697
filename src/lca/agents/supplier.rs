// SPDX-License-Identifier: MIT

use super::{product_prompt, ResearchStep, Researcher, GET_SUPPLIER};
use crate::adk::model::Model;
use crate::adk::tool::Tool;
use crate::lca::types::fields;
use crate::lca::workflow::{StateSnapshot, StateUpdate, StepDescriptor, StepError};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

const INSTRUCTION: &str = "You are an expert assistant specialized in identifying and analyzing suppliers in manufacturing industries.
When provided with a product name and optional supplier, your task is to:
1. Search for and identify:
   - Major manufacturers and suppliers of the product
   - Key market players in the industry
   - Regional and global suppliers
   - Specialized or niche suppliers if applicable
2. Focus on company profiles, manufacturing locations, quality certifications and market presence
3. Prioritize industry directories, company reports, trade associations and market analyses
4. Verify supplier credibility through certifications and market presence

Provide comprehensive, accurate supplier information with proper source attribution.";

const EXTRACTION: &str = "Summarize the gathered supplier information into a clear, structured list.
Each supplier entry should include the company name, a brief description of capabilities,
key products or services, and notable certifications or qualifications.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SupplierAnswer {
    /// Relevant suppliers, one description per entry
    pub supplier_list: Vec<String>,
}

pub struct RelatedSupplier;

impl Researcher for RelatedSupplier {
    type Output = SupplierAnswer;

    fn name(&self) -> &'static str {
        GET_SUPPLIER
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
        output: SupplierAnswer,
        _snapshot: &StateSnapshot,
    ) -> Result<StateUpdate, StepError> {
        Ok(StateUpdate::new()
            .with_serialized(fields::RELATED_SUPPLIER_LIST, &output.supplier_list)?)
    }
}

pub fn descriptor(model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> StepDescriptor {
    ResearchStep::new(RelatedSupplier, model, tools)
        .into_descriptor()
        .reads(&[fields::PRODUCT_NAME, fields::SUPPLIER])
        .writes(&[fields::RELATED_SUPPLIER_LIST, fields::REFERENCE_SOURCES])
}
