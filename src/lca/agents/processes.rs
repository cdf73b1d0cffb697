// SPDX-License-Identifier: MIT

use super::{ResearchStep, Researcher, GET_PROCESSES};
use crate::adk::model::Model;
use crate::adk::tool::Tool;
use crate::lca::types::{fields, UnitProcess};
use crate::lca::workflow::{StateSnapshot, StateUpdate, StepDescriptor, StepError};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

const INSTRUCTION: &str = "You are an expert assistant specialized in analyzing and extracting detailed production processes for manufactured products.
When provided with a product name and supplier, your task is to:
1. First search the supplier's official website, focusing on technical documentation, product specifications and manufacturing details
2. If supplier information is insufficient, expand the search to industry databases, academic papers, patents,
   manufacturing standards and trade publications
3. For each search iteration:
   - Prioritize authoritative and technical sources
   - Focus on step-by-step manufacturing procedures
   - Include key production parameters when available
   - Verify information across multiple sources
4. Compile the findings into a clear, chronological production workflow
5. Include direct source links for each major process step

If initial searches don't yield sufficient detail, refine the queries using industry-specific and technical manufacturing terms.";

const EXTRACTION: &str = "Summarize the extracted production process into a structured, chronological list of unit processes.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProcessesAnswer {
    /// Production process list in chronological order
    pub processes_list: Vec<UnitProcess>,
}

pub struct ProcessesList;

impl Researcher for ProcessesList {
    type Output = ProcessesAnswer;

    fn name(&self) -> &'static str {
        GET_PROCESSES
    }

    fn instruction(&self) -> &'static str {
        INSTRUCTION
    }

    fn extraction_instruction(&self) -> &'static str {
        EXTRACTION
    }

    fn prompt(&self, snapshot: &StateSnapshot) -> Result<Option<String>, StepError> {
        let product: String = snapshot.require(fields::PRODUCT_NAME)?;
        let mut prompt = format!(
            "Please analyze and extract the detailed production processes for {}",
            product
        );

        if let Some(supplier) = snapshot.optional::<String>(fields::SUPPLIER)? {
            prompt.push_str(&format!(" manufactured by {}", supplier));
        }
        if let Some(component) = snapshot.optional::<String>(fields::PRODUCT_COMPONENT)? {
            prompt.push_str(&format!("\nProduct Component Information: {}", component));
        }
        if let Some(technology) = snapshot.optional::<String>(fields::TECHNOLOGY_INFORMATION)? {
            prompt.push_str(&format!("\nTechnology Information: {}", technology));
        }

        Ok(Some(prompt))
    }

    fn into_update(
        &self,
        output: ProcessesAnswer,
        _snapshot: &StateSnapshot,
    ) -> Result<StateUpdate, StepError> {
        log::info!(
            "{} identified {} processes",
            GET_PROCESSES,
            output.processes_list.len()
        );
        Ok(StateUpdate::new().with_serialized(fields::PROCESSES_LIST, &output.processes_list)?)
    }
}

pub fn descriptor(model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> StepDescriptor {
    ResearchStep::new(ProcessesList, model, tools)
        .into_descriptor()
        .reads(&[
            fields::PRODUCT_NAME,
            fields::SUPPLIER,
            fields::PRODUCT_COMPONENT,
            fields::TECHNOLOGY_INFORMATION,
        ])
        .writes(&[fields::PROCESSES_LIST, fields::REFERENCE_SOURCES])
}
