// SPDX-License-Identifier: MIT

//! Emission source research, one unit process per invocation
//!
//! The step walks `processesList` with the `emissionCursor` field; its router
//! sends control back to the step until every process has been analysed.

use super::{ResearchStep, Researcher, GET_EMISSIONS};
use crate::adk::model::Model;
use crate::adk::tool::Tool;
use crate::lca::types::{fields, EmissionSource, UnitProcess};
use crate::lca::workflow::{
    RouteOutcome, StateSnapshot, StateUpdate, StepDescriptor, StepError, WorkflowState,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const INSTRUCTION: &str = "You are an expert assistant specialized in identifying and analyzing emission sources in industrial processes.
When provided with a manufacturing process and product information, your task is to:
1. Analyze the process for potential emission sources: direct process emissions, energy-related emissions,
   auxiliary process emissions, fugitive emissions and waste treatment emissions
2. For each emission source, identify its characteristics, emission mechanisms, operating conditions and control technologies
3. Gather information from environmental permits, BAT reference documents, emission factor databases,
   industry environmental guidelines and scientific literature
4. Consider emissions to air, water and soil as well as waste generation
5. Pay special attention to greenhouse gases, regulated pollutants and hazardous substances

Provide comprehensive emission source information with proper technical details and references.";

const EXTRACTION: &str = "Summarize the identified emission sources into a structured format.
For each emission source include a clear name, a detailed technical description covering emission
characteristics and relevant control measures, and the references that support it.
Ensure all major emission pathways are covered.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EmissionsAnswer {
    /// Emission sources of the analysed process
    pub emission_sources: Vec<EmissionSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmissionRoute {
    /// More processes to analyse
    Next,
    Exhausted,
}

impl RouteOutcome for EmissionRoute {
    fn all() -> &'static [Self] {
        &[EmissionRoute::Next, EmissionRoute::Exhausted]
    }
}

fn cursor_of(value: Option<&Value>) -> usize {
    value.and_then(Value::as_u64).unwrap_or(0) as usize
}

/// Loop back while `emissionCursor` is short of the processes list
pub fn route(state: &WorkflowState) -> Vec<EmissionRoute> {
    let cursor = cursor_of(state.get(fields::EMISSION_CURSOR));
    if cursor < state.len_of(fields::PROCESSES_LIST) {
        vec![EmissionRoute::Next]
    } else {
        vec![EmissionRoute::Exhausted]
    }
}

pub struct EmissionSources;

impl EmissionSources {
    fn target(&self, snapshot: &StateSnapshot) -> Result<Option<(usize, UnitProcess)>, StepError> {
        let processes: Vec<UnitProcess> = snapshot
            .optional(fields::PROCESSES_LIST)?
            .unwrap_or_default();
        let cursor = cursor_of(snapshot.get(fields::EMISSION_CURSOR));
        Ok(processes.into_iter().nth(cursor).map(|p| (cursor, p)))
    }
}

impl Researcher for EmissionSources {
    type Output = EmissionsAnswer;

    fn name(&self) -> &'static str {
        GET_EMISSIONS
    }

    fn instruction(&self) -> &'static str {
        INSTRUCTION
    }

    fn extraction_instruction(&self) -> &'static str {
        EXTRACTION
    }

    fn prompt(&self, snapshot: &StateSnapshot) -> Result<Option<String>, StepError> {
        let Some((_, process)) = self.target(snapshot)? else {
            return Ok(None);
        };
        let product: String = snapshot.require(fields::PRODUCT_NAME)?;

        let mut prompt = format!("Product: {}", product);
        if let Some(supplier) = snapshot.optional::<String>(fields::SUPPLIER)? {
            prompt.push_str(&format!("\nSupplier: {}", supplier));
        }
        if let Some(component) = snapshot.optional::<String>(fields::PRODUCT_COMPONENT)? {
            prompt.push_str(&format!("\nProduct Component Information: {}", component));
        }
        if let Some(technology) = snapshot.optional::<String>(fields::TECHNOLOGY_INFORMATION)? {
            prompt.push_str(&format!("\nTechnology Information: {}", technology));
        }
        prompt.push_str(&format!("\nTarget Unit Process: {}", process.process_name));
        if let Some(description) = &process.process_description {
            prompt.push_str(&format!("\nProcess Description: {}", description));
        }
        prompt.push_str("\nIdentify the emission sources of the target unit process.");

        Ok(Some(prompt))
    }

    fn into_update(
        &self,
        output: EmissionsAnswer,
        snapshot: &StateSnapshot,
    ) -> Result<StateUpdate, StepError> {
        let (cursor, process) = self
            .target(snapshot)?
            .ok_or_else(|| StepError::Other("emission cursor is past the processes list".into()))?;

        let sources: Vec<EmissionSource> = output
            .emission_sources
            .into_iter()
            .map(|source| EmissionSource {
                process_name: Some(process.process_name.clone()),
                ..source
            })
            .collect();

        log::info!(
            "{} found {} sources for process {} '{}'",
            GET_EMISSIONS,
            sources.len(),
            cursor + 1,
            process.process_name
        );

        Ok(StateUpdate::new()
            .with_serialized(fields::EMISSION_SOURCES, &sources)?
            .with(fields::EMISSION_CURSOR, json!(cursor + 1)))
    }
}

pub fn descriptor(model: Arc<dyn Model>, tools: Vec<Arc<dyn Tool>>) -> StepDescriptor {
    ResearchStep::new(EmissionSources, model, tools)
        .into_descriptor()
        .reads(&[
            fields::PRODUCT_NAME,
            fields::SUPPLIER,
            fields::PRODUCT_COMPONENT,
            fields::TECHNOLOGY_INFORMATION,
            fields::PROCESSES_LIST,
            fields::EMISSION_CURSOR,
        ])
        .writes(&[
            fields::EMISSION_SOURCES,
            fields::EMISSION_CURSOR,
            fields::REFERENCE_SOURCES,
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lca::agents::testing::snapshot;

    fn inputs() -> Vec<&'static str> {
        vec![
            fields::PRODUCT_NAME,
            fields::PROCESSES_LIST,
            fields::EMISSION_CURSOR,
        ]
    }

    fn processes() -> Value {
        json!([
            {"processName": "Wafer texturing", "processDescription": "Alkaline etch"},
            {"processName": "Lamination"}
        ])
    }

    #[test]
    fn test_prompt_targets_process_at_cursor() {
        let snapshot = snapshot(
            StateUpdate::new()
                .with(fields::PRODUCT_NAME, json!("Solar Panel"))
                .with(fields::PROCESSES_LIST, processes())
                .with(fields::EMISSION_CURSOR, json!(1)),
            &inputs(),
        );
        let prompt = EmissionSources.prompt(&snapshot).unwrap().unwrap();
        assert!(prompt.starts_with("Product: Solar Panel"));
        assert!(prompt.contains("Target Unit Process: Lamination"));
        assert!(!prompt.contains("Wafer texturing"));
    }

    #[test]
    fn test_nothing_to_research_without_processes() {
        let snapshot = snapshot(
            StateUpdate::new().with(fields::PRODUCT_NAME, json!("Solar Panel")),
            &inputs(),
        );
        assert_eq!(EmissionSources.prompt(&snapshot).unwrap(), None);
    }

    #[test]
    fn test_update_tags_sources_and_advances_cursor() {
        let snapshot = snapshot(
            StateUpdate::new()
                .with(fields::PRODUCT_NAME, json!("Solar Panel"))
                .with(fields::PROCESSES_LIST, processes()),
            &inputs(),
        );
        let answer: EmissionsAnswer = serde_json::from_value(json!({
            "emission_sources": [
                {"name": "KOH etching effluent", "description": "Alkaline wastewater"},
                {"name": "Process electricity"}
            ]
        }))
        .unwrap();

        let update = EmissionSources.into_update(answer, &snapshot).unwrap();
        assert_eq!(update.get(fields::EMISSION_CURSOR), Some(&json!(1)));
        assert_eq!(
            update.get(fields::EMISSION_SOURCES),
            Some(&json!([
                {"name": "KOH etching effluent", "description": "Alkaline wastewater", "processName": "Wafer texturing"},
                {"name": "Process electricity", "processName": "Wafer texturing"}
            ]))
        );
    }

    #[test]
    fn test_route_follows_cursor() {
        let mut state = WorkflowState::empty();
        assert_eq!(route(&state), vec![EmissionRoute::Exhausted]);

        state.update(fields::PROCESSES_LIST, processes());
        assert_eq!(route(&state), vec![EmissionRoute::Next]);

        state.update(fields::EMISSION_CURSOR, json!(1));
        assert_eq!(route(&state), vec![EmissionRoute::Next]);

        state.update(fields::EMISSION_CURSOR, json!(2));
        assert_eq!(route(&state), vec![EmissionRoute::Exhausted]);
    }
}
