// SPDX-License-Identifier: MIT

use super::FINALIZE_RESULTS;
use crate::adk::reference::ReferenceSource;
use crate::lca::types::{fields, AnalysisSummary, EmissionSource, UnitProcess};
use crate::lca::workflow::{StateUpdate, Step, StepContext, StepDescriptor, StepError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Summarises the merged analysis; makes no external calls
pub struct FinalizeResults;

#[async_trait]
impl Step for FinalizeResults {
    async fn invoke(&self, ctx: StepContext) -> Result<StateUpdate, StepError> {
        let processes: Vec<UnitProcess> = ctx
            .snapshot
            .optional(fields::PROCESSES_LIST)?
            .unwrap_or_default();
        let sources: Vec<EmissionSource> = ctx
            .snapshot
            .optional(fields::EMISSION_SOURCES)?
            .unwrap_or_default();
        let references: Vec<ReferenceSource> = ctx
            .snapshot
            .optional(fields::REFERENCE_SOURCES)?
            .unwrap_or_default();

        let covered: HashSet<&str> = sources
            .iter()
            .filter_map(|s| s.process_name.as_deref())
            .collect();

        let summary = AnalysisSummary {
            process_count: processes.len(),
            emission_source_count: sources.len(),
            reference_count: references.len(),
            processes_without_emissions: processes
                .iter()
                .filter(|p| !covered.contains(p.process_name.as_str()))
                .map(|p| p.process_name.clone())
                .collect(),
        };

        log::info!(
            "Analysis complete: {} processes, {} emission sources, {} references",
            summary.process_count,
            summary.emission_source_count,
            summary.reference_count
        );

        Ok(StateUpdate::new().with_serialized(fields::SUMMARY, &summary)?)
    }
}

pub fn descriptor() -> StepDescriptor {
    StepDescriptor::new(FINALIZE_RESULTS, Arc::new(FinalizeResults))
        .reads(&[
            fields::PROCESSES_LIST,
            fields::EMISSION_SOURCES,
            fields::REFERENCE_SOURCES,
        ])
        .writes(&[fields::SUMMARY])
}
