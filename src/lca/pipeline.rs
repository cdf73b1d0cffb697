// SPDX-License-Identifier: MIT

//! Workflow graphs for product analysis
//!
//! ```text
//! getComponent ──┬─> getProcesses ─?─> getEmissions ⟲
//! getTechnology ─┘          │                 │
//!                           └──?──> finalizeResults <──?──┘
//!                                   (after getBasicInfo, getSupplier, getProcesses)
//! ```
//!
//! `─>` is a static edge and `─?─>` a route chosen by [`emissions::route`].

use crate::adk::model::Model;
use crate::adk::tool::Tool;
use crate::lca::agents::emissions::{self, EmissionRoute};
use crate::lca::agents::{
    basic_information, component, finalize, processes, supplier, technology, FINALIZE_RESULTS,
    GET_BASIC_INFO, GET_COMPONENT, GET_EMISSIONS, GET_PROCESSES, GET_SUPPLIER, GET_TECHNOLOGY,
};
use crate::lca::types::fields;
use crate::lca::workflow::{
    CompiledGraph, EdgeSpec, GraphBuilder, ReducerType, StateSchema, Target, ValidationError,
};
use std::sync::Arc;

/// References are unioned by URL; emission sources accumulate per process
pub fn analysis_schema() -> StateSchema {
    StateSchema::new()
        .field(
            fields::REFERENCE_SOURCES,
            ReducerType::UnionByKey("url".to_string()),
        )
        .field(fields::EMISSION_SOURCES, ReducerType::Append)
}

/// The combined product analysis graph
///
/// `finalizeResults` is only reached through a router: directly from
/// `getProcesses` when there is nothing to analyse, otherwise from
/// `getEmissions` once the processes list is exhausted.
pub fn product_analysis_graph(
    model: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
) -> Result<CompiledGraph, ValidationError> {
    let emission_routes = [
        (EmissionRoute::Next, Target::step(GET_EMISSIONS)),
        (EmissionRoute::Exhausted, Target::step(FINALIZE_RESULTS)),
    ];

    GraphBuilder::new("combined_product_analysis")
        .schema(analysis_schema())
        .step(basic_information::descriptor(model.clone(), tools.clone()))
        .step(component::descriptor(model.clone(), tools.clone()))
        .step(supplier::descriptor(model.clone(), tools.clone()))
        .step(technology::descriptor(model.clone(), tools.clone()))
        .step(
            processes::descriptor(model.clone(), tools.clone())
                .after(&[GET_COMPONENT, GET_TECHNOLOGY]),
        )
        .step(emissions::descriptor(model, tools).after(&[GET_PROCESSES]))
        .step(finalize::descriptor().after(&[GET_BASIC_INFO, GET_SUPPLIER, GET_PROCESSES]))
        .entry(GET_BASIC_INFO)
        .entry(GET_COMPONENT)
        .entry(GET_SUPPLIER)
        .entry(GET_TECHNOLOGY)
        .edge(GET_BASIC_INFO, Target::End)
        .edge(GET_SUPPLIER, Target::End)
        .edge(GET_COMPONENT, Target::step(GET_PROCESSES))
        .edge(GET_TECHNOLOGY, Target::step(GET_PROCESSES))
        .edge_spec(EdgeSpec::conditional(GET_PROCESSES, emissions::route, &emission_routes))
        .edge_spec(EdgeSpec::conditional(GET_EMISSIONS, emissions::route, &emission_routes))
        .edge(FINALIZE_RESULTS, Target::End)
        .compile()
}

/// A single processes-list step, seeded with optional component and technology context
pub fn processes_list_graph(
    model: Arc<dyn Model>,
    tools: Vec<Arc<dyn Tool>>,
) -> Result<CompiledGraph, ValidationError> {
    GraphBuilder::new("build_processes_list")
        .schema(analysis_schema())
        .step(processes::descriptor(model, tools))
        .entry(GET_PROCESSES)
        .edge(GET_PROCESSES, Target::End)
        .compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lca::agents::testing::AnswerModel;
    use serde_json::json;

    #[test]
    fn test_product_analysis_graph_compiles() {
        let graph = product_analysis_graph(AnswerModel::new(json!({})), vec![]).unwrap();
        assert_eq!(graph.entries().len(), 4);
        assert_eq!(graph.steps().count(), 7);
        assert_eq!(
            graph.step(FINALIZE_RESULTS).map(|s| s.after.clone()),
            Some(vec![
                GET_BASIC_INFO.to_string(),
                GET_SUPPLIER.to_string(),
                GET_PROCESSES.to_string()
            ])
        );
        assert_eq!(graph.outgoing(GET_PROCESSES).len(), 1);
        assert_eq!(graph.outgoing(GET_EMISSIONS).len(), 1);
        assert!(graph.is_router_gated(GET_EMISSIONS));
        assert!(graph.is_router_gated(FINALIZE_RESULTS));
        assert!(!graph.is_router_gated(GET_PROCESSES));
    }

    #[test]
    fn test_processes_list_graph_compiles() {
        let graph = processes_list_graph(AnswerModel::new(json!({})), vec![]).unwrap();
        assert_eq!(graph.entries(), &[GET_PROCESSES.to_string()]);
    }

    #[test]
    fn test_schema_reducers() {
        let schema = analysis_schema();
        assert_eq!(
            schema.reducer(fields::REFERENCE_SOURCES),
            ReducerType::UnionByKey("url".into())
        );
        assert_eq!(
            schema.reducer(fields::EMISSION_SOURCES),
            ReducerType::Append
        );
        assert_eq!(
            schema.reducer(fields::PROCESSES_LIST),
            ReducerType::Overwrite
        );
    }
}
