// SPDX-License-Identifier: MIT

//! Run surface for callers: seed payload in, merged result out

use crate::adk::agent::LoopPolicy;
use crate::adk::error::AdkError;
use crate::adk::model::openai::OpenAIModel;
use crate::adk::model::Model;
use crate::adk::tool::Tool;
use crate::lca::config::AnalysisConfig;
use crate::lca::pipeline::{processes_list_graph, product_analysis_graph};
use crate::lca::tools::TavilySearchTool;
use crate::lca::types::{fields, ProcessesListRequest, ProcessesListResponse, ProductAnalysis};
use crate::lca::workflow::{
    CompiledGraph, Engine, StateUpdate, ValidationError, WorkflowError, WorkflowRun,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Provider(#[from] AdkError),

    #[error(transparent)]
    Graph(#[from] ValidationError),
}

/// Compiled analysis graphs plus the engine that runs them
pub struct AnalysisService {
    engine: Engine,
    product_analysis: CompiledGraph,
    processes_list: CompiledGraph,
}

impl AnalysisService {
    pub fn new(
        model: Arc<dyn Model>,
        tools: Vec<Arc<dyn Tool>>,
        policy: LoopPolicy,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            engine: Engine::new(policy),
            product_analysis: product_analysis_graph(model.clone(), tools.clone())?,
            processes_list: processes_list_graph(model, tools)?,
        })
    }

    /// OpenAI-compatible model plus Tavily search, as configured
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, SetupError> {
        let model: Arc<dyn Model> = Arc::new(OpenAIModel::new(
            config.model.name.clone(),
            config.model.base_url.clone(),
        )?);
        let search: Arc<dyn Tool> = Arc::new(TavilySearchTool::new(config.search.max_results)?);
        log::info!(
            "Using model '{}' with {} search results per lookup",
            config.model.name,
            config.search.max_results
        );
        Ok(Self::new(model, vec![search], config.tool_loop.policy())?)
    }

    /// Run the combined analysis and return the full run record
    pub async fn run_product_analysis(
        &self,
        product: &str,
        supplier: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowRun, WorkflowError> {
        let mut seed = StateUpdate::new().with(fields::PRODUCT_NAME, json!(product));
        if let Some(supplier) = supplier {
            seed = seed.with(fields::SUPPLIER, json!(supplier));
        }
        self.engine.run(&self.product_analysis, seed, cancel).await
    }

    pub async fn analyze_product(
        &self,
        product: &str,
        supplier: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ProductAnalysis, WorkflowError> {
        self.run_product_analysis(product, supplier, cancel)
            .await?
            .output()
    }

    pub async fn build_processes_list(
        &self,
        request: &ProcessesListRequest,
        cancel: &CancellationToken,
    ) -> Result<ProcessesListResponse, WorkflowError> {
        let mut seed = StateUpdate::new().with(fields::PRODUCT_NAME, json!(request.product_name));
        let optional = [
            (fields::SUPPLIER, &request.supplier),
            (fields::PRODUCT_COMPONENT, &request.product_component),
            (fields::TECHNOLOGY_INFORMATION, &request.technology_information),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                seed = seed.with(field, json!(value));
            }
        }

        self.engine
            .run(&self.processes_list, seed, cancel)
            .await?
            .output()
    }
}
