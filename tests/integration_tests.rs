//! Integration tests for the product analysis workflows
//!
//! These tests drive the compiled graphs end-to-end using a scripted model
//! and an in-memory lookup tool.

use async_trait::async_trait;
use lca_agents_rs::adk::agent::LoopPolicy;
use lca_agents_rs::adk::error::AdkError;
use lca_agents_rs::adk::model::{Content, GenerationConfig, Model, Part};
use lca_agents_rs::adk::tool::Tool;
use lca_agents_rs::lca::agents::{
    FINALIZE_RESULTS, GET_BASIC_INFO, GET_COMPONENT, GET_EMISSIONS, GET_PROCESSES, GET_SUPPLIER,
    GET_TECHNOLOGY,
};
use lca_agents_rs::lca::pipeline::analysis_schema;
use lca_agents_rs::lca::service::AnalysisService;
use lca_agents_rs::lca::types::{fields, ProcessesListRequest, ProductAnalysis};
use lca_agents_rs::lca::workflow::{
    step_fn, GraphBuilder, StateUpdate, StepDescriptor, StepError, Target, ValidationError,
    WorkflowError,
};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Components
// ============================================================================

const SEARCH_TOOL: &str = "mock_search";

/// Scripted model: asks for one lookup per loop (or one per turn when
/// `persistent`), then answers extraction calls by requested schema name
struct ScriptedModel {
    processes: Vec<&'static str>,
    persistent: bool,
    extractions: Mutex<HashMap<String, usize>>,
    analysed_processes: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(processes: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            processes,
            persistent: false,
            extractions: Mutex::new(HashMap::new()),
            analysed_processes: Mutex::new(Vec::new()),
        })
    }

    fn persistent(processes: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            processes,
            persistent: true,
            extractions: Mutex::new(HashMap::new()),
            analysed_processes: Mutex::new(Vec::new()),
        })
    }

    fn extractions_of(&self, schema: &str) -> usize {
        self.extractions
            .lock()
            .unwrap()
            .get(schema)
            .copied()
            .unwrap_or(0)
    }

    fn reasoning_response(history: &[Content], persistent: bool) -> Content {
        let looked_up = history.iter().any(|c| {
            c.parts
                .iter()
                .any(|p| matches!(p, Part::FunctionResponse { .. }))
        });
        if looked_up && !persistent {
            return Content {
                role: "model".to_string(),
                parts: vec![Part::Text("I have enough information.".to_string())],
            };
        }

        let query = history
            .iter()
            .find(|c| c.role == "user")
            .map(|c| c.text())
            .unwrap_or_default();
        Content {
            role: "model".to_string(),
            parts: vec![Part::FunctionCall {
                id: Some("call_1".to_string()),
                name: SEARCH_TOOL.to_string(),
                args: json!({ "query": query }),
            }],
        }
    }

    fn answer(&self, schema: &str, transcript: &str) -> Value {
        match schema {
            "BasicInformationAnswer" => json!({
                "product_information": "Crystalline silicon photovoltaic module"
            }),
            "ComponentAnswer" => json!({
                "component_information": "Glass, EVA, silicon cells, aluminium frame"
            }),
            "SupplierAnswer" => json!({
                "supplier_list": ["Suntech Power Holdings", "Wuxi Suntech"]
            }),
            "TechnologyAnswer" => json!({
                "technology_information": "PERC cell technology"
            }),
            "ProcessesAnswer" => json!({
                "processes_list": self
                    .processes
                    .iter()
                    .map(|name| json!({ "processName": name }))
                    .collect::<Vec<_>>()
            }),
            "EmissionsAnswer" => {
                let process = transcript
                    .lines()
                    .find_map(|line| line.strip_prefix("Target Unit Process: "))
                    .unwrap_or("unknown")
                    .to_string();
                self.analysed_processes
                    .lock()
                    .unwrap()
                    .push(process.clone());
                json!({
                    "emission_sources": [
                        { "name": format!("{} electricity", process) }
                    ]
                })
            }
            other => panic!("unexpected extraction schema {}", other),
        }
    }
}

#[async_trait]
impl Model for ScriptedModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        _tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, AdkError> {
        let Some(schema) = config.and_then(|c| c.response_schema.as_ref()) else {
            return Ok(Self::reasoning_response(history, self.persistent));
        };

        *self
            .extractions
            .lock()
            .unwrap()
            .entry(schema.name.clone())
            .or_insert(0) += 1;

        let transcript = history
            .iter()
            .find(|c| c.role == "user")
            .map(|c| c.text())
            .unwrap_or_default();
        let answer = self.answer(&schema.name, &transcript).to_string();
        Ok(Content {
            role: "model".to_string(),
            parts: vec![Part::Text(answer)],
        })
    }
}

/// Static schema for MockSearchTool
static MOCK_SEARCH_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {"type": "string"}
        },
        "required": ["query"]
    })
});

/// Lookup tool returning one shared and one per-call reference, or failing
struct MockSearchTool {
    calls: AtomicUsize,
    fail: bool,
}

impl MockSearchTool {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }
}

#[async_trait]
impl Tool for MockSearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Mock web search"
    }

    fn schema(&self) -> &Value {
        &MOCK_SEARCH_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, AdkError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AdkError::api("mock_search", "service unavailable"));
        }
        Ok(json!({
            "query": input["query"],
            "results": [
                {
                    "title": "Photovoltaic module overview",
                    "url": "https://ref.example/pv-overview",
                    "content": "Overview",
                    "score": 0.5
                },
                {
                    "title": format!("Result {}", n),
                    "url": format!("https://ref.example/{}", n),
                    "content": "Details"
                }
            ]
        }))
    }
}

fn fast_policy() -> LoopPolicy {
    LoopPolicy {
        max_turns: 3,
        call_timeout: Duration::from_secs(5),
    }
}

fn service(model: Arc<ScriptedModel>, tool: Arc<MockSearchTool>) -> AnalysisService {
    let tools: Vec<Arc<dyn Tool>> = vec![tool];
    AnalysisService::new(model, tools, fast_policy()).unwrap()
}

// ============================================================================
// Product Analysis Tests
// ============================================================================

const SOLAR_PROCESSES: [&str; 3] = [
    "Silicon Wafer Production",
    "Cell Fabrication",
    "Module Assembly",
];

#[tokio::test]
async fn test_solar_panel_analysis_end_to_end() {
    let model = ScriptedModel::new(SOLAR_PROCESSES.to_vec());
    let tool = MockSearchTool::new();
    let service = service(model.clone(), tool.clone());
    let cancel = CancellationToken::new();

    let run = service
        .run_product_analysis("Solar Panel", Some("Suntech Power"), &cancel)
        .await
        .unwrap();

    for step in [
        GET_BASIC_INFO,
        GET_COMPONENT,
        GET_SUPPLIER,
        GET_TECHNOLOGY,
        GET_PROCESSES,
    ] {
        assert_eq!(run.completions_of(step), 1, "{} should run once", step);
    }
    assert_eq!(run.completions_of(GET_EMISSIONS), SOLAR_PROCESSES.len());
    assert_eq!(run.completions_of(FINALIZE_RESULTS), 1);

    // Finalize merges last, after every emission pass
    assert_eq!(
        run.completions.last().map(|c| c.step.as_str()),
        Some(FINALIZE_RESULTS)
    );
    assert!(run.position(GET_PROCESSES) < run.position(GET_EMISSIONS));

    let iterations: Vec<u32> = run
        .completions
        .iter()
        .filter(|c| c.step == GET_EMISSIONS)
        .map(|c| c.iteration)
        .collect();
    assert_eq!(iterations, vec![1, 2, 3]);

    assert_eq!(
        *model.analysed_processes.lock().unwrap(),
        SOLAR_PROCESSES.to_vec()
    );

    let analysis: ProductAnalysis = run.output().unwrap();
    assert_eq!(analysis.product_name, "Solar Panel");
    assert_eq!(analysis.supplier.as_deref(), Some("Suntech Power"));
    assert_eq!(
        analysis.product_basic_information,
        "Crystalline silicon photovoltaic module"
    );
    assert_eq!(analysis.related_supplier_list.len(), 2);
    assert_eq!(analysis.technology_information, "PERC cell technology");
    assert_eq!(analysis.processes_list.len(), 3);

    let tagged: Vec<Option<&str>> = analysis
        .emission_sources
        .iter()
        .map(|s| s.process_name.as_deref())
        .collect();
    assert_eq!(tagged.len(), 3);
    for process in SOLAR_PROCESSES {
        assert!(tagged.contains(&Some(process)));
    }

    // Eight lookups: one shared URL plus one unique URL each
    assert_eq!(tool.calls.load(Ordering::SeqCst), 8);
    assert_eq!(analysis.reference_sources.len(), 9);
    let mut urls: Vec<&str> = analysis
        .reference_sources
        .iter()
        .map(|r| r.url.as_str())
        .collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 9);

    assert_eq!(analysis.summary.process_count, 3);
    assert_eq!(analysis.summary.emission_source_count, 3);
    assert_eq!(analysis.summary.reference_count, 9);
    assert!(analysis.summary.processes_without_emissions.is_empty());
}

#[tokio::test]
async fn test_analysis_without_supplier() {
    let model = ScriptedModel::new(vec!["Assembly"]);
    let service = service(model, MockSearchTool::new());

    let analysis = service
        .analyze_product("Solar Panel", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(analysis.supplier, None);
    assert_eq!(analysis.processes_list.len(), 1);
    assert_eq!(analysis.emission_sources.len(), 1);
}

#[tokio::test]
async fn test_empty_processes_list_still_finalizes() {
    let model = ScriptedModel::new(vec![]);
    let service = service(model.clone(), MockSearchTool::new());
    let cancel = CancellationToken::new();

    let run = service
        .run_product_analysis("Solar Panel", Some("Suntech Power"), &cancel)
        .await
        .unwrap();

    // getProcesses routes straight to finalizeResults
    assert_eq!(run.completions_of(GET_EMISSIONS), 0);
    assert_eq!(run.completions_of(FINALIZE_RESULTS), 1);
    assert_eq!(model.extractions_of("EmissionsAnswer"), 0);

    let analysis: ProductAnalysis = run.output().unwrap();
    assert!(analysis.processes_list.is_empty());
    assert!(analysis.emission_sources.is_empty());
    assert_eq!(analysis.summary.process_count, 0);
}

#[tokio::test]
async fn test_failing_lookup_finalizes_with_empty_references() {
    let model = ScriptedModel::persistent(vec!["Module Assembly"]);
    let tool = MockSearchTool::failing();
    let service = service(model.clone(), tool.clone());
    let cancel = CancellationToken::new();

    let analysis = service
        .analyze_product("Solar Panel", Some("Suntech Power"), &cancel)
        .await
        .unwrap();

    // Every step hits the turn bound: 6 step invocations x 3 turns
    assert_eq!(tool.calls.load(Ordering::SeqCst), 18);
    assert!(analysis.reference_sources.is_empty());
    assert_eq!(analysis.summary.reference_count, 0);
    assert_eq!(analysis.processes_list.len(), 1);
    assert_eq!(analysis.emission_sources.len(), 1);
    assert_eq!(model.extractions_of("EmissionsAnswer"), 1);
}

#[tokio::test]
async fn test_cancelled_analysis() {
    let model = ScriptedModel::new(SOLAR_PROCESSES.to_vec());
    let service = service(model, MockSearchTool::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service
        .analyze_product("Solar Panel", None, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Cancelled), "got {:?}", err);
}

// ============================================================================
// Processes List Tests
// ============================================================================

#[tokio::test]
async fn test_build_processes_list() {
    let model = ScriptedModel::new(SOLAR_PROCESSES.to_vec());
    let tool = MockSearchTool::new();
    let service = service(model.clone(), tool.clone());

    let request = ProcessesListRequest {
        product_name: "Solar Panel".to_string(),
        supplier: Some("Suntech Power".to_string()),
        product_component: Some("Silicon cells".to_string()),
        technology_information: None,
    };

    let response = service
        .build_processes_list(&request, &CancellationToken::new())
        .await
        .unwrap();

    let names: Vec<&str> = response
        .processes_list
        .iter()
        .map(|p| p.process_name.as_str())
        .collect();
    assert_eq!(names, SOLAR_PROCESSES.to_vec());
    assert_eq!(response.reference_sources.len(), 2);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    assert_eq!(model.extractions_of("ProcessesAnswer"), 1);
    assert_eq!(model.extractions_of("EmissionsAnswer"), 0);
}

// ============================================================================
// Graph Validation Tests
// ============================================================================

#[test]
fn test_two_overwrite_writers_rejected() {
    let writer = |name: &str| {
        StepDescriptor::new(
            name,
            step_fn(|_ctx| async move {
                Ok::<_, StepError>(StateUpdate::new().with(fields::PROCESSES_LIST, json!([])))
            }),
        )
        .writes(&[fields::PROCESSES_LIST])
    };

    let err = GraphBuilder::new("conflicting_writers")
        .schema(analysis_schema())
        .step(writer("second"))
        .step(writer("first"))
        .entry("first")
        .entry("second")
        .edge("first", Target::End)
        .edge("second", Target::End)
        .compile()
        .unwrap_err();

    match err {
        ValidationError::AmbiguousWriter { field, steps } => {
            assert_eq!(field, fields::PROCESSES_LIST);
            assert_eq!(steps, vec!["first".to_string(), "second".to_string()]);
        }
        other => panic!("expected AmbiguousWriter, got {:?}", other),
    }
}

#[test]
fn test_union_writers_accepted() {
    let writer = |name: &str| {
        StepDescriptor::new(
            name,
            step_fn(|_ctx| async move { Ok::<_, StepError>(StateUpdate::new()) }),
        )
        .writes(&[fields::REFERENCE_SOURCES])
    };

    let graph = GraphBuilder::new("shared_references")
        .schema(analysis_schema())
        .step(writer("first"))
        .step(writer("second"))
        .entry("first")
        .entry("second")
        .edge("first", Target::End)
        .edge("second", Target::End)
        .compile()
        .unwrap();
    assert_eq!(graph.steps().count(), 2);
}
