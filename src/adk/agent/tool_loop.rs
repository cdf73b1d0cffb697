// SPDX-License-Identifier: MIT

//! Tool-call loop - consult a lookup tool, then finalize
//!
//! Every research step runs the same bounded state machine:
//!
//! ```text
//! AwaitingModel -> Deciding -> InvokingTool -> AwaitingModel ...
//!                          \-> Finalizing (terminal)
//! ```
//!
//! The loop leaves `Deciding` for `Finalizing` when the model asks for no
//! tool, or when the turn counter has reached `max_turns`. Hitting the bound
//! is not an error: the step is finalized with whatever has been gathered.

use crate::adk::error::{AdkError, CallStage, ExternalCallFailure};
use crate::adk::model::{Content, GenerationConfig, Model, Part, ResponseSchema};
use crate::adk::reference::ReferenceSource;
use crate::adk::tool::Tool;
use futures::future::join_all;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_TURNS: u32 = 10;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Bounds applied to one loop invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPolicy {
    /// Maximum number of lookup rounds before finalization is forced
    pub max_turns: u32,
    /// Time bound for each individual external call
    pub call_timeout: Duration,
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Result of a finalized loop
#[derive(Debug, Clone)]
pub struct LoopOutcome<T> {
    /// Structured output produced by the extraction call
    pub output: T,
    /// Items of every successful lookup in the most recent turn that had one
    pub references: Vec<ReferenceSource>,
    /// Number of lookup rounds performed
    pub turns: u32,
    /// True when the turn bound forced finalization
    pub forced: bool,
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    External(#[from] ExternalCallFailure),

    #[error("tool-call loop cancelled after {turns} turns")]
    Cancelled { turns: u32 },
}

#[derive(Debug)]
enum LoopState {
    AwaitingModel,
    Deciding(Content),
    InvokingTool(Vec<PendingCall>),
    Finalizing,
}

#[derive(Debug)]
struct PendingCall {
    id: Option<String>,
    name: String,
    args: serde_json::Value,
}

/// Bounded reasoning/lookup loop followed by one structured extraction
pub struct ToolCallLoop {
    pub name: String,
    pub instruction: String,
    pub extraction_instruction: String,
    pub model: Arc<dyn Model>,
    pub tools: Vec<Arc<dyn Tool>>,
    pub policy: LoopPolicy,
    /// HashMap for O(1) tool lookups
    tool_map: HashMap<String, usize>,
}

impl ToolCallLoop {
    pub fn new(
        name: String,
        instruction: String,
        extraction_instruction: String,
        model: Arc<dyn Model>,
        tools: Vec<Arc<dyn Tool>>,
        policy: LoopPolicy,
    ) -> Self {
        let tool_map: HashMap<String, usize> = tools
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), i))
            .collect();

        Self {
            name,
            instruction,
            extraction_instruction,
            model,
            tools,
            policy,
            tool_map,
        }
    }

    fn get_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tool_map.get(name).map(|&i| &self.tools[i])
    }

    /// Run the loop for `input` and extract a `T` from the gathered turns.
    ///
    /// `cancel` is checked before every reasoning call, so a turn that has
    /// started always completes.
    pub async fn run<T>(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<LoopOutcome<T>, LoopError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let mut history = vec![Content::system(&self.instruction), Content::user(input)];
        let mut turns: u32 = 0;
        let mut references = Vec::new();
        let mut forced = false;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    if cancel.is_cancelled() {
                        return Err(LoopError::Cancelled { turns });
                    }
                    log::info!("{} turn {}/{}", self.name, turns + 1, self.policy.max_turns);
                    let response = self
                        .bounded(
                            CallStage::Reasoning,
                            self.model
                                .generate_content(&history, None, Some(self.tools.as_slice())),
                        )
                        .await?;
                    LoopState::Deciding(response)
                }
                LoopState::Deciding(response) => {
                    let calls: Vec<PendingCall> = response
                        .function_calls()
                        .into_iter()
                        .map(|(id, name, args)| PendingCall {
                            id: id.clone(),
                            name: name.to_string(),
                            args: args.clone(),
                        })
                        .collect();
                    history.push(response);

                    if calls.is_empty() {
                        LoopState::Finalizing
                    } else if turns >= self.policy.max_turns {
                        log::warn!(
                            "{} reached max turns ({}), finalizing with gathered information",
                            self.name,
                            self.policy.max_turns
                        );
                        forced = true;
                        LoopState::Finalizing
                    } else {
                        LoopState::InvokingTool(calls)
                    }
                }
                LoopState::InvokingTool(calls) => {
                    let results = join_all(calls.iter().map(|call| self.lookup(call))).await;

                    let mut function_responses = Vec::with_capacity(calls.len());
                    let mut turn_references: Option<Vec<ReferenceSource>> = None;
                    for (call, result) in calls.into_iter().zip(results) {
                        let response = match result {
                            Ok(value) => {
                                turn_references
                                    .get_or_insert_with(Vec::new)
                                    .extend(ReferenceSource::from_lookup_result(&value));
                                value
                            }
                            Err(e) if e.is_timeout() => {
                                log::warn!("{}: {}", self.name, e);
                                serde_json::json!({ "error": e.to_string() })
                            }
                            Err(e) => {
                                log::error!("{}: {}", self.name, e);
                                serde_json::json!({ "error": e.to_string() })
                            }
                        };
                        function_responses.push(Part::FunctionResponse {
                            id: call.id,
                            name: call.name,
                            response,
                        });
                    }

                    // A turn with no successful lookup keeps the previous references
                    if let Some(turn_references) = turn_references {
                        references = turn_references;
                    }
                    history.push(Content {
                        role: "user".to_string(),
                        parts: function_responses,
                    });
                    turns += 1;
                    LoopState::AwaitingModel
                }
                LoopState::Finalizing => {
                    let output = self.extract::<T>(&history).await?;
                    return Ok(LoopOutcome {
                        output,
                        references,
                        turns,
                        forced,
                    });
                }
            };
        }
    }

    /// Execute one requested lookup; failures are reported, not propagated
    async fn lookup(&self, call: &PendingCall) -> Result<serde_json::Value, ExternalCallFailure> {
        log::info!("{} tool call: {} {}", self.name, call.name, call.args);
        let tool = self.get_tool(&call.name).ok_or_else(|| {
            ExternalCallFailure::new(CallStage::Lookup, AdkError::tool_not_found(&call.name))
        })?;
        self.bounded(CallStage::Lookup, tool.execute(call.args.clone()))
            .await
    }

    /// Structured extraction over the accumulated turns
    async fn extract<T>(&self, history: &[Content]) -> Result<T, ExternalCallFailure>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| ExternalCallFailure::new(CallStage::Extraction, e.into()))?;
        let config = GenerationConfig {
            response_schema: Some(ResponseSchema {
                name: T::schema_name(),
                schema,
            }),
            ..Default::default()
        };
        let request = vec![
            Content::system(format!(
                "{}\n\nRespond with a single JSON object matching the requested schema.",
                self.extraction_instruction
            )),
            Content::user(render_transcript(history)),
        ];

        let response = self
            .bounded(
                CallStage::Extraction,
                self.model.generate_content(&request, Some(&config), None),
            )
            .await?;

        parse_structured(&response.text())
            .map_err(|e| ExternalCallFailure::new(CallStage::Extraction, e.into()))
    }

    async fn bounded<R, F>(&self, stage: CallStage, call: F) -> Result<R, ExternalCallFailure>
    where
        F: Future<Output = Result<R, AdkError>>,
    {
        match tokio::time::timeout(self.policy.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ExternalCallFailure::new(stage, e)),
            Err(_) => Err(ExternalCallFailure::new(
                stage,
                AdkError::timeout(
                    format!("{} {} call", self.name, stage),
                    self.policy.call_timeout,
                ),
            )),
        }
    }
}

/// Render the conversation (minus the system prompt) as plain text
fn render_transcript(history: &[Content]) -> String {
    let mut lines = Vec::new();
    for content in history.iter().filter(|c| c.role != "system") {
        for part in &content.parts {
            match part {
                Part::Text(text) if !text.trim().is_empty() => {
                    lines.push(format!("{}: {}", content.role, text.trim()));
                }
                Part::Text(_) => {}
                Part::FunctionCall { name, args, .. } => {
                    lines.push(format!("{} called {}({})", content.role, name, args));
                }
                Part::FunctionResponse { name, response, .. } => {
                    lines.push(format!("{} returned: {}", name, response));
                }
            }
        }
    }
    lines.join("\n\n")
}

/// Parse a JSON answer, tolerating a surrounding markdown code fence
fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim())
}
