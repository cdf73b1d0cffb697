// SPDX-License-Identifier: MIT

//! Model module - defines LLM model trait and implementations
//!
//! This module provides the core Model trait and shared types.
//! Model implementations are in their own submodules:
//! - [openai] - OpenAI-compatible chat completions API

pub mod openai;

use crate::adk::error::AdkError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for model generation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    /// Ask the model for JSON conforming to this schema
    pub response_schema: Option<ResponseSchema>,
}

/// A named JSON schema for structured output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenated text parts of this message
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Function calls requested in this message
    pub fn function_calls(&self) -> Vec<(&Option<String>, &str, &serde_json::Value)> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::FunctionCall { id, name, args } => Some((id, name.as_str(), args)),
                _ => None,
            })
            .collect()
    }
}

/// Parts of a message - text, function calls, etc.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    /// Regular text output from the model
    Text(String),
    /// Function/tool call requested by the model
    FunctionCall {
        /// Provider-assigned call id, echoed back in the matching response
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        args: serde_json::Value,
    },
    /// Response from executing a function/tool
    FunctionResponse {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        response: serde_json::Value,
    },
}

/// Core trait for LLM model implementations
#[async_trait]
pub trait Model: Send + Sync {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, AdkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_text_and_calls() {
        let content = Content {
            role: "model".to_string(),
            parts: vec![
                Part::Text("Let me ".to_string()),
                Part::Text("search.".to_string()),
                Part::FunctionCall {
                    id: Some("call_1".to_string()),
                    name: "search".to_string(),
                    args: json!({"query": "silicon wafer"}),
                },
            ],
        };
        assert_eq!(content.text(), "Let me search.");
        let calls = content.function_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "search");
    }

    #[test]
    fn test_constructors() {
        assert_eq!(Content::system("x").role, "system");
        assert_eq!(Content::user("y").text(), "y");
    }
}
