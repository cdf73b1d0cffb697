// SPDX-License-Identifier: MIT

//! Typed error handling for the agent kit
//!
//! Model providers and tools report failures as [`AdkError`]. The tool-call
//! loop wraps them in [`ExternalCallFailure`] so callers can see which stage
//! of the loop failed.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by model providers and lookup tools
#[derive(Debug, Error)]
pub enum AdkError {
    /// API errors from external services (chat completions, search, ...)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Tool not found during execution
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The call did not finish within its time bound
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The provider answered with something we cannot interpret
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl AdkError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a tool not found error
    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

/// Which external call of the tool-call loop failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStage {
    /// The reasoning call that decides whether to consult a tool
    Reasoning,
    /// The external lookup itself
    Lookup,
    /// The final structured-extraction call
    Extraction,
}

impl fmt::Display for CallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStage::Reasoning => write!(f, "reasoning"),
            CallStage::Lookup => write!(f, "lookup"),
            CallStage::Extraction => write!(f, "extraction"),
        }
    }
}

/// A reasoning, lookup or extraction call failed or timed out
#[derive(Debug, Error)]
#[error("{stage} call failed: {source}")]
pub struct ExternalCallFailure {
    pub stage: CallStage,
    #[source]
    pub source: AdkError,
}

impl ExternalCallFailure {
    pub fn new(stage: CallStage, source: AdkError) -> Self {
        Self { stage, source }
    }

    /// True when the failure was caused by the per-call time bound
    pub fn is_timeout(&self) -> bool {
        matches!(self.source, AdkError::Timeout { .. })
    }
}
