// SPDX-License-Identifier: MIT

//! Analysis configuration
//!
//! Loaded from YAML; every section is optional and falls back to defaults.
//! Secrets (`OPENAI_API_KEY`, `TAVILY_API_KEY`) are never part of this file.

use crate::adk::agent::{LoopPolicy, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_TURNS};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "qwen-plus";
pub const DEFAULT_MAX_RESULTS: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub model: ModelConfig,
    pub search: SearchConfig,
    pub tool_loop: ToolLoopConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// OpenAI-compatible endpoint; `OPENAI_BASE_URL` when unset
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolLoopConfig {
    pub max_turns: u32,
    pub call_timeout_secs: u64,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT.as_secs(),
        }
    }
}

impl ToolLoopConfig {
    pub fn policy(&self) -> LoopPolicy {
        LoopPolicy {
            max_turns: self.max_turns,
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}

impl AnalysisConfig {
    /// Load a config file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)?.with_env_overrides()
    }

    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `LCA_MODEL`, `OPENAI_BASE_URL` and `LCA_MAX_TURNS`
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(model) = env::var("LCA_MODEL") {
            self.model.name = model;
        }
        if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
            self.model.base_url = Some(base_url);
        }
        if let Ok(value) = env::var("LCA_MAX_TURNS") {
            self.tool_loop.max_turns =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: "LCA_MAX_TURNS".to_string(),
                        value,
                    })?;
        }
        Ok(self)
    }
}
