// SPDX-License-Identifier: MIT

use crate::adk::error::AdkError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;

pub const TAVILY_SEARCH_TOOL: &str = "tavily_search_results_json";
const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

// --- Static schema ---

static TAVILY_SEARCH_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query"
            }
        },
        "required": ["query"]
    })
});

#[derive(Debug, Serialize, Deserialize)]
pub struct TavilySearchArgs {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TavilySearchResult {
    pub results: Vec<SearchResult>,
    pub query: String,
}

/// Web search through the Tavily API
pub struct TavilySearchTool {
    client: Client,
    api_key: String,
    endpoint: String,
    max_results: u32,
}

impl TavilySearchTool {
    pub fn new(max_results: u32) -> Result<Self, AdkError> {
        let api_key = env::var("TAVILY_API_KEY")
            .map_err(|_| AdkError::config("TAVILY_API_KEY must be set"))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            endpoint: TAVILY_ENDPOINT.to_string(),
            max_results,
        })
    }

    pub fn max_results(&self) -> u32 {
        self.max_results
    }
}

fn parse_results(body: Value, query: String) -> Result<TavilySearchResult, AdkError> {
    let results_json = body
        .get("results")
        .cloned()
        .ok_or_else(|| AdkError::api("tavily", "Invalid response format: missing results"))?;

    Ok(TavilySearchResult {
        results: serde_json::from_value(results_json)?,
        query,
    })
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        TAVILY_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "A search engine optimized for comprehensive, accurate, and trusted results. Input should be a search query. Returns titles, URLs, content excerpts and relevance scores."
    }

    fn schema(&self) -> &Value {
        &TAVILY_SEARCH_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, AdkError> {
        let args: TavilySearchArgs = serde_json::from_value(input)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "api_key": self.api_key,
                "query": args.query,
                "max_results": self.max_results,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(AdkError::api("tavily", format!("{}: {}", status, text)));
        }

        let body: Value = resp.json().await?;
        let result = parse_results(body, args.query)?;

        Ok(serde_json::to_value(result)?)
    }
}
