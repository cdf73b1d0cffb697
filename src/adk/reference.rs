// SPDX-License-Identifier: MIT

//! Reference sources collected from lookup results

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A provenance item returned by an external lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReferenceSource {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ReferenceSource {
    /// Collect reference sources from a lookup result.
    ///
    /// Accepts either a bare array of items or an object with a `results`
    /// array. Items without a `url` are skipped.
    pub fn from_lookup_result(result: &Value) -> Vec<ReferenceSource> {
        let items = match result {
            Value::Array(items) => items,
            Value::Object(obj) => match obj.get("results") {
                Some(Value::Array(items)) => items,
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };

        items
            .iter()
            .filter_map(|item| serde_json::from_value::<ReferenceSource>(item.clone()).ok())
            .collect()
    }
}
