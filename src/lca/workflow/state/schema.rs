// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema defining the workflow state structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: HashMap<String, StateFieldDef>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field with the given reducer
    pub fn field(mut self, name: &str, reducer: ReducerType) -> Self {
        self.fields.insert(
            name.to_string(),
            StateFieldDef {
                reducer,
                default: None,
            },
        );
        self
    }

    /// Reducer for a field; undeclared fields are overwritten
    pub fn reducer(&self, name: &str) -> ReducerType {
        self.fields
            .get(name)
            .map(|def| def.reducer.clone())
            .unwrap_or_default()
    }
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateFieldDef {
    /// Reducer for merging values
    #[serde(default)]
    pub reducer: ReducerType,
    /// Default value
    pub default: Option<serde_json::Value>,
}

/// Reducer types for merging values into state
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReducerType {
    /// Replace the value (default); the last merged writer wins
    #[default]
    Overwrite,
    /// Concatenate collections in merge order
    Append,
    /// Merge collections, deduplicating items by the named key
    UnionByKey(String),
}

impl ReducerType {
    /// Whether concurrent writers are safe for this reducer
    pub fn is_commutative(&self) -> bool {
        !matches!(self, ReducerType::Overwrite)
    }
}
