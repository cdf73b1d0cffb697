// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow execution

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::schema::{ReducerType, StateSchema};
use crate::lca::workflow::error::{StepError, WorkflowError};

/// Runtime workflow state with reducer support
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Current state values
    fields: BTreeMap<String, Value>,
    /// Reducers for each field
    reducers: HashMap<String, ReducerType>,
}

impl WorkflowState {
    /// Create a new WorkflowState from a schema
    pub fn new(schema: &StateSchema) -> Self {
        let mut fields = BTreeMap::new();
        let mut reducers = HashMap::new();

        for (name, def) in &schema.fields {
            if let Some(default) = &def.default {
                fields.insert(name.clone(), default.clone());
            }
            reducers.insert(name.clone(), def.reducer.clone());
        }

        Self { fields, reducers }
    }

    /// Create an empty WorkflowState
    pub fn empty() -> Self {
        Self {
            fields: BTreeMap::new(),
            reducers: HashMap::new(),
        }
    }

    /// Update a field using the appropriate reducer
    pub fn update(&mut self, key: &str, value: Value) {
        let reducer = self.reducers.get(key).cloned().unwrap_or_default();

        match reducer {
            ReducerType::Overwrite => {
                self.fields.insert(key.to_string(), value);
            }
            ReducerType::Append => {
                let arr = self
                    .fields
                    .entry(key.to_string())
                    .or_insert(Value::Array(vec![]));
                if let Value::Array(a) = arr {
                    a.extend(into_items(value));
                }
            }
            ReducerType::UnionByKey(item_key) => {
                let arr = self
                    .fields
                    .entry(key.to_string())
                    .or_insert(Value::Array(vec![]));
                if let Value::Array(existing) = arr {
                    for item in into_items(value) {
                        union_item(existing, item, &item_key);
                    }
                }
            }
        }
    }

    /// Merge a step's partial output.
    ///
    /// Every field must be among the step's declared outputs; otherwise
    /// nothing is applied.
    pub fn merge(
        &mut self,
        step: &str,
        declared: &[String],
        update: StateUpdate,
    ) -> Result<(), WorkflowError> {
        if let Some(field) = update.0.keys().find(|f| !declared.contains(f)) {
            return Err(WorkflowError::UndeclaredOutputField {
                step: step.to_string(),
                field: field.clone(),
            });
        }

        for (key, value) in update.0 {
            self.update(&key, value);
        }
        Ok(())
    }

    /// Apply caller-supplied seed fields; no declaration check
    pub fn seed(&mut self, update: StateUpdate) {
        for (key, value) in update.0 {
            self.update(&key, value);
        }
    }

    /// Read-only copy of the given fields
    pub fn snapshot(&self, inputs: &[String]) -> StateSnapshot {
        StateSnapshot {
            fields: inputs
                .iter()
                .filter_map(|name| self.fields.get(name).map(|v| (name.clone(), v.clone())))
                .collect(),
        }
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Number of items in an array field (0 when absent)
    pub fn len_of(&self, key: &str) -> usize {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::empty()
    }
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn item_key(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => item.to_string(),
    }
}

/// Insert `item` unless an item with the same key exists.
///
/// On a key collision the survivor does not depend on merge order: the
/// higher `score` wins, then the lexicographically greater JSON text.
fn union_item(existing: &mut Vec<Value>, item: Value, key: &str) {
    let k = item_key(&item, key);
    match existing.iter().position(|e| item_key(e, key) == k) {
        Some(i) => {
            if outranks(&item, &existing[i]) {
                existing[i] = item;
            }
        }
        None => existing.push(item),
    }
}

fn outranks(candidate: &Value, current: &Value) -> bool {
    let score = |v: &Value| v.get("score").and_then(Value::as_f64);
    match score(candidate).partial_cmp(&score(current)) {
        Some(Ordering::Greater) => true,
        Some(Ordering::Less) => false,
        _ => candidate.to_string() > current.to_string(),
    }
}

/// Partial output returned by a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate(BTreeMap<String, Value>);

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: Value) -> Self {
        self.0.insert(field.to_string(), value);
        self
    }

    /// Serialize a typed value into a field
    pub fn with_serialized<T: Serialize>(
        self,
        field: &str,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(self.with(field, serde_json::to_value(value)?))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Immutable view of the fields a step declared as inputs
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    fields: BTreeMap<String, Value>,
}

impl StateSnapshot {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Deserialize a field that must be present
    pub fn require<T: DeserializeOwned>(&self, field: &str) -> Result<T, StepError> {
        self.optional(field)?
            .ok_or_else(|| StepError::MissingInput(field.to_string()))
    }

    /// Deserialize a field that may be absent or null
    pub fn optional<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, StepError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StepError::InvalidInput {
                    field: field.to_string(),
                    source,
                }),
        }
    }
}
