//! Shared key-value store for one pipeline run
//!
//! A [`Context`] is created when a run starts, seeded with the initial
//! request, and grows as each step's outputs are merged into it. It is
//! append-only: a key, once written, keeps its value for the rest of the run.
//! Steps never see the `Context` itself; they get a [`ContextSnapshot`] that
//! holds only the keys they declared as inputs.

use crate::error::{Error, Result, StepError, StepResult};
use crate::step::StepOutput;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Append-only context owned by a single run
///
/// # Example
///
/// ```
/// use crew_core::Context;
/// use serde_json::json;
///
/// let mut ctx = Context::new();
/// ctx.insert("ticket", json!("AAPL")).unwrap();
///
/// assert_eq!(ctx.get_str("ticket"), Some("AAPL"));
/// assert!(ctx.insert("ticket", json!("MSFT")).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    data: BTreeMap<String, serde_json::Value>,
}

impl Context {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for seeding the initial request
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Result<Self> {
        self.insert(key, value.into())?;
        Ok(self)
    }

    /// Insert a value; fails if the key is already present
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) -> Result<()> {
        let key = key.into();
        if self.data.contains_key(&key) {
            return Err(Error::ContextConflict(key));
        }
        self.data.insert(key, value);
        Ok(())
    }

    /// Insert a typed value, serialized to JSON first
    pub fn insert_typed<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| Error::Serialization(format!("Failed to serialize context value: {e}")))?;
        self.insert(key, json_value)
    }

    /// Get a value from the context
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a string value from the context
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    /// Get a typed value from the context
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| Error::Serialization(format!("Failed to deserialize context value: {e}"))),
        }
    }

    /// Check if a key exists in the context
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Keys currently populated, in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Get the number of entries in the context
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the context is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Immutable copy restricted to `keys`
    ///
    /// Keys that are not populated are simply absent from the snapshot; the
    /// graph validation guarantees this never happens for declared inputs.
    pub fn snapshot<'a>(&self, keys: impl IntoIterator<Item = &'a String>) -> ContextSnapshot {
        let data = keys
            .into_iter()
            .filter_map(|k| self.data.get(k).map(|v| (k.clone(), v.clone())))
            .collect();
        ContextSnapshot { data }
    }

    /// Merge a step's outputs
    ///
    /// Either every output is inserted or none is: conflicts are checked up
    /// front so a rejected merge leaves the context untouched.
    pub fn merge(&mut self, outputs: StepOutput) -> Result<()> {
        if let Some(key) = outputs.keys().find(|k| self.data.contains_key(*k)) {
            return Err(Error::ContextConflict(key.to_string()));
        }
        self.data.extend(outputs.into_inner());
        Ok(())
    }
}

/// Read-only view handed to a step for one attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ContextSnapshot {
    data: BTreeMap<String, serde_json::Value>,
}

impl ContextSnapshot {
    /// Get a value from the snapshot
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a value, failing the attempt if it is absent
    pub fn require(&self, key: &str) -> StepResult<&serde_json::Value> {
        self.get(key)
            .ok_or_else(|| StepError::MissingInput(key.to_string()))
    }

    /// Get a string value, failing the attempt if it is absent or not a string
    pub fn require_str(&self, key: &str) -> StepResult<&str> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| StepError::MissingInput(format!("{key} (expected a string)")))
    }

    /// Keys visible in this snapshot
    pub fn keys(&self) -> BTreeSet<&str> {
        self.data.keys().map(String::as_str).collect()
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The snapshot as a JSON object, e.g. for template rendering
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
