//! The single JSON document synchronized across every overlay client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Latest-state snapshot shared by all connected clients.
///
/// Always a JSON object at the top level. It only changes through
/// [`SharedState::merge`], a shallow per-key overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedState(Map<String, Value>);

impl SharedState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Shallow-merges `update` into this state.
    ///
    /// Top-level keys from `update` replace same-named keys; nested objects
    /// are replaced wholesale, never merged recursively. Returns the number
    /// of keys written.
    pub fn merge(&mut self, update: Map<String, Value>) -> usize {
        let written = update.len();
        for (key, value) in update {
            self.0.insert(key, value);
        }
        written
    }

    /// Looks up a single top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the underlying object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts into a `serde_json::Value::Object`.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for SharedState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
