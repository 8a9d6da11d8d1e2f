use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{InextError, Result};

/// Declarative state of one resource instance.
///
/// `values` is the desired state handed in by the caller and rewritten from
/// server responses. `prior` is the last persisted state; comparing the two tells
/// an update which fields changed. An empty id means the object does not exist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    #[serde(default)]
    id: String,
    #[serde(default)]
    values: Map<String, Value>,
    #[serde(default)]
    prior: Map<String, Value>,
}

impl ResourceState {
    /// State for an object that does not exist yet
    #[must_use]
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            id: String::new(),
            values,
            prior: Map::new(),
        }
    }

    /// Server id, empty when the object does not exist
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` when the state is bound to a server object
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.id.is_empty()
    }

    /// Bind the state to the server object `id`
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Mark the object as gone
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    /// All current values
    pub const fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Value of `key`; `null` counts as unset
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|value| !value.is_null())
    }

    /// Overwrite the value of `key`
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Replace the desired values, keeping the persisted snapshot.
    ///
    /// This is how a caller plans an update of an existing object.
    pub fn plan(&mut self, values: Map<String, Value>) {
        self.values = values;
    }

    /// Record the current values as persisted
    pub fn mark_persisted(&mut self) {
        self.prior = self.values.clone();
    }

    /// Returns `true` when `key` differs from the persisted state
    #[must_use]
    pub fn has_change(&self, key: &str) -> bool {
        self.get(key) != self.prior.get(key).filter(|value| !value.is_null())
    }

    /// String value, `None` when unset
    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        self.get(key)
            .map(|value| {
                value
                    .as_str()
                    .ok_or_else(|| type_error(key, "a string", value))
            })
            .transpose()
    }

    /// String value that must be set
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.get_str(key)?
            .ok_or_else(|| InextError::resource_state(key, "required value is missing"))
    }

    /// Boolean value, `false` when unset
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key).map_or(Ok(false), |value| {
            value
                .as_bool()
                .ok_or_else(|| type_error(key, "a boolean", value))
        })
    }

    /// Integer value, `None` when unset
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.get(key)
            .map(|value| {
                value
                    .as_i64()
                    .ok_or_else(|| type_error(key, "an integer", value))
            })
            .transpose()
    }

    /// List of strings, empty when unset
    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>> {
        string_list(key, self.get(key))
    }

    /// Persisted list of strings, empty when unset
    pub fn prior_string_list(&self, key: &str) -> Result<Vec<String>> {
        string_list(key, self.prior.get(key))
    }

    /// String to string mapping, empty when unset
    pub fn get_string_map(&self, key: &str) -> Result<BTreeMap<String, String>> {
        string_map(key, self.get(key))
    }

    /// Persisted string to string mapping, empty when unset
    pub fn prior_string_map(&self, key: &str) -> Result<BTreeMap<String, String>> {
        string_map(key, self.prior.get(key))
    }
}

fn type_error(key: &str, expected: &str, value: &Value) -> InextError {
    InextError::resource_state(key, format!("expected {expected}, got {value}"))
}

fn string_list(key: &str, value: Option<&Value>) -> Result<Vec<String>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| type_error(key, "a list of strings", item))
            })
            .collect(),
        Some(other) => Err(type_error(key, "a list of strings", other)),
    }
}

fn string_map(key: &str, value: Option<&Value>) -> Result<BTreeMap<String, String>> {
    match value {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(k, v)| {
                v.as_str()
                    .map(|v| (k.clone(), v.to_string()))
                    .ok_or_else(|| type_error(key, "a map of strings", v))
            })
            .collect(),
        Some(other) => Err(type_error(key, "a map of strings", other)),
    }
}
