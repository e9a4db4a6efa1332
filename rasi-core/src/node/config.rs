//! Configuration Mappings
//!
//! A [`Config`] is the ordered set of initial input values handed to a node
//! constructor. Keys arrive as unstructured data here, which is why the
//! reserved-name rules are checked again when the mapping is applied.
//!
//! JSON objects are accepted as a source:
//!
//! ```rust,ignore
//! let config = Config::from_json_str(r#"{ "temperature": 300.0, "nu": 1e13 }"#)?;
//! ```
//!
//! Numbers become scalars, arrays of numbers become arrays, arrays of arrays
//! become matrices, objects of numbers become tables, booleans become flags.
//! Nodes, curves and datasets have no JSON form and are wired in code.

use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{ConfigurationError, Result};

use super::value::{Matrix, Table, Value};

/// Initial input values for a node, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Config {
    entries: IndexMap<String, Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: Json =
            serde_json::from_str(text).map_err(|e| ConfigurationError::Json(e.to_string()))?;
        Self::from_json(&json)
    }

    /// Convert a JSON object into a configuration mapping.
    pub fn from_json(json: &Json) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| ConfigurationError::Json("expected an object".into()))?;

        let mut config = Self::new();
        for (key, value) in object {
            config.insert(key.as_str(), json_value(key, value)?);
        }
        Ok(config)
    }
}

fn number(key: &str, json: &Json) -> Result<f64, ConfigurationError> {
    json.as_f64()
        .ok_or_else(|| ConfigurationError::Json(format!("'{key}': expected a number, got {json}")))
}

fn json_value(key: &str, json: &Json) -> Result<Value, ConfigurationError> {
    match json {
        Json::Null => Ok(Value::Unset),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(_) => number(key, json).map(Value::Scalar),
        Json::Array(items) if items.iter().all(Json::is_array) && !items.is_empty() => {
            let rows = items
                .iter()
                .map(|row| {
                    row.as_array()
                        .into_iter()
                        .flatten()
                        .map(|x| number(key, x))
                        .collect::<Result<Vec<_>, _>>()
                })
                .collect::<Result<Vec<_>, _>>()?;
            Matrix::from_rows(rows)
                .map(Value::from)
                .ok_or_else(|| ConfigurationError::Json(format!("'{key}': ragged matrix")))
        }
        Json::Array(items) => items
            .iter()
            .map(|x| number(key, x))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::from),
        Json::Object(entries) => entries
            .iter()
            .map(|(name, x)| -> Result<(String, f64), ConfigurationError> {
                Ok((name.clone(), number(key, x)?))
            })
            .collect::<Result<Table, ConfigurationError>>()
            .map(Value::from),
        Json::String(_) => Err(ConfigurationError::Json(format!(
            "'{key}': strings are not valid input values"
        ))),
    }
}

impl IntoIterator for Config {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Config {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut config = Self::new();
        for (key, value) in iter {
            config.insert(key, value);
        }
        config
    }
}
