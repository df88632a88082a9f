//! Canonical request value handed to the engine by a protocol listener.
//!
//! A request is a JSON-shaped tree: scalar fields, nested maps (headers, query,
//! form) and arrays for repeated fields. The engine only ever reads it.

use crate::error::{PredicateError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Request(Map<String, Value>);

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a request from a JSON object.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Request(map)),
            other => Err(PredicateError::invalid(format!(
                "request must be an object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Look up a field by exact name or dotted path (`headers.accept`).
    pub fn get(&self, name: &str) -> Option<&Value> {
        lookup(&self.0, name, true)
    }
}

impl From<Map<String, Value>> for Request {
    fn from(map: Map<String, Value>) -> Self {
        Request(map)
    }
}

impl TryFrom<Value> for Request {
    type Error = PredicateError;

    fn try_from(value: Value) -> Result<Self> {
        Request::from_json(value)
    }
}

/// Find `name` in `map`.
///
/// An exact key wins; otherwise keys are compared ignoring case when
/// `key_case_sensitive` is false. A name that does not exist as a key is then
/// tried as a dotted path through nested maps.
pub fn lookup<'r>(
    map: &'r Map<String, Value>,
    name: &str,
    key_case_sensitive: bool,
) -> Option<&'r Value> {
    if let Some(value) = find_key(map, name, key_case_sensitive) {
        return Some(value);
    }
    name.match_indices('.').find_map(|(index, _)| {
        let (head, tail) = (&name[..index], &name[index + 1..]);
        find_key(map, head, key_case_sensitive)?
            .as_object()
            .and_then(|inner| lookup(inner, tail, key_case_sensitive))
    })
}

fn find_key<'r>(
    map: &'r Map<String, Value>,
    name: &str,
    key_case_sensitive: bool,
) -> Option<&'r Value> {
    if let Some(value) = map.get(name) {
        return Some(value);
    }
    if key_case_sensitive {
        return None;
    }
    let lowered = name.to_lowercase();
    map.iter()
        .find(|(key, _)| key.to_lowercase() == lowered)
        .map(|(_, value)| value)
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
