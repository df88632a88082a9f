//! JSONPath selection over JSON field values.

use super::{JsonPathSelector, SelectorKind};
use crate::error::{PredicateError, Result};
use serde_json::Value;
use serde_json_path::JsonPath;
use tracing::{trace, warn};

#[derive(Debug)]
pub struct CompiledJsonPath {
    path: JsonPath,
    case_sensitive: bool,
}

impl CompiledJsonPath {
    pub fn compile(directive: &JsonPathSelector, case_sensitive: bool) -> Result<Self> {
        let source = if case_sensitive {
            directive.selector.clone()
        } else {
            directive.selector.to_lowercase()
        };
        let path = JsonPath::parse(&source).map_err(|_| PredicateError::SelectorSyntax {
            kind: SelectorKind::JsonPath,
            selector: directive.selector.clone(),
        })?;
        Ok(Self {
            path,
            case_sensitive,
        })
    }

    /// Query `text` as JSON. A single match is returned as-is, several as an array.
    pub fn select(&self, text: &str) -> Option<Value> {
        let parsed = if self.case_sensitive {
            serde_json::from_str::<Value>(text)
        } else {
            serde_json::from_str::<Value>(&text.to_lowercase())
        };
        let document = match parsed {
            Ok(document) => document,
            Err(_) => {
                warn!("jsonpath predicate applied to a value that is not valid JSON");
                return None;
            }
        };

        let mut matches: Vec<Value> = self
            .path
            .query(&document)
            .all()
            .into_iter()
            .cloned()
            .collect();
        trace!("jsonpath selected {} value(s)", matches.len());
        match matches.len() {
            0 => None,
            1 => matches.pop(),
            _ => Some(Value::Array(matches)),
        }
    }
}
