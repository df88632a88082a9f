//! Field resolution: from a field name (and optional selector) to the raw
//! value(s) a predicate compares against.

use crate::encoding::Encoding;
use crate::error::Result;
use crate::request::lookup;
use crate::selector::CompiledSelector;
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::trace;

/// Resolves request fields for one leaf predicate.
///
/// Repeated fields come back as arrays, unreduced; deciding whether any or all
/// elements must match is the operator's job.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolver<'s> {
    selector: Option<&'s CompiledSelector>,
    key_case_sensitive: bool,
    encoding: Encoding,
}

impl<'s> FieldResolver<'s> {
    pub fn new(
        selector: Option<&'s CompiledSelector>,
        key_case_sensitive: bool,
        encoding: Encoding,
    ) -> Self {
        Self {
            selector,
            key_case_sensitive,
            encoding,
        }
    }

    /// Resolve a field of `container` all the way to a comparable value,
    /// applying the selector when one is configured.
    pub fn resolve<'r>(
        &self,
        container: &'r Map<String, Value>,
        name: &str,
    ) -> Result<Option<Cow<'r, Value>>> {
        self.select(self.field(container, name).map(Cow::Borrowed))
    }

    /// Plain lookup by name or dotted path; no selector.
    pub fn field<'r>(&self, container: &'r Map<String, Value>, name: &str) -> Option<&'r Value> {
        lookup(container, name, self.key_case_sensitive)
    }

    /// Apply the selector to a resolved value.
    ///
    /// Selectors only read text: any other value, or text that is not a
    /// well-formed document, resolves to nothing.
    pub fn select<'a>(&self, actual: Option<Cow<'a, Value>>) -> Result<Option<Cow<'a, Value>>> {
        let Some(selector) = self.selector else {
            return Ok(actual);
        };
        match actual.as_deref() {
            Some(Value::String(text)) => Ok(selector.select(text)?.map(Cow::Owned)),
            _ => Ok(None),
        }
    }

    /// View a resolved value as a map of sub-fields.
    ///
    /// In text mode a string holding a JSON object is parsed, so predicates can
    /// reach into JSON bodies.
    pub fn object<'a>(&self, actual: Option<Cow<'a, Value>>) -> Option<Cow<'a, Map<String, Value>>> {
        match actual? {
            Cow::Borrowed(Value::Object(map)) => Some(Cow::Borrowed(map)),
            Cow::Owned(Value::Object(map)) => Some(Cow::Owned(map)),
            Cow::Borrowed(Value::String(text)) => self.parse_object(text).map(Cow::Owned),
            Cow::Owned(Value::String(text)) => self.parse_object(&text).map(Cow::Owned),
            _ => None,
        }
    }

    fn parse_object(&self, text: &str) -> Option<Map<String, Value>> {
        if self.encoding.is_binary() {
            return None;
        }
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Some(map),
            _ => {
                trace!("field is not a JSON object; nested expectation cannot match");
                None
            }
        }
    }
}
