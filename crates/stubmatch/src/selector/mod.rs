//! Selector directives that extract sub-values from structured text fields.
//!
//! Two directives are supported, mirroring Mountebank's predicate parameters:
//! - `xpath` - XML documents, with namespace aliasing
//! - `jsonpath` - JSON documents (RFC 9535)
//!
//! A directive is compiled once per evaluation and then applied to every field
//! value the predicate compares.

mod jsonpath;
mod xpath;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use jsonpath::CompiledJsonPath;
pub use xpath::CompiledXPath;

/// Which selector directive a failure or guard refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    XPath,
    JsonPath,
}

impl SelectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorKind::XPath => "xpath",
            SelectorKind::JsonPath => "jsonpath",
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `xpath` predicate parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct XPathSelector {
    pub selector: String,

    /// Alias -> namespace URI. Aliases are arbitrary; binding happens by URI.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ns: BTreeMap<String, String>,
}

impl XPathSelector {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ns: BTreeMap::new(),
        }
    }

    pub fn with_namespace(mut self, alias: impl Into<String>, uri: impl Into<String>) -> Self {
        self.ns.insert(alias.into(), uri.into());
        self
    }
}

/// `jsonpath` predicate parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JsonPathSelector {
    pub selector: String,
}

/// Borrowed view of whichever directive a predicate carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    XPath(&'a XPathSelector),
    JsonPath(&'a JsonPathSelector),
}

impl Selector<'_> {
    pub fn kind(&self) -> SelectorKind {
        match self {
            Selector::XPath(_) => SelectorKind::XPath,
            Selector::JsonPath(_) => SelectorKind::JsonPath,
        }
    }

    /// Compile the directive for one evaluation.
    ///
    /// Tag, attribute and key names are matched case-insensitively unless
    /// `case_sensitive` is set.
    pub fn compile(&self, case_sensitive: bool) -> Result<CompiledSelector> {
        match self {
            Selector::XPath(directive) => Ok(CompiledSelector::XPath(CompiledXPath::compile(
                directive,
                case_sensitive,
            )?)),
            Selector::JsonPath(directive) => Ok(CompiledSelector::JsonPath(
                CompiledJsonPath::compile(directive, case_sensitive)?,
            )),
        }
    }
}

/// A directive ready to run against field text.
#[derive(Debug)]
pub enum CompiledSelector {
    XPath(CompiledXPath),
    JsonPath(CompiledJsonPath),
}

impl CompiledSelector {
    /// Apply the selector to a field's text.
    ///
    /// Returns `None` when the text is not a well-formed document or nothing was
    /// selected. Node selections come back as an array of strings in document
    /// order; aggregate functions come back as a number, boolean or string.
    pub fn select(&self, text: &str) -> Result<Option<Value>> {
        match self {
            CompiledSelector::XPath(xpath) => xpath.select(text),
            CompiledSelector::JsonPath(jsonpath) => Ok(jsonpath.select(text)),
        }
    }

    pub fn kind(&self) -> SelectorKind {
        match self {
            CompiledSelector::XPath(_) => SelectorKind::XPath,
            CompiledSelector::JsonPath(_) => SelectorKind::JsonPath,
        }
    }
}
