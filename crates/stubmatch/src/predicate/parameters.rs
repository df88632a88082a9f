//! Predicate parameters that modify how values are resolved and compared.

use crate::error::{PredicateError, Result};
use crate::selector::{JsonPathSelector, Selector, XPathSelector};
use serde::{Deserialize, Serialize};

/// Modifier keys that may sit next to an operator key.
///
/// None of these change which operator runs, only how the compared values
/// are resolved and normalized.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PredicateParameters {
    /// Whether matching is case-sensitive (default: false, as in Mountebank)
    #[serde(default, skip_serializing_if = "is_false")]
    pub case_sensitive: bool,

    /// Whether field names are matched case-sensitively (defaults to `case_sensitive`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_case_sensitive: Option<bool>,

    /// Regex pattern stripped from both sides before comparing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<XPathSelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonpath: Option<JsonPathSelector>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl PredicateParameters {
    pub fn key_case_sensitive(&self) -> bool {
        self.key_case_sensitive.unwrap_or(self.case_sensitive)
    }

    /// The `except` pattern, ignoring an empty string.
    pub fn except(&self) -> Option<&str> {
        self.except.as_deref().filter(|pattern| !pattern.is_empty())
    }

    pub fn selector(&self) -> Option<Selector<'_>> {
        match (&self.xpath, &self.jsonpath) {
            (Some(xpath), _) => Some(Selector::XPath(xpath)),
            (None, Some(jsonpath)) => Some(Selector::JsonPath(jsonpath)),
            (None, None) => None,
        }
    }

    pub fn is_default(&self) -> bool {
        self == &PredicateParameters::default()
    }

    /// Reject parameter combinations that can never be evaluated.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.xpath.is_some() && self.jsonpath.is_some() {
            return Err(PredicateError::invalid(
                "a predicate may use either xpath or jsonpath, not both",
            ));
        }
        if let Some(pattern) = self.except() {
            regex::Regex::new(pattern).map_err(|e| {
                PredicateError::invalid(format!("invalid except pattern {pattern:?}: {e}"))
            })?;
        }
        Ok(())
    }
}
