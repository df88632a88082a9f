//! Value normalization applied before every comparison.
//!
//! Text mode strips the `except` pattern and folds case. Binary mode decodes
//! base64 and leaves the bytes untouched. Numbers and booleans are never
//! rewritten.

use crate::encoding::Encoding;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

/// A scalar ready for direct comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Text(String),
    Bytes(Vec<u8>),
    Number(f64),
    Bool(bool),
    Null,
}

impl Operand {
    /// Text form used when a native scalar meets a string.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Operand::Text(text) => Some(Cow::Borrowed(text)),
            Operand::Number(n) => Some(Cow::Owned(format_number(*n))),
            Operand::Bool(b) => Some(Cow::Owned(b.to_string())),
            Operand::Null => Some(Cow::Borrowed("null")),
            Operand::Bytes(_) => None,
        }
    }
}

/// Raw text of a scalar request value, before any normalization.
pub fn scalar_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(text) => Some(Cow::Borrowed(text)),
        Value::Number(n) => n.as_f64().map(|n| Cow::Owned(format_number(n))),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Null => Some(Cow::Borrowed("null")),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Format a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Normalization settings for one predicate.
#[derive(Debug, Clone)]
pub struct Normalizer {
    encoding: Encoding,
    case_sensitive: bool,
    except: Option<Arc<Regex>>,
}

impl Normalizer {
    /// `except` must already be compiled with the predicate's case flag.
    pub fn new(encoding: Encoding, case_sensitive: bool, except: Option<Arc<Regex>>) -> Self {
        Self {
            encoding,
            case_sensitive,
            except,
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Normalize a scalar. Arrays and objects are not scalars and yield `None`,
    /// as does a string that is not valid base64 in binary mode.
    pub fn normalize(&self, value: &Value) -> Option<Operand> {
        match value {
            Value::String(text) => self.text(text),
            Value::Number(n) => n.as_f64().map(Operand::Number),
            Value::Bool(b) => Some(Operand::Bool(*b)),
            Value::Null => Some(Operand::Null),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn text(&self, text: &str) -> Option<Operand> {
        if self.encoding.is_binary() {
            return STANDARD.decode(text).ok().map(Operand::Bytes);
        }
        let stripped = self.strip(text);
        if self.case_sensitive {
            Some(Operand::Text(stripped.into_owned()))
        } else {
            Some(Operand::Text(stripped.to_lowercase()))
        }
    }

    /// Remove every `except` match. Used on its own for `matches`, where the
    /// regex handles case folding.
    pub fn strip<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match &self.except {
            Some(except) if !self.encoding.is_binary() => except.replace_all(text, ""),
            _ => Cow::Borrowed(text),
        }
    }

    /// Decode a base64 string in binary mode.
    pub fn decode(&self, text: &str) -> Option<Vec<u8>> {
        STANDARD.decode(text).ok()
    }
}
