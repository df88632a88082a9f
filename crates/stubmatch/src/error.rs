//! Typed failures raised by predicate construction and evaluation.
//!
//! Only configuration problems are errors. Anything that merely fails to match
//! (absent fields, non-XML bodies, empty selections) is reported as `false`.

use crate::selector::SelectorKind;

/// Error code shared by every predicate failure, mirroring Mountebank's `code`.
pub const BAD_DATA: &str = "bad data";

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The stub definition itself is invalid.
    BadData,
}

impl ErrorKind {
    /// Wire code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::BadData => BAD_DATA,
        }
    }
}

/// Failure raised while building or evaluating a predicate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredicateError {
    /// A text selector was combined with base64 encoding.
    #[error("the {kind} predicate parameter is not allowed in binary mode")]
    UnsupportedInBinaryMode { kind: SelectorKind },

    /// The selector expression could not be compiled.
    #[error("malformed {kind} predicate selector")]
    SelectorSyntax { kind: SelectorKind, selector: String },

    /// The predicate definition is structurally invalid.
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),
}

impl PredicateError {
    pub fn invalid(message: impl Into<String>) -> Self {
        PredicateError::InvalidPredicate(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::BadData
    }

    /// Mountebank-style error code (always `"bad data"`).
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// The offending selector text, when the failure came from one.
    pub fn source_text(&self) -> Option<&str> {
        match self {
            PredicateError::SelectorSyntax { selector, .. } => Some(selector),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PredicateError>;
