//! Operator evaluators.
//!
//! Each evaluator is a pure function over normalized values. Multi-valued
//! actuals are handled by the helpers at the bottom of this module:
//! existential for scalar expectations, containment for `equals` sequences and
//! exact multiset equality for `deepEquals` sequences.

use crate::normalize::Operand;
use serde_json::Value;

/// Leaf comparison selected by the predicate's operator key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equals,
    DeepEquals,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Exists,
}

impl Comparison {
    /// `deepEquals` rejects surplus keys and surplus sequence elements.
    pub fn is_strict(&self) -> bool {
        matches!(self, Comparison::DeepEquals)
    }

    fn is_equality(&self) -> bool {
        matches!(self, Comparison::Equals | Comparison::DeepEquals)
    }

    /// Compare two normalized scalars.
    ///
    /// `Matches` and `Exists` never reach this function; they need the raw
    /// pattern and the resolution outcome respectively.
    pub fn compare(&self, actual: &Operand, expected: &Operand) -> bool {
        match (actual, expected) {
            (Operand::Bytes(actual), Operand::Bytes(expected)) => self.bytes(actual, expected),
            (Operand::Bytes(_), _) | (_, Operand::Bytes(_)) => false,
            (Operand::Number(actual), Operand::Number(expected)) if self.is_equality() => {
                actual == expected
            }
            (Operand::Bool(actual), Operand::Bool(expected)) if self.is_equality() => {
                actual == expected
            }
            (Operand::Null, Operand::Null) if self.is_equality() => true,
            _ => match (actual.as_text(), expected.as_text()) {
                (Some(actual), Some(expected)) => self.text(&actual, &expected),
                _ => false,
            },
        }
    }

    fn text(&self, actual: &str, expected: &str) -> bool {
        match self {
            Comparison::Equals | Comparison::DeepEquals => actual == expected,
            Comparison::Contains => actual.contains(expected),
            Comparison::StartsWith => actual.starts_with(expected),
            Comparison::EndsWith => actual.ends_with(expected),
            Comparison::Matches | Comparison::Exists => false,
        }
    }

    fn bytes(&self, actual: &[u8], expected: &[u8]) -> bool {
        match self {
            Comparison::Equals | Comparison::DeepEquals => actual == expected,
            Comparison::Contains => {
                expected.is_empty() || actual.windows(expected.len()).any(|w| w == expected)
            }
            Comparison::StartsWith => actual.starts_with(expected),
            Comparison::EndsWith => actual.ends_with(expected),
            Comparison::Matches | Comparison::Exists => false,
        }
    }
}

/// Whether a resolved value counts as present for `exists`.
///
/// Empty strings and nulls are absent; a non-empty selection is present even
/// when every selected node is empty.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(_) => true,
    }
}

/// `exists` verdict: the expected flag must agree with presence.
pub fn exists(expected: &Value, actual: Option<&Value>) -> bool {
    let should_exist = match expected {
        Value::Bool(flag) => *flag,
        Value::String(flag) => !flag.eq_ignore_ascii_case("false"),
        _ => true,
    };
    should_exist == is_present(actual)
}

/// True iff at least one actual element satisfies `test`.
pub fn any_of<A, F>(actual: &[A], mut test: F) -> bool
where
    F: FnMut(&A) -> bool,
{
    actual.iter().any(|item| test(item))
}

/// True iff every expected element is satisfied by some actual element.
/// Order and surplus actual elements are ignored.
pub fn contains_all<A, E, F>(actual: &[A], expected: &[E], mut test: F) -> bool
where
    F: FnMut(&A, &E) -> bool,
{
    expected
        .iter()
        .all(|expected| actual.iter().any(|actual| test(actual, expected)))
}

/// Order-insensitive multiset equality: same cardinality, and every expected
/// element pairs with a distinct actual element.
pub fn multiset_equals<A, E, F>(actual: &[A], expected: &[E], mut test: F) -> bool
where
    F: FnMut(&A, &E) -> bool,
{
    if actual.len() != expected.len() {
        return false;
    }
    let mut used = vec![false; actual.len()];
    expected.iter().all(|expected| {
        let slot = actual
            .iter()
            .enumerate()
            .position(|(index, actual)| !used[index] && test(actual, expected));
        match slot {
            Some(index) => {
                used[index] = true;
                true
            }
            None => false,
        }
    })
}
