//! Predicate evaluation.
//!
//! `Engine::evaluate` runs in two passes. The first walks the predicate tree,
//! rejects selectors in binary mode and compiles every selector, so
//! configuration errors surface before any request field is read and
//! regardless of which branch short-circuits. The second pass resolves fields
//! and applies the operators.

use crate::cache::PatternCache;
use crate::config::EngineConfig;
use crate::encoding::Encoding;
use crate::error::{PredicateError, Result};
use crate::normalize::{scalar_text, Normalizer};
use crate::operators::{self, Comparison};
use crate::predicate::{FieldSpec, Operator, Predicate, PredicateParameters};
use crate::request::Request;
use crate::resolver::FieldResolver;
use crate::selector::CompiledSelector;
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::{debug, trace, warn};

/// Evaluates predicates against requests.
///
/// An engine is cheap to share: evaluation takes `&self` and the only mutable
/// state is the pattern cache, which is internally locked.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    cache: PatternCache,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = PatternCache::new(config.pattern_cache.clone());
        Self { config, cache }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &PatternCache {
        &self.cache
    }

    /// Decide whether `request` satisfies `predicate`.
    ///
    /// Errors only for configuration problems: a selector used in binary mode,
    /// or a selector that cannot be compiled or evaluated. A non-match is
    /// never an error.
    pub fn evaluate(
        &self,
        predicate: &Predicate,
        request: &Request,
        encoding: Encoding,
    ) -> Result<bool> {
        debug!(
            operator = predicate.operator().name(),
            %encoding,
            "Evaluating predicate"
        );
        let prepared = Prepared::new(predicate, encoding)?;
        let verdict = self.run(&prepared, request.fields(), encoding)?;
        debug!(operator = predicate.operator().name(), verdict, "Predicate evaluated");
        Ok(verdict)
    }

    /// Evaluate with the configured default encoding.
    pub fn evaluate_default(&self, predicate: &Predicate, request: &Request) -> Result<bool> {
        self.evaluate(predicate, request, self.config.default_encoding)
    }

    /// Evaluate a stub's predicate list: every predicate must match, and an
    /// empty list matches any request.
    pub fn evaluate_all(
        &self,
        predicates: &[Predicate],
        request: &Request,
        encoding: Encoding,
    ) -> Result<bool> {
        let prepared = predicates
            .iter()
            .map(|predicate| Prepared::new(predicate, encoding))
            .collect::<Result<Vec<_>>>()?;
        for (index, predicate) in prepared.iter().enumerate() {
            if !self.run(predicate, request.fields(), encoding)? {
                debug!(index, total = predicates.len(), "Stub predicate did not match");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn run(
        &self,
        prepared: &Prepared<'_>,
        request: &Map<String, Value>,
        encoding: Encoding,
    ) -> Result<bool> {
        let predicate = prepared.predicate;
        if let Some((comparison, fields)) = predicate.operator().leaf() {
            let Some(leaf) = Leaf::new(
                self,
                comparison,
                predicate.parameters(),
                prepared.selector.as_ref(),
                encoding,
            ) else {
                return Ok(false);
            };
            return leaf.fields(fields, request);
        }

        match predicate.operator() {
            // `not` always has exactly one child
            Operator::Not(_) => Ok(!self.all(&prepared.children, request, encoding)?),
            Operator::Or(_) => {
                for child in &prepared.children {
                    if self.run(child, request, encoding)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => self.all(&prepared.children, request, encoding),
        }
    }

    fn all(
        &self,
        children: &[Prepared<'_>],
        request: &Map<String, Value>,
        encoding: Encoding,
    ) -> Result<bool> {
        for child in children {
            if !self.run(child, request, encoding)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A predicate whose selectors have been checked and compiled.
struct Prepared<'p> {
    predicate: &'p Predicate,
    selector: Option<CompiledSelector>,
    children: Vec<Prepared<'p>>,
}

impl<'p> Prepared<'p> {
    fn new(predicate: &'p Predicate, encoding: Encoding) -> Result<Self> {
        let parameters = predicate.parameters();
        let selector = match parameters.selector() {
            Some(selector) if encoding.is_binary() => {
                return Err(PredicateError::UnsupportedInBinaryMode {
                    kind: selector.kind(),
                });
            }
            Some(selector) => Some(selector.compile(parameters.case_sensitive)?),
            None => None,
        };
        let children = predicate
            .operator()
            .children()
            .iter()
            .map(|child| Prepared::new(child, encoding))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            predicate,
            selector,
            children,
        })
    }
}

/// Evaluation state for one leaf operator.
struct Leaf<'e> {
    cache: &'e PatternCache,
    comparison: Comparison,
    case_sensitive: bool,
    resolver: FieldResolver<'e>,
    normalizer: Normalizer,
}

impl<'e> Leaf<'e> {
    /// Returns `None` when the `except` pattern does not compile; like a bad
    /// `matches` pattern, that makes the leaf a non-match.
    fn new(
        engine: &'e Engine,
        comparison: Comparison,
        parameters: &PredicateParameters,
        selector: Option<&'e CompiledSelector>,
        encoding: Encoding,
    ) -> Option<Self> {
        let case_sensitive = parameters.case_sensitive;
        let except = match parameters.except() {
            Some(pattern) if !encoding.is_binary() => {
                match engine.cache.text(pattern, case_sensitive) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("Invalid except pattern {:?}: {}", pattern, e);
                        return None;
                    }
                }
            }
            _ => None,
        };
        Some(Self {
            cache: &engine.cache,
            comparison,
            case_sensitive,
            resolver: FieldResolver::new(selector, parameters.key_case_sensitive(), encoding),
            normalizer: Normalizer::new(encoding, case_sensitive, except),
        })
    }

    /// Every declared field must be satisfied.
    fn fields(&self, fields: &FieldSpec, container: &Map<String, Value>) -> Result<bool> {
        for (name, expected) in fields {
            let actual = self.resolver.field(container, name).map(Cow::Borrowed);
            let verdict = self.compare(expected, actual, true)?;
            trace!(field = %name, comparison = ?self.comparison, verdict, "Compared field");
            if !verdict {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `select` is cleared once the selector has been applied, so elements of
    /// a selected sequence are not selected again.
    fn compare(&self, expected: &Value, actual: Option<Cow<'_, Value>>, select: bool) -> Result<bool> {
        if let Value::Object(expected) = expected {
            return self.object(expected, actual, select);
        }
        let actual = if select {
            self.resolver.select(actual)?
        } else {
            actual
        };
        let actual = actual.as_deref();
        if self.comparison == Comparison::Exists {
            return Ok(operators::exists(expected, actual));
        }
        match expected {
            Value::Array(expected) => self.sequence(expected, actual),
            scalar => Ok(self.scalar(scalar, actual)),
        }
    }

    /// Nested field spec: recurse into sub-fields of an object, or of a JSON
    /// object held in a string.
    fn object(
        &self,
        expected: &Map<String, Value>,
        actual: Option<Cow<'_, Value>>,
        select: bool,
    ) -> Result<bool> {
        let actual = self.resolver.object(actual);
        match &actual {
            None if self.comparison != Comparison::Exists => return Ok(false),
            Some(actual) if self.comparison.is_strict() && actual.len() != expected.len() => {
                return Ok(false)
            }
            _ => {}
        }
        for (name, expected) in expected {
            // a missing parent resolves every child as absent
            let child = actual
                .as_deref()
                .and_then(|actual| self.resolver.field(actual, name))
                .map(Cow::Borrowed);
            if !self.compare(expected, child, select)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Expected sequence: `deepEquals` wants the same multiset, the other
    /// operators want every expected element matched by some actual element.
    fn sequence(&self, expected: &[Value], actual: Option<&Value>) -> Result<bool> {
        let actual = match actual {
            Some(Value::Array(items)) => items.as_slice(),
            Some(single) => std::slice::from_ref(single),
            None => return Ok(false),
        };

        let mut failure = None;
        let test = |actual: &Value, expected: &Value| {
            match self.compare(expected, Some(Cow::Borrowed(actual)), false) {
                Ok(verdict) => verdict,
                Err(err) => {
                    failure.get_or_insert(err);
                    false
                }
            }
        };
        let verdict = if self.comparison.is_strict() {
            operators::multiset_equals(actual, expected, test)
        } else {
            operators::contains_all(actual, expected, test)
        };
        match failure {
            Some(err) => Err(err),
            None => Ok(verdict),
        }
    }

    /// Scalar expectation. A sequence of actual values matches when any
    /// element does; `deepEquals` additionally requires exactly one element.
    fn scalar(&self, expected: &Value, actual: Option<&Value>) -> bool {
        match actual {
            None | Some(Value::Object(_)) => false,
            Some(Value::Array(items)) if self.comparison.is_strict() => {
                items.len() == 1 && self.scalar(expected, items.first())
            }
            Some(Value::Array(items)) => {
                operators::any_of(items, |item| self.scalar(expected, Some(item)))
            }
            Some(actual) if self.comparison == Comparison::Matches => {
                self.matches(expected, actual)
            }
            Some(actual) => match (
                self.normalizer.normalize(actual),
                self.normalizer.normalize(expected),
            ) {
                (Some(actual), Some(expected)) => self.comparison.compare(&actual, &expected),
                _ => false,
            },
        }
    }

    /// `matches`: the expected value is a regex. Text mode strips `except`
    /// from the actual value and lets the regex flag handle case; binary mode
    /// runs the pattern over the decoded bytes.
    fn matches(&self, pattern: &Value, actual: &Value) -> bool {
        let Some(pattern) = scalar_text(pattern) else {
            return false;
        };

        if self.normalizer.encoding().is_binary() {
            let Some(bytes) = actual.as_str().and_then(|text| self.normalizer.decode(text)) else {
                return false;
            };
            return match self.cache.bytes(&pattern, true) {
                Ok(re) => re.is_match(&bytes),
                Err(e) => {
                    warn!("Invalid matches pattern {:?}: {}", pattern, e);
                    false
                }
            };
        }

        let Some(text) = scalar_text(actual) else {
            return false;
        };
        match self.cache.text(&pattern, self.case_sensitive) {
            Ok(re) => re.is_match(&self.normalizer.strip(&text)),
            Err(e) => {
                warn!("Invalid matches pattern {:?}: {}", pattern, e);
                false
            }
        }
    }
}
