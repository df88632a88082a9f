//! Mountebank-compatible predicate definitions.
//!
//! A predicate is a JSON object with exactly one operator key and any number
//! of parameter keys:
//!
//! ```json
//! { "endsWith": { "query": { "key": "gin" } }, "caseSensitive": true }
//! ```
//!
//! Leaf operators (`equals`, `deepEquals`, `contains`, `startsWith`,
//! `endsWith`, `matches`, `exists`) carry a field spec. The logical operators
//! nest whole predicates: `not` takes one predicate object, `or` and `and` take
//! an array of predicate objects.
//!
//! Predicates are validated when they are built, so an unknown operator or a
//! bad regex is rejected at stub registration rather than on live traffic.

mod parameters;

use crate::error::{PredicateError, Result};
use crate::operators::Comparison;
use crate::request::type_name;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub use parameters::PredicateParameters;

/// Field name -> expected value(s) under a leaf operator.
pub type FieldSpec = Map<String, Value>;

const PARAMETER_KEYS: [&str; 5] = [
    "caseSensitive",
    "keyCaseSensitive",
    "except",
    "xpath",
    "jsonpath",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Equals(FieldSpec),
    DeepEquals(FieldSpec),
    Contains(FieldSpec),
    StartsWith(FieldSpec),
    EndsWith(FieldSpec),
    Matches(FieldSpec),
    Exists(FieldSpec),
    Not(Box<Predicate>),
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
}

impl Operator {
    /// Wire name of the operator key.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Equals(_) => "equals",
            Operator::DeepEquals(_) => "deepEquals",
            Operator::Contains(_) => "contains",
            Operator::StartsWith(_) => "startsWith",
            Operator::EndsWith(_) => "endsWith",
            Operator::Matches(_) => "matches",
            Operator::Exists(_) => "exists",
            Operator::Not(_) => "not",
            Operator::Or(_) => "or",
            Operator::And(_) => "and",
        }
    }

    /// The comparison and field spec of a leaf operator.
    pub fn leaf(&self) -> Option<(Comparison, &FieldSpec)> {
        match self {
            Operator::Equals(fields) => Some((Comparison::Equals, fields)),
            Operator::DeepEquals(fields) => Some((Comparison::DeepEquals, fields)),
            Operator::Contains(fields) => Some((Comparison::Contains, fields)),
            Operator::StartsWith(fields) => Some((Comparison::StartsWith, fields)),
            Operator::EndsWith(fields) => Some((Comparison::EndsWith, fields)),
            Operator::Matches(fields) => Some((Comparison::Matches, fields)),
            Operator::Exists(fields) => Some((Comparison::Exists, fields)),
            Operator::Not(_) | Operator::Or(_) | Operator::And(_) => None,
        }
    }

    /// Nested predicates of a logical operator.
    pub fn children(&self) -> &[Predicate] {
        match self {
            Operator::Not(inner) => std::slice::from_ref(inner.as_ref()),
            Operator::Or(children) | Operator::And(children) => children,
            _ => &[],
        }
    }

    fn parse(name: &str, value: &Value) -> Result<Self> {
        let fields = || -> Result<FieldSpec> {
            match value {
                Value::Object(fields) => Ok(fields.clone()),
                other => Err(PredicateError::invalid(format!(
                    "{name} predicate must be an object, got {}",
                    type_name(other)
                ))),
            }
        };
        let list = || -> Result<Vec<Predicate>> {
            match value {
                Value::Array(items) => items.iter().map(Predicate::from_json).collect(),
                other => Err(PredicateError::invalid(format!(
                    "{name} predicate must be an array of predicates, got {}",
                    type_name(other)
                ))),
            }
        };

        match name {
            "equals" => Ok(Operator::Equals(fields()?)),
            "deepEquals" => Ok(Operator::DeepEquals(fields()?)),
            "contains" => Ok(Operator::Contains(fields()?)),
            "startsWith" => Ok(Operator::StartsWith(fields()?)),
            "endsWith" => Ok(Operator::EndsWith(fields()?)),
            "matches" => {
                let fields = fields()?;
                validate_patterns(&fields)?;
                Ok(Operator::Matches(fields))
            }
            "exists" => Ok(Operator::Exists(fields()?)),
            "not" => Ok(Operator::Not(Box::new(Predicate::from_json(value)?))),
            "or" => Ok(Operator::Or(list()?)),
            "and" => Ok(Operator::And(list()?)),
            other => Err(PredicateError::invalid(format!(
                "unknown predicate operator: {other}"
            ))),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Operator::Equals(fields)
            | Operator::DeepEquals(fields)
            | Operator::Contains(fields)
            | Operator::StartsWith(fields)
            | Operator::EndsWith(fields)
            | Operator::Matches(fields)
            | Operator::Exists(fields) => Value::Object(fields.clone()),
            Operator::Not(inner) => inner.to_json(),
            Operator::Or(children) | Operator::And(children) => {
                Value::Array(children.iter().map(Predicate::to_json).collect())
            }
        }
    }
}

/// Every string under a `matches` field spec must be a valid regex.
fn validate_patterns(fields: &FieldSpec) -> Result<()> {
    fn walk(value: &Value) -> Result<()> {
        match value {
            Value::String(pattern) => regex::Regex::new(pattern).map(|_| ()).map_err(|e| {
                PredicateError::invalid(format!("invalid matches pattern {pattern:?}: {e}"))
            }),
            Value::Array(items) => items.iter().try_for_each(walk),
            Value::Object(map) => map.values().try_for_each(walk),
            _ => Ok(()),
        }
    }
    fields.values().try_for_each(walk)
}

/// A single stub predicate.
///
/// Every constructor validates, so a `Predicate` never carries a regex that
/// fails to compile or parameters its operator cannot take.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    operator: Operator,
    parameters: PredicateParameters,
}

impl Predicate {
    pub fn new(operator: Operator) -> Result<Self> {
        if let Operator::Matches(fields) = &operator {
            validate_patterns(fields)?;
        }
        Ok(Self {
            operator,
            parameters: PredicateParameters::default(),
        })
    }

    pub fn with_parameters(self, parameters: PredicateParameters) -> Result<Self> {
        Self::assemble(self.operator, parameters)
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn parameters(&self) -> &PredicateParameters {
        &self.parameters
    }

    fn assemble(operator: Operator, parameters: PredicateParameters) -> Result<Self> {
        parameters.validate()?;
        if operator.leaf().is_none() && !parameters.is_default() {
            return Err(PredicateError::invalid(format!(
                "the {} operator does not take parameters; put them on the nested predicates",
                operator.name()
            )));
        }
        Ok(Self {
            operator,
            parameters,
        })
    }

    /// Parse and validate a predicate from its JSON definition.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            PredicateError::invalid(format!(
                "predicate must be an object, got {}",
                type_name(value)
            ))
        })?;

        let mut operator: Option<Operator> = None;
        let mut parameters = Map::new();
        for (key, value) in object {
            if PARAMETER_KEYS.contains(&key.as_str()) {
                parameters.insert(key.clone(), value.clone());
                continue;
            }
            if let Some(existing) = &operator {
                return Err(PredicateError::invalid(format!(
                    "predicate has more than one operator: {} and {key}",
                    existing.name()
                )));
            }
            operator = Some(Operator::parse(key, value)?);
        }

        let operator = operator.ok_or_else(|| {
            PredicateError::invalid(
                "predicate has no operator; use one of: equals, deepEquals, contains, \
                 startsWith, endsWith, matches, exists, not, or, and",
            )
        })?;

        let parameters: PredicateParameters = serde_json::from_value(Value::Object(parameters))
            .map_err(|e| PredicateError::invalid(format!("invalid predicate parameters: {e}")))?;
        Self::assemble(operator, parameters)
    }

    /// Serialize back to the Mountebank wire shape.
    pub fn to_json(&self) -> Value {
        let mut object = match serde_json::to_value(&self.parameters) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        object.insert(self.operator.name().to_string(), self.operator.to_json());
        Value::Object(object)
    }
}

impl TryFrom<Value> for Predicate {
    type Error = PredicateError;

    fn try_from(value: Value) -> Result<Self> {
        Predicate::from_json(&value)
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Predicate::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Predicate {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}
