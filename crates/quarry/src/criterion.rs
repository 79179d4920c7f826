//! Single filter conditions.
//!
//! A [`Criterion`] is an `(attribute, operator, operand)` triple. A list of
//! criteria is read as a conjunction.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{QueryError, Result};
use crate::operator::Operator;
use crate::record::{read, Record};
use crate::value::Value;

/// A single filter condition.
///
/// Equality is structural over the triple. On the wire a criterion is the
/// 3-element array `[attribute, operator, operand]`.
///
/// # Example
///
/// ```
/// use quarry::{Criterion, Operator, Value};
///
/// let criterion = Criterion::new("title", Operator::Equal, "A Wizard of Earthsea");
/// assert!(criterion.matches_value(&Value::from("A Wizard of Earthsea")));
/// ```
#[derive(Debug, Clone)]
pub struct Criterion {
    attribute: String,
    operator: Operator,
    operand: Value,
    pattern: OnceCell<Option<Regex>>,
}

impl Criterion {
    /// Creates a new criterion.
    pub fn new(attribute: impl Into<String>, operator: Operator, operand: impl Into<Value>) -> Self {
        Criterion {
            attribute: attribute.into(),
            operator,
            operand: operand.into(),
            pattern: OnceCell::new(),
        }
    }

    /// The attribute name this criterion reads.
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The comparison operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The value compared against.
    pub fn operand(&self) -> &Value {
        &self.operand
    }

    /// Checks that the criterion can be evaluated.
    ///
    /// The attribute must be non-blank, `one_of`/`not_one_of` need a list
    /// operand and `matches` needs a pattern that compiles.
    pub fn validate(&self) -> Result<()> {
        if self.attribute.trim().is_empty() {
            return Err(QueryError::invalid_criteria("attribute name can't be blank"));
        }

        match self.operator {
            Operator::OneOf | Operator::NotOneOf if !self.operand.is_list() => {
                Err(QueryError::invalid_criteria(format!(
                    "operator `{}` expects a list operand, got {}",
                    self.operator,
                    self.operand.type_name()
                )))
            }
            Operator::Matches => match &self.operand {
                Value::String(pattern) => {
                    let regex = Regex::new(pattern)?;
                    let _ = self.pattern.set(Some(regex));
                    Ok(())
                }
                other => Err(QueryError::invalid_criteria(format!(
                    "operator `matches` expects a string pattern, got {}",
                    other.type_name()
                ))),
            },
            _ => Ok(()),
        }
    }

    /// Returns a copy with the operator replaced by its complement.
    pub fn inverted(&self) -> Result<Criterion> {
        Ok(Criterion::new(
            self.attribute.clone(),
            self.operator.invert()?,
            self.operand.clone(),
        ))
    }

    /// Evaluates this criterion against a record.
    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> bool {
        self.matches_value(read(record, &self.attribute))
    }

    /// Evaluates the complement of this criterion against a record.
    ///
    /// Uses the inverse operator when there is one, otherwise negates the
    /// match.
    pub fn matches_inverted<R: Record + ?Sized>(&self, record: &R) -> bool {
        let value = read(record, &self.attribute);
        match self.operator.inverse() {
            Some(inverse) => self.evaluate(inverse, value),
            None => !self.evaluate(self.operator, value),
        }
    }

    /// Evaluates this criterion against an attribute value.
    pub fn matches_value(&self, value: &Value) -> bool {
        self.evaluate(self.operator, value)
    }

    fn evaluate(&self, operator: Operator, value: &Value) -> bool {
        match operator {
            Operator::Equal => value.loose_eq(&self.operand),
            Operator::NotEqual => !value.loose_eq(&self.operand),
            Operator::GreaterThan
            | Operator::GreaterThanOrEqualTo
            | Operator::LessThan
            | Operator::LessThanOrEqualTo => operator.eval_ordering(value.total_cmp(&self.operand)),
            Operator::OneOf => self.one_of(value),
            Operator::NotOneOf => !self.one_of(value),
            Operator::Contains => match (value, &self.operand) {
                (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
                (Value::List(items), needle) => items.iter().any(|item| item.loose_eq(needle)),
                _ => false,
            },
            Operator::StartsWith => match (value, &self.operand) {
                (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
                _ => false,
            },
            Operator::EndsWith => match (value, &self.operand) {
                (Value::String(s), Value::String(suffix)) => s.ends_with(suffix.as_str()),
                _ => false,
            },
            Operator::Matches => match (value, self.regex()) {
                (Value::String(s), Some(regex)) => regex.is_match(s),
                _ => false,
            },
        }
    }

    fn one_of(&self, value: &Value) -> bool {
        match &self.operand {
            Value::List(items) => items.iter().any(|item| value.loose_eq(item)),
            single => value.loose_eq(single),
        }
    }

    // An operand that does not compile never matches; `validate` reports it.
    fn regex(&self) -> Option<&Regex> {
        self.pattern
            .get_or_init(|| self.operand.as_str().and_then(|p| Regex::new(p).ok()))
            .as_ref()
    }
}

impl PartialEq for Criterion {
    fn eq(&self, other: &Self) -> bool {
        self.attribute == other.attribute
            && self.operator == other.operator
            && self.operand == other.operand
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.operator, self.operand)
    }
}

impl Serialize for Criterion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.attribute)?;
        tuple.serialize_element(&self.operator)?;
        tuple.serialize_element(&self.operand)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for Criterion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let (attribute, operator, operand) = <(String, Operator, Value)>::deserialize(deserializer)?;
        Ok(Criterion::new(attribute, operator, operand))
    }
}
