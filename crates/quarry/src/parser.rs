//! Criteria parsing.
//!
//! Two surface syntaxes normalize into the same ordered criteria list:
//!
//! - a [`Filter`] mapping of attribute names to values or operator
//!   expressions, built in code or decoded from JSON;
//! - a block: a closure that receives the [`Operators`] proxy and returns a
//!   [`Filter`].
//!
//! ```
//! use quarry::{CriteriaParser, Criterion, Filter, Operator};
//!
//! let parser = CriteriaParser::default();
//! let criteria = parser
//!     .parse_block(|ops| Ok(Filter::new().with("title", "Tehanu").with("rating", ops.gte(4))))
//!     .unwrap();
//!
//! assert_eq!(
//!     criteria,
//!     vec![
//!         Criterion::new("title", Operator::Equal, "Tehanu"),
//!         Criterion::new("rating", Operator::GreaterThanOrEqualTo, 4),
//!     ]
//! );
//! ```

use log::trace;

use crate::criterion::Criterion;
use crate::error::{QueryError, Result};
use crate::operator::{Operator, OperatorRegistry};
use crate::value::{Number, Value};

/// An operator applied to an operand, produced by the [`Operators`] proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Canonical operator.
    pub operator: Operator,
    /// Normalized operand.
    pub operand: Value,
}

/// Right-hand side of a filter entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Bare value, read as equality.
    Value(Value),
    /// Explicit operator expression.
    Operation(Operation),
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Value(value)
    }
}

impl From<Operation> for Expr {
    fn from(operation: Operation) -> Self {
        Expr::Operation(operation)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Expr {
    fn from(items: Vec<T>) -> Self {
        Expr::Value(Value::from(items))
    }
}

macro_rules! expr_from_value {
    ($($source:ty),+) => {
        $(
            impl From<$source> for Expr {
                fn from(value: $source) -> Self {
                    Expr::Value(Value::from(value))
                }
            }
        )+
    };
}

expr_from_value!(
    &str, String, &String, bool, Number, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32,
    f64
);

/// Mapping-style filter input.
///
/// Entries keep insertion order. Keys are checked when the filter is
/// parsed: each must be a non-blank string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    entries: Vec<(Value, Expr)>,
}

impl Filter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Filter::default()
    }

    /// Appends an entry.
    pub fn with(mut self, key: impl Into<Value>, expr: impl Into<Expr>) -> Self {
        self.entries.push((key.into(), expr.into()));
        self
    }

    /// Decodes a JSON object using the global operator registry.
    ///
    /// A bare value is an equality test. A single-key object whose key is
    /// an operator name is an operator expression:
    ///
    /// ```
    /// use quarry::Filter;
    ///
    /// let json = serde_json::json!({ "author": "Ursula K. LeGuin", "rating": { "gte": 4 } });
    /// let filter = Filter::from_json(&json).unwrap();
    /// assert_eq!(filter.len(), 2);
    /// ```
    pub fn from_json(json: &serde_json::Value) -> Result<Filter> {
        Filter::from_json_with(json, OperatorRegistry::global())
    }

    /// Decodes a JSON object, resolving operator names with `registry`.
    pub fn from_json_with(json: &serde_json::Value, registry: &OperatorRegistry) -> Result<Filter> {
        let object = json.as_object().ok_or_else(|| {
            QueryError::invalid_criteria(format!("filter must be an object, got {json}"))
        })?;

        let ops = Operators::new(registry);
        let mut filter = Filter::new();
        for (key, value) in object {
            let expr = match value {
                serde_json::Value::Object(expression) => {
                    let mut pairs = expression.iter();
                    match (pairs.next(), pairs.next()) {
                        (Some((name, operand)), None) => {
                            let operand: Value = decode_operand(operand)?;
                            ops.call(name, [operand])?
                        }
                        _ => {
                            return Err(QueryError::invalid_criteria(format!(
                                "operator expression for `{key}` must have exactly one operator"
                            )))
                        }
                    }
                }
                other => Expr::Value(decode_operand(other)?),
            };
            filter = filter.with(key.as_str(), expr);
        }
        Ok(filter)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the filter has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&Value, &Expr)> {
        self.entries.iter().map(|(key, expr)| (key, expr))
    }
}

fn decode_operand(json: &serde_json::Value) -> Result<Value> {
    serde_json::from_value(json.clone()).map_err(|_| {
        QueryError::invalid_criteria(format!("unsupported operand {json}"))
    })
}

impl<K: Into<Value>, E: Into<Expr>> FromIterator<(K, E)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, E)>>(iter: I) -> Self {
        Filter {
            entries: iter
                .into_iter()
                .map(|(key, expr)| (key.into(), expr.into()))
                .collect(),
        }
    }
}

impl<K: Into<Value>, E: Into<Expr>, const N: usize> From<[(K, E); N]> for Filter {
    fn from(entries: [(K, E); N]) -> Self {
        entries.into_iter().collect()
    }
}

/// Builder proxy handed to block filters.
///
/// Each method builds an operator expression. Both the short and the
/// full-word spellings produce the same canonical operator.
#[derive(Debug, Clone, Copy)]
pub struct Operators<'r> {
    registry: &'r OperatorRegistry,
}

impl<'r> Operators<'r> {
    /// Creates a proxy resolving names with `registry`.
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        Operators { registry }
    }

    fn op(operator: Operator, operand: impl Into<Value>) -> Expr {
        Expr::Operation(Operation {
            operator,
            operand: operand.into(),
        })
    }

    fn list<I, T>(operator: Operator, items: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Operators::op(
            operator,
            Value::List(items.into_iter().map(Into::into).collect()),
        )
    }

    /// Attribute equals `value`.
    pub fn equal(&self, value: impl Into<Value>) -> Expr {
        Operators::op(Operator::Equal, value)
    }

    /// Alias for [`Operators::equal`].
    pub fn eq(&self, value: impl Into<Value>) -> Expr {
        self.equal(value)
    }

    /// Attribute does not equal `value`.
    pub fn not_equal(&self, value: impl Into<Value>) -> Expr {
        Operators::op(Operator::NotEqual, value)
    }

    /// Alias for [`Operators::not_equal`].
    pub fn ne(&self, value: impl Into<Value>) -> Expr {
        self.not_equal(value)
    }

    /// Attribute is greater than `value`.
    pub fn greater_than(&self, value: impl Into<Value>) -> Expr {
        Operators::op(Operator::GreaterThan, value)
    }

    /// Alias for [`Operators::greater_than`].
    pub fn gt(&self, value: impl Into<Value>) -> Expr {
        self.greater_than(value)
    }

    /// Attribute is greater than or equal to `value`.
    pub fn greater_than_or_equal_to(&self, value: impl Into<Value>) -> Expr {
        Operators::op(Operator::GreaterThanOrEqualTo, value)
    }

    /// Alias for [`Operators::greater_than_or_equal_to`].
    pub fn gte(&self, value: impl Into<Value>) -> Expr {
        self.greater_than_or_equal_to(value)
    }

    /// Attribute is less than `value`.
    pub fn less_than(&self, value: impl Into<Value>) -> Expr {
        Operators::op(Operator::LessThan, value)
    }

    /// Alias for [`Operators::less_than`].
    pub fn lt(&self, value: impl Into<Value>) -> Expr {
        self.less_than(value)
    }

    /// Attribute is less than or equal to `value`.
    pub fn less_than_or_equal_to(&self, value: impl Into<Value>) -> Expr {
        Operators::op(Operator::LessThanOrEqualTo, value)
    }

    /// Alias for [`Operators::less_than_or_equal_to`].
    pub fn lte(&self, value: impl Into<Value>) -> Expr {
        self.less_than_or_equal_to(value)
    }

    /// Attribute is one of `items`.
    pub fn one_of<I, T>(&self, items: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Operators::list(Operator::OneOf, items)
    }

    /// Attribute is none of `items`.
    pub fn not_one_of<I, T>(&self, items: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Operators::list(Operator::NotOneOf, items)
    }

    /// String attribute contains `value`, or list attribute includes it.
    pub fn contains(&self, value: impl Into<Value>) -> Expr {
        Operators::op(Operator::Contains, value)
    }

    /// String attribute starts with `prefix`.
    pub fn starts_with(&self, prefix: impl Into<Value>) -> Expr {
        Operators::op(Operator::StartsWith, prefix)
    }

    /// String attribute ends with `suffix`.
    pub fn ends_with(&self, suffix: impl Into<Value>) -> Expr {
        Operators::op(Operator::EndsWith, suffix)
    }

    /// String attribute matches the regular expression `pattern`.
    pub fn matches(&self, pattern: impl Into<Value>) -> Expr {
        Operators::op(Operator::Matches, pattern)
    }

    /// Builds an operator expression by name or alias.
    ///
    /// `one_of` and `not_one_of` take either a single list operand or any
    /// number of scalar operands; every other operator takes exactly one.
    /// Unregistered names fail with [`QueryError::UnknownOperator`].
    pub fn call<I, T>(&self, name: &str, operands: I) -> Result<Expr>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let operator = self.registry.resolve(name)?;
        let mut operands: Vec<Value> = operands.into_iter().map(Into::into).collect();

        match operator {
            Operator::OneOf | Operator::NotOneOf => {
                let operand = if operands.len() == 1 && operands[0].is_list() {
                    operands.remove(0)
                } else {
                    Value::List(operands)
                };
                Ok(Operators::op(operator, operand))
            }
            _ if operands.len() == 1 => Ok(Operators::op(operator, operands.remove(0))),
            _ => Err(QueryError::invalid_criteria(format!(
                "operator `{name}` expects 1 operand, got {}",
                operands.len()
            ))),
        }
    }
}

/// Normalizes filter input into criteria.
#[derive(Debug, Clone, Copy)]
pub struct CriteriaParser<'r> {
    registry: &'r OperatorRegistry,
}

impl Default for CriteriaParser<'static> {
    fn default() -> Self {
        CriteriaParser::new(OperatorRegistry::global())
    }
}

impl<'r> CriteriaParser<'r> {
    /// Creates a parser resolving operator names with `registry`.
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        CriteriaParser { registry }
    }

    /// The registry this parser resolves operator names with.
    pub fn registry(&self) -> &'r OperatorRegistry {
        self.registry
    }

    /// Returns the builder proxy passed to blocks.
    pub fn operators(&self) -> Operators<'r> {
        Operators::new(self.registry)
    }

    /// Parses a mapping.
    pub fn parse_filter(&self, filter: &Filter) -> Result<Vec<Criterion>> {
        let mut criteria = Vec::with_capacity(filter.len());
        for (key, expr) in filter.entries() {
            let attribute = match key {
                Value::String(name) if !name.trim().is_empty() => name.clone(),
                Value::String(_) => {
                    return Err(QueryError::invalid_criteria(
                        "attribute name can't be blank",
                    ))
                }
                other => {
                    return Err(QueryError::invalid_criteria(format!(
                        "attribute name must be a string, got {} {other}",
                        other.type_name()
                    )))
                }
            };

            let criterion = match expr {
                Expr::Value(value) => Criterion::new(attribute, Operator::Equal, value.clone()),
                Expr::Operation(operation) => {
                    Criterion::new(attribute, operation.operator, operation.operand.clone())
                }
            };
            criterion.validate()?;
            criteria.push(criterion);
        }

        trace!("parsed {} criteria from filter", criteria.len());
        Ok(criteria)
    }

    /// Parses a block. The block receives the [`Operators`] proxy and must
    /// return a [`Filter`].
    pub fn parse_block<F>(&self, block: F) -> Result<Vec<Criterion>>
    where
        F: FnOnce(&Operators<'r>) -> Result<Filter>,
    {
        let filter = block(&self.operators())?;
        self.parse_filter(&filter)
    }

    /// Parses a mapping followed by a block; mapping criteria come first.
    pub fn parse<F>(&self, filter: &Filter, block: F) -> Result<Vec<Criterion>>
    where
        F: FnOnce(&Operators<'r>) -> Result<Filter>,
    {
        let mut criteria = self.parse_filter(filter)?;
        criteria.extend(self.parse_block(block)?);
        Ok(criteria)
    }

    /// Parses a JSON object, see [`Filter::from_json`].
    pub fn parse_json(&self, json: &serde_json::Value) -> Result<Vec<Criterion>> {
        self.parse_filter(&Filter::from_json_with(json, self.registry)?)
    }
}
