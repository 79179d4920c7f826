//! Comparison operators and the alias registry.
//!
//! Every spelling the parser accepts resolves through an
//! [`OperatorRegistry`] to exactly one canonical [`Operator`]. The
//! comparison operators form inverse pairs; string and pattern operators
//! are uninvertible.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{QueryError, Result, UnknownOperatorName};

/// Comparison operator for a criterion.
///
/// | Operator | Inverse |
/// |----------|---------|
/// | `Equal` | `NotEqual` |
/// | `GreaterThan` | `LessThanOrEqualTo` |
/// | `GreaterThanOrEqualTo` | `LessThan` |
/// | `OneOf` | `NotOneOf` |
/// | `Contains`, `StartsWith`, `EndsWith`, `Matches` | none |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Attribute equals the operand.
    Equal,
    /// Attribute does not equal the operand.
    NotEqual,
    /// Attribute is greater than the operand.
    GreaterThan,
    /// Attribute is greater than or equal to the operand.
    GreaterThanOrEqualTo,
    /// Attribute is less than the operand.
    LessThan,
    /// Attribute is less than or equal to the operand.
    LessThanOrEqualTo,
    /// Attribute is one of the listed values.
    OneOf,
    /// Attribute is none of the listed values.
    NotOneOf,

    // Backend additions
    /// String attribute contains a substring, or list attribute contains
    /// an item.
    Contains,
    /// String attribute starts with a prefix.
    StartsWith,
    /// String attribute ends with a suffix.
    EndsWith,
    /// String attribute matches a regular expression.
    Matches,
}

impl Operator {
    /// Every operator, in declaration order.
    pub const ALL: [Operator; 12] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqualTo,
        Operator::LessThan,
        Operator::LessThanOrEqualTo,
        Operator::OneOf,
        Operator::NotOneOf,
        Operator::Contains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Matches,
    ];

    /// Returns the canonical name of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equal => "equal",
            Operator::NotEqual => "not_equal",
            Operator::GreaterThan => "greater_than",
            Operator::GreaterThanOrEqualTo => "greater_than_or_equal_to",
            Operator::LessThan => "less_than",
            Operator::LessThanOrEqualTo => "less_than_or_equal_to",
            Operator::OneOf => "one_of",
            Operator::NotOneOf => "not_one_of",
            Operator::Contains => "contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Matches => "matches",
        }
    }

    /// Returns the alternate spellings accepted for this operator.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Operator::Equal => &["eq", "equals", "=="],
            Operator::NotEqual => &["ne", "not_equals", "!="],
            Operator::GreaterThan => &["gt", ">"],
            Operator::GreaterThanOrEqualTo => &["gte", "ge", "greater_than_or_equal", ">="],
            Operator::LessThan => &["lt", "<"],
            Operator::LessThanOrEqualTo => &["lte", "le", "less_than_or_equal", "<="],
            Operator::OneOf => &["in"],
            Operator::NotOneOf => &["not_in", "nin"],
            Operator::Contains => &["includes"],
            Operator::StartsWith => &["startswith"],
            Operator::EndsWith => &["endswith"],
            Operator::Matches => &["regex", "match"],
        }
    }

    /// Returns the logical complement, if this operator has one.
    pub fn inverse(self) -> Option<Operator> {
        match self {
            Operator::Equal => Some(Operator::NotEqual),
            Operator::NotEqual => Some(Operator::Equal),
            Operator::GreaterThan => Some(Operator::LessThanOrEqualTo),
            Operator::LessThanOrEqualTo => Some(Operator::GreaterThan),
            Operator::GreaterThanOrEqualTo => Some(Operator::LessThan),
            Operator::LessThan => Some(Operator::GreaterThanOrEqualTo),
            Operator::OneOf => Some(Operator::NotOneOf),
            Operator::NotOneOf => Some(Operator::OneOf),
            Operator::Contains | Operator::StartsWith | Operator::EndsWith | Operator::Matches => {
                None
            }
        }
    }

    /// Returns `true` if this operator has a logical complement.
    pub fn is_invertible(self) -> bool {
        self.inverse().is_some()
    }

    /// Returns the logical complement of this operator.
    ///
    /// Fails with [`QueryError::UninvertibleOperator`] naming the operator
    /// when it has none.
    pub fn invert(self) -> Result<Operator> {
        self.inverse()
            .ok_or(QueryError::UninvertibleOperator {
                operator: self.as_str(),
            })
    }

    /// Resolves a canonical name or alias using the global registry.
    pub fn resolve(name: &str) -> Result<Operator> {
        Ok(OperatorRegistry::global().resolve(name)?)
    }

    /// Evaluates an ordering-based comparison.
    ///
    /// Returns `false` for operators that are not ordering-based.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::NotEqual => ordering != Ordering::Equal,
            Operator::GreaterThan => ordering == Ordering::Greater,
            Operator::GreaterThanOrEqualTo => ordering != Ordering::Less,
            Operator::LessThan => ordering == Ordering::Less,
            Operator::LessThanOrEqualTo => ordering != Ordering::Greater,
            _ => false,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Operator {
    type Err = UnknownOperatorName;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        OperatorRegistry::global().resolve(s)
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

static GLOBAL: Lazy<OperatorRegistry> = Lazy::new(OperatorRegistry::default);

/// Table of operator spellings.
///
/// The default registry knows every canonical name and alias listed on
/// [`Operator`]. Backends can layer extra spellings on top with
/// [`OperatorRegistry::with_alias`].
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    names: HashMap<String, Operator>,
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        let mut names = HashMap::new();
        for op in Operator::ALL {
            names.insert(op.as_str().to_string(), op);
            for alias in op.aliases() {
                names.insert((*alias).to_string(), op);
            }
        }
        OperatorRegistry { names }
    }
}

impl OperatorRegistry {
    /// Creates a registry with the default spellings.
    pub fn new() -> Self {
        OperatorRegistry::default()
    }

    /// Returns the process-wide default registry.
    pub fn global() -> &'static OperatorRegistry {
        &GLOBAL
    }

    /// Adds an extra spelling for an operator.
    pub fn with_alias(mut self, alias: impl Into<String>, op: Operator) -> Self {
        self.names.insert(alias.into(), op);
        self
    }

    /// Resolves a canonical name or alias.
    pub fn resolve(&self, name: &str) -> std::result::Result<Operator, UnknownOperatorName> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| UnknownOperatorName(name.to_string()))
    }

    /// Returns `true` if `name` resolves to an operator.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Returns the logical complement of `op`.
    pub fn invert(&self, op: Operator) -> Result<Operator> {
        op.invert()
    }
}
