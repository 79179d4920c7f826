//! Scope construction and re-materialization.
//!
//! A [`ScopeBuilder`] turns any accepted filter input into a scope. Backends
//! that need their own representation of each variant implement the six
//! `build_*` constructors; parsing, decoding of the serialized form and
//! conversion of generic [`Scope`] trees come for free.

use std::sync::Arc;

use log::debug;

use crate::criterion::Criterion;
use crate::error::{QueryError, Result};
use crate::operator::OperatorRegistry;
use crate::parser::{CriteriaParser, Filter, Operators};
use crate::scope::{Scope, ScopeType};
use crate::value::Value;

/// Block filter: receives the [`Operators`] proxy, returns a [`Filter`].
pub type Block<'a> = Box<dyn FnOnce(&Operators<'_>) -> Result<Filter> + 'a>;

/// Anything a scope can be built from.
pub enum ScopeInput<'a> {
    /// No filter; builds `All`.
    Nil,
    /// An existing scope.
    Scope(Scope),
    /// A pre-built criteria list, taken as is.
    Criteria(Vec<Criterion>),
    /// A mapping filter.
    Filter(Filter),
    /// A block filter.
    Block(Block<'a>),
    /// A mapping filter followed by a block filter.
    FilterAndBlock(Filter, Block<'a>),
    /// The serialized form of a scope, see [`Scope::to_json`].
    Serialized(serde_json::Value),
}

impl<'a> ScopeInput<'a> {
    /// Wraps a closure as a block input.
    pub fn block(block: impl FnOnce(&Operators<'_>) -> Result<Filter> + 'a) -> Self {
        ScopeInput::Block(Box::new(block))
    }

    /// Wraps a mapping and a closure; mapping criteria come first.
    pub fn filter_and_block(
        filter: Filter,
        block: impl FnOnce(&Operators<'_>) -> Result<Filter> + 'a,
    ) -> Self {
        ScopeInput::FilterAndBlock(filter, Box::new(block))
    }

    /// Short name of the input shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ScopeInput::Nil => "nil",
            ScopeInput::Scope(_) => "scope",
            ScopeInput::Criteria(_) => "criteria",
            ScopeInput::Filter(_) => "filter",
            ScopeInput::Block(_) => "block",
            ScopeInput::FilterAndBlock(..) => "filter and block",
            ScopeInput::Serialized(_) => "serialized scope",
        }
    }
}

impl std::fmt::Debug for ScopeInput<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeInput::Scope(scope) => f.debug_tuple("Scope").field(scope).finish(),
            ScopeInput::Criteria(criteria) => f.debug_tuple("Criteria").field(criteria).finish(),
            ScopeInput::Filter(filter) => f.debug_tuple("Filter").field(filter).finish(),
            ScopeInput::Serialized(json) => f.debug_tuple("Serialized").field(json).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

impl From<Scope> for ScopeInput<'_> {
    fn from(scope: Scope) -> Self {
        ScopeInput::Scope(scope)
    }
}

impl From<&Scope> for ScopeInput<'_> {
    fn from(scope: &Scope) -> Self {
        ScopeInput::Scope(scope.clone())
    }
}

impl From<Filter> for ScopeInput<'_> {
    fn from(filter: Filter) -> Self {
        ScopeInput::Filter(filter)
    }
}

impl From<Vec<Criterion>> for ScopeInput<'_> {
    fn from(criteria: Vec<Criterion>) -> Self {
        ScopeInput::Criteria(criteria)
    }
}

impl<'a, T: Into<ScopeInput<'a>>> From<Option<T>> for ScopeInput<'a> {
    fn from(input: Option<T>) -> Self {
        input.map_or(ScopeInput::Nil, Into::into)
    }
}

/// Constructs scopes of a backend's own representation.
///
/// # Example
///
/// A builder that renders scopes as SQL-ish text:
///
/// ```
/// use quarry::{Criterion, Filter, ScopeBuilder};
///
/// struct Where;
///
/// impl ScopeBuilder for Where {
///     type Scope = String;
///
///     fn name(&self) -> &str { "Where" }
///     fn build_all(&self) -> String { "TRUE".into() }
///     fn build_none(&self) -> String { "FALSE".into() }
///     fn build_criteria(&self, criteria: Vec<Criterion>, inverted: bool) -> String {
///         let body: Vec<String> = criteria.iter().map(|c| c.to_string()).collect();
///         let body = body.join(" AND ");
///         if inverted { format!("NOT ({body})") } else { body }
///     }
///     fn build_conjunction(&self, scopes: Vec<String>) -> String { scopes.join(" AND ") }
///     fn build_disjunction(&self, scopes: Vec<String>) -> String { scopes.join(" OR ") }
///     fn build_negation(&self, scopes: Vec<String>) -> String {
///         format!("NOT ({})", scopes.join(" OR "))
///     }
/// }
///
/// let sql = Where.build(Filter::from([("series", "Earthsea")])).unwrap();
/// assert_eq!(sql, r#"series equal "Earthsea""#);
/// ```
pub trait ScopeBuilder {
    /// The scope representation this builder produces.
    type Scope;

    /// Name used in error messages.
    fn name(&self) -> &str;

    /// Registry used to resolve operator names while parsing.
    fn registry(&self) -> &OperatorRegistry {
        OperatorRegistry::global()
    }

    /// Scope matching every record.
    fn build_all(&self) -> Self::Scope;

    /// Scope matching no record.
    fn build_none(&self) -> Self::Scope;

    /// Criteria scope; `inverted` is only set for invertible criteria.
    fn build_criteria(&self, criteria: Vec<Criterion>, inverted: bool) -> Self::Scope;

    /// Scope matching records every child matches.
    fn build_conjunction(&self, scopes: Vec<Self::Scope>) -> Self::Scope;

    /// Scope matching records at least one child matches.
    fn build_disjunction(&self, scopes: Vec<Self::Scope>) -> Self::Scope;

    /// Scope matching records no child matches.
    fn build_negation(&self, scopes: Vec<Self::Scope>) -> Self::Scope;

    /// Re-materializes a generic scope tree as this builder's scopes.
    fn transform_scope(&self, scope: &Scope) -> Self::Scope {
        let children = |scopes: &Arc<[Scope]>| -> Vec<Self::Scope> {
            scopes.iter().map(|child| self.transform_scope(child)).collect()
        };

        match scope {
            Scope::All => self.build_all(),
            Scope::None => self.build_none(),
            Scope::Criteria { criteria, inverted } => {
                self.build_criteria(criteria.to_vec(), *inverted)
            }
            Scope::Conjunction { scopes } => self.build_conjunction(children(scopes)),
            Scope::Disjunction { scopes } => self.build_disjunction(children(scopes)),
            Scope::Negation { scopes } => self.build_negation(children(scopes)),
        }
    }

    /// Builds a scope from any accepted input.
    ///
    /// Filters and blocks are parsed and validated; scopes are
    /// re-materialized; criteria lists are taken as is.
    fn build<'a>(&self, input: impl Into<ScopeInput<'a>>) -> Result<Self::Scope>
    where
        Self: Sized,
    {
        let parser = CriteriaParser::new(self.registry());
        let input = input.into();
        debug!("{}: building scope from {}", self.name(), input.kind());

        match input {
            ScopeInput::Nil => Ok(self.build_all()),
            ScopeInput::Scope(scope) => Ok(self.transform_scope(&scope)),
            ScopeInput::Criteria(criteria) => Ok(self.build_criteria(criteria, false)),
            ScopeInput::Filter(filter) => {
                Ok(self.build_criteria(parser.parse_filter(&filter)?, false))
            }
            ScopeInput::Block(block) => Ok(self.build_criteria(parser.parse_block(block)?, false)),
            ScopeInput::FilterAndBlock(filter, block) => {
                Ok(self.build_criteria(parser.parse(&filter, block)?, false))
            }
            ScopeInput::Serialized(json) => self.from_json(&json),
        }
    }

    /// Decodes the serialized form of a scope.
    ///
    /// Fails with [`QueryError::InvalidScope`] when `json` is not a scope
    /// mapping and [`QueryError::UnknownScopeType`] when its `type` tag is
    /// not one of the six variants.
    fn from_json(&self, json: &serde_json::Value) -> Result<Self::Scope>
    where
        Self: Sized,
    {
        let object = json
            .as_object()
            .ok_or_else(|| QueryError::invalid_scope(format!("expected a scope object, got {json}")))?;
        let tag = object
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| QueryError::invalid_scope("scope object has no `type` tag"))?;

        let scope_type = ScopeType::from_tag(tag).ok_or_else(|| QueryError::UnknownScopeType {
            scope_type: tag.to_string(),
            class: self.name().to_string(),
        })?;

        let children = || -> Result<Vec<Self::Scope>> {
            match object.get("scopes") {
                Some(serde_json::Value::Array(items)) => {
                    items.iter().map(|item| self.from_json(item)).collect()
                }
                None => Ok(Vec::new()),
                Some(other) => Err(QueryError::invalid_scope(format!(
                    "`scopes` must be an array, got {other}"
                ))),
            }
        };

        match scope_type {
            ScopeType::All => Ok(self.build_all()),
            ScopeType::None => Ok(self.build_none()),
            ScopeType::Criteria => {
                let criteria = match object.get("criteria") {
                    Some(value) => {
                        let triples: Vec<(String, String, Value)> =
                            serde_json::from_value(value.clone())?;
                        triples
                            .into_iter()
                            .map(|(attribute, operator, operand)| -> Result<Criterion> {
                                let operator = self.registry().resolve(&operator)?;
                                let criterion = Criterion::new(attribute, operator, operand);
                                criterion.validate()?;
                                Ok(criterion)
                            })
                            .collect::<Result<Vec<_>>>()?
                    }
                    None => Vec::new(),
                };

                let inverted = match object.get("inverted") {
                    None => false,
                    Some(serde_json::Value::Bool(inverted)) => *inverted,
                    Some(other) => {
                        return Err(QueryError::invalid_scope(format!(
                            "`inverted` must be a boolean, got {other}"
                        )))
                    }
                };
                // Same check `Scope::invert` makes before setting the flag.
                if inverted {
                    for criterion in &criteria {
                        criterion.operator().invert()?;
                    }
                }
                Ok(self.build_criteria(criteria, inverted))
            }
            ScopeType::Conjunction => Ok(self.build_conjunction(children()?)),
            ScopeType::Disjunction => Ok(self.build_disjunction(children()?)),
            ScopeType::Negation => Ok(self.build_negation(children()?)),
        }
    }
}

/// Builder for the crate's own [`Scope`] type.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericScopeBuilder<'r> {
    registry: Option<&'r OperatorRegistry>,
}

impl<'r> GenericScopeBuilder<'r> {
    /// Creates a builder using the global operator registry.
    pub fn new() -> Self {
        GenericScopeBuilder::default()
    }

    /// Creates a builder resolving operator names with `registry`.
    pub fn with_registry(registry: &'r OperatorRegistry) -> Self {
        GenericScopeBuilder {
            registry: Some(registry),
        }
    }
}

impl ScopeBuilder for GenericScopeBuilder<'_> {
    type Scope = Scope;

    fn name(&self) -> &str {
        "GenericScopeBuilder"
    }

    fn registry(&self) -> &OperatorRegistry {
        self.registry.unwrap_or_else(|| OperatorRegistry::global())
    }

    fn build_all(&self) -> Scope {
        Scope::All
    }

    fn build_none(&self) -> Scope {
        Scope::None
    }

    fn build_criteria(&self, criteria: Vec<Criterion>, inverted: bool) -> Scope {
        Scope::Criteria {
            criteria: criteria.into(),
            inverted,
        }
    }

    fn build_conjunction(&self, scopes: Vec<Scope>) -> Scope {
        Scope::conjunction(scopes)
    }

    fn build_disjunction(&self, scopes: Vec<Scope>) -> Scope {
        Scope::disjunction(scopes)
    }

    fn build_negation(&self, scopes: Vec<Scope>) -> Scope {
        Scope::negation(scopes)
    }

    // Already generic; sharing the tree is enough.
    fn transform_scope(&self, scope: &Scope) -> Scope {
        scope.clone()
    }
}
