//! Query builder and executor.
//!
//! A [`Query`] pairs a [`Scope`] with an [`Order`] and optional pagination.
//! Queries hold no data: every evaluation method takes the data source and
//! runs the whole pipeline against it.

use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::builder::ScopeInput;
use crate::error::{QueryError, Result};
use crate::operator::OperatorRegistry;
use crate::ordering::{Dir, Order};
use crate::parser::CriteriaParser;
use crate::record::Record;
use crate::scope::Scope;
use crate::value::Value;

/// A scope plus ordering and pagination.
///
/// Evaluation filters with the scope, sorts stably by the order, then drops
/// `offset` records and keeps at most `limit`:
///
/// ```text
/// result = scope(data) |> stable_sort(order) |> skip(offset) |> take(limit)
/// ```
///
/// Every mutator returns a new query.
///
/// # Example
///
/// ```
/// use indexmap::IndexMap;
/// use quarry::{Filter, Query, ScopeInput, Value};
///
/// let book = |title: &str, published_at: i64| -> IndexMap<String, Value> {
///     IndexMap::from([
///         ("title".to_string(), Value::from(title)),
///         ("published_at".to_string(), Value::from(published_at)),
///     ])
/// };
/// let books = vec![book("A Wizard of Earthsea", 1968), book("The Dispossessed", 1974)];
///
/// let query = Query::new()
///     .where_(ScopeInput::block(|ops| {
///         Ok(Filter::new().with("published_at", ops.gt(1970)))
///     }))
///     .unwrap()
///     .order([("title", "desc")])
///     .unwrap()
///     .limit(1)
///     .unwrap();
///
/// let results = query.call(&books);
/// assert_eq!(results.len(), 1);
/// assert_eq!(results[0]["title"], Value::from("The Dispossessed"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Query {
    scope: Scope,
    order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<usize>,
}

impl Query {
    /// Creates a query matching every record.
    pub fn new() -> Self {
        Query::default()
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    /// Narrows the query; the strategy is inferred from the input shape.
    ///
    /// Repeated calls accumulate: the parsed scope is combined with the
    /// current one using [`Scope::and`].
    pub fn where_<'a>(&self, input: impl Into<ScopeInput<'a>>) -> Result<Query> {
        QueryBuilder::new(self).call(None, input)
    }

    /// Narrows the query using an explicit parsing strategy.
    pub fn where_with<'a>(
        &self,
        strategy: Strategy,
        input: impl Into<ScopeInput<'a>>,
    ) -> Result<Query> {
        QueryBuilder::new(self).call(Some(strategy), input)
    }

    /// Replaces the ordering.
    ///
    /// Fails with [`QueryError::InvalidArgument`] for blank attributes or
    /// directions other than ascending/descending.
    pub fn order<I, K, D>(&self, entries: I) -> Result<Query>
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: AsRef<str>,
    {
        Ok(Query {
            order: Order::parse(entries)?,
            ..self.clone()
        })
    }

    /// Appends one sort key to the ordering.
    pub fn order_by(&self, field: impl Into<String>, dir: Dir) -> Result<Query> {
        Ok(Query {
            order: self.order.then(field, dir)?,
            ..self.clone()
        })
    }

    /// Sets the maximum number of results. `Value::Null` clears it.
    pub fn limit(&self, limit: impl Into<Value>) -> Result<Query> {
        Ok(Query {
            limit: pagination("limit", limit.into())?,
            ..self.clone()
        })
    }

    /// Sets the number of leading results to skip. `Value::Null` clears it.
    pub fn offset(&self, offset: impl Into<Value>) -> Result<Query> {
        Ok(Query {
            offset: pagination("offset", offset.into())?,
            ..self.clone()
        })
    }

    /// Returns an equivalent query.
    ///
    /// Queries never cache results, so there is nothing to discard.
    pub fn reset(&self) -> Query {
        self.clone()
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Returns the scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Returns the ordering.
    pub fn ordering(&self) -> &Order {
        &self.order
    }

    /// Returns the limit, if set.
    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    /// Returns the offset, if set.
    pub fn get_offset(&self) -> Option<usize> {
        self.offset
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Runs the query, returning references to the selected records.
    pub fn call<'d, R: Record>(&self, data: &'d [R]) -> Vec<&'d R> {
        let mut results = self.scope.call(data);
        let filtered = results.len();

        if !self.order.is_empty() {
            results.sort_by(|a, b| self.order.compare(*a, *b));
        }

        let results: Vec<&'d R> = results
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect();

        debug!(
            "query over {} scope: {} records, {} matched, {} returned",
            self.scope.scope_type(),
            data.len(),
            filtered,
            results.len()
        );
        results
    }

    /// Iterates over the selected records.
    ///
    /// Without an ordering, records are filtered lazily as the iterator is
    /// consumed.
    pub fn each<'d, R: Record>(&'d self, data: &'d [R]) -> Box<dyn Iterator<Item = &'d R> + 'd> {
        if self.order.is_empty() {
            Box::new(
                data.iter()
                    .filter(move |record| self.scope.matches(*record))
                    .skip(self.offset.unwrap_or(0))
                    .take(self.limit.unwrap_or(usize::MAX)),
            )
        } else {
            Box::new(self.call(data).into_iter())
        }
    }

    /// Counts matching records, ignoring limit and offset.
    pub fn count<R: Record>(&self, data: &[R]) -> usize {
        data.iter().filter(|record| self.scope.matches(*record)).count()
    }

    /// Returns `true` if any record matches, ignoring limit and offset.
    pub fn exists<R: Record>(&self, data: &[R]) -> bool {
        data.iter().any(|record| self.scope.matches(record))
    }

    /// Returns the first selected record.
    pub fn first<'d, R: Record>(&'d self, data: &'d [R]) -> Option<&'d R> {
        self.each(data).next()
    }

    /// Runs the query and clones the selected records.
    pub fn to_cloned<R: Record + Clone>(&self, data: &[R]) -> Vec<R> {
        self.call(data).into_iter().cloned().collect()
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Loads a query descriptor:
    ///
    /// ```json
    /// { "scope": {"type": "all"}, "order": {"title": "asc"}, "limit": 10, "offset": 20 }
    /// ```
    ///
    /// Every key is optional.
    pub fn from_json(json: &serde_json::Value) -> Result<Query> {
        let object = json.as_object().ok_or_else(|| {
            QueryError::invalid_argument(format!("expected a query object, got {json}"))
        })?;

        let mut query = Query::new();
        if let Some(scope) = object.get("scope") {
            query.scope = Scope::from_json(scope)?;
        }
        if let Some(order) = object.get("order") {
            let entries: Vec<(String, String)> = match order {
                serde_json::Value::Object(fields) => fields
                    .iter()
                    .map(|(field, dir)| (field.clone(), dir.as_str().unwrap_or_default().to_string()))
                    .collect(),
                other => {
                    return Err(QueryError::invalid_argument(format!(
                        "order must be an object, got {other}"
                    )))
                }
            };
            query.order = Order::parse(entries)?;
        }
        if let Some(limit) = object.get("limit") {
            query.limit = pagination("limit", serde_json::from_value(limit.clone())?)?;
        }
        if let Some(offset) = object.get("offset") {
            query.offset = pagination("offset", serde_json::from_value(offset.clone())?)?;
        }
        Ok(query)
    }

    /// Serialized descriptor, see [`Query::from_json`].
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<Scope> for Query {
    fn from(scope: Scope) -> Self {
        Query {
            scope,
            ..Query::default()
        }
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Query::from_json(&json).map_err(serde::de::Error::custom)
    }
}

fn pagination(name: &str, value: Value) -> Result<Option<usize>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_index().map(Some).ok_or_else(|| {
            QueryError::invalid_argument(format!("{name} must be a non-negative integer, got {n:?}"))
        }),
        other => Err(QueryError::invalid_argument(format!(
            "{name} must be a non-negative integer, got {}",
            other.type_name()
        ))),
    }
}

// ============================================================================
// Builder
// ============================================================================

/// How a `where` argument is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// A block filter, optionally preceded by a mapping.
    Block,
    /// A mapping filter.
    #[default]
    Hash,
    /// A pre-built scope, criteria list or serialized scope, taken without
    /// validation.
    Unsafe,
}

impl Strategy {
    /// Returns the strategy name accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Block => "block",
            Strategy::Hash => "hash",
            Strategy::Unsafe => "unsafe",
        }
    }

    /// Strategy matching an input's shape. `Nil` falls back to the default.
    pub fn infer(input: &ScopeInput<'_>) -> Strategy {
        match input {
            ScopeInput::Block(_) | ScopeInput::FilterAndBlock(..) => Strategy::Block,
            ScopeInput::Scope(_) | ScopeInput::Criteria(_) | ScopeInput::Serialized(_) => {
                Strategy::Unsafe
            }
            ScopeInput::Nil | ScopeInput::Filter(_) => Strategy::Hash,
        }
    }

    fn expects(self) -> &'static str {
        match self {
            Strategy::Block => "a block",
            Strategy::Hash => "a filter mapping",
            Strategy::Unsafe => "a scope or criteria list",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "block" => Ok(Strategy::Block),
            "hash" => Ok(Strategy::Hash),
            "unsafe" => Ok(Strategy::Unsafe),
            _ => Err(QueryError::parse(s, "unknown strategy")),
        }
    }
}

/// Parses `where` arguments and appends them to a query's scope.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'q> {
    query: &'q Query,
    registry: &'q OperatorRegistry,
}

impl<'q> QueryBuilder<'q> {
    /// Creates a builder using the global operator registry.
    pub fn new(query: &'q Query) -> Self {
        QueryBuilder {
            query,
            registry: OperatorRegistry::global(),
        }
    }

    /// Resolves operator names with `registry` instead of the global one.
    pub fn with_registry(self, registry: &'q OperatorRegistry) -> Self {
        QueryBuilder { registry, ..self }
    }

    /// Parses `input` and returns the query narrowed by it.
    ///
    /// Without a strategy, one is inferred from the input. Fails with
    /// [`QueryError::ParseError`] when the input does not fit the strategy.
    pub fn call<'a>(
        &self,
        strategy: Option<Strategy>,
        input: impl Into<ScopeInput<'a>>,
    ) -> Result<Query> {
        let input = input.into();
        let strategy = strategy.unwrap_or_else(|| Strategy::infer(&input));
        let parser = CriteriaParser::new(self.registry);
        debug!("where: {} input with {strategy} strategy", input.kind());

        let scope = match (strategy, input) {
            (_, ScopeInput::Nil) => Scope::All,
            (Strategy::Block, ScopeInput::Block(block)) => {
                Scope::from_criteria(parser.parse_block(block)?)
            }
            (Strategy::Block, ScopeInput::FilterAndBlock(filter, block)) => {
                Scope::from_criteria(parser.parse(&filter, block)?)
            }
            (Strategy::Hash, ScopeInput::Filter(filter)) => {
                Scope::from_criteria(parser.parse_filter(&filter)?)
            }
            (Strategy::Unsafe, ScopeInput::Scope(scope)) => scope,
            (Strategy::Unsafe, ScopeInput::Criteria(criteria)) => Scope::from_criteria(criteria),
            (Strategy::Unsafe, ScopeInput::Serialized(json)) => Scope::from_json(&json)?,
            (strategy, other) => {
                return Err(QueryError::parse(
                    strategy.as_str(),
                    format!("expected {}, got {}", strategy.expects(), other.kind()),
                ))
            }
        };

        Ok(Query {
            scope: self.query.scope.and(scope),
            ..self.query.clone()
        })
    }

    /// Like [`QueryBuilder::call`] with the strategy given by name.
    pub fn call_named<'a>(&self, strategy: &str, input: impl Into<ScopeInput<'a>>) -> Result<Query> {
        self.call(Some(strategy.parse()?), input)
    }
}
