//! Quarry - Composable scope and criteria algebra for querying records.
//!
//! Quarry turns filter expressions into immutable predicate trees that can
//! be combined, inverted, serialized and evaluated against any collection of
//! records. It supports:
//!
//! - Two filter front-ends: mappings and blocks, normalized into one
//!   criteria list
//! - An operator registry with aliases and inverse operators
//! - Scope composition with `and`, `or`, `not` and `invert`, simplified on
//!   the fly
//! - Queries with multi-field stable ordering and limit/offset pagination
//! - Scope builders that re-materialize scopes for other backends
//!
//! # Quick Start
//!
//! ```rust
//! use indexmap::IndexMap;
//! use quarry::{Filter, Query, Scope, ScopeInput, Value};
//!
//! let book = |author: &str, series: &str, published_at: &str| -> IndexMap<String, Value> {
//!     IndexMap::from([
//!         ("author".to_string(), Value::from(author)),
//!         ("series".to_string(), Value::from(series)),
//!         ("published_at".to_string(), Value::from(published_at)),
//!     ])
//! };
//! let books = vec![
//!     book("Ursula K. LeGuin", "Earthsea", "1968-11-01"),
//!     book("Ursula K. LeGuin", "Hainish", "1974-05-01"),
//!     book("Frank Herbert", "Dune", "1965-08-01"),
//! ];
//!
//! let leguin = Scope::parse(Filter::from([("author", "Ursula K. LeGuin")])).unwrap();
//! let earthsea = Scope::parse(Filter::from([("series", "Earthsea")])).unwrap();
//! let scope = leguin.and_not(&earthsea).unwrap();
//!
//! let query = Query::from(scope)
//!     .where_(ScopeInput::block(|ops| {
//!         Ok(Filter::new().with("published_at", ops.gte("1970-01-01")))
//!     }))
//!     .unwrap()
//!     .order([("published_at", "desc")])
//!     .unwrap();
//!
//! let results = query.call(&books);
//! assert_eq!(results.len(), 1);
//! assert_eq!(results[0]["series"], Value::from("Hainish"));
//! ```
//!
//! # Scope Semantics
//!
//! | Scope | Matches |
//! |-------|---------|
//! | `All` | every record |
//! | `None` | no record |
//! | `Criteria` | records satisfying every criterion (inverted: violating at least one) |
//! | `Conjunction` | records satisfying every child |
//! | `Disjunction` | records satisfying at least one child |
//! | `Negation` | records satisfying none of the children |
//!
//! `All` is the identity of `and` and absorbs `or`; `None` is the identity
//! of `or` and absorbs `and`. Empty criteria and container scopes match
//! everything and act as identities too.
//!
//! # Operators
//!
//! | Operator | Inverse |
//! |----------|---------|
//! | `equal` | `not_equal` |
//! | `greater_than` | `less_than_or_equal_to` |
//! | `greater_than_or_equal_to` | `less_than` |
//! | `one_of` | `not_one_of` |
//! | `contains`, `starts_with`, `ends_with`, `matches` | none |

mod builder;
mod criterion;
mod error;
mod operator;
mod ordering;
mod parser;
mod query;
mod record;
mod scope;
mod value;

// Re-export public API
pub use builder::{Block, GenericScopeBuilder, ScopeBuilder, ScopeInput};
pub use criterion::Criterion;
pub use error::{QueryError, Result, UnknownOperatorName};
pub use operator::{Operator, OperatorRegistry};
pub use ordering::{compare_values, Dir, Order};
pub use parser::{CriteriaParser, Expr, Filter, Operation, Operators};
pub use query::{Query, QueryBuilder, Strategy};
pub use record::Record;
pub use scope::{Scope, ScopeType};
pub use value::{Number, Value};
