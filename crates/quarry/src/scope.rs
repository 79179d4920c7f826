//! The scope algebra.
//!
//! A [`Scope`] is an immutable predicate tree over records. Composition
//! (`and`, `or`, `not`, `invert`) always returns a new scope and simplifies
//! trivial cases on the way:
//!
//! ```text
//! x.and(All) == x      x.and(None) == None
//! x.or(None) == x      x.or(All)   == All
//! x.and(empty) == x    x.or(empty) == x
//! Criteria(a).and(Criteria(b)) == Criteria(a ++ b)
//! ```
//!
//! Children are held behind [`Arc`], so cloning a scope or composing it into
//! a larger tree shares the unchanged subtrees.

use std::sync::Arc;

use log::trace;
use serde::{Deserialize, Deserializer, Serialize};

use crate::builder::{GenericScopeBuilder, ScopeBuilder, ScopeInput};
use crate::criterion::Criterion;
use crate::error::{QueryError, Result};
use crate::record::Record;

/// Type tag of a scope variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeType {
    All,
    None,
    Criteria,
    Conjunction,
    Disjunction,
    Negation,
}

impl ScopeType {
    /// Every scope type.
    pub const ALL: [ScopeType; 6] = [
        ScopeType::All,
        ScopeType::None,
        ScopeType::Criteria,
        ScopeType::Conjunction,
        ScopeType::Disjunction,
        ScopeType::Negation,
    ];

    /// The serialized `type` tag.
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeType::All => "all",
            ScopeType::None => "none",
            ScopeType::Criteria => "criteria",
            ScopeType::Conjunction => "conjunction",
            ScopeType::Disjunction => "disjunction",
            ScopeType::Negation => "negation",
        }
    }

    /// Looks up a serialized `type` tag.
    pub fn from_tag(tag: &str) -> Option<ScopeType> {
        ScopeType::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl std::fmt::Display for ScopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A composable predicate over records.
///
/// Serializes as a mapping with a `type` tag:
///
/// ```text
/// {"type": "all"}
/// {"type": "criteria", "criteria": [["author", "equal", "Ursula K. LeGuin"]], "inverted": false}
/// {"type": "conjunction", "scopes": [...]}
/// ```
///
/// Equality is structural: two scopes are equal when they are the same
/// variant with equal contents. An empty conjunction is not equal to `All`
/// even though both match every record.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scope {
    /// Matches every record.
    #[default]
    All,
    /// Matches no record.
    None,
    /// Matches records satisfying every criterion, or, when inverted,
    /// records violating at least one.
    Criteria {
        criteria: Arc<[Criterion]>,
        inverted: bool,
    },
    /// Matches records satisfying every child.
    Conjunction { scopes: Arc<[Scope]> },
    /// Matches records satisfying at least one child.
    Disjunction { scopes: Arc<[Scope]> },
    /// Matches records satisfying none of the children.
    Negation { scopes: Arc<[Scope]> },
}

impl Scope {
    /// Scope matching every record.
    pub fn all() -> Scope {
        Scope::All
    }

    /// Scope matching no record.
    pub fn none() -> Scope {
        Scope::None
    }

    /// Criteria scope over the given criteria.
    pub fn from_criteria(criteria: impl IntoIterator<Item = Criterion>) -> Scope {
        Scope::Criteria {
            criteria: criteria.into_iter().collect(),
            inverted: false,
        }
    }

    /// Conjunction of the given scopes.
    pub fn conjunction(scopes: impl IntoIterator<Item = Scope>) -> Scope {
        Scope::Conjunction {
            scopes: scopes.into_iter().collect(),
        }
    }

    /// Disjunction of the given scopes.
    pub fn disjunction(scopes: impl IntoIterator<Item = Scope>) -> Scope {
        Scope::Disjunction {
            scopes: scopes.into_iter().collect(),
        }
    }

    /// Negation of the given scopes.
    pub fn negation(scopes: impl IntoIterator<Item = Scope>) -> Scope {
        Scope::Negation {
            scopes: scopes.into_iter().collect(),
        }
    }

    /// Builds a scope from a filter, block, criteria list or scope.
    ///
    /// ```
    /// use quarry::{Filter, Scope, ScopeInput};
    ///
    /// let by_author = Scope::parse(Filter::from([("author", "Ursula K. LeGuin")])).unwrap();
    /// let recent = Scope::parse(ScopeInput::block(|ops| {
    ///     Ok(Filter::new().with("published_at", ops.gte("1970-01-01")))
    /// }))
    /// .unwrap();
    ///
    /// assert_eq!(by_author.and(&recent).criteria().map(|c| c.len()), Some(2));
    /// ```
    pub fn parse<'a>(input: impl Into<ScopeInput<'a>>) -> Result<Scope> {
        GenericScopeBuilder::new().build(input)
    }

    /// Decodes the serialized form produced by [`Scope::to_json`].
    pub fn from_json(json: &serde_json::Value) -> Result<Scope> {
        GenericScopeBuilder::new().from_json(json)
    }

    /// Serialized form: a mapping with a `type` tag.
    pub fn to_json(&self) -> serde_json::Value {
        // Scopes only hold strings, numbers, lists and booleans.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// The variant's type tag.
    pub fn scope_type(&self) -> ScopeType {
        match self {
            Scope::All => ScopeType::All,
            Scope::None => ScopeType::None,
            Scope::Criteria { .. } => ScopeType::Criteria,
            Scope::Conjunction { .. } => ScopeType::Conjunction,
            Scope::Disjunction { .. } => ScopeType::Disjunction,
            Scope::Negation { .. } => ScopeType::Negation,
        }
    }

    /// The criteria of a criteria scope.
    pub fn criteria(&self) -> Option<&[Criterion]> {
        match self {
            Scope::Criteria { criteria, .. } => Some(criteria),
            _ => None,
        }
    }

    /// The children of a container scope.
    pub fn scopes(&self) -> Option<&[Scope]> {
        match self {
            Scope::Conjunction { scopes }
            | Scope::Disjunction { scopes }
            | Scope::Negation { scopes } => Some(scopes),
            Scope::All | Scope::None | Scope::Criteria { .. } => None,
        }
    }

    /// Returns `true` for an inverted criteria scope.
    pub fn is_inverted(&self) -> bool {
        matches!(self, Scope::Criteria { inverted: true, .. })
    }

    /// Returns `true` if the scope has nothing to filter by.
    ///
    /// `All` and `None` are never empty. Criteria scopes are empty without
    /// criteria; container scopes are empty without children.
    pub fn is_empty(&self) -> bool {
        match self {
            Scope::All | Scope::None => false,
            Scope::Criteria { criteria, .. } => criteria.is_empty(),
            Scope::Conjunction { scopes }
            | Scope::Disjunction { scopes }
            | Scope::Negation { scopes } => scopes.is_empty(),
        }
    }

    /// Returns a criteria scope with its criteria replaced.
    pub fn with_criteria(&self, criteria: impl IntoIterator<Item = Criterion>) -> Result<Scope> {
        match self {
            Scope::Criteria { inverted, .. } => Ok(Scope::Criteria {
                criteria: criteria.into_iter().collect(),
                inverted: *inverted,
            }),
            other => Err(QueryError::invalid_scope(format!(
                "{} scope has no criteria",
                other.scope_type()
            ))),
        }
    }

    /// Returns a container scope with its children replaced.
    pub fn with_scopes(&self, scopes: impl IntoIterator<Item = Scope>) -> Result<Scope> {
        let scopes: Arc<[Scope]> = scopes.into_iter().collect();
        match self {
            Scope::Conjunction { .. } => Ok(Scope::Conjunction { scopes }),
            Scope::Disjunction { .. } => Ok(Scope::Disjunction { scopes }),
            Scope::Negation { .. } => Ok(Scope::Negation { scopes }),
            other => Err(QueryError::invalid_scope(format!(
                "{} scope has no child scopes",
                other.scope_type()
            ))),
        }
    }

    // ========================================================================
    // Composition
    // ========================================================================

    /// Logical AND.
    pub fn and(&self, other: impl Into<Scope>) -> Scope {
        let other = other.into();

        if matches!(self, Scope::None) || matches!(other, Scope::None) {
            trace!("and: none absorbs");
            return Scope::None;
        }
        if matches!(self, Scope::All) {
            return other;
        }
        if matches!(other, Scope::All) || other.is_empty() {
            trace!("and: {} operand is an identity", other.scope_type());
            return self.clone();
        }

        match (self, other) {
            (
                Scope::Criteria {
                    criteria: left,
                    inverted: false,
                },
                Scope::Criteria {
                    criteria: right,
                    inverted: false,
                },
            ) => Scope::from_criteria(left.iter().chain(right.iter()).cloned()),
            (Scope::Conjunction { scopes }, Scope::Conjunction { scopes: more }) => {
                Scope::conjunction(scopes.iter().chain(more.iter()).cloned())
            }
            (Scope::Conjunction { scopes }, other) => {
                Scope::conjunction(scopes.iter().cloned().chain([other]))
            }
            (receiver, other) => Scope::conjunction([receiver.clone(), other]),
        }
    }

    /// Logical OR.
    ///
    /// Criteria scopes are never fused here; `a OR b` keeps both sides.
    pub fn or(&self, other: impl Into<Scope>) -> Scope {
        let other = other.into();

        if matches!(self, Scope::All) || matches!(other, Scope::All) {
            trace!("or: all absorbs");
            return Scope::All;
        }
        if matches!(self, Scope::None) {
            return other;
        }
        if matches!(other, Scope::None) || other.is_empty() {
            trace!("or: {} operand is an identity", other.scope_type());
            return self.clone();
        }

        match (self, other) {
            (Scope::Disjunction { scopes }, Scope::Disjunction { scopes: more }) => {
                Scope::disjunction(scopes.iter().chain(more.iter()).cloned())
            }
            (Scope::Disjunction { scopes }, other) => {
                Scope::disjunction(scopes.iter().cloned().chain([other]))
            }
            (receiver, other) => Scope::disjunction([receiver.clone(), other]),
        }
    }

    /// Logical AND NOT: `self.and(other.invert())`.
    ///
    /// Shortcuts skip the inversion when the result is already known, e.g.
    /// `x.not(None) == x` and `x.not(All) == None`.
    pub fn not(&self, other: impl Into<Scope>) -> Result<Scope> {
        let other = other.into();

        match other {
            Scope::None => return Ok(self.clone()),
            Scope::All => return Ok(Scope::None),
            _ => {}
        }
        if matches!(self, Scope::None) {
            return Ok(Scope::None);
        }
        if other.is_empty() {
            return Ok(self.clone());
        }

        Ok(self.and(other.invert()?))
    }

    /// Alias for [`Scope::not`].
    pub fn and_not(&self, other: impl Into<Scope>) -> Result<Scope> {
        self.not(other)
    }

    /// Logical complement.
    ///
    /// - `All` and `None` swap.
    /// - Criteria scopes flip their `inverted` flag. Every operator must be
    ///   invertible; otherwise this fails with
    ///   [`QueryError::UninvertibleOperator`].
    /// - A conjunction becomes a negation of the same children.
    /// - A negation of one child becomes that child; a negation of several
    ///   becomes a conjunction of them.
    /// - Disjunctions fail with [`QueryError::UninvertibleScope`].
    pub fn invert(&self) -> Result<Scope> {
        match self {
            Scope::All => Ok(Scope::None),
            Scope::None => Ok(Scope::All),
            Scope::Criteria { criteria, inverted } => {
                for criterion in criteria.iter() {
                    criterion.operator().invert()?;
                }
                Ok(Scope::Criteria {
                    criteria: Arc::clone(criteria),
                    inverted: !inverted,
                })
            }
            Scope::Conjunction { scopes } => Ok(Scope::Negation {
                scopes: Arc::clone(scopes),
            }),
            Scope::Negation { scopes } if scopes.len() == 1 => Ok(scopes[0].clone()),
            Scope::Negation { scopes } => Ok(Scope::Conjunction {
                scopes: Arc::clone(scopes),
            }),
            Scope::Disjunction { .. } => Err(QueryError::UninvertibleScope {
                scope_type: ScopeType::Disjunction.as_str(),
            }),
        }
    }

    /// [`Scope::and`] with a parsed operand.
    pub fn and_where<'a>(&self, input: impl Into<ScopeInput<'a>>) -> Result<Scope> {
        Ok(self.and(Scope::parse(input)?))
    }

    /// [`Scope::or`] with a parsed operand.
    pub fn or_where<'a>(&self, input: impl Into<ScopeInput<'a>>) -> Result<Scope> {
        Ok(self.or(Scope::parse(input)?))
    }

    /// [`Scope::not`] with a parsed operand.
    pub fn not_where<'a>(&self, input: impl Into<ScopeInput<'a>>) -> Result<Scope> {
        self.not(Scope::parse(input)?)
    }

    // ========================================================================
    // Evaluation
    // ========================================================================

    /// Tests a single record.
    ///
    /// Empty criteria and container scopes match every record.
    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> bool {
        match self {
            Scope::All => true,
            Scope::None => false,
            Scope::Criteria {
                criteria,
                inverted: false,
            } => criteria.iter().all(|criterion| criterion.matches(record)),
            Scope::Criteria {
                criteria,
                inverted: true,
            } => {
                criteria.is_empty()
                    || criteria
                        .iter()
                        .any(|criterion| criterion.matches_inverted(record))
            }
            Scope::Conjunction { scopes } => scopes.iter().all(|scope| scope.matches(record)),
            Scope::Disjunction { scopes } => {
                scopes.is_empty() || scopes.iter().any(|scope| scope.matches(record))
            }
            Scope::Negation { scopes } => !scopes.iter().any(|scope| scope.matches(record)),
        }
    }

    /// Filters a slice, keeping the input order.
    pub fn call<'d, R: Record>(&self, data: &'d [R]) -> Vec<&'d R> {
        data.iter().filter(|record| self.matches(*record)).collect()
    }
}

impl From<&Scope> for Scope {
    fn from(scope: &Scope) -> Self {
        scope.clone()
    }
}

impl From<Criterion> for Scope {
    fn from(criterion: Criterion) -> Self {
        Scope::from_criteria([criterion])
    }
}

impl From<Vec<Criterion>> for Scope {
    fn from(criteria: Vec<Criterion>) -> Self {
        Scope::from_criteria(criteria)
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Scope::from_json(&json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Operator;
    use crate::value::Value;
    use indexmap::IndexMap;
    use serde_json::json;

    fn eq(attribute: &str, value: &str) -> Criterion {
        Criterion::new(attribute, Operator::Equal, value)
    }

    fn author(name: &str) -> Scope {
        Scope::from_criteria([eq("author", name)])
    }

    fn series(name: &str) -> Scope {
        Scope::from_criteria([eq("series", name)])
    }

    fn book(author: &str, series: &str) -> IndexMap<String, Value> {
        IndexMap::from([
            ("author".to_string(), Value::from(author)),
            ("series".to_string(), Value::from(series)),
        ])
    }

    fn samples() -> Vec<Scope> {
        vec![
            author("Ursula K. LeGuin"),
            Scope::conjunction([author("a"), series("b")]),
            Scope::disjunction([author("a"), series("b")]),
            Scope::negation([author("a")]),
            author("a").invert().unwrap(),
        ]
    }

    #[test]
    fn identity_laws() {
        for x in samples() {
            assert_eq!(x.and(Scope::All), x);
            assert_eq!(Scope::All.and(&x), x);
            assert_eq!(x.and(Scope::None), Scope::None);
            assert_eq!(Scope::None.and(&x), Scope::None);
            assert_eq!(x.or(Scope::None), x);
            assert_eq!(Scope::None.or(&x), x);
            assert_eq!(x.or(Scope::All), Scope::All);
            assert_eq!(Scope::All.or(&x), Scope::All);
        }
    }

    #[test]
    fn empty_scopes_are_identities() {
        let x = author("a");
        for empty in [
            Scope::from_criteria([]),
            Scope::conjunction([]),
            Scope::disjunction([]),
            Scope::negation([]),
        ] {
            assert!(empty.is_empty());
            assert_eq!(x.and(&empty), x);
            assert_eq!(x.or(&empty), x);
        }
        assert!(!Scope::All.is_empty());
        assert!(!Scope::None.is_empty());
    }

    #[test]
    fn criteria_fuse_under_and() {
        let fused = author("a").and(series("b"));
        assert_eq!(fused, Scope::from_criteria([eq("author", "a"), eq("series", "b")]));
    }

    #[test]
    fn inverted_criteria_do_not_fuse() {
        let inverted = series("b").invert().unwrap();
        let combined = author("a").and(&inverted);
        assert_eq!(combined, Scope::conjunction([author("a"), inverted]));
    }

    #[test]
    fn criteria_do_not_fuse_under_or() {
        let either = author("a").or(series("b"));
        assert_eq!(either, Scope::disjunction([author("a"), series("b")]));
    }

    #[test]
    fn containers_flatten_their_own_kind() {
        let conj = Scope::conjunction([author("a"), Scope::negation([series("b")])]);
        let more = Scope::conjunction([series("c")]);
        assert_eq!(
            conj.and(&more),
            Scope::conjunction([author("a"), Scope::negation([series("b")]), series("c")])
        );
        assert_eq!(
            conj.and(Scope::negation([series("d")])),
            Scope::conjunction([
                author("a"),
                Scope::negation([series("b")]),
                Scope::negation([series("d")]),
            ])
        );

        let disj = Scope::disjunction([author("a"), author("b")]);
        assert_eq!(
            disj.or(Scope::disjunction([author("c")])),
            Scope::disjunction([author("a"), author("b"), author("c")])
        );
        assert_eq!(
            disj.or(series("x")),
            Scope::disjunction([author("a"), author("b"), series("x")])
        );
    }

    #[test]
    fn mixed_kinds_wrap_in_a_conjunction() {
        let disj = Scope::disjunction([author("a"), author("b")]);
        assert_eq!(
            disj.and(series("x")),
            Scope::conjunction([disj.clone(), series("x")])
        );
    }

    #[test]
    fn invert_rules() {
        assert_eq!(Scope::All.invert().unwrap(), Scope::None);
        assert_eq!(Scope::None.invert().unwrap(), Scope::All);

        let a = author("a");
        let b = series("b");
        assert_eq!(
            Scope::conjunction([a.clone(), b.clone()]).invert().unwrap(),
            Scope::negation([a.clone(), b.clone()])
        );
        assert_eq!(Scope::negation([a.clone()]).invert().unwrap(), a);
        assert_eq!(
            Scope::negation([a.clone(), b.clone()]).invert().unwrap(),
            Scope::conjunction([a.clone(), b.clone()])
        );

        let inverted = a.invert().unwrap();
        assert!(inverted.is_inverted());
        assert_eq!(inverted.criteria(), a.criteria());
        assert_eq!(inverted.invert().unwrap(), a);
    }

    #[test]
    fn invert_fails_eagerly_for_uninvertible_operators() {
        let scope = Scope::from_criteria([
            eq("author", "a"),
            Criterion::new("title", Operator::Contains, "Sea"),
        ]);
        assert!(matches!(
            scope.invert(),
            Err(QueryError::UninvertibleOperator {
                operator: "contains"
            })
        ));
    }

    #[test]
    fn disjunction_is_uninvertible() {
        let disj = Scope::disjunction([author("a")]);
        assert!(matches!(
            disj.invert(),
            Err(QueryError::UninvertibleScope {
                scope_type: "disjunction"
            })
        ));
        assert!(author("b").not(&disj).is_err());
    }

    #[test]
    fn not_shortcuts() {
        let x = author("a");
        assert_eq!(x.not(Scope::None).unwrap(), x);
        assert_eq!(x.not(Scope::All).unwrap(), Scope::None);
        assert_eq!(Scope::None.not(&x).unwrap(), Scope::None);
        assert_eq!(x.not(Scope::from_criteria([])).unwrap(), x);
        assert_eq!(
            x.not(series("b")).unwrap(),
            x.and(series("b").invert().unwrap())
        );
    }

    #[test]
    fn cross_variant_equality_is_false() {
        assert_ne!(Scope::conjunction([]), Scope::All);
        assert_ne!(Scope::from_criteria([]), Scope::conjunction([]));
        assert_ne!(author("a"), author("a").invert().unwrap());
    }

    #[test]
    fn evaluation() {
        let data = vec![
            book("Ursula K. LeGuin", "Earthsea"),
            book("Ursula K. LeGuin", "Hainish"),
            book("Frank Herbert", "Dune"),
        ];

        let leguin = author("Ursula K. LeGuin");
        assert_eq!(leguin.call(&data).len(), 2);

        let not_earthsea = leguin.not(series("Earthsea")).unwrap();
        assert_eq!(not_earthsea.call(&data), vec![&data[1]]);

        let either = series("Dune").or(series("Hainish"));
        assert_eq!(either.call(&data), vec![&data[1], &data[2]]);

        let neither = Scope::negation([series("Dune"), series("Hainish")]);
        assert_eq!(neither.call(&data), vec![&data[0]]);

        assert_eq!(Scope::All.call(&data).len(), 3);
        assert!(Scope::None.call(&data).is_empty());
        assert_eq!(Scope::disjunction([]).call(&data).len(), 3);
    }

    #[test]
    fn inverted_criteria_match_when_any_criterion_fails() {
        let data = vec![
            book("Ursula K. LeGuin", "Earthsea"),
            book("Ursula K. LeGuin", "Hainish"),
            book("Frank Herbert", "Dune"),
        ];
        let both = Scope::from_criteria([eq("author", "Ursula K. LeGuin"), eq("series", "Earthsea")]);
        let inverted = both.invert().unwrap();
        assert_eq!(inverted.call(&data), vec![&data[1], &data[2]]);
    }

    #[test]
    fn with_criteria_and_scopes() {
        let inverted = author("a").invert().unwrap();
        let replaced = inverted.with_criteria([eq("series", "b")]).unwrap();
        assert_eq!(replaced, series("b").invert().unwrap());

        let conj = Scope::conjunction([author("a")]);
        assert_eq!(
            conj.with_scopes([series("b")]).unwrap(),
            Scope::conjunction([series("b")])
        );

        assert!(matches!(
            Scope::All.with_criteria([]),
            Err(QueryError::InvalidScope { .. })
        ));
        assert!(matches!(
            author("a").with_scopes([]),
            Err(QueryError::InvalidScope { .. })
        ));
    }

    #[test]
    fn serialized_shape() {
        assert_eq!(Scope::All.to_json(), json!({ "type": "all" }));
        assert_eq!(Scope::None.to_json(), json!({ "type": "none" }));
        assert_eq!(
            author("a").invert().unwrap().to_json(),
            json!({
                "type": "criteria",
                "criteria": [["author", "equal", "a"]],
                "inverted": true,
            })
        );
        assert_eq!(
            Scope::negation([Scope::All]).to_json(),
            json!({ "type": "negation", "scopes": [{ "type": "all" }] })
        );
    }

    #[test]
    fn deserialize_through_the_builder() {
        let scope = Scope::conjunction([author("a"), Scope::disjunction([series("b"), Scope::None])]);
        let back: Scope = serde_json::from_value(scope.to_json()).unwrap();
        assert_eq!(back, scope);

        let err = serde_json::from_value::<Scope>(json!({ "type": "xor" })).unwrap_err();
        assert!(err.to_string().contains("unknown scope type `xor`"));
    }

    #[test]
    fn scope_type_tags() {
        for scope_type in ScopeType::ALL {
            assert_eq!(ScopeType::from_tag(scope_type.as_str()), Some(scope_type));
        }
        assert_eq!(ScopeType::from_tag("xor"), None);
        assert_eq!(author("a").scope_type(), ScopeType::Criteria);
    }
}
