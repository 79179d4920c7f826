//! Property-based tests for quarry using proptest.

use indexmap::IndexMap;
use proptest::prelude::*;
use quarry::{Criterion, Dir, Operator, Query, Scope, Value};

// ============================================================================
// Test helpers
// ============================================================================

type Item = IndexMap<String, Value>;

fn item(value: Option<i64>, name: &str, active: bool) -> Item {
    let mut item = IndexMap::new();
    if let Some(value) = value {
        item.insert("value".to_string(), Value::from(value));
    }
    item.insert("name".to_string(), Value::from(name));
    item.insert("active".to_string(), Value::from(active));
    item
}

// Some items lack `value` so null handling is exercised.
fn item_strategy() -> impl Strategy<Value = Item> {
    (
        prop::option::weighted(0.9, -50i64..50),
        "[a-z]{1,6}",
        any::<bool>(),
    )
        .prop_map(|(value, name, active)| item(value, &name, active))
}

fn items_strategy() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(item_strategy(), 0..60)
}

fn invertible_operator() -> impl Strategy<Value = Operator> {
    prop::sample::select(vec![
        Operator::Equal,
        Operator::NotEqual,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqualTo,
        Operator::LessThan,
        Operator::LessThanOrEqualTo,
    ])
}

fn criterion_strategy() -> impl Strategy<Value = Criterion> {
    (invertible_operator(), -50i64..50)
        .prop_map(|(operator, threshold)| Criterion::new("value", operator, threshold))
}

fn criteria_scope() -> impl Strategy<Value = Scope> {
    prop::collection::vec(criterion_strategy(), 1..4).prop_map(Scope::from_criteria)
}

fn leaf_strategy() -> impl Strategy<Value = Scope> {
    prop_oneof![Just(Scope::All), Just(Scope::None), criteria_scope()]
}

// Scopes built only from invertible pieces.
fn scope_strategy() -> impl Strategy<Value = Scope> {
    leaf_strategy().prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..3).prop_map(Scope::conjunction),
            prop::collection::vec(inner, 1..3).prop_map(Scope::negation),
        ]
    })
}

// Negation means "none of", so inversion is an exact complement only when
// every container has a single child.
fn single_child_scope() -> impl Strategy<Value = Scope> {
    leaf_strategy().prop_recursive(3, 6, 1, |inner| {
        prop_oneof![
            inner.clone().prop_map(|scope| Scope::conjunction([scope])),
            inner.prop_map(|scope| Scope::negation([scope])),
        ]
    })
}

fn matching(scope: &Scope, items: &[Item]) -> Vec<bool> {
    items.iter().map(|item| scope.matches(item)).collect()
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// `All` is the identity of `and`; `None` is the identity of `or`.
    #[test]
    fn identity_laws(scope in scope_strategy()) {
        prop_assert_eq!(scope.and(Scope::All), scope.clone());
        prop_assert_eq!(Scope::All.and(&scope), scope.clone());
        prop_assert_eq!(scope.or(Scope::None), scope.clone());
        prop_assert_eq!(Scope::None.or(&scope), scope.clone());
    }

    /// `None` absorbs `and`; `All` absorbs `or`.
    #[test]
    fn absorption_laws(scope in scope_strategy()) {
        prop_assert_eq!(scope.and(Scope::None), Scope::None);
        prop_assert_eq!(scope.or(Scope::All), Scope::All);
    }

    /// An operator and its inverse split any data set in two.
    #[test]
    fn operator_complement(
        items in items_strategy(),
        criterion in criterion_strategy(),
    ) {
        let inverse = criterion.inverted().unwrap();
        for item in &items {
            prop_assert_ne!(criterion.matches(item), inverse.matches(item));
        }
    }

    /// An inverted scope matches exactly the records the scope rejects.
    #[test]
    fn inversion_is_complement(
        items in items_strategy(),
        scope in single_child_scope(),
    ) {
        let inverted = scope.invert().unwrap();
        for item in &items {
            prop_assert_ne!(scope.matches(item), inverted.matches(item));
        }
    }

    /// Inverting twice yields an equivalent filter.
    #[test]
    fn double_inversion(
        items in items_strategy(),
        scope in single_child_scope(),
    ) {
        let twice = scope.invert().unwrap().invert().unwrap();
        prop_assert_eq!(matching(&twice, &items), matching(&scope, &items));
    }

    /// Conjunctions and multi-child negations flip back structurally.
    #[test]
    fn container_double_inversion_is_structural(
        scopes in prop::collection::vec(scope_strategy(), 2..4),
    ) {
        let conjunction = Scope::conjunction(scopes.clone());
        let negation = Scope::negation(scopes);
        prop_assert_eq!(conjunction.invert().unwrap().invert().unwrap(), conjunction);
        prop_assert_eq!(negation.invert().unwrap().invert().unwrap(), negation);
    }

    /// Criteria scopes flip back structurally.
    #[test]
    fn criteria_double_inversion_is_structural(scope in criteria_scope()) {
        prop_assert_eq!(scope.invert().unwrap().invert().unwrap(), scope);
    }

    /// `not` keeps exactly the records matching the receiver but not the
    /// argument.
    #[test]
    fn not_is_and_not(
        items in items_strategy(),
        left in scope_strategy(),
        right in single_child_scope(),
    ) {
        let scope = left.not(&right).unwrap();
        for item in &items {
            prop_assert_eq!(
                scope.matches(item),
                left.matches(item) && !right.matches(item)
            );
        }
    }

    /// Composition evaluates like the boolean connectives.
    #[test]
    fn composition_follows_boolean_logic(
        items in items_strategy(),
        left in scope_strategy(),
        right in scope_strategy(),
    ) {
        let both = left.and(&right);
        let either = left.or(&right);
        for item in &items {
            prop_assert_eq!(both.matches(item), left.matches(item) && right.matches(item));
            prop_assert_eq!(either.matches(item), left.matches(item) || right.matches(item));
        }
    }

    /// Filtering never adds records and keeps the input order.
    #[test]
    fn filter_keeps_input_order(
        items in items_strategy(),
        scope in scope_strategy(),
    ) {
        let results = scope.call(&items);
        prop_assert!(results.len() <= items.len());

        let expected: Vec<&Item> = items.iter().filter(|item| scope.matches(*item)).collect();
        prop_assert_eq!(results, expected);
    }

    /// Count equals the unpaginated result size, whatever the pagination.
    #[test]
    fn count_consistency(
        items in items_strategy(),
        scope in scope_strategy(),
        limit in 0usize..20,
        offset in 0usize..20,
    ) {
        let query = Query::from(scope);
        let paged = query.limit(limit).unwrap().offset(offset).unwrap();

        prop_assert_eq!(query.count(&items), query.call(&items).len());
        prop_assert_eq!(paged.count(&items), query.count(&items));
        prop_assert_eq!(query.exists(&items), query.count(&items) > 0);
    }

    /// `offset(o).limit(l)` is the `o..o + l` window of the full result.
    #[test]
    fn pagination_is_a_window(
        items in items_strategy(),
        limit in 0usize..30,
        offset in 0usize..70,
        desc in any::<bool>(),
    ) {
        let dir = if desc { Dir::Desc } else { Dir::Asc };
        let query = Query::new().order_by("value", dir).unwrap();
        let full = query.call(&items);

        let paged = query.offset(offset).unwrap().limit(limit).unwrap();
        let start = offset.min(full.len());
        let end = (offset + limit).min(full.len());
        prop_assert_eq!(paged.call(&items), full[start..end].to_vec());

        let lazy: Vec<&Item> = paged.each(&items).collect();
        prop_assert_eq!(lazy, full[start..end].to_vec());
    }

    /// Sorting is stable: equal keys keep their input order.
    #[test]
    fn ordering_is_stable(items in items_strategy()) {
        let query = Query::new().order([("active", "asc")]).unwrap();
        let results = query.call(&items);

        let expected: Vec<&Item> = items
            .iter()
            .filter(|item| item["active"] == Value::from(false))
            .chain(items.iter().filter(|item| item["active"] == Value::from(true)))
            .collect();
        prop_assert_eq!(results, expected);
    }

    /// Records without the sort attribute come last in either direction.
    #[test]
    fn nulls_sort_last(items in items_strategy(), desc in any::<bool>()) {
        let dir = if desc { Dir::Desc } else { Dir::Asc };
        let results = Query::new().order_by("value", dir).unwrap().call(&items);

        let first_null = results
            .iter()
            .position(|item| !item.contains_key("value"))
            .unwrap_or(results.len());
        prop_assert!(results[first_null..].iter().all(|item| !item.contains_key("value")));
    }

    /// Scopes survive their serialized form.
    #[test]
    fn serialized_scope_round_trip(scope in scope_strategy()) {
        let json = scope.to_json();
        prop_assert_eq!(Scope::from_json(&json).unwrap(), scope);
    }
}
