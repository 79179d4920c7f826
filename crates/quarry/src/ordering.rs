//! Ordering types for query result sorting.
//!
//! Provides [`Dir`] for sort direction and [`Order`], an ordered mapping of
//! attribute names to directions.

use std::cmp::Ordering;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{QueryError, Result};
use crate::record::{read, Record};
use crate::value::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dir {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

impl Dir {
    /// Applies this direction to an ordering.
    ///
    /// For `Asc`, returns the ordering unchanged.
    /// For `Desc`, reverses the ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    /// Returns the display name of this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl std::fmt::Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dir {
    type Err = QueryError;

    /// Accepts `asc`, `ascending`, `desc` and `descending`, in any case.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Dir::Asc),
            "desc" | "descending" => Ok(Dir::Desc),
            _ => Err(QueryError::invalid_argument(format!(
                "sort direction must be ascending or descending, got {s:?}"
            ))),
        }
    }
}

impl Serialize for Dir {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Dir {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordered mapping of attribute names to sort directions.
///
/// The first entry is the primary sort key, later entries break ties. An
/// empty order keeps the data source's order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IndexMap<String, Dir>")]
pub struct Order(IndexMap<String, Dir>);

impl Order {
    /// Creates an empty order.
    pub fn new() -> Self {
        Order::default()
    }

    /// Parses `(attribute, direction)` pairs.
    ///
    /// Fails with [`QueryError::InvalidArgument`] for a blank attribute or a
    /// direction other than ascending/descending.
    ///
    /// ```
    /// use quarry::{Dir, Order};
    ///
    /// let order = Order::parse([("author", "asc"), ("published_at", "descending")]).unwrap();
    /// assert_eq!(order.get("published_at"), Some(Dir::Desc));
    /// ```
    pub fn parse<I, K, D>(entries: I) -> Result<Order>
    where
        I: IntoIterator<Item = (K, D)>,
        K: AsRef<str>,
        D: AsRef<str>,
    {
        let mut order = Order::new();
        for (field, dir) in entries {
            order = order.then(field.as_ref(), dir.as_ref().parse()?)?;
        }
        Ok(order)
    }

    /// Returns a copy with one more sort key.
    ///
    /// Re-adding an attribute moves it to the end with the new direction.
    pub fn then(&self, field: impl Into<String>, dir: Dir) -> Result<Order> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(QueryError::invalid_argument("order attribute can't be blank"));
        }

        let mut fields = self.0.clone();
        fields.shift_remove(&field);
        fields.insert(field, dir);
        Ok(Order(fields))
    }

    /// Direction for an attribute, if it is a sort key.
    pub fn get(&self, field: &str) -> Option<Dir> {
        self.0.get(field).copied()
    }

    /// Number of sort keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no sort keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the sort keys in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Dir)> {
        self.0.iter().map(|(field, dir)| (field.as_str(), *dir))
    }

    /// Compares two records using every sort key in turn.
    ///
    /// Records missing a sort attribute come last in either direction.
    pub fn compare<R: Record + ?Sized>(&self, a: &R, b: &R) -> Ordering {
        for (field, dir) in &self.0 {
            let (x, y) = (read(a, field), read(b, field));
            let ordering = if x.is_null() || y.is_null() {
                compare_values(x, y)
            } else {
                dir.apply(x.total_cmp(y))
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl TryFrom<IndexMap<String, Dir>> for Order {
    type Error = QueryError;

    fn try_from(fields: IndexMap<String, Dir>) -> Result<Self> {
        fields
            .into_iter()
            .try_fold(Order::new(), |order, (field, dir)| order.then(field, dir))
    }
}

/// Compares two attribute values for sorting.
///
/// Nulls sort after every other value; everything else follows
/// [`Value::total_cmp`].
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => a.total_cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_apply() {
        assert_eq!(Dir::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(Dir::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Dir::Desc.apply(Ordering::Equal), Ordering::Equal);
    }

    #[test]
    fn dir_parsing() {
        assert_eq!("asc".parse::<Dir>().unwrap(), Dir::Asc);
        assert_eq!("Ascending".parse::<Dir>().unwrap(), Dir::Asc);
        assert_eq!("DESC".parse::<Dir>().unwrap(), Dir::Desc);
        assert!(matches!(
            "sideways".parse::<Dir>(),
            Err(QueryError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn order_rejects_blank_attributes() {
        assert!(matches!(
            Order::parse([(" ", "asc")]),
            Err(QueryError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn order_keeps_priority() {
        let order = Order::parse([("author", "asc"), ("title", "desc")]).unwrap();
        let keys: Vec<_> = order.iter().collect();
        assert_eq!(keys, [("author", Dir::Asc), ("title", Dir::Desc)]);

        let moved = order.then("author", Dir::Desc).unwrap();
        let keys: Vec<_> = moved.iter().collect();
        assert_eq!(keys, [("title", Dir::Desc), ("author", Dir::Desc)]);
    }

    #[test]
    fn compare_none_values() {
        let none = Value::Null;
        let some = Value::from("test");

        assert_eq!(compare_values(&none, &some), Ordering::Greater);
        assert_eq!(compare_values(&some, &none), Ordering::Less);
        assert_eq!(compare_values(&none, &none), Ordering::Equal);
    }

    #[test]
    fn compare_by_multiple_keys() {
        let row = |title: &str, rating: i64| -> IndexMap<String, Value> {
            IndexMap::from([
                ("title".to_string(), Value::from(title)),
                ("rating".to_string(), Value::from(rating)),
            ])
        };
        let order = Order::parse([("rating", "desc"), ("title", "asc")]).unwrap();

        assert_eq!(order.compare(&row("b", 5), &row("a", 4)), Ordering::Less);
        assert_eq!(order.compare(&row("a", 5), &row("b", 5)), Ordering::Less);
        assert_eq!(order.compare(&row("a", 5), &row("a", 5)), Ordering::Equal);
    }

    #[test]
    fn missing_attributes_sort_last_both_ways() {
        let with = IndexMap::from([("rating".to_string(), Value::from(1))]);
        let without: IndexMap<String, Value> = IndexMap::new();

        for dir in ["asc", "desc"] {
            let order = Order::parse([("rating", dir)]).unwrap();
            assert_eq!(order.compare(&with, &without), Ordering::Less);
            assert_eq!(order.compare(&without, &with), Ordering::Greater);
        }
    }

    #[test]
    fn serde_round_trip_validates() {
        let order = Order::parse([("author", "asc")]).unwrap();
        assert_eq!(
            serde_json::to_value(&order).unwrap(),
            serde_json::json!({ "author": "asc" })
        );

        let parsed: Order =
            serde_json::from_value(serde_json::json!({ "title": "descending" })).unwrap();
        assert_eq!(parsed.get("title"), Some(Dir::Desc));

        assert!(serde_json::from_value::<Order>(serde_json::json!({ "": "asc" })).is_err());
        assert!(serde_json::from_value::<Order>(serde_json::json!({ "title": "up" })).is_err());
    }
}
