//! Attribute access for records in a data source.
//!
//! Scopes and queries evaluate against any slice of types implementing
//! [`Record`]. The common map types are covered out of the box.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use indexmap::IndexMap;

use crate::value::Value;

/// Trait for types that scopes can filter.
///
/// # Example
///
/// ```
/// use quarry::{Record, Value};
///
/// struct Book {
///     title: Value,
///     author: Value,
/// }
///
/// impl Record for Book {
///     fn attribute(&self, name: &str) -> Option<&Value> {
///         match name {
///             "title" => Some(&self.title),
///             "author" => Some(&self.author),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Record {
    /// Returns the value of an attribute, or `None` if the record does not
    /// have it. Missing attributes compare as [`Value::Null`].
    fn attribute(&self, name: &str) -> Option<&Value>;
}

impl<S: BuildHasher> Record for IndexMap<String, Value, S> {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Record for BTreeMap<String, Value> {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl<S: BuildHasher> Record for HashMap<String, Value, S> {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn attribute(&self, name: &str) -> Option<&Value> {
        (**self).attribute(name)
    }
}

static NULL: Value = Value::Null;

/// Reads an attribute, treating a missing one as null.
pub(crate) fn read<'r, R: Record + ?Sized>(record: &'r R, name: &str) -> &'r Value {
    record.attribute(name).unwrap_or(&NULL)
}
