//! Value-model helpers
//!
//! The engine operates on `serde_json::Value` graphs (with the
//! `preserve_order` feature, so object key order is traversal order).
//! This module holds the small comparison/coercion primitives the
//! predicate evaluator builds on.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value;

use crate::query::PathKey;

/// Equality with numbers compared by numeric value rather than by their
/// integer/float representation, so `1` and `1.0` are equal. Containers
/// compare element-wise with the same rule.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(av, bv)| loose_eq(av, bv))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, av)| y.get(k).is_some_and(|bv| loose_eq(av, bv)))
        }
        _ => a == b,
    }
}

/// Ordering for the `<`/`<=`/`>`/`>=` operators: numeric for numbers,
/// lexicographic for strings, undefined otherwise.
pub fn compare_order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.as_str().cmp(y.as_str())),
        _ => None,
    }
}

/// String form of a value, as used by the `^=`/`$=`/`*=` and regex
/// operators. Strings are taken verbatim, everything else serializes to
/// its JSON text.
pub fn text_of(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(text) => Cow::Borrowed(text.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Direct children of a container in native order (array index order,
/// object insertion order). Scalars have none.
pub fn children(owner: &Value) -> Vec<(PathKey, &Value)> {
    match owner {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, child)| (PathKey::Index(index), child))
            .collect(),
        Value::Object(fields) => fields
            .iter()
            .map(|(key, child)| (PathKey::Key(key.clone()), child))
            .collect(),
        _ => Vec::new(),
    }
}

/// Resolve a path to the value it names, if it exists.
pub fn resolve<'a>(root: &'a Value, path: &[PathKey]) -> Option<&'a Value> {
    let mut node = root;
    for key in path {
        node = match (node, key) {
            (Value::Object(fields), PathKey::Key(name)) => fields.get(name)?,
            (Value::Array(items), PathKey::Index(index)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Mutable variant of [`resolve`], used by the mutation applier.
pub fn resolve_mut<'a>(root: &'a mut Value, path: &[PathKey]) -> Option<&'a mut Value> {
    let mut node = root;
    for key in path {
        node = match (node, key) {
            (Value::Object(fields), PathKey::Key(name)) => fields.get_mut(name)?,
            (Value::Array(items), PathKey::Index(index)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(node)
}
