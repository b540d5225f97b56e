//! Descendant Walker
//!
//! Depth-first pre-order traversal over every descendant of a value,
//! driven by an explicit frame stack rather than recursion so that deeply
//! nested inputs cannot exhaust the call stack. Yields each descendant
//! (the owner itself is excluded) together with its path relative to the
//! owner. `serde_json::Value` is a tree by construction, so no cycle
//! guard is needed.

use serde_json::Value;

use crate::query::PathKey;

enum Frame<'a> {
    Array(std::iter::Enumerate<std::slice::Iter<'a, Value>>),
    Object(serde_json::map::Iter<'a>),
}

impl<'a> Frame<'a> {
    fn new(container: &'a Value) -> Option<Self> {
        match container {
            Value::Array(items) => Some(Self::Array(items.iter().enumerate())),
            Value::Object(fields) => Some(Self::Object(fields.iter())),
            _ => None,
        }
    }

    fn next_child(&mut self) -> Option<(PathKey, &'a Value)> {
        match self {
            Self::Array(iter) => iter.next().map(|(index, child)| (PathKey::Index(index), child)),
            Self::Object(iter) => iter.next().map(|(key, child)| (PathKey::Key(key.clone()), child)),
        }
    }
}

/// Iterator over `(relative_path, value)` for every descendant of the
/// value it was created from, in discovery (pre-)order.
pub struct DescendantWalker<'a> {
    stack: Vec<Frame<'a>>,
    trail: Vec<PathKey>,
}

impl<'a> DescendantWalker<'a> {
    pub fn new(owner: &'a Value) -> Self {
        Self {
            stack: Frame::new(owner).into_iter().collect(),
            trail: Vec::new(),
        }
    }
}

impl<'a> Iterator for DescendantWalker<'a> {
    type Item = (Vec<PathKey>, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len();
            let frame = self.stack.last_mut()?;
            match frame.next_child() {
                None => {
                    self.stack.pop();
                }
                Some((key, child)) => {
                    self.trail.truncate(depth - 1);
                    self.trail.push(key);
                    let path = self.trail.clone();
                    if let Some(frame) = Frame::new(child) {
                        self.stack.push(frame);
                    }
                    return Some((path, child));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::format_path;
    use serde_json::json;

    fn walk_paths(value: &Value) -> Vec<String> {
        DescendantWalker::new(value)
            .map(|(path, _)| format_path(&path))
            .collect()
    }

    #[test]
    fn test_walk_scalar_has_no_descendants() {
        assert!(walk_paths(&json!(42)).is_empty());
        assert!(walk_paths(&json!(null)).is_empty());
    }

    #[test]
    fn test_walk_preorder() {
        let value = json!({"a": {"b": 1}, "c": [2, {"d": 3}]});
        assert_eq!(
            walk_paths(&value),
            vec![
                "$[\"a\"]",
                "$[\"a\"][\"b\"]",
                "$[\"c\"]",
                "$[\"c\"][0]",
                "$[\"c\"][1]",
                "$[\"c\"][1][\"d\"]",
            ]
        );
    }

    #[test]
    fn test_walk_descends_through_arrays() {
        let value = json!([[["x"]]]);
        assert_eq!(
            walk_paths(&value),
            vec!["$[0]", "$[0][0]", "$[0][0][0]"]
        );
    }

    #[test]
    fn test_walk_deeply_nested_does_not_recurse() {
        // Deep enough to catch an accidentally recursive walker.
        let mut value = json!(0);
        for _ in 0..10_000 {
            value = json!({ "k": value });
        }
        assert_eq!(DescendantWalker::new(&value).count(), 10_000);
    }

    #[test]
    fn test_walk_values() {
        let value = json!({"a": [true]});
        let seen: Vec<Value> = DescendantWalker::new(&value)
            .map(|(_, node)| node.clone())
            .collect();
        assert_eq!(seen, vec![json!([true]), json!(true)]);
    }
}
