//! Mutation Applier
//!
//! Resolves every matched path to an owner/key pair and performs the
//! query's mutation there: set, shallow merge, regex replace, or (with no
//! mutation spec) delete. Matches are processed in reverse discovery
//! order so array deletions never shift indices out from under the
//! not-yet-processed matches.

use std::time::{SystemTime, UNIX_EPOCH};

use log::trace;
use serde_json::Value;

use crate::eval::evaluate;
use crate::query::{format_path, Mutation, Path, PathKey, Query, ReplaceSpec};
use crate::value::resolve_mut;

/// Evaluate `query` against `root` and mutate every matched location.
/// Returns `None` when nothing matched (the root is dropped in that
/// case, as it is when the query prunes the root itself); otherwise the
/// mutated root.
pub fn apply(query: &Query, root: Value) -> Option<Value> {
    let paths = evaluate(query, &root);
    if paths.is_empty() {
        return None;
    }

    // A synthetic one-element holder gives even the conceptual root an
    // owner, so a match at the empty path can be mutated like any other.
    let mut holder = Value::Array(vec![root]);
    for path in paths.iter().rev() {
        apply_at(&mut holder, path, query.mutation.as_ref());
    }

    match holder {
        Value::Array(mut items) => items.pop(),
        _ => None,
    }
}

fn apply_at(holder: &mut Value, path: &Path, mutation: Option<&Mutation>) {
    // Owner of the match: the holder itself for a root match, otherwise
    // the container one level above the final segment.
    let root_key = PathKey::Index(0);
    let (owner, key) = match path.split_last() {
        None => (holder, &root_key),
        Some((last, parent)) => {
            let full_parent: Vec<PathKey> =
                std::iter::once(PathKey::Index(0)).chain(parent.iter().cloned()).collect();
            match resolve_mut(holder, &full_parent) {
                Some(owner) => (owner, last),
                None => return,
            }
        }
    };

    match mutation {
        None => delete_at(owner, key),
        Some(Mutation::Set(value)) => set_at(owner, key, value.clone()),
        Some(Mutation::Merge(fields)) => {
            let Some(target) = child_mut(owner, key) else {
                return;
            };
            match target {
                Value::Object(existing) => {
                    for (name, value) in fields {
                        existing.insert(name.clone(), value.clone());
                    }
                }
                _ => trace!("merge skipped: {} is not an object", format_path(path)),
            }
        }
        Some(Mutation::Replace(spec)) => {
            let Some(target) = child_mut(owner, key) else {
                return;
            };
            match target {
                Value::String(existing) => {
                    if let Some(rewritten) = rewrite(spec, existing) {
                        *existing = rewritten;
                    }
                }
                _ => trace!("replace skipped: {} is not a string", format_path(path)),
            }
        }
    }
}

fn delete_at(owner: &mut Value, key: &PathKey) {
    match (owner, key) {
        (Value::Array(items), PathKey::Index(index)) => {
            if *index < items.len() {
                items.remove(*index);
            }
        }
        (Value::Object(fields), PathKey::Key(name)) => {
            fields.remove(name);
        }
        _ => {}
    }
}

fn set_at(owner: &mut Value, key: &PathKey, value: Value) {
    match (owner, key) {
        (Value::Array(items), PathKey::Index(index)) => {
            if let Some(slot) = items.get_mut(*index) {
                *slot = value;
            }
        }
        (Value::Object(fields), PathKey::Key(name)) => {
            fields.insert(name.clone(), value);
        }
        _ => {}
    }
}

fn child_mut<'a>(owner: &'a mut Value, key: &PathKey) -> Option<&'a mut Value> {
    match (owner, key) {
        (Value::Array(items), PathKey::Index(index)) => items.get_mut(*index),
        (Value::Object(fields), PathKey::Key(name)) => fields.get_mut(name),
        _ => None,
    }
}

/// Run one replace. The `${now}` token is substituted before the string
/// reaches the regex engine so it can never be mistaken for a named
/// capture reference.
fn rewrite(spec: &ReplaceSpec, input: &str) -> Option<String> {
    let re = spec.regex()?;
    let replacement = if spec.replacement.contains("${now}") {
        spec.replacement.replace("${now}", &epoch_millis().to_string())
    } else {
        spec.replacement.clone()
    };
    let rewritten = if spec.replace_all() {
        re.replace_all(input, replacement.as_str())
    } else {
        re.replace(input, replacement.as_str())
    };
    Some(rewritten.into_owned())
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}
