//! Path Evaluator
//!
//! Walks a root value with a compiled step program and produces the list
//! of matching paths. This is the engine's hot path: it never mutates the
//! input and never hands out live references, only key/index paths, which
//! is what lets the applier process matches (including array deletions)
//! safely afterwards.

use std::cmp::Ordering;

use serde_json::Value;

use crate::query::{Compare, KeySpec, KeyToken, Path, PathKey, Query, Step};
use crate::value::{children, compare_order, loose_eq, resolve, text_of};
use crate::walk::DescendantWalker;

/// Evaluate a compiled query against a root value. Deterministic; result
/// order is discovery order and duplicates are kept.
pub fn evaluate(query: &Query, root: &Value) -> Vec<Path> {
    run_program(&query.steps, root)
}

/// Run a step program. The leading step must be an anchor (`Root` or
/// `Current`); both bind to `root` here — the caller decides what value
/// that is (the document root, or the node a filter is testing).
pub(crate) fn run_program(steps: &[Step], root: &Value) -> Vec<Path> {
    let mut rest = steps.iter();
    match rest.next() {
        Some(Step::Root | Step::Current) => {}
        _ => return Vec::new(),
    }

    let mut paths: Vec<Path> = vec![Vec::new()];
    for step in rest {
        let mut next = Vec::new();
        for path in &paths {
            let Some(owner) = resolve(root, path) else {
                continue;
            };
            match step {
                // Anchors only lead a program; mid-program they are inert.
                Step::Root | Step::Current => next.push(path.clone()),
                Step::Select {
                    keys,
                    descend,
                    compare,
                } => select_into(owner, path, keys, *descend, compare.as_ref(), &mut next),
                Step::Filter {
                    program,
                    negate,
                    descend,
                } => filter_into(owner, path, program, *negate, *descend, &mut next),
            }
        }
        paths = next;
        if paths.is_empty() {
            break;
        }
    }
    paths
}

// =============================================================================
// Selection steps
// =============================================================================

fn select_into(
    owner: &Value,
    base: &Path,
    keys: &KeySpec,
    descend: bool,
    compare: Option<&Compare>,
    out: &mut Vec<Path>,
) {
    match keys {
        KeySpec::Wildcard => {
            if descend {
                // Every descendant, pre-order; direct children come first
                // as a consequence of the walk order.
                for (relative, node) in DescendantWalker::new(owner) {
                    if compare_passes(compare, node) {
                        out.push(joined(base, &relative));
                    }
                }
            } else {
                for (key, child) in children(owner) {
                    if compare_passes(compare, child) {
                        out.push(appended(base, key));
                    }
                }
            }
        }
        KeySpec::Keys(tokens) => {
            for token in tokens {
                if let Some(key) = eval_predicate(owner, token, compare) {
                    out.push(appended(base, key));
                }
            }
            if descend {
                for (relative, node) in DescendantWalker::new(owner) {
                    for token in tokens {
                        if let Some(key) = eval_predicate(node, token, compare) {
                            let mut path = joined(base, &relative);
                            path.push(key);
                            out.push(path);
                        }
                    }
                }
            }
        }
    }
}

// =============================================================================
// Expression (predicate) evaluation
// =============================================================================

/// Test one requested key against an owner: normalize the key relative to
/// the owner, require it to exist, and apply the comparison clause if one
/// is present. Returns the normalized key on success.
fn eval_predicate(owner: &Value, token: &KeyToken, compare: Option<&Compare>) -> Option<PathKey> {
    match owner {
        Value::Object(fields) => {
            // Numeric syntax against an object is a literal string key.
            let name = match token {
                KeyToken::Name(name) => name.clone(),
                KeyToken::Index(index) => index.to_string(),
            };
            let value = fields.get(&name)?;
            compare_passes(compare, value).then_some(PathKey::Key(name))
        }
        Value::Array(items) => {
            let KeyToken::Index(raw) = token else {
                return None;
            };
            let index = normalize_index(*raw, items.len())?;
            compare_passes(compare, &items[index]).then_some(PathKey::Index(index))
        }
        _ => None,
    }
}

/// Negative indices count from the end, but only against a real array.
fn normalize_index(raw: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if raw < 0 { raw + len } else { raw };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

fn compare_passes(compare: Option<&Compare>, value: &Value) -> bool {
    let Some(compare) = compare else {
        // Bare existence check: the key resolved, that is the test.
        return true;
    };
    match compare {
        Compare::Eq(rhs) => loose_eq(value, rhs),
        Compare::Ne(rhs) => !loose_eq(value, rhs),
        Compare::Lt(rhs) => compare_order(value, rhs) == Some(Ordering::Less),
        Compare::Le(rhs) => {
            matches!(compare_order(value, rhs), Some(Ordering::Less | Ordering::Equal))
        }
        Compare::Gt(rhs) => compare_order(value, rhs) == Some(Ordering::Greater),
        Compare::Ge(rhs) => matches!(
            compare_order(value, rhs),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Compare::StartsWith(prefix) => text_of(value).starts_with(prefix.as_str()),
        Compare::EndsWith(suffix) => text_of(value).ends_with(suffix.as_str()),
        Compare::Contains(needle) => text_of(value).contains(needle.as_str()),
        Compare::Regex(re) => re.is_match(&text_of(value)),
    }
}

// =============================================================================
// Filter steps
// =============================================================================

/// A filter never tests an array node as its own identity: against an
/// array owner it searches the elements ("does this array contain a
/// matching element"), and a descendant filter skips array nodes while
/// testing every other descendant.
fn filter_into(
    owner: &Value,
    base: &Path,
    program: &[Step],
    negate: bool,
    descend: bool,
    out: &mut Vec<Path>,
) {
    if descend {
        if !owner.is_array() && passes_filter(program, owner) != negate {
            out.push(base.clone());
        }
        for (relative, node) in DescendantWalker::new(owner) {
            if node.is_array() {
                continue;
            }
            if passes_filter(program, node) != negate {
                out.push(joined(base, &relative));
            }
        }
        return;
    }

    match owner {
        Value::Array(items) => {
            for (index, element) in items.iter().enumerate() {
                if element.is_array() {
                    continue;
                }
                if passes_filter(program, element) != negate {
                    out.push(appended(base, PathKey::Index(index)));
                }
            }
        }
        _ => {
            if passes_filter(program, owner) != negate {
                out.push(base.clone());
            }
        }
    }
}

fn passes_filter(program: &[Step], node: &Value) -> bool {
    !run_program(program, node).is_empty()
}

// =============================================================================
// Path helpers
// =============================================================================

fn appended(base: &Path, key: PathKey) -> Path {
    let mut path = base.clone();
    path.push(key);
    path
}

fn joined(base: &Path, relative: &[PathKey]) -> Path {
    let mut path = base.clone();
    path.extend_from_slice(relative);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn select(keys: KeySpec) -> Step {
        Step::Select {
            keys,
            descend: false,
            compare: None,
        }
    }

    fn select_desc(keys: KeySpec) -> Step {
        Step::Select {
            keys,
            descend: true,
            compare: None,
        }
    }

    fn name(key: &str) -> KeyToken {
        KeyToken::Name(key.to_string())
    }

    fn keyed(tokens: Vec<KeyToken>) -> KeySpec {
        KeySpec::Keys(tokens)
    }

    fn query(steps: Vec<Step>) -> Query {
        Query::new(steps, None)
    }

    fn paths_of(steps: Vec<Step>, root: &Value) -> Vec<Path> {
        evaluate(&query(steps), root)
    }

    #[test]
    fn test_root_only_matches_empty_path() {
        let root = json!({"a": 1});
        assert_eq!(paths_of(vec![Step::Root], &root), vec![Vec::<PathKey>::new()]);
    }

    #[test]
    fn test_missing_anchor_yields_nothing() {
        let root = json!({"a": 1});
        assert!(paths_of(vec![select(keyed(vec![name("a")]))], &root).is_empty());
        assert!(paths_of(vec![], &root).is_empty());
    }

    #[test]
    fn test_child_key() {
        let root = json!({"a": {"b": 1}});
        let paths = paths_of(
            vec![
                Step::Root,
                select(keyed(vec![name("a")])),
                select(keyed(vec![name("b")])),
            ],
            &root,
        );
        assert_eq!(
            paths,
            vec![vec![PathKey::Key("a".to_string()), PathKey::Key("b".to_string())]]
        );
    }

    #[test]
    fn test_multi_key_bracket_keeps_request_order() {
        let root = json!({"a": 1, "b": 2, "c": 3});
        let paths = paths_of(
            vec![
                Step::Root,
                select(keyed(vec![name("c"), name("missing"), name("a")])),
            ],
            &root,
        );
        assert_eq!(
            paths,
            vec![
                vec![PathKey::Key("c".to_string())],
                vec![PathKey::Key("a".to_string())],
            ]
        );
    }

    #[test]
    fn test_negative_index_normalizes_against_array() {
        let root = json!({"items": [1, 2, 3]});
        let paths = paths_of(
            vec![
                Step::Root,
                select(keyed(vec![name("items")])),
                select(keyed(vec![KeyToken::Index(-1)])),
            ],
            &root,
        );
        assert_eq!(
            paths,
            vec![vec![PathKey::Key("items".to_string()), PathKey::Index(2)]]
        );
    }

    #[test]
    fn test_numeric_key_against_object_is_literal() {
        let root = json!({"-1": 9});
        let paths = paths_of(vec![Step::Root, select(keyed(vec![KeyToken::Index(-1)]))], &root);
        assert_eq!(paths, vec![vec![PathKey::Key("-1".to_string())]]);
    }

    #[test]
    fn test_out_of_range_index() {
        let root = json!([1, 2]);
        assert!(paths_of(vec![Step::Root, select(keyed(vec![KeyToken::Index(5)]))], &root).is_empty());
        assert!(paths_of(vec![Step::Root, select(keyed(vec![KeyToken::Index(-3)]))], &root).is_empty());
    }

    #[test]
    fn test_wildcard_child_order() {
        let root = json!({"b": 1, "a": [10, 20]});
        let paths = paths_of(vec![Step::Root, select(KeySpec::Wildcard)], &root);
        assert_eq!(
            paths,
            vec![
                vec![PathKey::Key("b".to_string())],
                vec![PathKey::Key("a".to_string())],
            ]
        );
    }

    #[test]
    fn test_wildcard_descendant_enumerates_all_nodes() {
        let root = json!({"a": {"b": 1}, "c": 2});
        let paths = paths_of(vec![Step::Root, select_desc(KeySpec::Wildcard)], &root);
        assert_eq!(
            paths,
            vec![
                vec![PathKey::Key("a".to_string())],
                vec![PathKey::Key("a".to_string()), PathKey::Key("b".to_string())],
                vec![PathKey::Key("c".to_string())],
            ]
        );
    }

    #[test]
    fn test_descendant_key_finds_all_depths() {
        let root = json!({"x": {"target": 1}, "target": 2, "list": [{"target": 3}]});
        let paths = paths_of(vec![Step::Root, select_desc(keyed(vec![name("target")]))], &root);
        // Owner's own child first, then descendants in walk order.
        assert_eq!(
            paths,
            vec![
                vec![PathKey::Key("target".to_string())],
                vec![PathKey::Key("x".to_string()), PathKey::Key("target".to_string())],
                vec![
                    PathKey::Key("list".to_string()),
                    PathKey::Index(0),
                    PathKey::Key("target".to_string()),
                ],
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        let owner = json!({"n": 5, "s": "widget"});
        let n = name("n");
        let s = name("s");
        let cases = [
            (Compare::Eq(json!(5.0)), &n, true),
            (Compare::Eq(json!(4)), &n, false),
            (Compare::Ne(json!(4)), &n, true),
            (Compare::Lt(json!(6)), &n, true),
            (Compare::Le(json!(5)), &n, true),
            (Compare::Gt(json!(5)), &n, false),
            (Compare::Ge(json!(5)), &n, true),
            (Compare::StartsWith("wid".to_string()), &s, true),
            (Compare::EndsWith("get".to_string()), &s, true),
            (Compare::Contains("dge".to_string()), &s, true),
            (Compare::Contains("xyz".to_string()), &s, false),
            // Ordering across types never passes.
            (Compare::Lt(json!("6")), &n, false),
        ];
        for (compare, token, expected) in cases {
            assert_eq!(
                eval_predicate(&owner, token, Some(&compare)).is_some(),
                expected,
                "{compare:?}"
            );
        }
    }

    #[test]
    fn test_comparison_requires_existing_key() {
        let owner = json!({"n": 5});
        assert!(eval_predicate(&owner, &name("missing"), Some(&Compare::Ne(json!(1)))).is_none());
        // Bare existence is the one operator-free form.
        assert!(eval_predicate(&owner, &name("missing"), None).is_none());
        assert!(eval_predicate(&owner, &name("n"), None).is_some());
    }

    #[test]
    fn test_regex_compare_coerces_to_text() {
        let owner = json!({"n": 1234});
        let re = regex::Regex::new("^12").unwrap();
        assert!(eval_predicate(&owner, &name("n"), Some(&Compare::Regex(re))).is_some());
    }

    #[test]
    fn test_filter_on_object_owner_tests_the_owner() {
        let root = json!({"a": {"flag": true}, "b": {"flag": false}});
        let program = vec![
            Step::Current,
            Step::Select {
                keys: keyed(vec![name("flag")]),
                descend: false,
                compare: Some(Compare::Eq(json!(true))),
            },
        ];
        let steps = vec![
            Step::Root,
            select(keyed(vec![name("a"), name("b")])),
            Step::Filter {
                program,
                negate: false,
                descend: false,
            },
        ];
        // The candidate paths themselves are kept or dropped.
        assert_eq!(paths_of(steps, &root), vec![vec![PathKey::Key("a".to_string())]]);
    }

    #[test]
    fn test_filter_on_array_owner_tests_elements() {
        let root = json!({"items": [{"hidden": true}, {"x": 1}, [0]]});
        let program = vec![Step::Current, select(keyed(vec![name("hidden")]))];
        let steps = vec![
            Step::Root,
            select(keyed(vec![name("items")])),
            Step::Filter {
                program,
                negate: true,
                descend: false,
            },
        ];
        // Element 0 matches the sub-program and is dropped by negation;
        // element 2 is an array and is never tested as its own identity.
        assert_eq!(
            paths_of(steps, &root),
            vec![vec![PathKey::Key("items".to_string()), PathKey::Index(1)]]
        );
    }

    #[test]
    fn test_descendant_filter_matches_any_depth() {
        let root = json!({
            "a": {"flag": true},
            "b": {"x": {"flag": true}},
            "c": {"flag": false},
        });
        let program = vec![
            Step::Current,
            Step::Select {
                keys: keyed(vec![name("flag")]),
                descend: false,
                compare: Some(Compare::Eq(json!(true))),
            },
        ];
        let steps = vec![
            Step::Root,
            Step::Filter {
                program,
                negate: false,
                descend: true,
            },
        ];
        assert_eq!(
            paths_of(steps, &root),
            vec![
                vec![PathKey::Key("a".to_string())],
                vec![PathKey::Key("b".to_string()), PathKey::Key("x".to_string())],
            ]
        );
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let root = json!({"a": {"k": 1}, "b": [{"k": 2}, {"k": 3}]});
        let steps = vec![Step::Root, select_desc(keyed(vec![name("k")]))];
        let first = paths_of(steps.clone(), &root);
        let second = paths_of(steps, &root);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
