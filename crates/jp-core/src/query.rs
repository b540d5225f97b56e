//! Compiled query representation
//!
//! These types are produced by the jp-compiler crate and consumed by the
//! evaluator and the mutation applier. A `Query` is immutable once built;
//! the only cross-call state it carries is the lazily compiled replace
//! regex, memoized per instance.

use std::fmt;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

// =============================================================================
// Paths
// =============================================================================

/// One segment of a match path: an object key or a (normalized) array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    Key(String),
    Index(usize),
}

/// Route from the conceptual root down to one matched value.
pub type Path = Vec<PathKey>;

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "[{:?}]", key),
            Self::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Render a path as a bracketed accessor chain, e.g. `$["items"][2]`.
pub fn format_path(path: &[PathKey]) -> String {
    let mut out = String::from("$");
    for key in path {
        out.push_str(&key.to_string());
    }
    out
}

// =============================================================================
// Steps
// =============================================================================

/// A requested key before owner-relative normalization. `Index` is only
/// treated as an array index when the owner is an array; against an object
/// it degrades to the literal string key (e.g. `"-1"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyToken {
    Name(String),
    Index(i64),
}

/// Key selection of a `Select` step: the wildcard, or an explicit list
/// (a single `.name` step compiles to a one-element list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    Wildcard,
    Keys(Vec<KeyToken>),
}

/// Comparison clause attached to the trailing selection step of a filter
/// sub-program. Candidate values that fail the comparison are treated as
/// absent keys.
#[derive(Debug, Clone)]
pub enum Compare {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Le(Value),
    Gt(Value),
    Ge(Value),
    StartsWith(String),
    EndsWith(String),
    Contains(String),
    Regex(Regex),
}

/// One instruction of a compiled query.
#[derive(Debug, Clone)]
pub enum Step {
    /// Anchor to the root value passed to evaluate/apply.
    Root,
    /// Anchor to the value currently under test (filter sub-programs).
    Current,
    /// Select children by key list or wildcard; `descend` extends the
    /// selection to every depth below the owner.
    Select {
        keys: KeySpec,
        descend: bool,
        compare: Option<Compare>,
    },
    /// Keep candidates (or, for array owners, their elements) for which
    /// the sub-program yields at least one match. `negate` inverts the
    /// keep decision; `descend` extends the test to every descendant.
    Filter {
        program: Vec<Step>,
        negate: bool,
        descend: bool,
    },
}

// =============================================================================
// Mutations
// =============================================================================

/// Source text of a replace mutation's pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacePattern {
    /// Verbatim substring; escaped before compilation, replaces all
    /// occurrences.
    Literal(String),
    /// Regex source plus flags. Only `i` and `g` are honored.
    Regex { source: String, flags: String },
}

/// Compiled regex-replace spec. The regex itself is built on first use and
/// memoized for the lifetime of the owning `Query`; a pattern that fails to
/// compile turns every apply into a no-op.
#[derive(Debug)]
pub struct ReplaceSpec {
    pub pattern: ReplacePattern,
    pub replacement: String,
    compiled: OnceLock<Option<Regex>>,
}

impl Clone for ReplaceSpec {
    fn clone(&self) -> Self {
        // The memo cell is instance-scoped; a clone recompiles on demand.
        Self {
            pattern: self.pattern.clone(),
            replacement: self.replacement.clone(),
            compiled: OnceLock::new(),
        }
    }
}

impl ReplaceSpec {
    pub fn new(pattern: ReplacePattern, replacement: String) -> Self {
        Self {
            pattern,
            replacement,
            compiled: OnceLock::new(),
        }
    }

    /// The compiled regex, built at most once per instance.
    pub fn regex(&self) -> Option<&Regex> {
        self.compiled
            .get_or_init(|| match &self.pattern {
                ReplacePattern::Literal(text) => Regex::new(&regex::escape(text)).ok(),
                ReplacePattern::Regex { source, flags } => RegexBuilder::new(source)
                    .case_insensitive(flags.contains('i'))
                    .build()
                    .ok(),
            })
            .as_ref()
    }

    /// Whether the replacement applies to all occurrences or only the first.
    pub fn replace_all(&self) -> bool {
        match &self.pattern {
            ReplacePattern::Literal(_) => true,
            ReplacePattern::Regex { flags, .. } => flags.contains('g'),
        }
    }
}

/// Trailing mutation spec of a query. Absent means prune mode: `apply`
/// deletes every matched location.
#[derive(Debug, Clone)]
pub enum Mutation {
    Set(Value),
    Merge(Map<String, Value>),
    Replace(ReplaceSpec),
}

// =============================================================================
// Query
// =============================================================================

/// A compiled path expression: an ordered step program plus an optional
/// mutation. Built once, evaluated/applied any number of times.
#[derive(Debug, Clone)]
pub struct Query {
    pub steps: Vec<Step>,
    pub mutation: Option<Mutation>,
}

impl Query {
    pub fn new(steps: Vec<Step>, mutation: Option<Mutation>) -> Self {
        Self { steps, mutation }
    }

    /// True when the query carries no mutation suffix and `apply` will
    /// delete matches instead of writing to them.
    pub fn is_prune(&self) -> bool {
        self.mutation.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_path() {
        let path = vec![
            PathKey::Key("items".to_string()),
            PathKey::Index(2),
            PathKey::Key("a b".to_string()),
        ];
        assert_eq!(format_path(&path), "$[\"items\"][2][\"a b\"]");
        assert_eq!(format_path(&[]), "$");
    }

    #[test]
    fn test_replace_spec_literal_escapes_metachars() {
        let spec = ReplaceSpec::new(
            ReplacePattern::Literal("a.b".to_string()),
            String::new(),
        );
        let re = spec.regex().expect("literal pattern always compiles");
        assert!(re.is_match("a.b"));
        assert!(!re.is_match("axb"));
        assert!(spec.replace_all());
    }

    #[test]
    fn test_replace_spec_bad_regex_is_memoized_none() {
        let spec = ReplaceSpec::new(
            ReplacePattern::Regex {
                source: "(".to_string(),
                flags: String::new(),
            },
            String::new(),
        );
        assert!(spec.regex().is_none());
        // Second call hits the memo, same outcome.
        assert!(spec.regex().is_none());
    }

    #[test]
    fn test_replace_spec_flags() {
        let spec = ReplaceSpec::new(
            ReplacePattern::Regex {
                source: "foo".to_string(),
                flags: "ig".to_string(),
            },
            String::new(),
        );
        let re = spec.regex().expect("valid regex");
        assert!(re.is_match("FOO"));
        assert!(spec.replace_all());

        let first_only = ReplaceSpec::new(
            ReplacePattern::Regex {
                source: "foo".to_string(),
                flags: String::new(),
            },
            String::new(),
        );
        assert!(!first_only.replace_all());
    }
}
