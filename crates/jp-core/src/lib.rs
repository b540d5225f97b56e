//! jsonprune Core Library
//!
//! This crate provides the query-and-mutate engine for jsonprune: given a
//! compiled path expression, it enumerates every matching location inside
//! a JSON value graph and, when the expression carries a mutation suffix,
//! rewrites the graph at each match (set, shallow merge, regex replace,
//! or delete). The companion `jp-compiler` crate turns expression text
//! into the `Query` values consumed here.
//!
//! # Modules
//!
//! - `query`: compiled query representation (steps, mutations, paths)
//! - `value`: comparison/coercion helpers over `serde_json::Value`
//! - `walk`: stack-based depth-first descendant traversal
//! - `eval`: path evaluation and filter-predicate evaluation
//! - `apply`: in-place mutation of matched locations
//!
//! Evaluation is synchronous and side-effect free; `apply` is the only
//! operation that mutates, and it owns its input for the duration. A
//! `Query` may be shared across threads: the one lazily computed piece of
//! state (the replace regex) sits behind a `OnceLock`.

pub mod apply;
pub mod eval;
pub mod query;
pub mod value;
pub mod walk;

// Re-export the engine surface
pub use apply::apply;
pub use eval::evaluate;
pub use query::{
    format_path, Compare, KeySpec, KeyToken, Mutation, Path, PathKey, Query, ReplacePattern,
    ReplaceSpec, Step,
};
pub use walk::DescendantWalker;
