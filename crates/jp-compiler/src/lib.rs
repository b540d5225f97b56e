//! jsonprune Query Compiler
//!
//! This crate turns path-expression text into the compiled `Query`
//! program that `jp-core` evaluates and applies.

pub mod lexer;
pub mod parser;

pub use parser::{compile, try_compile, CompileError};
