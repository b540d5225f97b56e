//! Query Compiler
//!
//! Single-pass recursive-descent compiler from expression text to a
//! `jp_core::Query`: a step program plus an optional trailing mutation.
//! The grammar is anchored (`$`/`@`), dot or bracket accessors, filters
//! (`[?...]`, recursively compiled), and an outer mutation suffix
//! (`=value`, `+=object`, `=repl({...})`). Malformed input fails the
//! whole compile; there are no partial results.

use log::debug;
use regex::RegexBuilder;
use serde_json::Value;

use jp_core::{
    Compare, KeySpec, KeyToken, Mutation, Query, ReplacePattern, ReplaceSpec, Step,
};

use crate::lexer::Lexer;

/// Compile failure. Callers that only care about valid/invalid use
/// [`try_compile`](crate::try_compile); the CLI and logs use the variants.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("empty query expression")]
    Empty,
    #[error("expected a key, index, or wildcard at offset {0}")]
    ExpectedKey(usize),
    #[error("unterminated bracket accessor")]
    UnterminatedBracket,
    #[error("unterminated quoted key")]
    UnterminatedQuote,
    #[error("filter is missing its closing bracket")]
    UnterminatedFilter,
    #[error("empty filter body")]
    EmptyFilter,
    #[error("comparison clause needs a key selection to attach to")]
    MisplacedComparison,
    #[error("invalid comparison operator at offset {0}")]
    BadOperator(usize),
    #[error("unterminated inline regex")]
    UnterminatedRegex,
    #[error("invalid regular expression: {0}")]
    BadRegex(String),
    #[error("invalid literal value: {0}")]
    BadLiteral(String),
    #[error("merge value must be a JSON object")]
    MergeNotObject,
    #[error("invalid repl() spec")]
    BadReplaceSpec,
    #[error("unexpected trailing input at offset {0}")]
    TrailingInput(usize),
}

/// Compile a path expression.
pub fn compile(text: &str) -> Result<Query, CompileError> {
    if text.trim().is_empty() {
        return Err(CompileError::Empty);
    }
    let mut lex = Lexer::new(text);
    // Only the whole expression defaults its anchor to the root; filter
    // bodies default to the value under test.
    let steps = parse_steps(&mut lex, Step::Root)?;
    lex.skip_whitespace();
    let mutation = parse_mutation(&mut lex)?;
    Ok(Query::new(steps, mutation))
}

/// Tolerant entry point: a malformed expression is simply `None`.
pub fn try_compile(text: &str) -> Option<Query> {
    match compile(text) {
        Ok(query) => Some(query),
        Err(err) => {
            debug!("query rejected: {err} in {text:?}");
            None
        }
    }
}

// =============================================================================
// Steps
// =============================================================================

fn parse_steps(lex: &mut Lexer<'_>, default_anchor: Step) -> Result<Vec<Step>, CompileError> {
    let mut steps = Vec::new();

    lex.skip_whitespace();
    match lex.peek() {
        Some(b'$') => {
            lex.bump(1);
            steps.push(Step::Root);
        }
        Some(b'@') => {
            lex.bump(1);
            steps.push(Step::Current);
        }
        _ => steps.push(default_anchor),
    }

    loop {
        lex.skip_whitespace();
        match lex.peek() {
            Some(b'.') => {
                lex.bump(1);
                let descend = if lex.peek() == Some(b'.') {
                    lex.bump(1);
                    true
                } else {
                    false
                };
                lex.skip_whitespace();
                match lex.peek() {
                    Some(b'*') => {
                        lex.bump(1);
                        steps.push(wildcard(descend));
                    }
                    Some(b'[') => {
                        lex.bump(1);
                        steps.push(parse_bracket(lex, descend)?);
                    }
                    _ => {
                        let at = lex.pos();
                        let key = lex
                            .identifier()
                            .ok_or(CompileError::ExpectedKey(at))?
                            .to_string();
                        steps.push(Step::Select {
                            keys: KeySpec::Keys(vec![KeyToken::Name(key)]),
                            descend,
                            compare: None,
                        });
                    }
                }
            }
            Some(b'[') => {
                lex.bump(1);
                steps.push(parse_bracket(lex, false)?);
            }
            _ => break,
        }
    }

    Ok(steps)
}

fn wildcard(descend: bool) -> Step {
    Step::Select {
        keys: KeySpec::Wildcard,
        descend,
        compare: None,
    }
}

/// Bracket accessor body, cursor positioned just past the `[`. The
/// step kind (child vs descendant) is inherited from the dots that
/// preceded the bracket.
fn parse_bracket(lex: &mut Lexer<'_>, descend: bool) -> Result<Step, CompileError> {
    lex.skip_whitespace();
    match lex.peek() {
        Some(b'?') => {
            lex.bump(1);
            lex.skip_whitespace();
            let negate = lex.eat("!");
            let close = lex.closing_bracket().ok_or(CompileError::UnterminatedFilter)?;
            let body = lex.take_until(close);
            lex.bump(1); // the ']'
            let program = parse_filter_program(body)?;
            Ok(Step::Filter {
                program,
                negate,
                descend,
            })
        }
        Some(b'*') => {
            lex.bump(1);
            lex.skip_whitespace();
            if lex.eat("]") {
                Ok(wildcard(descend))
            } else {
                Err(CompileError::UnterminatedBracket)
            }
        }
        _ => {
            let mut tokens = Vec::new();
            loop {
                lex.skip_whitespace();
                match lex.peek() {
                    Some(b'\'') => {
                        let key = lex.quoted_string().ok_or(CompileError::UnterminatedQuote)?;
                        tokens.push(KeyToken::Name(key));
                    }
                    Some(b'-' | b'0'..=b'9') => {
                        let at = lex.pos();
                        let index = lex.integer().ok_or(CompileError::ExpectedKey(at))?;
                        tokens.push(KeyToken::Index(index));
                    }
                    _ => return Err(CompileError::ExpectedKey(lex.pos())),
                }
                lex.skip_whitespace();
                if lex.eat(",") {
                    continue;
                }
                if lex.eat("]") {
                    break;
                }
                return Err(CompileError::UnterminatedBracket);
            }
            Ok(Step::Select {
                keys: KeySpec::Keys(tokens),
                descend,
                compare: None,
            })
        }
    }
}

// =============================================================================
// Filters
// =============================================================================

/// A filter body is a whole sub-expression, compiled recursively with a
/// `Current` default anchor, optionally followed by a comparison clause
/// that attaches to its trailing key selection.
fn parse_filter_program(body: &str) -> Result<Vec<Step>, CompileError> {
    if body.trim().is_empty() {
        return Err(CompileError::EmptyFilter);
    }
    let mut lex = Lexer::new(body);
    let mut steps = parse_steps(&mut lex, Step::Current)?;
    lex.skip_whitespace();
    if !lex.rest().is_empty() {
        let compare = parse_compare(&mut lex)?;
        match steps.last_mut() {
            Some(Step::Select { compare: slot, .. }) => *slot = Some(compare),
            _ => return Err(CompileError::MisplacedComparison),
        }
    }
    Ok(steps)
}

fn parse_compare(lex: &mut Lexer<'_>) -> Result<Compare, CompileError> {
    if lex.eat("=/") {
        return parse_inline_regex(lex);
    }

    let at = lex.pos();
    let op = ["==", "!=", "^=", "$=", "*=", "<=", ">=", "<", ">"]
        .into_iter()
        .find(|op| lex.eat(op))
        .ok_or(CompileError::BadOperator(at))?;

    let rhs_text = lex.rest().trim();
    let rhs: Value = serde_json::from_str(rhs_text)
        .map_err(|err| CompileError::BadLiteral(err.to_string()))?;

    let compare = match op {
        "==" => Compare::Eq(rhs),
        "!=" => Compare::Ne(rhs),
        "<" => Compare::Lt(rhs),
        "<=" => Compare::Le(rhs),
        ">" => Compare::Gt(rhs),
        ">=" => Compare::Ge(rhs),
        // The string operators require a string operand.
        "^=" | "$=" | "*=" => {
            let Value::String(text) = rhs else {
                return Err(CompileError::BadLiteral(format!(
                    "{op} needs a string operand"
                )));
            };
            match op {
                "^=" => Compare::StartsWith(text),
                "$=" => Compare::EndsWith(text),
                _ => Compare::Contains(text),
            }
        }
        _ => unreachable!("operator table is exhaustive"),
    };
    Ok(compare)
}

/// `=/pattern/flags` comparison. Only the `i` flag is honored; the regex
/// is compiled eagerly so a bad pattern fails the whole compile.
fn parse_inline_regex(lex: &mut Lexer<'_>) -> Result<Compare, CompileError> {
    let bytes = lex.rest().as_bytes();
    let mut end = 0;
    loop {
        match bytes.get(end) {
            None => return Err(CompileError::UnterminatedRegex),
            Some(b'\\') => end += 2,
            Some(b'/') => break,
            Some(_) => end += 1,
        }
    }
    let source = lex.take_until(lex.pos() + end).to_string();
    lex.bump(1); // the '/'

    let mut flags = String::new();
    while let Some(b) = lex.peek() {
        if b.is_ascii_alphabetic() {
            flags.push(b as char);
            lex.bump(1);
        } else {
            break;
        }
    }
    lex.skip_whitespace();
    if !lex.rest().is_empty() {
        return Err(CompileError::TrailingInput(lex.pos()));
    }

    let regex = RegexBuilder::new(&source)
        .case_insensitive(flags.contains('i'))
        .build()
        .map_err(|err| CompileError::BadRegex(err.to_string()))?;
    Ok(Compare::Regex(regex))
}

// =============================================================================
// Mutation suffix
// =============================================================================

fn parse_mutation(lex: &mut Lexer<'_>) -> Result<Option<Mutation>, CompileError> {
    let at = lex.pos();
    let rest = lex.rest().trim();
    if rest.is_empty() {
        return Ok(None);
    }

    if let Some(inner) = rest.strip_prefix("=repl(") {
        let inner = inner
            .strip_suffix(')')
            .ok_or(CompileError::BadReplaceSpec)?;
        return parse_replace_spec(inner).map(Some);
    }

    if let Some(text) = rest.strip_prefix("+=") {
        let value: Value = serde_json::from_str(text.trim())
            .map_err(|err| CompileError::BadLiteral(err.to_string()))?;
        return match value {
            Value::Object(fields) => Ok(Some(Mutation::Merge(fields))),
            _ => Err(CompileError::MergeNotObject),
        };
    }

    if let Some(text) = rest.strip_prefix('=') {
        let value: Value = serde_json::from_str(text.trim())
            .map_err(|err| CompileError::BadLiteral(err.to_string()))?;
        return Ok(Some(Mutation::Set(value)));
    }

    Err(CompileError::TrailingInput(at))
}

fn parse_replace_spec(inner: &str) -> Result<Mutation, CompileError> {
    let value: Value =
        serde_json::from_str(inner).map_err(|err| CompileError::BadLiteral(err.to_string()))?;
    let spec = value.as_object().ok_or(CompileError::BadReplaceSpec)?;

    let replacement = spec
        .get("replacement")
        .and_then(Value::as_str)
        .ok_or(CompileError::BadReplaceSpec)?
        .to_string();

    let pattern = if let Some(text) = spec.get("pattern").and_then(Value::as_str) {
        ReplacePattern::Literal(text.to_string())
    } else if let Some(source) = spec.get("regex").and_then(Value::as_str) {
        let flags = spec
            .get("flags")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        ReplacePattern::Regex {
            source: source.to_string(),
            flags,
        }
    } else {
        return Err(CompileError::BadReplaceSpec);
    };

    Ok(Mutation::Replace(ReplaceSpec::new(pattern, replacement)))
}
