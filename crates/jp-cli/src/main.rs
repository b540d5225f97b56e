//! jsonprune CLI
//!
//! CLI tool for compiling path expressions and running them against JSON
//! documents.

use std::fs;
use std::io::Read;

use clap::{Parser, Subcommand};
use serde_json::Value;

use jp_core::{apply, evaluate, format_path, Mutation, Query, Step};
use jp_compiler::compile;

mod bench;

#[derive(Parser)]
#[command(name = "jp-cli")]
#[command(about = "jsonprune path expression compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an expression and dump its step program
    Compile {
        /// Path expression, e.g. '$..ads' or '$.config.adsEnabled=false'
        query: String,
    },

    /// List every location an expression matches in a document
    Eval {
        query: String,

        /// JSON document file ('-' for stdin)
        #[arg(short, long, default_value = "-")]
        input: String,
    },

    /// Apply an expression to a document and print the result
    Apply {
        query: String,

        /// JSON document file ('-' for stdin)
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Benchmark repeated evaluation of an expression
    Bench {
        query: String,

        /// JSON document file ('-' for stdin)
        #[arg(short, long, default_value = "-")]
        input: String,

        #[arg(long, default_value_t = 10_000)]
        iterations: usize,

        #[arg(long, default_value_t = 1_000)]
        warmup: usize,

        /// Also time apply (clone cost subtracted)
        #[arg(long)]
        with_apply: bool,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { query } => cmd_compile(&query),
        Commands::Eval { query, input } => cmd_eval(&query, &input),
        Commands::Apply {
            query,
            input,
            output,
        } => cmd_apply(&query, &input, output.as_deref()),
        Commands::Bench {
            query,
            input,
            iterations,
            warmup,
            with_apply,
        } => cmd_bench(&query, &input, iterations, warmup, with_apply),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn compile_query(text: &str) -> Result<Query, String> {
    compile(text).map_err(|e| format!("Invalid query '{}': {}", text, e))
}

fn read_document(input: &str) -> Result<Value, String> {
    let text = if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        buffer
    } else {
        fs::read_to_string(input).map_err(|e| format!("Failed to read '{}': {}", input, e))?
    };
    serde_json::from_str(&text).map_err(|e| format!("Invalid JSON in '{}': {}", input, e))
}

fn cmd_compile(query_text: &str) -> Result<(), String> {
    let query = compile_query(query_text)?;

    println!("Query: {}", query_text);
    println!("  Steps:    {}", query.steps.len());
    for step in &query.steps {
        println!("    {}", describe_step(step));
    }
    let mode = match &query.mutation {
        None => "prune (delete matches)".to_string(),
        Some(Mutation::Set(value)) => format!("set {}", value),
        Some(Mutation::Merge(fields)) => format!("merge {} field(s)", fields.len()),
        Some(Mutation::Replace(spec)) => format!("replace via {:?}", spec.pattern),
    };
    println!("  Mutation: {}", mode);

    Ok(())
}

fn cmd_eval(query_text: &str, input: &str) -> Result<(), String> {
    let query = compile_query(query_text)?;
    let document = read_document(input)?;

    let matches = evaluate(&query, &document);
    println!("{} match(es)", matches.len());
    for path in &matches {
        let value = jp_core::value::resolve(&document, path)
            .map(Value::to_string)
            .unwrap_or_default();
        println!("  {} = {}", format_path(path), value);
    }

    Ok(())
}

fn cmd_apply(query_text: &str, input: &str, output: Option<&str>) -> Result<(), String> {
    let query = compile_query(query_text)?;
    let document = read_document(input)?;

    let Some(result) = apply(&query, document) else {
        println!("No match; document unchanged");
        return Ok(());
    };

    let rendered = serde_json::to_string_pretty(&result)
        .map_err(|e| format!("Failed to serialize result: {}", e))?;
    match output {
        Some(path) => {
            fs::write(path, rendered)
                .map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            println!("Wrote {}", path);
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

fn cmd_bench(
    query_text: &str,
    input: &str,
    iterations: usize,
    warmup: usize,
    with_apply: bool,
) -> Result<(), String> {
    let query = compile_query(query_text)?;
    let document = read_document(input)?;

    bench::run_bench(
        &query,
        &document,
        &bench::BenchOptions {
            iterations,
            warmup,
            with_apply,
        },
    )
}

fn describe_step(step: &Step) -> String {
    match step {
        Step::Root => "anchor root".to_string(),
        Step::Current => "anchor current".to_string(),
        Step::Select {
            keys,
            descend,
            compare,
        } => {
            let kind = if *descend { "descendant" } else { "child" };
            let compare = if compare.is_some() { " (with comparison)" } else { "" };
            format!("{kind} select {keys:?}{compare}")
        }
        Step::Filter {
            program,
            negate,
            descend,
        } => {
            let kind = if *descend { "descendant" } else { "child" };
            let negate = if *negate { "negated " } else { "" };
            format!("{kind} {negate}filter ({} sub-steps)", program.len())
        }
    }
}
