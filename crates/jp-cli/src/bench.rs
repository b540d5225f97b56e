//! Manual micro-benchmark for the evaluate/apply hot path.

use std::time::Instant;

use jp_core::{apply, evaluate, Query};
use serde_json::Value;

pub struct BenchOptions {
    pub iterations: usize,
    pub warmup: usize,
    pub with_apply: bool,
}

pub fn run_bench(query: &Query, document: &Value, opts: &BenchOptions) -> Result<(), String> {
    if opts.iterations == 0 {
        return Err("iterations must be at least 1".to_string());
    }

    let matches = evaluate(query, document).len();
    println!("Matches per evaluation: {}", matches);

    for _ in 0..opts.warmup {
        std::hint::black_box(evaluate(query, document));
    }

    let start = Instant::now();
    for _ in 0..opts.iterations {
        std::hint::black_box(evaluate(query, document));
    }
    let eval_elapsed = start.elapsed();

    report("evaluate", opts.iterations, eval_elapsed.as_secs_f64());

    if opts.with_apply {
        // apply consumes its input, so each iteration pays for one clone;
        // measure and subtract the clone cost.
        let clone_start = Instant::now();
        for _ in 0..opts.iterations {
            std::hint::black_box(document.clone());
        }
        let clone_elapsed = clone_start.elapsed();

        let start = Instant::now();
        for _ in 0..opts.iterations {
            std::hint::black_box(apply(query, document.clone()));
        }
        let apply_elapsed = start.elapsed();

        let net = (apply_elapsed.as_secs_f64() - clone_elapsed.as_secs_f64()).max(0.0);
        report("apply (minus clone)", opts.iterations, net);
    }

    Ok(())
}

fn report(label: &str, iterations: usize, seconds: f64) {
    let per_op_us = seconds * 1e6 / iterations as f64;
    let ops_per_sec = if seconds > 0.0 {
        iterations as f64 / seconds
    } else {
        f64::INFINITY
    };
    println!(
        "{:<20} {} iters in {:.1}ms ({:.2}us/op, {:.0} ops/s)",
        label,
        iterations,
        seconds * 1000.0,
        per_op_us,
        ops_per_sec,
    );
}
