//! Command-line driver for the `arb` interpreter.
//!
//! Dispatches to one of six run modes, matching `original_source`'s
//! `main()`: `run` evaluates silently, `time`/`space` evaluate and report a
//! resource measurement on stderr, `debug` evaluates with a tracing
//! [`arb::StderrTracer`], and `ast`/`print` stop after parsing.

use std::fs;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use arb::{ArbError, GcConfig, NoopTracer, StdIo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Run,
    Time,
    Space,
    Debug,
    Ast,
    Print,
}

/// A tree-walking interpreter for a small expression-oriented functional
/// language.
#[derive(Debug, Parser)]
#[command(name = "arb", version, about)]
struct Cli {
    mode: Mode,
    /// Path to a source file.
    source_file: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.source_file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: could not read {}: {err}", cli.source_file);
            return ExitCode::FAILURE;
        }
    };

    match cli.mode {
        Mode::Run => run(&source),
        Mode::Time => run_timed(&source),
        Mode::Space => run_with_space_report(&source),
        Mode::Debug => run_debug(&source),
        Mode::Ast => print_ast(&source),
        Mode::Print => pretty_print(&source),
    }
}

fn run(source: &str) -> ExitCode {
    let mut tracer = NoopTracer;
    let mut io = StdIo;
    match arb::run_source(source, GcConfig::default(), &mut tracer, &mut io) {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(err) => report(err),
    }
}

fn run_timed(source: &str) -> ExitCode {
    let mut tracer = NoopTracer;
    let mut io = StdIo;
    let start = Instant::now();
    let result = arb::run_source(source, GcConfig::default(), &mut tracer, &mut io);
    match result {
        Ok(value) => {
            println!("{value}");
            eprintln!("Total time (seconds): {:.6}", start.elapsed().as_secs_f64());
            ExitCode::SUCCESS
        }
        Err(err) => report(err),
    }
}

fn run_with_space_report(source: &str) -> ExitCode {
    let mut tracer = NoopTracer;
    let mut io = StdIo;
    let config = GcConfig::default();
    match arb::run_with_stats(source, config, &mut tracer, &mut io) {
        Ok((value, stats)) => {
            println!("{value}");
            let peak_kib = (stats.capacity * std::mem::size_of::<arb::Value>()) as f64 / 1024.0;
            eprintln!("Peak memory (KiB): {peak_kib}");
            ExitCode::SUCCESS
        }
        Err(err) => report(err),
    }
}

fn run_debug(source: &str) -> ExitCode {
    let mut tracer = arb::StderrTracer;
    let mut io = StdIo;
    match arb::run_source(source, GcConfig::default(), &mut tracer, &mut io) {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(err) => report(err),
    }
}

fn print_ast(source: &str) -> ExitCode {
    let mut tracer = NoopTracer;
    match arb::parse_source(source, &mut tracer) {
        Ok(tree) => {
            println!("{tree}");
            ExitCode::SUCCESS
        }
        Err(err) => report(err),
    }
}

fn pretty_print(source: &str) -> ExitCode {
    let mut tracer = NoopTracer;
    match arb::parse_source(source, &mut tracer) {
        Ok(tree) => {
            println!("{}", tree.pretty_print());
            ExitCode::SUCCESS
        }
        Err(err) => report(err),
    }
}

/// `.exit` is not a failure (`arb::ArbError::Exit`); everything else prints
/// to stderr and fails the process, matching `original_source`'s
/// `sys.exit(message)` convention.
fn report(err: ArbError) -> ExitCode {
    if matches!(err, ArbError::Exit) {
        return ExitCode::SUCCESS;
    }
    eprintln!("{err}");
    ExitCode::FAILURE
}
