//! Execution tracing infrastructure.
//!
//! Mirrors the teacher's zero-cost tracer design: the evaluator, lexer, and
//! parser are generic over a [`Tracer`] implementation, so the default
//! [`NoopTracer`] compiles away to nothing via monomorphization and `run`/
//! `time`/`space`/`ast`/`print` modes pay no tracing overhead at all.
//! [`StderrTracer`] backs `debug` mode and reproduces the category of line
//! `original_source`'s `debug` flag writes to standard error.

use crate::error::SourceLocation;
use crate::lexer::Token;

/// Hook points a caller can observe during lexing, parsing, and evaluation.
/// Every method has a no-op default; implementations override only the hooks
/// they care about.
pub trait Tracer {
    fn on_lexer_start(&mut self) {}
    fn on_lex_token(&mut self, _token: &Token) {}

    fn on_parser_start(&mut self) {}
    fn on_parse_expr(&mut self, _token: &Token) {}

    fn on_interp_start(&mut self) {}
    /// Called once per evaluator micro-step, before the step runs.
    fn on_step(&mut self, _node_kind: &'static str, _loc: SourceLocation) {}
    fn on_variable_lookup(&mut self, _name: &str) {}
    fn on_gc(&mut self, _reclaimed: usize) {}
    fn on_continuation_captured(&mut self) {}
    fn on_continuation_applied(&mut self) {}
    fn on_eval_nested_start(&mut self) {}
    fn on_eval_nested_stop(&mut self) {}
    fn on_exit_called(&mut self) {}
}

/// Production default: every hook is the trait's no-op default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Writes a human-readable line to standard error for every hook, in the
/// same `[Debug] ...` style `original_source` uses.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrTracer;

impl Tracer for StderrTracer {
    fn on_lexer_start(&mut self) {
        eprintln!("[Debug] *** starting lexer ***");
    }

    fn on_lex_token(&mut self, token: &Token) {
        eprintln!("[Debug] read token ({} {:?})", token.loc, token.lexeme);
    }

    fn on_parser_start(&mut self) {
        eprintln!("[Debug] *** starting parser ***");
    }

    fn on_parse_expr(&mut self, token: &Token) {
        eprintln!("[Debug] parsing expression starting with ({} {:?})", token.loc, token.lexeme);
    }

    fn on_interp_start(&mut self) {
        eprintln!("[Debug] *** starting interpreter ***");
    }

    fn on_step(&mut self, node_kind: &'static str, loc: SourceLocation) {
        eprintln!("[Debug] evaluating AST node of type {node_kind} at {loc}");
    }

    fn on_variable_lookup(&mut self, name: &str) {
        eprintln!("[Debug] looking up the variable {name}");
    }

    fn on_gc(&mut self, reclaimed: usize) {
        eprintln!("[Debug] GC collected {reclaimed} store cells");
    }

    fn on_continuation_captured(&mut self) {
        eprintln!("[Debug] captured continuation");
    }

    fn on_continuation_applied(&mut self) {
        eprintln!("[Debug] applied continuation, stack switched");
    }

    fn on_eval_nested_start(&mut self) {
        eprintln!("[Debug] eval started a new interpreter instance");
    }

    fn on_eval_nested_stop(&mut self) {
        eprintln!("[Debug] eval stopped the new interpreter instance");
    }

    fn on_exit_called(&mut self) {
        eprintln!("[Debug] execution stopped by the intrinsic call .exit");
    }
}
