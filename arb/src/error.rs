//! The single error type returned by every fallible entry point in this crate.
//!
//! Splits internal bugs from user-level failures, collapsed to the four kinds
//! this language's error model needs: lexer, parser, runtime, and internal.

use std::fmt;

/// A `(line, col)` position in a source file, 1-indexed to match the lexer's
/// own counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub line: u32,
    pub col: u32,
}

impl SourceLocation {
    #[must_use]
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Every fallible operation in `arb` returns this error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArbError {
    /// Unsupported character, unterminated string literal, malformed signed
    /// integer — raised by the lexer, always at a known location.
    #[error("[Lexer Error] {message} at {loc}")]
    Lexer { loc: SourceLocation, message: String },

    /// Unexpected/missing token, unsupported escape, empty sequence, trailing
    /// tokens — raised by the parser.
    #[error("[Parser Error] {message}{}", loc.map(|l| format!(" at {l}")).unwrap_or_default())]
    Parser { loc: Option<SourceLocation>, message: String },

    /// Undefined variable, arity/type mismatch, non-callable callee, and
    /// every other failure raised while evaluating the AST.
    #[error("[Runtime Error] {message}{}", loc.map(|l| format!(" at {l}")).unwrap_or_default())]
    Runtime { loc: Option<SourceLocation>, message: String },

    /// An invariant of this implementation itself was violated. Reaching this
    /// indicates a bug in `arb`, never in the interpreted program.
    #[error("[Internal Error] {message}")]
    Internal { message: String },

    /// The interpreted program called `.exit`. Not a failure: propagated via
    /// `?` through every caller, including a nested `.eval`, with no handler
    /// in between. The CLI driver maps this to a clean exit rather than
    /// printing it.
    #[error("exit")]
    Exit,
}

impl ArbError {
    #[must_use]
    pub fn lexer(loc: SourceLocation, message: impl Into<String>) -> Self {
        Self::Lexer { loc, message: message.into() }
    }

    #[must_use]
    pub fn parser(loc: Option<SourceLocation>, message: impl Into<String>) -> Self {
        Self::Parser { loc, message: message.into() }
    }

    #[must_use]
    pub fn runtime(loc: Option<SourceLocation>, message: impl Into<String>) -> Self {
        Self::Runtime { loc, message: message.into() }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

pub type ArbResult<T> = Result<T, ArbError>;
