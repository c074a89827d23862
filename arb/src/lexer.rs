//! Turns a source string into a sequence of [`Token`]s.
//!
//! Tokens are not classified here beyond grouping by lexeme shape (the rules
//! in [`lex`]); the parser decides what a token *means* in context. This
//! keeps the lexer a single linear pass with no lookahead beyond one
//! character, the same shape as `original_source`'s `next_token`.

use crate::error::{ArbError, ArbResult, SourceLocation};
use crate::tracer::Tracer;

/// One lexeme plus the location it started at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub loc: SourceLocation,
    pub lexeme: String,
}

impl Token {
    /// True for tokens the lexer could only have produced via its integer
    /// rule: leading digit, or a leading sign immediately followed by a
    /// digit. Every other character of the lexeme is guaranteed to be a
    /// digit already, since that is the only lexer rule that can start this
    /// way.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        let mut chars = self.lexeme.chars();
        match chars.next() {
            Some(c) if c.is_ascii_digit() => true,
            Some('+' | '-') => matches!(chars.next(), Some(c) if c.is_ascii_digit()),
            _ => false,
        }
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        self.lexeme.starts_with('"')
    }

    #[must_use]
    pub fn is_intrinsic(&self) -> bool {
        self.lexeme.starts_with('.')
    }

    #[must_use]
    pub fn is_word(&self) -> bool {
        !self.lexeme.is_empty() && self.lexeme.chars().all(|c| c.is_ascii_alphabetic())
    }
}

/// The raw character set the lexer accepts anywhere in source text. Anything
/// outside this set is a fatal lexer error, even inside what would otherwise
/// be a comment or a string literal.
///
/// Kept intentionally broader than the punctuation the grammar actually
/// recognizes as tokens (only `(){}[]=` start a punctuation token): a
/// character such as `` ` `` or `,` passes this gate but then simply fails to
/// match any token rule, surfacing the same "unsupported character" error a
/// few lines later once the lexer tries to start a token with it.
fn in_charset(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_ascii_whitespace()
        || "`~!@#$%^&*()-_=+[{]}\\|;:'\",<.>/?".contains(c)
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    col: u32,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self { chars: source.chars().peekable(), line: 1, col: 1 }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.col)
    }
}

/// Lexes an entire source string into tokens, in source order.
///
/// # Errors
/// Returns [`ArbError::Lexer`] on an unsupported character or an unterminated
/// string literal.
pub fn lex(source: &str, tracer: &mut impl Tracer) -> ArbResult<Vec<Token>> {
    tracer.on_lexer_start();
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = next_token(&mut cursor)? {
        tracer.on_lex_token(&token);
        tokens.push(token);
    }
    Ok(tokens)
}

/// Errors if the next character (if any) falls outside [`in_charset`]; called
/// before every consumption that isn't already confined to a safe predicate
/// (digits, letters), so an invalid character is rejected with its real
/// location no matter where in the source it turns up — inside a comment or
/// a string literal included.
fn check_charset(cursor: &mut Cursor<'_>) -> ArbResult<()> {
    if let Some(c) = cursor.peek() {
        if !in_charset(c) {
            return Err(ArbError::lexer(cursor.loc(), format!("unsupported character {c:?} in the source")));
        }
    }
    Ok(())
}

fn next_token(cursor: &mut Cursor<'_>) -> ArbResult<Option<Token>> {
    loop {
        loop {
            check_charset(cursor)?;
            if !matches!(cursor.peek(), Some(c) if c.is_whitespace()) {
                break;
            }
            cursor.bump();
        }
        let Some(c) = cursor.peek() else { return Ok(None) };
        let loc = cursor.loc();

        if c == '#' {
            loop {
                check_charset(cursor)?;
                if !matches!(cursor.peek(), Some(c) if c != '\n') {
                    break;
                }
                cursor.bump();
            }
            continue;
        }

        let lexeme = if c.is_ascii_digit() {
            lex_run(cursor, |c| c.is_ascii_digit())
        } else if c == '-' || c == '+' {
            let sign = cursor.bump().unwrap();
            if !matches!(cursor.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(ArbError::lexer(loc, "incomplete integer literal"));
            }
            let mut s = String::from(sign);
            s.push_str(&lex_run(cursor, |c| c.is_ascii_digit()));
            s
        } else if c.is_ascii_alphabetic() {
            lex_run(cursor, |c| c.is_ascii_alphabetic())
        } else if c == '.' {
            lex_run_checked(cursor, |c| !(c.is_whitespace() || c == ')'))?
        } else if matches!(c, '(' | ')' | '{' | '}' | '[' | ']' | '=') {
            cursor.bump().unwrap().to_string()
        } else if c == '"' {
            lex_string(cursor, loc)?
        } else {
            // in charset (checked above) but matches no token rule, e.g. a bare `,` or `` ` ``.
            return Err(ArbError::lexer(loc, format!("unsupported character {c:?}")));
        };

        return Ok(Some(Token { loc, lexeme }));
    }
}

fn lex_run(cursor: &mut Cursor<'_>, pred: impl Fn(char) -> bool) -> String {
    let mut s = String::new();
    while matches!(cursor.peek(), Some(c) if pred(c)) {
        s.push(cursor.bump().unwrap());
    }
    s
}

/// As [`lex_run`], but for predicates that can't guarantee every accepted
/// character is already charset-safe (the intrinsic-name rule matches
/// anything but whitespace/`)`).
fn lex_run_checked(cursor: &mut Cursor<'_>, pred: impl Fn(char) -> bool) -> ArbResult<String> {
    let mut s = String::new();
    while matches!(cursor.peek(), Some(c) if pred(c)) {
        check_charset(cursor)?;
        s.push(cursor.bump().unwrap());
    }
    Ok(s)
}

/// Reads a raw (undecoded) string literal, tracking a trailing-backslash
/// parity count so an escaped quote (`\"`) doesn't end the literal early.
/// Real newlines are kept verbatim and still advance line/col.
fn lex_string(cursor: &mut Cursor<'_>, start: SourceLocation) -> ArbResult<String> {
    let mut s = String::new();
    s.push(cursor.bump().unwrap()); // opening quote
    loop {
        match cursor.peek() {
            None => return Err(ArbError::lexer(start, "incomplete string literal")),
            Some('"') if trailing_backslashes(&s) % 2 == 0 => {
                s.push(cursor.bump().unwrap());
                return Ok(s);
            }
            Some(_) => {
                check_charset(cursor)?;
                s.push(cursor.bump().unwrap());
            }
        }
    }
}

fn trailing_backslashes(s: &str) -> usize {
    s.chars().rev().take_while(|&c| c == '\\').count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::NoopTracer;

    fn lex_ok(src: &str) -> Vec<String> {
        lex(src, &mut NoopTracer).unwrap().into_iter().map(|t| t.lexeme).collect()
    }

    #[test]
    fn lexes_call() {
        assert_eq!(lex_ok("(.add 1 2)"), vec!["(", ".add", "1", "2", ")"]);
    }

    #[test]
    fn lexes_signed_integers() {
        assert_eq!(lex_ok("-7 +2 3"), vec!["-7", "+2", "3"]);
    }

    #[test]
    fn lexes_string_with_escaped_quote() {
        assert_eq!(lex_ok(r#""a\"b""#), vec![r#""a\"b""#]);
    }

    #[test]
    fn strips_comments() {
        assert_eq!(lex_ok("1 # a comment\n2"), vec!["1", "2"]);
    }

    #[test]
    fn rejects_unsupported_character() {
        assert!(lex(&String::from('\u{263A}'), &mut NoopTracer).is_err());
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(lex(r#""abc"#, &mut NoopTracer).is_err());
    }

    #[test]
    fn rejects_incomplete_signed_integer() {
        assert!(lex("- x", &mut NoopTracer).is_err());
    }
}
