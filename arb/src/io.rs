//! Standard-input/output plumbing for the `.getline` and `.put` intrinsics.
//!
//! Grounded on the teacher's `PrintWriter` (`parcadei-ouros`'s `io.rs`): a
//! small trait the evaluator is generic-free over (it only fires on two rare
//! intrinsics, not the per-step hot path the way [`crate::tracer::Tracer`]
//! is, so a trait object is the right tradeoff here rather than a second
//! monomorphized type parameter threaded through every evaluator method).
//! [`StdIo`] is what `arb-cli` wires up; [`CollectIo`] lets tests drive
//! `.getline` from a canned line queue and capture everything `.put` writes
//! without touching the process's real stdio.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// The two stdio operations the interpreted language can perform.
pub trait InterpreterIo {
    /// Writes `s` verbatim (no separator, no trailing newline) and flushes,
    /// matching `.put`'s contract in `spec.md` §4.4.
    fn put(&mut self, s: &str) -> io::Result<()>;

    /// Reads one line without its terminator; `Ok(None)` on EOF, matching
    /// `.getline`'s contract.
    fn getline(&mut self) -> io::Result<Option<String>>;
}

/// Talks to the process's real standard input/output. Used by `arb-cli` in
/// every run mode.
#[derive(Debug, Default)]
pub struct StdIo;

impl InterpreterIo for StdIo {
    fn put(&mut self, s: &str) -> io::Result<()> {
        print!("{s}");
        io::stdout().flush()
    }

    fn getline(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let n = io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }
}

/// Feeds `.getline` from a preloaded queue of lines and collects everything
/// `.put` writes into a string, for tests that exercise end-to-end program
/// output without touching the real process stdio.
#[derive(Debug, Default)]
pub struct CollectIo {
    pub output: String,
    input: VecDeque<String>,
}

impl CollectIo {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { output: String::new(), input: lines.into_iter().map(Into::into).collect() }
    }
}

impl InterpreterIo for CollectIo {
    fn put(&mut self, s: &str) -> io::Result<()> {
        self.output.push_str(s);
        Ok(())
    }

    fn getline(&mut self) -> io::Result<Option<String>> {
        Ok(self.input.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_io_captures_put_and_drains_input() {
        let mut io = CollectIo::with_input(["first", "second"]);
        io.put("a").unwrap();
        io.put("b").unwrap();
        assert_eq!(io.output, "ab");
        assert_eq!(io.getline().unwrap(), Some("first".to_string()));
        assert_eq!(io.getline().unwrap(), Some("second".to_string()));
        assert_eq!(io.getline().unwrap(), None);
    }
}
