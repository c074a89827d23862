//! Small text helpers shared by the pretty-printer and the `.strquote`/`.put`
//! display paths, grounded on `original_source`'s `indent`/`quote` helpers.

/// Indents every line of `text` by `cnt` spaces.
pub fn indent(text: &str, cnt: usize) -> String {
    let pad = " ".repeat(cnt);
    text.lines().map(|line| format!("{pad}{line}")).collect::<Vec<_>>().join("\n")
}

/// Produces a quoted literal form of `s`, escaping only `\` and `"` — used by
/// both the parser's inverse (pretty-printing string literals) and the
/// `.strquote` intrinsic.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_backslash_and_quote() {
        assert_eq!(quote("a\\b\"c"), "\"a\\\\b\\\"c\"");
    }

    #[test]
    fn indents_every_line() {
        assert_eq!(indent("a\nb", 2), "  a\n  b");
    }
}
