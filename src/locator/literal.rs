//! Quote-safe literals for generated selectors

use regex::Regex;
use std::sync::LazyLock;

static CSS_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[_a-zA-Z][_a-zA-Z0-9-]*$").unwrap());

/// XPath string literal; falls back to `concat()` when both quote kinds appear
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{}'", s);
    }
    if !s.contains('"') {
        return format!("\"{}\"", s);
    }

    let mut args: Vec<String> = Vec::new();
    for (i, part) in s.split('\'').enumerate() {
        if i > 0 {
            args.push("\"'\"".to_string());
        }
        if !part.is_empty() {
            args.push(format!("'{}'", part));
        }
    }
    format!("concat({})", args.join(", "))
}

/// Double-quoted CSS string
pub fn css_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// `s` if it can be written as a bare CSS identifier
pub fn css_ident(s: &str) -> Option<&str> {
    CSS_IDENT.is_match(s).then_some(s)
}

/// Values with control characters are never embedded in selectors
pub fn has_control_chars(s: &str) -> bool {
    s.chars().any(char::is_control)
}
