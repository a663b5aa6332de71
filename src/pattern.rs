//! Mapping of ECMA-262 schema patterns onto the `regex` crate.
//!
//! JSON Schema patterns use ECMA-262 syntax, where `\d` and `\w` are ASCII
//! classes while the `regex` crate treats them as Unicode classes. Escapes
//! and class syntax that mean something different are rewritten; everything
//! else passes through untouched and is left to the regex parser.
//!
//! Inside a class ECMA has no nesting and no set operators, and `[]` / `[^]`
//! are the empty and the universal class.

use regex::Regex;

const DIGIT: &str = "0-9";
const WORD: &str = "A-Za-z0-9_";

const EMPTY_CLASS: &str = r"[^\s\S]";
const ANY_CLASS: &str = r"[\s\S]";

/// Rewrite an ECMA-262 pattern into equivalent `regex` syntax.
pub fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut in_class = false;
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(escaped) = chars.next() else {
                    out.push('\\');
                    break;
                };
                match (escaped, in_class) {
                    ('d', false) => push_class(&mut out, DIGIT, false),
                    ('D', false) => push_class(&mut out, DIGIT, true),
                    ('w', false) => push_class(&mut out, WORD, false),
                    ('W', false) => push_class(&mut out, WORD, true),
                    ('d', true) => out.push_str(DIGIT),
                    ('w', true) => out.push_str(WORD),
                    // Nested classes union inside the enclosing one.
                    ('D', true) => push_class(&mut out, DIGIT, true),
                    ('W', true) => push_class(&mut out, WORD, true),
                    ('/', _) => out.push('/'),
                    (other, _) => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            '[' if !in_class => {
                let rest = chars.as_str();
                if let Some(stripped) = rest.strip_prefix(']') {
                    out.push_str(EMPTY_CLASS);
                    chars = stripped.chars();
                } else if let Some(stripped) = rest.strip_prefix("^]") {
                    out.push_str(ANY_CLASS);
                    chars = stripped.chars();
                } else {
                    in_class = true;
                    out.push('[');
                }
            }
            '[' | '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            other => out.push(other),
        }
    }
    out
}

fn push_class(out: &mut String, class: &str, negated: bool) {
    out.push('[');
    if negated {
        out.push('^');
    }
    out.push_str(class);
    out.push(']');
}

/// Compile an ECMA-262 pattern.
///
/// # Errors
///
/// Returns the `regex` parse error for patterns the engine cannot express.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&translate(pattern))
}
