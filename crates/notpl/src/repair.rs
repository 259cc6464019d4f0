/*
 * repair.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Best-effort syntax repair, applied once after a body fails to run.
//!
//! The only repair is a missing opening brace after a conditional head:
//! `if (x) print(1);` becomes `if (x){ print(1);}`. For `else if` the
//! previous block is closed first. When the inserted brace would be left
//! unbalanced, the block is closed after its first statement.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexical;

static HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(else\s*if|if|for|while)\s*\(").unwrap());

/// One inserted brace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    /// The head that was missing its brace, e.g. `if (x)`.
    pub head: String,
    /// Whether a closing brace had to be inserted as well.
    pub closed: bool,
}

/// Repaired body and the list of repairs. An empty list means the body was
/// left as is.
pub fn repair(body: &str) -> (String, Vec<Repair>) {
    let masked = lexical::mask(body);
    let mut text = masked.text().to_string();
    let mut repairs = Vec::new();
    let mut from = 0;

    while let Some(caps) = HEAD.captures_at(&text, from) {
        let (start, paren) = match caps.get(0) {
            Some(m) => (m.start(), m.end() - 1),
            None => break,
        };
        let is_else_if = caps[1].starts_with("else");
        let Some(close) = matching_close_paren(&text, paren) else {
            break;
        };
        let after = close + 1;
        from = after;
        if opens_block(&text[after..]) {
            continue;
        }

        let head = masked.restore(&text[start..after]);
        let mut brace_at = after;
        if is_else_if && !text[..start].trim_end().ends_with('}') {
            text.insert_str(start, "} ");
            brace_at += 2;
        }
        text.insert(brace_at, '{');

        let closed = brace_balance(&text) > 0;
        if closed {
            let close_at = first_statement_end(&text, brace_at + 1).unwrap_or(text.len());
            text.insert(close_at, '}');
        }

        from = brace_at + 1;
        repairs.push(Repair { head, closed });
    }

    (masked.restore(&text), repairs)
}

/// A `{`, `then` or `do` right after the head means nothing is missing.
fn opens_block(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.starts_with('{') || starts_with_keyword(rest, "then") || starts_with_keyword(rest, "do")
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.strip_prefix(keyword)
        .is_some_and(|tail| !tail.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
}

pub(crate) fn matching_close_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn brace_balance(text: &str) -> isize {
    text.chars().fold(0, |acc, ch| match ch {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

/// Just past the first `;` at brace depth zero, starting at `from`.
fn first_statement_end(text: &str, from: usize) -> Option<usize> {
    let mut depth = 0isize;
    for (idx, ch) in text[from..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth -= 1,
            ';' if depth == 0 => return Some(from + idx + 1),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_brace_is_inserted_and_closed() {
        let (body, repairs) = repair("if (true) print('x');");
        assert_eq!(body, "if (true){ print('x');}");
        assert_eq!(
            repairs,
            vec![Repair {
                head: "if (true)".to_string(),
                closed: true
            }]
        );
    }

    #[test]
    fn test_existing_close_brace_is_reused() {
        let (body, repairs) = repair("if (x) print(1);}");
        assert_eq!(body, "if (x){ print(1);}");
        assert!(!repairs[0].closed);
    }

    #[test]
    fn test_else_if_closes_previous_block() {
        let (body, repairs) = repair("if (a){print(1); else if (b) print(2);}");
        assert_eq!(body, "if (a){print(1); } else if (b){ print(2);}");
        assert_eq!(repairs.len(), 1);
    }

    #[test]
    fn test_complete_body_is_untouched() {
        let body = "if (a){print(1);}else{print(2);}";
        let (repaired, repairs) = repair(body);
        assert_eq!(repaired, body);
        assert!(repairs.is_empty());
    }

    #[test]
    fn test_native_lua_heads_are_left_alone() {
        let body = "if (x) then print(1) end while (y) do y = false end";
        let (repaired, repairs) = repair(body);
        assert_eq!(repaired, body);
        assert!(repairs.is_empty());
    }

    #[test]
    fn test_heads_inside_strings_are_ignored() {
        let body = "print(\"if (x) y\");";
        assert_eq!(repair(body), (body.to_string(), vec![]));
    }
}
