/*
 * normalizer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Rewrites the assembled body into canonical brace syntax.
//!
//! Fragments may use a colon block style:
//!
//! ```text
//! <$ if (user): $>Hi<$ else: $>Bye<$ endif; $>
//! ```
//!
//! which is rewritten to `if (user){print("Hi");}else{print("Bye");}`.
//! All rewrites run on a masked copy of the body so string contents are
//! never altered. Normalization is idempotent.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::lexical::{self, Masked};
use crate::repair;

static BLOCK_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(else\s*if|if|for|while)\s*\(").unwrap());

static COLON_AFTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*:").unwrap());

static ELSE_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"\belse\s*:").unwrap());

// `else` standing alone as a statement: `...; else; ...`
static BARE_ELSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|;)(\s*)\belse\b\s*(;|$)").unwrap());

static END_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bend(?:if|for|while)\b\s*;?|\bend (?:if|for|while)\s*;").unwrap()
});

static SEMICOLON_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*;\s*").unwrap());

static EMPTY_EMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:print|echo)\s*\(\s*\x{E000}(\d+)\x{E001}\s*\)\s*;?").unwrap()
});

static REPEATED_SEMICOLON: Lazy<Regex> = Lazy::new(|| Regex::new(r";{2,}").unwrap());

static BRACE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*([{}])\s*").unwrap());

static BRACE_SEMICOLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"([{}]);(\()?").unwrap());

/// Normalize an assembled body.
pub fn normalize(body: &str) -> String {
    let masked = lexical::mask(body);
    let text = rewrite_blocks(masked.text());
    let text = collapse(&text, &masked);
    masked.restore(&text)
}

/// Colon and `end*` block syntax to braces.
fn rewrite_blocks(text: &str) -> String {
    let text = colon_heads(text);
    let text = ELSE_COLON.replace_all(&text, "} else {");
    let text = BARE_ELSE.replace_all(&text, "$1$2} else {$3");
    END_BLOCK.replace_all(&text, "}").into_owned()
}

/// `if (c):`, `else if (c):`, `for (…):` and `while (c):` heads to brace
/// heads. The condition ends at its matching paren; a head whose paren is
/// not directly followed by `:` is left alone.
fn colon_heads(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(caps) = BLOCK_HEAD.captures_at(text, pos) {
        let (Some(whole), Some(keyword)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let open = whole.end() - 1;
        let colon = repair::matching_close_paren(text, open).and_then(|close| {
            COLON_AFTER
                .find(&text[close + 1..])
                .map(|m| (close, close + 1 + m.end()))
        });
        let Some((close, after)) = colon else {
            out.push_str(&text[pos..whole.end()]);
            pos = whole.end();
            continue;
        };
        out.push_str(&text[pos..whole.start()]);
        let condition = &text[open + 1..close];
        if keyword.as_str().starts_with("else") {
            out.push_str(&format!("}} else if ({condition}) {{"));
        } else {
            out.push_str(&format!("{} ({condition}) {{", keyword.as_str()));
        }
        pos = after;
    }
    out.push_str(&text[pos..]);
    out
}

/// Whitespace and terminator cleanup around statements and braces.
fn collapse(text: &str, masked: &Masked) -> String {
    let text = SEMICOLON_SPACE.replace_all(text, ";");
    let text = EMPTY_EMIT.replace_all(&text, |caps: &Captures| {
        if is_empty_literal(masked, &caps[1]) {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    let text = REPEATED_SEMICOLON.replace_all(&text, ";");
    let text = BRACE_SPACE.replace_all(&text, "$1");
    // `};(` must keep its terminator or the next statement reads as a call
    let text = BRACE_SEMICOLON.replace_all(&text, |caps: &Captures| match caps.get(2) {
        Some(_) => caps[0].to_string(),
        None => caps[1].to_string(),
    });
    text.trim().to_string()
}

fn is_empty_literal(masked: &Masked, index: &str) -> bool {
    let literal = masked.restore(&format!("\u{E000}{index}\u{E001}"));
    matches!(literal.as_str(), "\"\"" | "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_colon_blocks() {
        let body = " if (x): ;\nprint(\"a\");\n else: ;\nprint(\"b\");\n endif; ;\n";
        assert_eq!(
            normalize(body),
            "if (x){print(\"a\");}else{print(\"b\");}"
        );
    }

    #[test]
    fn test_else_if_and_loops() {
        let body = "if (a): print(1); else if (b): print(2); endif; while (c): c = f(); endwhile;";
        assert_eq!(
            normalize(body),
            "if (a){print(1);}else if (b){print(2);}while (c){c = f();}"
        );
    }

    #[test]
    fn test_nested_parens_in_condition() {
        assert_eq!(
            normalize("if (f(x)): print(1); end if;"),
            "if (f(x)){print(1);}"
        );
    }

    #[test]
    fn test_bare_else_statement() {
        assert_eq!(
            normalize("if (x): ;print(1);\nelse;\nprint(2);endif;"),
            "if (x){print(1);}else{print(2);}"
        );
    }

    #[test]
    fn test_strings_are_untouched() {
        let body = "print(\"if (x): endif; // not a comment\");";
        assert_eq!(normalize(body), body);
    }

    #[test]
    fn test_comments_are_removed() {
        assert_eq!(
            normalize("a = 1; // set a\n/* block */ b = 2; -- lua\n"),
            "a = 1;b = 2;"
        );
    }

    #[test]
    fn test_empty_emits_dropped() {
        assert_eq!(normalize("print(\"\");x();print('');"), "x();");
    }

    #[test]
    fn test_brace_terminator_kept_before_paren() {
        assert_eq!(normalize("t = {};\n(f)()"), "t ={};(f)()");
    }

    #[test]
    fn test_native_lua_passes_through() {
        let body = "for i = 1, 3 do print(i) end";
        assert_eq!(normalize(body), body);
        let inline = "if x then print(1) else print(2) end";
        assert_eq!(normalize(inline), inline);
    }

    #[test]
    fn test_method_call_after_paren_head_is_not_a_colon_block() {
        let body = "if (x) then print(f(a):m()) end";
        assert_eq!(normalize(body), body);
        assert_eq!(
            normalize("local i = 0; while (i < 1) do i = i + 1; print(('x'):rep(2)) end"),
            "local i = 0;while (i < 1) do i = i + 1;print(('x'):rep(2)) end"
        );
    }

    #[test]
    fn test_colon_head_condition_may_contain_method_calls() {
        assert_eq!(
            normalize("if (s:len() > 0): print(s); endif;"),
            "if (s:len() > 0){print(s);}"
        );
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            " if (x): ;\nprint(\"a\");\n else: ;\nprint(\"b\");\n endif; ;\n",
            "if (a) { print(1) ; } else { print(2); } ;; print(\"\");",
            "for (i = 1, 3): print(i); endfor; t = { 1, 2 };",
            "if x then;print(\"a\");else;print(\"b\");end;",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "sample: {sample}");
        }
    }

    #[test]
    fn test_canonical_body_unchanged() {
        let canonical = "if (x){print(\"a\");}else{print(\"b\");}";
        assert_eq!(normalize(canonical), canonical);
    }
}
