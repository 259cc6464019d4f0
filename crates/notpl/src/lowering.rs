/*
 * lowering.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Lowers the brace block dialect to plain Lua.
//!
//! | brace form            | Lua                    |
//! |-----------------------|------------------------|
//! | `if (c){ ... }`       | `if (c) then ... end`  |
//! | `}else{`              | `else`                 |
//! | `}else if (c){`       | `elseif (c) then`      |
//! | `while (c){ ... }`    | `while (c) do ... end` |
//! | `for (i = 1, 3){ ...}`| `for i = 1, 3 do ... end` |
//!
//! Any other `{` opens a table constructor and is kept. Native Lua block
//! keywords pass through untouched, and `}else{` inside a native `if`
//! simply becomes `else`.

use crate::lexical;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Brace {
    Block,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Head {
    If,
    ElseIf,
    While,
    For,
}

pub fn lower(source: &str) -> String {
    let masked = lexical::mask(source);
    let chars: Vec<char> = masked.text().chars().collect();
    let mut out = String::with_capacity(chars.len() + 16);
    let mut stack: Vec<Brace> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' => {
                match block_head(&out) {
                    Some((Head::For, open)) => {
                        let trimmed_len = out.trim_end().len();
                        let header = out[open + 1..trimmed_len - 1].trim().to_string();
                        out.truncate(open);
                        let keep = out.trim_end().len();
                        out.truncate(keep);
                        out.push(' ');
                        out.push_str(&header);
                        out.push_str(" do ");
                        stack.push(Brace::Block);
                    }
                    Some((Head::While, _)) => {
                        out.push_str(" do ");
                        stack.push(Brace::Block);
                    }
                    Some((Head::If, _)) => {
                        out.push_str(" then ");
                        stack.push(Brace::Block);
                    }
                    // the block was opened by the `if` this branch continues
                    Some((Head::ElseIf, _)) => out.push_str(" then "),
                    None => {
                        out.push('{');
                        stack.push(Brace::Table);
                    }
                }
                i += 1;
            }
            '}' => {
                if stack.last() == Some(&Brace::Table) {
                    stack.pop();
                    out.push('}');
                    i += 1;
                } else if let Some((next, is_else_if)) = else_after(&chars, i + 1) {
                    out.push_str(if is_else_if { " elseif " } else { " else " });
                    i = next;
                } else if stack.pop().is_some() {
                    out.push_str(" end ");
                    i += 1;
                } else {
                    out.push('}');
                    i += 1;
                }
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    masked.restore(out.trim_end())
}

/// The block keyword owning a `{` about to be appended to `out`, with the
/// byte offset of its opening parenthesis.
fn block_head(out: &str) -> Option<(Head, usize)> {
    let trimmed = out.trim_end();
    if !trimmed.ends_with(')') {
        return None;
    }
    let open = matching_open_paren(trimmed)?;
    let before = trimmed[..open].trim_end();
    let word_start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map_or(before.len(), |(idx, _)| idx);
    let head = match &before[word_start..] {
        "if" => Head::If,
        "elseif" => Head::ElseIf,
        "while" => Head::While,
        "for" => Head::For,
        _ => return None,
    };
    Some((head, open))
}

fn matching_open_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices().rev() {
        match ch {
            ')' => depth += 1,
            '(' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// After a `}` at `from - 1`: if an `else{` or `else if` follows, the index
/// just past it and whether it continues with `if`.
fn else_after(chars: &[char], from: usize) -> Option<(usize, bool)> {
    let mut i = skip_space(chars, from);
    if !starts_with_word(chars, i, "else") {
        return None;
    }
    i = skip_space(chars, i + 4);
    if chars.get(i) == Some(&'{') {
        return Some((i + 1, false));
    }
    if starts_with_word(chars, i, "if") {
        return Some((skip_space(chars, i + 2), true));
    }
    None
}

fn skip_space(chars: &[char], mut i: usize) -> usize {
    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    i
}

fn starts_with_word(chars: &[char], at: usize, word: &str) -> bool {
    let len = word.chars().count();
    let matches = word
        .chars()
        .enumerate()
        .all(|(k, w)| chars.get(at + k) == Some(&w));
    matches
        && !chars
            .get(at + len)
            .is_some_and(|c| c.is_alphanumeric() || *c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_if_else() {
        assert_eq!(
            lower("if (x){print(\"a\");}else{print(\"b\");}"),
            "if (x) then print(\"a\"); else print(\"b\"); end"
        );
    }

    #[test]
    fn test_else_if_chain() {
        assert_eq!(
            lower("if (a){print(1);}else if (b){print(2);}else{print(3);}"),
            "if (a) then print(1); elseif (b) then print(2); else print(3); end"
        );
    }

    #[test]
    fn test_loops() {
        assert_eq!(
            lower("for (i = 1, 3){print(i);}"),
            "for i = 1, 3 do print(i); end"
        );
        assert_eq!(
            lower("for (k, v in pairs(t)){print(k);}"),
            "for k, v in pairs(t) do print(k); end"
        );
        assert_eq!(
            lower("while (n > 0){n = n - 1;}"),
            "while (n > 0) do n = n - 1; end"
        );
    }

    #[test]
    fn test_tables_are_kept() {
        assert_eq!(
            lower("local t ={a = {1, 2}};if (t.a){print(#t.a);}"),
            "local t ={a = {1, 2}};if (t.a) then print(#t.a); end"
        );
    }

    #[test]
    fn test_braces_in_strings_are_kept() {
        assert_eq!(
            lower("if (x){print(\"}else{\");}"),
            "if (x) then print(\"}else{\"); end"
        );
    }

    #[test]
    fn test_native_lua_unchanged() {
        let native = "for i = 1, 3 do print(i) end";
        assert_eq!(lower(native), native);
    }

    #[test]
    fn test_else_inside_native_if() {
        assert_eq!(
            lower("if x then;print(\"a\");}else{print(\"b\");end;"),
            "if x then;print(\"a\"); else print(\"b\");end;"
        );
    }
}
