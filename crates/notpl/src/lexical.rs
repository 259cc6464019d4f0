/*
 * lexical.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! String masking and comment stripping for fragment source.
//!
//! Textual rewrites (normalization and repair) run on a masked copy of the
//! source in which every string literal has been replaced by a placeholder,
//! so string contents are never touched. Comments are dropped in the same
//! pass: `//` and `/* */` as well as Lua `--` and `--[[ ]]`. A `//` outside
//! a string is always a comment, which means Lua floor division has to be
//! written as `math.floor(a / b)` in fragments.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").unwrap());

/// Source with its string literals replaced by placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Masked {
    text: String,
    literals: Vec<String>,
}

impl Masked {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Put the masked string literals back into `text`.
    pub fn restore(&self, text: &str) -> String {
        PLACEHOLDER
            .replace_all(text, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| self.literals.get(idx))
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Strip comments and mask string literals.
pub fn mask(source: &str) -> Masked {
    let chars: Vec<char> = source.chars().collect();
    let mut text = String::with_capacity(source.len());
    let mut literals = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        match (ch, next) {
            ('\'' | '"', _) => {
                let end = quoted_end(&chars, i);
                push_literal(&mut text, &mut literals, &chars[i..end]);
                i = end;
            }
            ('[', Some('[' | '=')) => match long_bracket_end(&chars, i) {
                Some(end) => {
                    push_literal(&mut text, &mut literals, &chars[i..end]);
                    i = end;
                }
                None => {
                    text.push(ch);
                    i += 1;
                }
            },
            ('-', Some('-')) => {
                i = match long_bracket_end(&chars, i + 2) {
                    Some(end) if chars.get(i + 2) == Some(&'[') => end,
                    _ => line_end(&chars, i),
                };
            }
            ('/', Some('/')) => i = line_end(&chars, i),
            ('/', Some('*')) => {
                i = block_comment_end(&chars, i + 2);
                text.push(' ');
            }
            _ => {
                text.push(ch);
                i += 1;
            }
        }
    }

    Masked { text, literals }
}

fn push_literal(text: &mut String, literals: &mut Vec<String>, literal: &[char]) {
    text.push(OPEN);
    text.push_str(&literals.len().to_string());
    text.push(CLOSE);
    literals.push(literal.iter().collect());
}

/// End (exclusive) of the quoted string starting at `start`. An
/// unterminated string runs to the end of the line.
fn quoted_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\n' => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

/// End (exclusive) of a Lua long bracket `[==[ ... ]==]` starting at
/// `start`, or `None` when `start` does not open one.
fn long_bracket_end(chars: &[char], start: usize) -> Option<usize> {
    if chars.get(start) != Some(&'[') {
        return None;
    }
    let mut i = start + 1;
    let mut level = 0;
    while chars.get(i) == Some(&'=') {
        level += 1;
        i += 1;
    }
    if chars.get(i) != Some(&'[') {
        return None;
    }
    i += 1;
    while i < chars.len() {
        if chars[i] == ']' {
            let mut j = i + 1;
            let mut close_level = 0;
            while chars.get(j) == Some(&'=') {
                close_level += 1;
                j += 1;
            }
            if close_level == level && chars.get(j) == Some(&']') {
                return Some(j + 1);
            }
        }
        i += 1;
    }
    Some(chars.len())
}

fn line_end(chars: &[char], start: usize) -> usize {
    chars[start..]
        .iter()
        .position(|c| *c == '\n')
        .map_or(chars.len(), |offset| start + offset)
}

fn block_comment_end(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}
