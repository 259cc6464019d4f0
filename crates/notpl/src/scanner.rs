/*
 * scanner.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Character cursor over a template source.
//!
//! The scanner knows nothing about delimiters. It stores the source as
//! characters, keeps a cursor clamped to `[0, len]` (where `len` is the
//! end-of-input sentinel), and answers bounded lookahead and lookbehind
//! queries. Line and column numbers come from a newline index built once
//! per source.

use crate::error::{NotplError, Result};

/// Newline offsets of a source, in character positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_breaks: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(chars: &[char]) -> Self {
        let line_breaks = chars
            .iter()
            .enumerate()
            .filter_map(|(idx, ch)| (*ch == '\n').then_some(idx))
            .collect();
        Self {
            line_breaks,
            len: chars.len(),
        }
    }

    /// 1-based line and column of a character position.
    ///
    /// Positions past the end resolve to the end of input. A newline
    /// belongs to the line it terminates.
    pub fn line_column(&self, pos: usize) -> (usize, usize) {
        let pos = pos.min(self.len);
        let row = match self.line_breaks.binary_search(&pos) {
            Ok(idx) | Err(idx) => idx,
        };
        let line_start = if row == 0 {
            0
        } else {
            self.line_breaks[row - 1] + 1
        };
        (row + 1, pos - line_start + 1)
    }

    pub fn line_count(&self) -> usize {
        self.line_breaks.len() + 1
    }
}

#[derive(Debug, Clone)]
pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    lines: LineIndex,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let lines = LineIndex::new(&chars);
        Self {
            chars,
            pos: 0,
            lines,
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Character under the cursor.
    ///
    /// At end of input this is the last real character, so callers that
    /// peek after the final advance still see the tail of the source.
    /// Empty sources have nothing to peek.
    pub fn peek(&self) -> Option<char> {
        if self.chars.is_empty() {
            return None;
        }
        let idx = self.pos.min(self.chars.len() - 1);
        Some(self.chars[idx])
    }

    /// Up to `n` characters starting at the cursor.
    pub fn lookahead(&self, n: usize) -> String {
        let end = (self.pos + n).min(self.chars.len());
        self.chars[self.pos..end].iter().collect()
    }

    /// Up to `n` characters ending just before the cursor.
    pub fn lookbehind(&self, n: usize) -> String {
        let start = self.pos.saturating_sub(n);
        self.chars[start..self.pos].iter().collect()
    }

    /// Whether the characters at the cursor spell `pattern`.
    pub fn matches_ahead(&self, pattern: &str) -> bool {
        let mut idx = self.pos;
        for ch in pattern.chars() {
            match self.chars.get(idx) {
                Some(c) if *c == ch => idx += 1,
                _ => return false,
            }
        }
        true
    }

    /// Move the cursor to `pos`, clamped to the end-of-input sentinel.
    pub fn goto(&mut self, pos: usize) {
        self.pos = pos.min(self.chars.len());
    }

    pub fn advance(&mut self) {
        self.goto(self.pos + 1);
    }

    /// Move forward by `n` characters. Negative steps are rejected; use
    /// [`Scanner::retreat`] to move backwards.
    pub fn advance_by(&mut self, n: isize) -> Result<()> {
        let steps = usize::try_from(n).map_err(|_| NotplError::InvalidArgument {
            message: format!("cannot advance the scanner by a negative amount ({n})"),
        })?;
        self.goto(self.pos.saturating_add(steps));
        Ok(())
    }

    /// Move back by `n` characters, stopping at the start.
    pub fn retreat(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Everything from the cursor to the end.
    pub fn rest(&self) -> String {
        self.chars[self.pos..].iter().collect()
    }

    /// Characters in `[start, end)`, both clamped to the source.
    pub fn range(&self, start: usize, end: usize) -> String {
        let end = end.min(self.chars.len());
        let start = start.min(end);
        self.chars[start..end].iter().collect()
    }

    pub fn source(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn line_column(&self) -> (usize, usize) {
        self.lines.line_column(self.pos)
    }

    pub fn line_column_at(&self, pos: usize) -> (usize, usize) {
        self.lines.line_column(pos)
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.lines
    }
}
