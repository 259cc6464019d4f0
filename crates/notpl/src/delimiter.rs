/*
 * delimiter.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Literal/code region recognition.
//!
//! The state machine walks a [`Scanner`] one position at a time and splits
//! the source into literal runs and code runs. Inside a code region it
//! tracks single and double quotes so that delimiter-like text inside a
//! string literal is not mistaken for the end of the region.
//!
//! A delimiter or quote immediately preceded by one backslash is escaped
//! and loses its structural meaning. In literal text the escaping
//! backslash is dropped, so `\<$` renders as `<$`.

use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticCollector, codes};
use crate::error::{NotplError, Result};
use crate::scanner::Scanner;

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if", "in",
    "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

const RISKY_SEQUENCES: &[&str] = &[
    "{{", "}}", "((", "))", "[[", "]]", ";;", "==", "++", "--", "<=", ">=", "=>", "~=", "..",
    "''", "\"\"",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelimiterPair {
    pub start: String,
    pub stop: String,
}

impl Default for DelimiterPair {
    fn default() -> Self {
        Self::new("<$", "$>")
    }
}

impl DelimiterPair {
    pub fn new(start: impl Into<String>, stop: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            stop: stop.into(),
        }
    }

    /// Hard requirements: both non-empty and distinct.
    pub fn is_valid(&self) -> bool {
        !self.start.is_empty() && !self.stop.is_empty() && self.start != self.stop
    }

    /// Either delimiter is shorter than two characters.
    pub fn is_short(&self) -> bool {
        self.start.chars().count() < 2 || self.stop.chars().count() < 2
    }

    /// The first delimiter that contains a sequence likely to appear in
    /// fragment code, or that is a Lua keyword.
    pub fn risky_part(&self) -> Option<&str> {
        [self.start.as_str(), self.stop.as_str()]
            .into_iter()
            .find(|d| LUA_KEYWORDS.contains(d) || RISKY_SEQUENCES.iter().any(|s| d.contains(s)))
    }
}

/// A scanned region of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Run {
    Literal(String),
    Code { text: String, terminated: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Literal,
    Code,
}

pub struct DelimiterMachine<'a> {
    pair: &'a DelimiterPair,
    mode: Mode,
    in_single: bool,
    in_double: bool,
    buffer: String,
    runs: Vec<Run>,
    opened_at: usize,
    diagnostics: &'a mut DiagnosticCollector,
}

impl<'a> DelimiterMachine<'a> {
    pub fn new(pair: &'a DelimiterPair, diagnostics: &'a mut DiagnosticCollector) -> Self {
        Self {
            pair,
            mode: Mode::Literal,
            in_single: false,
            in_double: false,
            buffer: String::new(),
            runs: Vec::new(),
            opened_at: 0,
            diagnostics,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Position of the start delimiter of the most recent code region.
    pub fn opened_at(&self) -> usize {
        self.opened_at
    }

    /// Process the cursor position, consuming either a whole delimiter or a
    /// single character. A delimiter directly after another is picked up by
    /// the next step, so adjacent code regions need no literal between them.
    pub fn step(&mut self, scanner: &mut Scanner) {
        match self.mode {
            Mode::Literal => self.step_literal(scanner),
            Mode::Code => self.step_code(scanner),
        }
    }

    fn step_literal(&mut self, scanner: &mut Scanner) {
        let start = self.pair.start.as_str();
        let stop = self.pair.stop.as_str();
        let Some(found) = longest_match(scanner, start, stop) else {
            self.push_current(scanner);
            return;
        };

        if is_escaped(scanner) {
            self.buffer.pop();
            self.buffer.push_str(found);
            skip(scanner, found);
            return;
        }

        if found == start {
            self.flush_literal();
            self.mode = Mode::Code;
            self.opened_at = scanner.position();
            skip(scanner, start);
        } else {
            let (line, column) = scanner.line_column();
            self.diagnostics.add(
                Diagnostic::error(
                    codes::DANGLING_STOP,
                    format!("Found '{stop}' without a matching '{start}'"),
                )
                .at(line, column),
            );
            self.buffer.push_str(stop);
            skip(scanner, stop);
        }
    }

    fn step_code(&mut self, scanner: &mut Scanner) {
        let Some(ch) = scanner.peek() else {
            return;
        };

        if self.in_single || self.in_double {
            if ((ch == '\'' && self.in_single) || (ch == '"' && self.in_double))
                && !is_escaped(scanner)
            {
                self.in_single = false;
                self.in_double = false;
            }
            self.push_current(scanner);
            return;
        }

        let start = self.pair.start.as_str();
        let stop = self.pair.stop.as_str();
        if let Some(found) = longest_match(scanner, stop, start) {
            if is_escaped(scanner) {
                self.buffer.push_str(found);
                skip(scanner, found);
            } else if found == stop {
                self.flush_code(true);
                self.mode = Mode::Literal;
                skip(scanner, stop);
            } else {
                let (line, column) = scanner.line_column();
                self.diagnostics.add(
                    Diagnostic::error(
                        codes::DANGLING_START,
                        format!("Found '{start}' inside a code region that is still open"),
                    )
                    .at(line, column),
                );
                skip(scanner, start);
            }
            return;
        }

        if !is_escaped(scanner) {
            match ch {
                '\'' => self.in_single = true,
                '"' => self.in_double = true,
                _ => {}
            }
        }
        self.push_current(scanner);
    }

    /// Flush the pending run and return all runs. A code region still open
    /// here becomes an unterminated `Run::Code`.
    pub fn finish(mut self, scanner: &Scanner) -> Vec<Run> {
        match self.mode {
            Mode::Literal => self.flush_literal(),
            Mode::Code => {
                let (line, column) = scanner.line_column_at(self.opened_at);
                self.diagnostics.add(
                    Diagnostic::error(
                        codes::UNTERMINATED,
                        format!("Code region opened here is never closed with '{}'", self.pair.stop),
                    )
                    .at(line, column),
                );
                self.flush_code(false);
            }
        }
        self.runs
    }

    fn push_current(&mut self, scanner: &mut Scanner) {
        if let Some(ch) = scanner.peek() {
            self.buffer.push(ch);
        }
        scanner.advance();
    }

    fn flush_literal(&mut self) {
        if !self.buffer.is_empty() {
            self.runs.push(Run::Literal(std::mem::take(&mut self.buffer)));
        }
    }

    fn flush_code(&mut self, terminated: bool) {
        self.in_single = false;
        self.in_double = false;
        self.runs.push(Run::Code {
            text: std::mem::take(&mut self.buffer),
            terminated,
        });
    }
}

/// Split `source` into runs, failing on a code region left open at end of
/// input.
pub fn scan(
    source: &str,
    pair: &DelimiterPair,
    template: &str,
    diagnostics: &mut DiagnosticCollector,
) -> Result<Vec<Run>> {
    let mut scanner = Scanner::new(source);
    let mut machine = DelimiterMachine::new(pair, diagnostics);
    while !scanner.is_eof() {
        machine.step(&mut scanner);
    }
    let opened_at = machine.opened_at();
    let runs = machine.finish(&scanner);

    if let Some(Run::Code {
        terminated: false, ..
    }) = runs.last()
    {
        let (line, column) = scanner.line_column_at(opened_at);
        return Err(NotplError::UnterminatedCode {
            template: template.to_string(),
            delimiter: pair.stop.clone(),
            line,
            column,
        });
    }
    Ok(runs)
}

/// The delimiter at the cursor, preferring `first` and then the longer one
/// when both match.
fn longest_match<'d>(scanner: &Scanner, first: &'d str, second: &'d str) -> Option<&'d str> {
    match (scanner.matches_ahead(first), scanner.matches_ahead(second)) {
        (true, true) if second.len() > first.len() => Some(second),
        (true, _) => Some(first),
        (false, true) => Some(second),
        (false, false) => None,
    }
}

/// Preceded by exactly one backslash.
fn is_escaped(scanner: &Scanner) -> bool {
    let behind: Vec<char> = scanner.lookbehind(2).chars().collect();
    match behind.as_slice() {
        [a, '\\'] => *a != '\\',
        ['\\'] => true,
        _ => false,
    }
}

fn skip(scanner: &mut Scanner, delimiter: &str) {
    scanner.goto(scanner.position() + delimiter.chars().count());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn runs(source: &str) -> (Vec<Run>, DiagnosticCollector) {
        let mut diags = DiagnosticCollector::new(3);
        let runs = scan(source, &DelimiterPair::default(), "test", &mut diags).unwrap();
        (runs, diags)
    }

    fn code(text: &str) -> Run {
        Run::Code {
            text: text.to_string(),
            terminated: true,
        }
    }

    #[test]
    fn test_literal_only() {
        let (runs, diags) = runs("<div>hello world</div>");
        assert_eq!(runs, vec![Run::Literal("<div>hello world</div>".into())]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_code_region() {
        let (runs, _) = runs("<div>hello world <$ print('foo bar'); $></div>");
        assert_eq!(
            runs,
            vec![
                Run::Literal("<div>hello world ".into()),
                code(" print('foo bar'); "),
                Run::Literal("</div>".into()),
            ]
        );
    }

    #[test]
    fn test_adjacent_regions() {
        let (runs, _) = runs("<$ a() $><$ b() $>");
        assert_eq!(runs, vec![code(" a() "), code(" b() ")]);
    }

    #[test]
    fn test_stop_inside_string_is_ignored() {
        let (runs, _) = runs("<$ print('$>'); print(\"x $> y\") $>!");
        assert_eq!(
            runs,
            vec![
                code(" print('$>'); print(\"x $> y\") "),
                Run::Literal("!".into()),
            ]
        );
    }

    #[test]
    fn test_escaped_quote_does_not_close_string() {
        let (runs, _) = runs(r"<$ print('it\'s $> here') $>");
        assert_eq!(runs, vec![code(r" print('it\'s $> here') ")]);
    }

    #[test]
    fn test_escaped_delimiter_in_literal() {
        let (runs, diags) = runs(r"show \<$ and \$> as text");
        assert_eq!(runs, vec![Run::Literal("show <$ and $> as text".into())]);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_double_backslash_does_not_escape() {
        let (runs, _) = runs(r"a\\<$ print(1) $>");
        assert_eq!(runs, vec![Run::Literal(r"a\\".into()), code(" print(1) ")]);
    }

    #[test]
    fn test_dangling_stop_is_reported_not_fatal() {
        let (runs, diags) = runs("a $> b");
        assert_eq!(runs, vec![Run::Literal("a $> b".into())]);
        assert_eq!(diags.diagnostics().len(), 1);
        let diag = &diags.diagnostics()[0];
        assert_eq!(diag.code, codes::DANGLING_STOP);
        assert_eq!(diag.location.map(|l| (l.line, l.column)), Some((1, 3)));
    }

    #[test]
    fn test_dangling_start_is_reported_and_dropped() {
        let (runs, diags) = runs("<$ a() <$ b() $>");
        assert_eq!(runs, vec![code(" a()  b() ")]);
        assert_eq!(diags.diagnostics()[0].code, codes::DANGLING_START);
    }

    #[test]
    fn test_unterminated_is_fatal_with_location() {
        let mut diags = DiagnosticCollector::new(3);
        let err = scan(
            "line one\n  <$ print('x')",
            &DelimiterPair::default(),
            "Template [t]",
            &mut diags,
        )
        .unwrap_err();
        match err {
            NotplError::UnterminatedCode { line, column, .. } => {
                assert_eq!((line, column), (2, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(diags.has_errors());
    }

    #[test]
    fn test_custom_delimiters() {
        let mut diags = DiagnosticCollector::new(3);
        let pair = DelimiterPair::new("{%", "%}");
        let runs = scan("x{% print(1) %}y", &pair, "t", &mut diags).unwrap();
        assert_eq!(
            runs,
            vec![
                Run::Literal("x".into()),
                code(" print(1) "),
                Run::Literal("y".into()),
            ]
        );
    }

    #[test]
    fn test_pair_checks() {
        assert!(DelimiterPair::default().is_valid());
        assert!(!DelimiterPair::new("", "$>").is_valid());
        assert!(!DelimiterPair::new("%%", "%%").is_valid());
        assert!(DelimiterPair::new("<", ">").is_short());
        assert_eq!(DelimiterPair::new("{{", "}}").risky_part(), Some("{{"));
        assert_eq!(DelimiterPair::new("<?", "end").risky_part(), Some("end"));
        assert_eq!(DelimiterPair::default().risky_part(), None);
    }
}
