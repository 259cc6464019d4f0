/*
 * diagnostics.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recoverable problems reported while compiling and rendering templates.
//!
//! Diagnostics never stop a render. Each one carries a stable code so it can
//! be searched for, and is filtered by the `reporting` level of the render
//! that produced it:
//!
//! | level | shown                     |
//! |-------|---------------------------|
//! | 0     | nothing                   |
//! | 1     | errors                    |
//! | 2     | errors, warnings          |
//! | 3     | errors, warnings, notices |
//!
//! Every diagnostic that passes the filter is also emitted as a `tracing`
//! event.

use std::fmt;

use serde::Serialize;

/// Diagnostic codes.
///
/// `N-1-*` scanning, `N-2-*` configuration, `N-3-*` execution and repair,
/// `N-4-*` nested rendering.
pub mod codes {
    pub const DANGLING_STOP: &str = "N-1-1";
    pub const DANGLING_START: &str = "N-1-2";
    pub const UNTERMINATED: &str = "N-1-3";

    pub const SHORT_DELIMITER: &str = "N-2-1";
    pub const RISKY_DELIMITER: &str = "N-2-2";
    pub const INVALID_OPTION: &str = "N-2-3";
    pub const TTL_DECREASE: &str = "N-2-4";
    pub const LONG_TTL: &str = "N-2-5";

    pub const SYNTAX_REPAIRED: &str = "N-3-1";
    pub const EXECUTION_FAILED: &str = "N-3-2";
    pub const RENDERED: &str = "N-3-3";

    pub const CIRCULAR_INCLUDE: &str = "N-4-1";
}

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Error,
    Warning,
    Notice,
}

impl DiagnosticKind {
    /// The lowest `reporting` level at which this kind is shown.
    pub fn min_level(self) -> u8 {
        match self {
            DiagnosticKind::Error => 1,
            DiagnosticKind::Warning => 2,
            DiagnosticKind::Notice => 3,
        }
    }

    pub fn visible_at(self, reporting: u8) -> bool {
        reporting >= self.min_level()
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Notice => "notice",
        };
        f.write_str(label)
    }
}

/// 1-based position in a template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A single reported problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
            template: None,
            location: None,
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, code, message)
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, code, message)
    }

    pub fn notice(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Notice, code, message)
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.location = Some(Location { line, column });
        self
    }

    pub fn for_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(template) = &self.template {
            write!(f, " ({template}")?;
            if let Some(loc) = &self.location {
                write!(f, ":{}:{}", loc.line, loc.column)?;
            }
            write!(f, ")")?;
        } else if let Some(loc) = &self.location {
            write!(f, " (line {}, column {})", loc.line, loc.column)?;
        }
        Ok(())
    }
}

/// Collects diagnostics that pass the active `reporting` level.
#[derive(Debug)]
pub struct DiagnosticCollector {
    reporting: u8,
    template: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new(reporting: u8) -> Self {
        Self {
            reporting,
            template: None,
            diagnostics: Vec::new(),
        }
    }

    /// A collector that stamps every diagnostic with a template label.
    pub fn for_template(reporting: u8, template: impl Into<String>) -> Self {
        Self {
            reporting,
            template: Some(template.into()),
            diagnostics: Vec::new(),
        }
    }

    pub fn reporting(&self) -> u8 {
        self.reporting
    }

    pub fn set_reporting(&mut self, reporting: u8) {
        self.reporting = reporting;
    }

    /// Record a diagnostic if the reporting level shows its kind.
    pub fn add(&mut self, mut diagnostic: Diagnostic) {
        if !diagnostic.kind.visible_at(self.reporting) {
            return;
        }
        if diagnostic.template.is_none() {
            diagnostic.template = self.template.clone();
        }
        emit(&diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, code: &'static str, message: impl Into<String>) {
        self.add(Diagnostic::error(code, message));
    }

    pub fn warn(&mut self, code: &'static str, message: impl Into<String>) {
        self.add(Diagnostic::warning(code, message));
    }

    pub fn notice(&mut self, code: &'static str, message: impl Into<String>) {
        self.add(Diagnostic::notice(code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

fn emit(diagnostic: &Diagnostic) {
    let template = diagnostic.template.as_deref().unwrap_or("-");
    match diagnostic.kind {
        DiagnosticKind::Error => {
            tracing::error!(code = diagnostic.code, template, "{}", diagnostic.message)
        }
        DiagnosticKind::Warning => {
            tracing::warn!(code = diagnostic.code, template, "{}", diagnostic.message)
        }
        DiagnosticKind::Notice => {
            tracing::info!(code = diagnostic.code, template, "{}", diagnostic.message)
        }
    }
}
