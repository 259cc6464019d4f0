/*
 * assembler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Turns scanned runs into an executable body.

use crate::delimiter::Run;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyElement {
    /// Literal text passed to the output verbatim.
    Emit(String),
    /// A code fragment executed in place.
    Code(String),
}

/// Ordered body of a template, rebuilt on every full render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledBody {
    elements: Vec<BodyElement>,
}

impl CompiledBody {
    pub fn from_runs(runs: Vec<Run>) -> Self {
        let mut body = Self::default();
        for run in runs {
            match run {
                Run::Literal(text) => body.push_literal(text),
                Run::Code { text, .. } => body.push_code(text),
            }
        }
        body
    }

    pub fn push_literal(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        // keep adjacent literals in one emit
        if let Some(BodyElement::Emit(prev)) = self.elements.last_mut() {
            prev.push_str(&text);
        } else {
            self.elements.push(BodyElement::Emit(text));
        }
    }

    pub fn push_code(&mut self, text: String) {
        self.elements.push(BodyElement::Code(text));
    }

    pub fn elements(&self) -> &[BodyElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether the body runs any code at all.
    pub fn has_code(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, BodyElement::Code(_)))
    }

    /// Host source for the body: one emit call per literal, fragments
    /// verbatim, each followed by a statement terminator.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for element in &self.elements {
            match element {
                BodyElement::Emit(text) => {
                    out.push_str("print(\"");
                    out.push_str(&escape_string(text));
                    out.push_str("\");\n");
                }
                BodyElement::Code(code) => {
                    out.push_str(code);
                    out.push_str(";\n");
                }
            }
        }
        out
    }
}

/// Escape text for a double-quoted Lua string literal.
pub fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
