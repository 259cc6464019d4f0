/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Command implementations for the notpl CLI.
//!
//! Each command parses its arguments into library types and drives a
//! [`notpl::Registry`].

pub mod render;
pub mod stats;

use anyhow::{Context, Result};
use serde_json::Value;

/// Parse a scope given inline or as a file. No scope means `null`.
pub fn load_scope(inline: Option<&str>, file: Option<&str>) -> Result<Option<Value>> {
    if let Some(text) = inline {
        let value = serde_json::from_str(text).context("--scope is not valid JSON")?;
        return Ok(Some(value));
    }
    if let Some(path) = file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scope file {path}"))?;
        let value = serde_json::from_str(&text)
            .with_context(|| format!("Scope file {path} is not valid JSON"))?;
        return Ok(Some(value));
    }
    Ok(None)
}

/// Print the diagnostics collected so far to stderr.
pub fn report(registry: &notpl::Registry) {
    for diagnostic in registry.take_diagnostics() {
        eprintln!("{diagnostic}");
    }
}
