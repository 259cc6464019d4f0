/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and rendering.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while compiling or rendering a template.
///
/// Only conditions that stop a render show up here. Recoverable problems
/// (dangling delimiters, rejected options, include cycles) are reported as
/// [`crate::Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum NotplError {
    /// A code region was opened but never closed before end of input.
    #[error("{template}: unterminated code region, missing '{delimiter}' (opened at {line}:{column})")]
    UnterminatedCode {
        template: String,
        delimiter: String,
        line: usize,
        column: usize,
    },

    /// A fragment failed to compile or raised while running.
    #[error("{template}: execution failed: {message}")]
    Execution { template: String, message: String },

    /// Reading a template source failed.
    #[error("Failed to read template '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing rendered output failed.
    #[error("Failed to write output '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A caller passed an argument outside the accepted domain.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A template outlived the registry that created it.
    #[error("The template registry has been dropped")]
    RegistryDropped,

    /// Error raised by the embedded Lua engine outside fragment execution.
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, NotplError>;
