/*
 * output.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output styling and output files.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{NotplError, Result};
use crate::options::{FilenameToken, OutputStyle, RenderOptions};
use crate::stats::RenderType;

static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static TAG_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static QUOTED_PADDING: Lazy<Regex> = Lazy::new(|| Regex::new(r#""\s*([^"]*?)\s*""#).unwrap());

/// Apply the output style to rendered text.
pub fn apply_style(output: &str, style: OutputStyle) -> String {
    match style {
        OutputStyle::Compressed => compress(output),
        OutputStyle::Compact | OutputStyle::Preserve => output.to_string(),
    }
}

fn compress(output: &str) -> String {
    let text = HTML_COMMENT.replace_all(output, "");
    let text = TAG_GAP.replace_all(&text, "><");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = QUOTED_PADDING.replace_all(&text, "\"$1\"");
    text.trim().to_string()
}

/// Values the filename tokens are filled from.
#[derive(Debug, Clone)]
pub struct OutputName<'a> {
    pub fingerprint: &'a str,
    pub short_fingerprint: &'a str,
    pub stem: &'a str,
    pub render_type: RenderType,
    pub time_ms: u128,
}

/// Output path for a render: the tokens joined with `-`, with `ext`
/// appended as an extension, inside the output directory.
pub fn output_path(options: &RenderOptions, name: &OutputName<'_>) -> PathBuf {
    let mut filename = String::new();
    for token in &options.output_format {
        let part = match token {
            FilenameToken::Ext => {
                filename.push('.');
                filename.push_str(&options.output_ext);
                continue;
            }
            FilenameToken::Tid => name.fingerprint.to_string(),
            FilenameToken::Atid => name.short_fingerprint.to_string(),
            FilenameToken::Time => name.time_ms.to_string(),
            FilenameToken::Filename => name.stem.to_string(),
            FilenameToken::Type => name.render_type.as_str().to_string(),
        };
        if !filename.is_empty() {
            filename.push('-');
        }
        filename.push_str(&part);
    }
    if filename.is_empty() {
        filename.push_str(name.short_fingerprint);
    }
    options.output_dir.join(filename)
}

pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| NotplError::Output {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, content).map_err(|source| NotplError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "wrote template output");
    Ok(())
}
