/*
 * options.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Render options.
//!
//! [`RenderOptions`] is the full, validated option set of a template.
//! [`OptionsPatch`] carries user overrides; it is built either with the
//! typed builder methods or from a JSON object (which is also how Lua tables
//! passed to `render` arrive). Merging a patch never fails: bad values are
//! reported and the previous value is kept.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use crate::delimiter::DelimiterPair;
use crate::diagnostics::{DiagnosticCollector, codes};

/// TTLs above this many milliseconds draw a notice.
pub const LONG_TTL_MS: u64 = 600_000;

/// Post-processing applied to the rendered output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    /// Collapse whitespace, drop gaps between tags and HTML comments.
    #[default]
    Compressed,
    /// Output as produced.
    Compact,
    /// Output as produced.
    Preserve,
}

impl OutputStyle {
    pub fn from_name(name: &str) -> Self {
        match name {
            "compressed" => OutputStyle::Compressed,
            "compact" => OutputStyle::Compact,
            _ => OutputStyle::Preserve,
        }
    }
}

/// Pieces an output filename is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilenameToken {
    /// Full template fingerprint.
    Tid,
    /// Abbreviated fingerprint.
    Atid,
    /// Milliseconds since the Unix epoch.
    Time,
    /// Source file name without extension.
    Filename,
    /// Render type of the render being written.
    Type,
    /// Output extension.
    Ext,
}

impl FilenameToken {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tid" => Some(FilenameToken::Tid),
            "atid" => Some(FilenameToken::Atid),
            "time" => Some(FilenameToken::Time),
            "filename" => Some(FilenameToken::Filename),
            "type" => Some(FilenameToken::Type),
            "ext" => Some(FilenameToken::Ext),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOptions {
    pub delimiters: DelimiterPair,
    /// 0 silent, 1 errors, 2 warnings, 3 notices.
    pub reporting: u8,
    pub style: OutputStyle,
    pub halt_on_error: bool,
    /// Static tier window in milliseconds; 0 disables it.
    pub full_cache_ttl: u64,
    /// Partial tier window in milliseconds; 0 disables it.
    pub partial_cache_ttl: u64,
    /// Write each render to a file.
    pub output: bool,
    pub output_format: Vec<FilenameToken>,
    pub output_ext: String,
    pub output_dir: PathBuf,
    /// Bypass the cache tiers for the next render only.
    pub force_full_render: bool,
    /// The template source is inline code rather than a path.
    pub code: bool,
    /// Display name, mostly useful for inline templates.
    pub name: Option<String>,
    pub use_absolute_paths: bool,
    pub auto_repair: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            delimiters: DelimiterPair::default(),
            reporting: 2,
            style: OutputStyle::Compressed,
            halt_on_error: true,
            full_cache_ttl: 0,
            partial_cache_ttl: 30_000,
            output: false,
            output_format: vec![
                FilenameToken::Atid,
                FilenameToken::Type,
                FilenameToken::Filename,
                FilenameToken::Ext,
            ],
            output_ext: "html".to_string(),
            output_dir: PathBuf::from("."),
            force_full_render: false,
            code: false,
            name: None,
            use_absolute_paths: false,
            auto_repair: true,
        }
    }
}

/// What changed when a patch was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub delimiters_changed: bool,
}

impl RenderOptions {
    /// Merge `patch` into these options, reporting rejected values.
    pub fn apply(&mut self, patch: &OptionsPatch, diags: &mut DiagnosticCollector) -> Applied {
        let mut applied = Applied::default();

        if let Some(reporting) = patch.reporting {
            if reporting <= 3 {
                self.reporting = reporting;
                diags.set_reporting(reporting);
            } else {
                diags.warn(
                    codes::INVALID_OPTION,
                    format!("Ignoring reporting level {reporting}; expected 0 to 3"),
                );
            }
        }

        if patch.delimiter_start.is_some() || patch.delimiter_stop.is_some() {
            let pair = DelimiterPair::new(
                patch
                    .delimiter_start
                    .clone()
                    .unwrap_or_else(|| self.delimiters.start.clone()),
                patch
                    .delimiter_stop
                    .clone()
                    .unwrap_or_else(|| self.delimiters.stop.clone()),
            );
            if !pair.is_valid() {
                diags.warn(
                    codes::INVALID_OPTION,
                    format!(
                        "Ignoring delimiters '{}' and '{}'; they must be non-empty and different",
                        pair.start, pair.stop
                    ),
                );
            } else if pair != self.delimiters {
                if pair.is_short() {
                    diags.warn(
                        codes::SHORT_DELIMITER,
                        format!(
                            "Delimiters '{}' and '{}' are short and may match ordinary text",
                            pair.start, pair.stop
                        ),
                    );
                }
                if let Some(risky) = pair.risky_part() {
                    diags.warn(
                        codes::RISKY_DELIMITER,
                        format!("Delimiter '{risky}' may collide with fragment code"),
                    );
                }
                self.delimiters = pair;
                applied.delimiters_changed = true;
            }
        }

        if let Some(style) = patch.style {
            self.style = style;
        }
        if let Some(halt) = patch.halt_on_error {
            self.halt_on_error = halt;
        }

        if let Some(ttl) = patch.full_cache_ttl {
            if ttl < self.full_cache_ttl {
                diags.warn(
                    codes::TTL_DECREASE,
                    format!(
                        "Ignoring full_cache_ttl {ttl}; it cannot go below the current {}",
                        self.full_cache_ttl
                    ),
                );
            } else {
                warn_long_ttl("full_cache_ttl", ttl, diags);
                self.full_cache_ttl = ttl;
            }
        }
        if let Some(ttl) = patch.partial_cache_ttl {
            warn_long_ttl("partial_cache_ttl", ttl, diags);
            self.partial_cache_ttl = ttl;
        }

        if let Some(output) = patch.output {
            self.output = output;
        }
        if let Some(format) = &patch.output_format {
            self.output_format = format.clone();
        }
        if let Some(ext) = &patch.output_ext {
            self.output_ext = ext.clone();
        }
        if let Some(dir) = &patch.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(force) = patch.force_full_render {
            self.force_full_render = force;
        }
        if let Some(code) = patch.code {
            self.code = code;
        }
        if let Some(name) = &patch.name {
            self.name = Some(name.clone());
        }
        if let Some(absolute) = patch.use_absolute_paths {
            self.use_absolute_paths = absolute;
        }
        if let Some(repair) = patch.auto_repair {
            self.auto_repair = repair;
        }

        applied
    }
}

fn warn_long_ttl(key: &str, ttl: u64, diags: &mut DiagnosticCollector) {
    if ttl > LONG_TTL_MS {
        diags.notice(
            codes::LONG_TTL,
            format!("{key} of {ttl}ms is long; cached output may go stale"),
        );
    }
}

/// User overrides for [`RenderOptions`]. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsPatch {
    pub delimiter_start: Option<String>,
    pub delimiter_stop: Option<String>,
    pub reporting: Option<u8>,
    pub style: Option<OutputStyle>,
    pub halt_on_error: Option<bool>,
    pub full_cache_ttl: Option<u64>,
    pub partial_cache_ttl: Option<u64>,
    pub output: Option<bool>,
    pub output_format: Option<Vec<FilenameToken>>,
    pub output_ext: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub force_full_render: Option<bool>,
    pub code: Option<bool>,
    pub name: Option<String>,
    pub use_absolute_paths: Option<bool>,
    pub auto_repair: Option<bool>,
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn delimiters(mut self, start: impl Into<String>, stop: impl Into<String>) -> Self {
        self.delimiter_start = Some(start.into());
        self.delimiter_stop = Some(stop.into());
        self
    }

    pub fn reporting(mut self, level: u8) -> Self {
        self.reporting = Some(level);
        self
    }

    pub fn style(mut self, style: OutputStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn halt_on_error(mut self, halt: bool) -> Self {
        self.halt_on_error = Some(halt);
        self
    }

    pub fn full_cache_ttl(mut self, ms: u64) -> Self {
        self.full_cache_ttl = Some(ms);
        self
    }

    pub fn partial_cache_ttl(mut self, ms: u64) -> Self {
        self.partial_cache_ttl = Some(ms);
        self
    }

    pub fn output(mut self, write: bool) -> Self {
        self.output = Some(write);
        self
    }

    pub fn output_format(mut self, tokens: Vec<FilenameToken>) -> Self {
        self.output_format = Some(tokens);
        self
    }

    pub fn output_ext(mut self, ext: impl Into<String>) -> Self {
        self.output_ext = Some(ext.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn force_full_render(mut self, force: bool) -> Self {
        self.force_full_render = Some(force);
        self
    }

    pub fn code(mut self, code: bool) -> Self {
        self.code = Some(code);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn use_absolute_paths(mut self, absolute: bool) -> Self {
        self.use_absolute_paths = Some(absolute);
        self
    }

    pub fn auto_repair(mut self, repair: bool) -> Self {
        self.auto_repair = Some(repair);
        self
    }

    /// Build a patch from a JSON object.
    ///
    /// Keys may be snake_case or camelCase. Unknown keys and values of the
    /// wrong type are reported and skipped.
    pub fn from_json(value: &Value, diags: &mut DiagnosticCollector) -> Self {
        let mut patch = Self::default();
        let object = match value {
            Value::Object(object) => object,
            Value::Null => return patch,
            other => {
                diags.warn(
                    codes::INVALID_OPTION,
                    format!("Ignoring options: expected an object, found {}", json_kind(other)),
                );
                return patch;
            }
        };

        for (key, value) in object {
            let key = snake_case(key);
            let mut checker = FieldCheck {
                key: &key,
                value,
                diags: &mut *diags,
            };
            match key.as_str() {
                "delimiter_start" => patch.delimiter_start = checker.string(),
                "delimiter_stop" => patch.delimiter_stop = checker.string(),
                "reporting" => patch.reporting = checker.level(),
                "style" => patch.style = checker.string().map(|s| OutputStyle::from_name(&s)),
                "halt_on_error" => patch.halt_on_error = checker.boolean(),
                "full_cache_ttl" => patch.full_cache_ttl = checker.unsigned(),
                "partial_cache_ttl" => patch.partial_cache_ttl = checker.unsigned(),
                "output" => patch.output = checker.boolean(),
                "output_format" => patch.output_format = checker.tokens(),
                "output_ext" => patch.output_ext = checker.string(),
                "output_dir" => patch.output_dir = checker.string().map(PathBuf::from),
                "force_full_render" => patch.force_full_render = checker.boolean(),
                "code" => patch.code = checker.boolean(),
                "name" => patch.name = checker.string(),
                "use_absolute_paths" => patch.use_absolute_paths = checker.boolean(),
                "auto_repair" => patch.auto_repair = checker.boolean(),
                _ => diags.warn(
                    codes::INVALID_OPTION,
                    format!("Ignoring unknown option '{key}'"),
                ),
            }
        }
        patch
    }
}

struct FieldCheck<'a> {
    key: &'a str,
    value: &'a Value,
    diags: &'a mut DiagnosticCollector,
}

impl FieldCheck<'_> {
    fn reject(&mut self, expected: &str) {
        self.diags.warn(
            codes::INVALID_OPTION,
            format!(
                "Ignoring option '{}': expected {expected}, found {}",
                self.key,
                json_kind(self.value)
            ),
        );
    }

    fn string(&mut self) -> Option<String> {
        match self.value {
            Value::String(s) => Some(s.clone()),
            _ => {
                self.reject("a string");
                None
            }
        }
    }

    fn boolean(&mut self) -> Option<bool> {
        match self.value {
            Value::Bool(b) => Some(*b),
            _ => {
                self.reject("a boolean");
                None
            }
        }
    }

    fn unsigned(&mut self) -> Option<u64> {
        match self.value.as_u64() {
            Some(n) => Some(n),
            None => {
                self.reject("a non-negative integer");
                None
            }
        }
    }

    fn level(&mut self) -> Option<u8> {
        match self.value.as_u64().and_then(|n| u8::try_from(n).ok()) {
            Some(level) if level <= 3 => Some(level),
            _ => {
                self.reject("a reporting level from 0 to 3");
                None
            }
        }
    }

    fn tokens(&mut self) -> Option<Vec<FilenameToken>> {
        let Value::Array(items) = self.value else {
            self.reject("a list of filename tokens");
            return None;
        };
        let tokens: Option<Vec<_>> = items
            .iter()
            .map(|item| item.as_str().and_then(FilenameToken::from_name))
            .collect();
        if tokens.is_none() {
            self.reject("tokens among tid, atid, time, filename, type, ext");
        }
        tokens
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

impl fmt::Display for OutputStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputStyle::Compressed => "compressed",
            OutputStyle::Compact => "compact",
            OutputStyle::Preserve => "preserve",
        };
        f.write_str(name)
    }
}
