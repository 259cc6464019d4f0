/*
 * nested.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Rendering templates from inside a running fragment.
//!
//! `render(source, options, scope)` in a fragment ends up here. The child is
//! inline code when `options.code` is set (inherited from the parent
//! otherwise), and a file path resolved against the parent's directory
//! when not. Every call records a parent → child edge.
//!
//! A child that already includes the parent, or that is itself still
//! rendering further up the stack, closes a cycle. Such a child is not run
//! again: its last output is used instead, and the cycle is reported once
//! per (parent, child) pair.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::diagnostics::{DiagnosticCollector, codes};
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::options::{OptionsPatch, RenderOptions};
use crate::registry::Registry;
use crate::template::{Template, TemplateSource};

pub(crate) fn render_child(
    registry: &Registry,
    parent: &Template,
    source: &str,
    options: Option<Value>,
    scope: Option<Value>,
) -> Result<String> {
    let parent_options = parent.options();
    let label = parent.to_string();
    let mut diags = DiagnosticCollector::for_template(parent_options.reporting, &label);

    let patch = options
        .map(|value| OptionsPatch::from_json(&value, &mut diags))
        .unwrap_or_default();
    let child_source = if patch.code.unwrap_or(parent_options.code) {
        TemplateSource::Inline(source.to_string())
    } else {
        TemplateSource::File(resolve_child_path(source, parent.source().path()))
    };
    let content = child_source.load()?;
    let fingerprint = Fingerprint::of(&content);
    parent.add_child(fingerprint.clone());

    if let Some(child) = registry.get_by_fingerprint(&fingerprint) {
        if child.has_child(parent.fingerprint()) || child.is_rendering() {
            if parent.should_warn_cycle(&fingerprint) {
                diags.warn(
                    codes::CIRCULAR_INCLUDE,
                    format!(
                        "{label} and {child} include each other; using the last output of {child}"
                    ),
                );
            }
            registry.collect(diags);
            return Ok(child.render_static());
        }
    }
    registry.collect(diags);

    let child = registry.create_with_content(
        child_source,
        content,
        inherited_options(&parent_options),
        &OptionsPatch::default(),
        None,
    )?;
    if let Some(scope) = scope {
        child.set_scope(scope);
    }
    child.render(&patch)
}

/// Starting options for a child created by a nested render.
fn inherited_options(parent: &RenderOptions) -> RenderOptions {
    RenderOptions {
        force_full_render: false,
        name: None,
        ..parent.clone()
    }
}

/// Resolve a child path relative to the parent file's directory.
///
/// A child without an extension takes the parent's extension.
pub fn resolve_child_path(child: &str, parent: Option<&Path>) -> PathBuf {
    let child_path = Path::new(child);
    let Some(parent) = parent else {
        return child_path.to_path_buf();
    };
    if child_path.is_absolute() {
        return child_path.to_path_buf();
    }
    let base_dir = parent.parent().unwrap_or(Path::new("."));
    let resolved = base_dir.join(child_path);
    match (child_path.extension(), parent.extension()) {
        (None, Some(ext)) => resolved.with_extension(ext),
        _ => resolved,
    }
}
