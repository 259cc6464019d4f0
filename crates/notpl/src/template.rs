/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! A registered template and its render pipeline.
//!
//! Every render picks one strategy:
//!
//! - **static**: a full render happened less than `full_cache_ttl` ago;
//!   the previous output is returned as is.
//! - **partial**: a full render happened less than `partial_cache_ttl` ago;
//!   the compiled body runs again against the current scope.
//! - **full**: scan, assemble, normalize, compile and run from source.
//!
//! A TTL of zero disables its tier. Changing the delimiters or setting
//! `force_full_render` always produces a full render; the force flag is
//! cleared once honoured.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant, SystemTime};

use serde_json::Value;

use crate::adapter::Program;
use crate::assembler::CompiledBody;
use crate::delimiter;
use crate::diagnostics::{DiagnosticCollector, codes};
use crate::error::{NotplError, Result};
use crate::fingerprint::Fingerprint;
use crate::nested;
use crate::normalizer;
use crate::options::{OptionsPatch, RenderOptions};
use crate::output::{self, OutputName};
use crate::registry::{Registry, RegistryInner};
use crate::repair;
use crate::stats::{RenderHistory, RenderType, TemplateStats, epoch_ms};

/// Where a template's source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    Inline(String),
}

impl TemplateSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        TemplateSource::File(path.into())
    }

    pub fn inline(code: impl Into<String>) -> Self {
        TemplateSource::Inline(code.into())
    }

    /// Read the source text.
    pub fn load(&self) -> Result<String> {
        match self {
            TemplateSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| NotplError::Io {
                    path: path.clone(),
                    source,
                })
            }
            TemplateSource::Inline(code) => Ok(code.clone()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            TemplateSource::File(path) => Some(path),
            TemplateSource::Inline(_) => None,
        }
    }
}

struct TemplateState {
    options: RenderOptions,
    scope: Value,
    program: Option<Program>,
    output: String,
    history: RenderHistory,
    last_options: Option<RenderOptions>,
    children: BTreeSet<Fingerprint>,
    warned_cycles: HashSet<Fingerprint>,
}

impl TemplateState {
    fn clear_compiled(&mut self) {
        self.program = None;
        self.history.invalidate();
    }
}

pub(crate) struct TemplateInner {
    fingerprint: Fingerprint,
    source: TemplateSource,
    content: String,
    created: SystemTime,
    registry: Weak<RegistryInner>,
    state: RefCell<TemplateState>,
    rendering: Cell<bool>,
}

/// Handle to a registered template. Clones share the same entry.
#[derive(Clone)]
pub struct Template {
    inner: Rc<TemplateInner>,
}

struct RenderingGuard<'a>(&'a Cell<bool>);

impl Drop for RenderingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Template {
    pub(crate) fn new(
        registry: &Rc<RegistryInner>,
        source: TemplateSource,
        content: String,
        options: RenderOptions,
        scope: Value,
    ) -> Self {
        let fingerprint = Fingerprint::of(&content);
        Self {
            inner: Rc::new(TemplateInner {
                fingerprint,
                source,
                content,
                created: SystemTime::now(),
                registry: Rc::downgrade(registry),
                state: RefCell::new(TemplateState {
                    options,
                    scope,
                    program: None,
                    output: String::new(),
                    history: RenderHistory::default(),
                    last_options: None,
                    children: BTreeSet::new(),
                    warned_cycles: HashSet::new(),
                }),
                rendering: Cell::new(false),
            }),
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.inner.fingerprint
    }

    /// Short form of the fingerprint used in log lines.
    pub fn alias(&self) -> &str {
        self.inner.fingerprint.alias()
    }

    pub fn source(&self) -> &TemplateSource {
        &self.inner.source
    }

    pub fn content(&self) -> &str {
        &self.inner.content
    }

    pub fn options(&self) -> RenderOptions {
        self.inner.state.borrow().options.clone()
    }

    pub fn scope(&self) -> Value {
        self.inner.state.borrow().scope.clone()
    }

    /// Replace the scope used by the next partial or full render.
    pub fn set_scope(&self, scope: Value) {
        self.inner.state.borrow_mut().scope = scope;
    }

    /// Output of the most recent render.
    pub fn output(&self) -> String {
        self.inner.state.borrow().output.clone()
    }

    /// Fingerprints of the templates this one has rendered inline.
    pub fn children(&self) -> Vec<Fingerprint> {
        self.inner.state.borrow().children.iter().cloned().collect()
    }

    pub fn has_child(&self, fingerprint: &Fingerprint) -> bool {
        self.inner.state.borrow().children.contains(fingerprint)
    }

    pub fn is_rendering(&self) -> bool {
        self.inner.rendering.get()
    }

    /// Path shown in labels and stats.
    pub fn display_path(&self) -> String {
        let state = self.inner.state.borrow();
        match &self.inner.source {
            TemplateSource::File(path) if state.options.use_absolute_paths => {
                std::fs::canonicalize(path)
                    .unwrap_or_else(|_| path.clone())
                    .display()
                    .to_string()
            }
            TemplateSource::File(path) => path.display().to_string(),
            TemplateSource::Inline(_) => match &state.options.name {
                Some(name) => name.clone(),
                None => format!("inline:{}", self.inner.fingerprint.alias()),
            },
        }
    }

    pub fn stats(&self) -> TemplateStats {
        let path = self.display_path();
        let state = self.inner.state.borrow();
        TemplateStats::new(
            path,
            self.inner.fingerprint.to_string(),
            self.inner.created,
            &state.history,
            state
                .last_options
                .clone()
                .unwrap_or_else(|| state.options.clone()),
        )
    }

    /// Render with the given overrides merged into the current options.
    pub fn render(&self, patch: &OptionsPatch) -> Result<String> {
        self.render_with(patch, None)
    }

    /// Re-run the compiled body against the current scope. Falls back to a
    /// full render when nothing has been compiled yet.
    pub fn update(&self) -> Result<String> {
        self.render_with(&OptionsPatch::default(), Some(RenderType::Partial))
    }

    /// Return the last output without running anything, counting it as a
    /// static render unless the template is in the middle of a render.
    pub fn render_static(&self) -> String {
        if self.is_rendering() {
            return self.output();
        }
        let started = Instant::now();
        let mut state = self.inner.state.borrow_mut();
        state
            .history
            .record(RenderType::Static, started, started.elapsed());
        state.output.clone()
    }

    fn render_with(&self, patch: &OptionsPatch, requested: Option<RenderType>) -> Result<String> {
        if self.is_rendering() {
            return Ok(self.output());
        }
        let registry = self.registry()?;
        let started = Instant::now();
        let label = self.to_string();

        let (options, delimiters_changed) = {
            let mut state = self.inner.state.borrow_mut();
            let mut diags = DiagnosticCollector::for_template(state.options.reporting, &label);
            let applied = state.options.apply(patch, &mut diags);
            registry.collect(diags);
            (state.options.clone(), applied.delimiters_changed)
        };
        let mut diags = DiagnosticCollector::for_template(options.reporting, &label);

        let render_type = {
            let state = self.inner.state.borrow();
            match requested {
                Some(RenderType::Partial) if state.program.is_some() => RenderType::Partial,
                _ => choose_strategy(
                    &state.history,
                    state.program.is_some(),
                    &options,
                    delimiters_changed,
                    started,
                ),
            }
        };

        self.inner.rendering.set(true);
        let guard = RenderingGuard(&self.inner.rendering);
        let result = match render_type {
            RenderType::Static => Ok(self.inner.state.borrow().output.clone()),
            RenderType::Partial => self.render_partial(&registry, &options, &label, &mut diags),
            RenderType::Full => self.render_full(&registry, &options, &label, &mut diags),
        };
        drop(guard);

        if options.force_full_render {
            self.inner.state.borrow_mut().options.force_full_render = false;
        }
        registry.collect(diags);

        let raw = result?;
        let styled = match render_type {
            RenderType::Static => raw,
            _ => output::apply_style(&raw, options.style),
        };
        let elapsed = started.elapsed();
        {
            let mut state = self.inner.state.borrow_mut();
            state.output = styled.clone();
            state.history.record(render_type, started, elapsed);
            state.last_options = Some(options.clone());
        }

        tracing::debug!(
            template = %label,
            alias = self.alias(),
            kind = render_type.as_str(),
            duration_us = elapsed.as_micros() as u64,
            "rendered template"
        );
        let mut done = DiagnosticCollector::for_template(options.reporting, &label);
        done.notice(
            codes::RENDERED,
            format!(
                "Rendered {render_type} in {:.3}ms",
                elapsed.as_secs_f64() * 1000.0
            ),
        );
        registry.collect(done);

        if options.output {
            self.write_output(&options, render_type, &styled)?;
        }
        Ok(styled)
    }

    fn render_full(
        &self,
        registry: &Registry,
        options: &RenderOptions,
        label: &str,
        diags: &mut DiagnosticCollector,
    ) -> Result<String> {
        {
            let mut state = self.inner.state.borrow_mut();
            state.clear_compiled();
            state.children.clear();
        }

        let runs = delimiter::scan(&self.inner.content, &options.delimiters, label, diags)?;
        let body = CompiledBody::from_runs(runs);
        let normalized = normalizer::normalize(&body.to_source());

        let (output, message) = match self.attempt(registry, &normalized, label) {
            Ok(output) => return Ok(output),
            Err(failure) => failure,
        };
        tracing::debug!(template = %label, error = %message, "template body failed");

        if options.auto_repair {
            let (repaired, repairs) = repair::repair(&normalized);
            if !repairs.is_empty() {
                for fix in &repairs {
                    diags.warn(
                        codes::SYNTAX_REPAIRED,
                        format!("Inserted a missing '{{' after `{}`", fix.head),
                    );
                }
                match self.attempt(registry, &repaired, label) {
                    Ok(output) => return Ok(output),
                    Err((output, message)) => {
                        return self.fail(options, label, diags, output, message);
                    }
                }
            }
        }
        self.fail(options, label, diags, output, message)
    }

    fn render_partial(
        &self,
        registry: &Registry,
        options: &RenderOptions,
        label: &str,
        diags: &mut DiagnosticCollector,
    ) -> Result<String> {
        let (program, scope) = {
            let state = self.inner.state.borrow();
            (state.program.clone(), state.scope.clone())
        };
        let Some(program) = program else {
            return self.render_full(registry, options, label, diags);
        };

        let nested = |source: &str, child_options: Option<Value>, child_scope: Option<Value>| {
            nested::render_child(registry, self, source, child_options, child_scope)
        };
        let execution = registry.adapter().call(&program, &scope, &nested);
        match execution.error {
            None => Ok(execution.output),
            Some(err) => {
                let message = err.to_string();
                if options.halt_on_error {
                    Err(NotplError::Execution {
                        template: label.to_string(),
                        message,
                    })
                } else {
                    diags.error(codes::EXECUTION_FAILED, message);
                    Ok(execution.output)
                }
            }
        }
    }

    /// Compile and run `body`. On failure returns what was emitted so far
    /// and the error message.
    fn attempt(
        &self,
        registry: &Registry,
        body: &str,
        label: &str,
    ) -> std::result::Result<String, (String, String)> {
        let program = registry
            .adapter()
            .compile(body, label)
            .map_err(|e| (String::new(), e.to_string()))?;
        let scope = self.inner.state.borrow().scope.clone();

        let nested = |source: &str, child_options: Option<Value>, child_scope: Option<Value>| {
            nested::render_child(registry, self, source, child_options, child_scope)
        };
        let execution = registry.adapter().call(&program, &scope, &nested);
        match execution.error {
            None => {
                self.inner.state.borrow_mut().program = Some(program);
                Ok(execution.output)
            }
            Some(err) => Err((execution.output, err.to_string())),
        }
    }

    fn fail(
        &self,
        options: &RenderOptions,
        label: &str,
        diags: &mut DiagnosticCollector,
        output: String,
        message: String,
    ) -> Result<String> {
        self.inner.state.borrow_mut().clear_compiled();
        if options.halt_on_error {
            return Err(NotplError::Execution {
                template: label.to_string(),
                message,
            });
        }
        diags.error(codes::EXECUTION_FAILED, message);
        Ok(output)
    }

    fn write_output(
        &self,
        options: &RenderOptions,
        render_type: RenderType,
        content: &str,
    ) -> Result<()> {
        let stem = match &self.inner.source {
            TemplateSource::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            TemplateSource::Inline(_) => options
                .name
                .clone()
                .unwrap_or_else(|| "inline".to_string()),
        };
        let name = OutputName {
            fingerprint: self.inner.fingerprint.as_str(),
            short_fingerprint: self.inner.fingerprint.short(),
            stem: &stem,
            render_type,
            time_ms: u128::from(epoch_ms(SystemTime::now())),
        };
        let path = output::output_path(options, &name);
        output::write_output(&path, content)
    }

    /// Record a child edge. Returns whether it is new.
    pub(crate) fn add_child(&self, child: Fingerprint) -> bool {
        self.inner.state.borrow_mut().children.insert(child)
    }

    /// Whether a cycle through `child` still needs a warning; marks it
    /// warned.
    pub(crate) fn should_warn_cycle(&self, child: &Fingerprint) -> bool {
        self.inner
            .state
            .borrow_mut()
            .warned_cycles
            .insert(child.clone())
    }

    pub(crate) fn registry(&self) -> Result<Registry> {
        self.inner
            .registry
            .upgrade()
            .map(Registry::from_inner)
            .ok_or(NotplError::RegistryDropped)
    }
}

fn choose_strategy(
    history: &RenderHistory,
    compiled: bool,
    options: &RenderOptions,
    delimiters_changed: bool,
    now: Instant,
) -> RenderType {
    if options.force_full_render || delimiters_changed || !compiled {
        return RenderType::Full;
    }
    let Some(elapsed) = history.since_full(now) else {
        return RenderType::Full;
    };
    if options.full_cache_ttl > 0 && elapsed < Duration::from_millis(options.full_cache_ttl) {
        RenderType::Static
    } else if options.partial_cache_ttl > 0
        && elapsed < Duration::from_millis(options.partial_cache_ttl)
    {
        RenderType::Partial
    } else {
        RenderType::Full
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Template [{}]", self.display_path())
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("fingerprint", &self.inner.fingerprint)
            .field("source", &self.inner.source)
            .finish_non_exhaustive()
    }
}
