/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template registry.
//!
//! The registry owns the Lua engine and every compiled template, keyed by
//! content fingerprint. It is an explicitly owned, single-threaded service:
//! build one per rendering context and pass it around. Handles are cheap to
//! clone and share the same entries.
//!
//! Templates are never evicted automatically. Registering content that is
//! already present either reuses the entry ([`Registry::create`]) or
//! replaces it ([`Registry::register`]).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

use crate::adapter::LuaAdapter;
use crate::diagnostics::{Diagnostic, DiagnosticCollector};
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::options::{OptionsPatch, RenderOptions};
use crate::stats::TemplateStats;
use crate::template::{Template, TemplateSource};

pub(crate) struct RegistryInner {
    adapter: LuaAdapter,
    templates: RefCell<HashMap<Fingerprint, Template>>,
    defaults: RenderOptions,
    diagnostics: RefCell<Vec<Diagnostic>>,
}

#[derive(Clone)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_defaults(RenderOptions::default())
    }

    /// A registry whose new templates start from `defaults`.
    pub fn with_defaults(defaults: RenderOptions) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                adapter: LuaAdapter::new(),
                templates: RefCell::new(HashMap::new()),
                defaults,
                diagnostics: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<RegistryInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn adapter(&self) -> &LuaAdapter {
        &self.inner.adapter
    }

    pub fn defaults(&self) -> &RenderOptions {
        &self.inner.defaults
    }

    /// Create a template, or return the existing one with the same content.
    ///
    /// An existing entry keeps its own options and scope; `patch` and
    /// `scope` only apply to new entries.
    pub fn create(
        &self,
        source: TemplateSource,
        patch: &OptionsPatch,
        scope: Option<Value>,
    ) -> Result<Template> {
        let content = source.load()?;
        self.create_with_content(source, content, self.inner.defaults.clone(), patch, scope)
    }

    pub(crate) fn create_with_content(
        &self,
        source: TemplateSource,
        content: String,
        base: RenderOptions,
        patch: &OptionsPatch,
        scope: Option<Value>,
    ) -> Result<Template> {
        let fingerprint = Fingerprint::of(&content);
        if let Some(existing) = self.get_by_fingerprint(&fingerprint) {
            return Ok(existing);
        }
        Ok(self.insert(source, content, base, patch, scope))
    }

    /// Create a template, replacing any entry with the same content.
    pub fn register(
        &self,
        source: TemplateSource,
        patch: &OptionsPatch,
        scope: Option<Value>,
    ) -> Result<Template> {
        let content = source.load()?;
        Ok(self.insert(source, content, self.inner.defaults.clone(), patch, scope))
    }

    fn insert(
        &self,
        source: TemplateSource,
        content: String,
        mut options: RenderOptions,
        patch: &OptionsPatch,
        scope: Option<Value>,
    ) -> Template {
        let mut diags = DiagnosticCollector::new(options.reporting);
        options.apply(patch, &mut diags);
        self.collect(diags);

        let template = Template::new(
            &self.inner,
            source,
            content,
            options,
            scope.unwrap_or(Value::Null),
        );
        tracing::debug!(template = %template, alias = template.alias(), "registered template");
        self.inner
            .templates
            .borrow_mut()
            .insert(template.fingerprint().clone(), template.clone());
        template
    }

    /// Render a template, creating it first if needed.
    ///
    /// A given `scope` replaces the template's scope before rendering.
    pub fn render(
        &self,
        source: TemplateSource,
        patch: &OptionsPatch,
        scope: Option<Value>,
    ) -> Result<String> {
        let content = source.load()?;
        let fingerprint = Fingerprint::of(&content);
        match self.get_by_fingerprint(&fingerprint) {
            Some(template) => {
                if let Some(scope) = scope {
                    template.set_scope(scope);
                }
                template.render(patch)
            }
            None => {
                let template =
                    self.insert(source, content, self.inner.defaults.clone(), patch, scope);
                template.render(&OptionsPatch::default())
            }
        }
    }

    /// Look a template up by its content.
    pub fn get(&self, source: &TemplateSource) -> Result<Option<Template>> {
        let content = source.load()?;
        Ok(self.get_by_fingerprint(&Fingerprint::of(&content)))
    }

    pub fn get_by_fingerprint(&self, fingerprint: &Fingerprint) -> Option<Template> {
        self.inner.templates.borrow().get(fingerprint).cloned()
    }

    /// Remove a template. Handles to it stay usable but are no longer
    /// found through the registry.
    pub fn remove(&self, fingerprint: &Fingerprint) -> Option<Template> {
        let removed = self.inner.templates.borrow_mut().remove(fingerprint);
        if let Some(template) = &removed {
            tracing::debug!(template = %template, "removed template");
        }
        removed
    }

    /// Statistics for every registered template, ordered by path.
    pub fn stats(&self) -> Vec<TemplateStats> {
        let templates: Vec<Template> = self.inner.templates.borrow().values().cloned().collect();
        let mut stats: Vec<TemplateStats> = templates.iter().map(Template::stats).collect();
        stats.sort_by(|a, b| a.path.cmp(&b.path));
        stats
    }

    pub fn len(&self) -> usize {
        self.inner.templates.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.templates.borrow().is_empty()
    }

    /// Drain the diagnostics reported since the last call.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.inner.diagnostics.borrow_mut())
    }

    pub(crate) fn collect(&self, diags: DiagnosticCollector) {
        if diags.is_empty() {
            return;
        }
        self.inner
            .diagnostics
            .borrow_mut()
            .extend(diags.into_diagnostics());
    }
}
