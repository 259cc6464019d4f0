/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `notpl render`: render a template to stdout.

use anyhow::{Result, bail};
use tracing::info;

use notpl::{OptionsPatch, OutputStyle, Registry, TemplateSource};

use super::{load_scope, report};

#[derive(Debug)]
pub struct RenderArgs {
    pub input: String,
    pub code: bool,
    pub scope: Option<String>,
    pub scope_file: Option<String>,
    pub delimiters: Option<Vec<String>>,
    pub style: Option<String>,
    pub reporting: Option<u8>,
    pub no_halt: bool,
    pub times: u32,
    pub output_dir: Option<String>,
}

impl RenderArgs {
    fn patch(&self) -> Result<OptionsPatch> {
        let mut patch = OptionsPatch::new();
        if let Some(pair) = &self.delimiters {
            let [start, stop] = pair.as_slice() else {
                bail!("--delimiters takes exactly two values");
            };
            patch = patch.delimiters(start.as_str(), stop.as_str());
        }
        if let Some(style) = &self.style {
            patch = patch.style(OutputStyle::from_name(style));
        }
        if let Some(level) = self.reporting {
            patch = patch.reporting(level);
        }
        if self.no_halt {
            patch = patch.halt_on_error(false);
        }
        if let Some(dir) = &self.output_dir {
            patch = patch.output(true).output_dir(dir.as_str());
        }
        if self.code {
            patch = patch.code(true);
        }
        Ok(patch)
    }
}

pub fn execute(args: RenderArgs) -> Result<()> {
    if args.times == 0 {
        bail!("--times must be at least 1");
    }
    let scope = load_scope(args.scope.as_deref(), args.scope_file.as_deref())?;
    let patch = args.patch()?;
    let source = if args.code {
        TemplateSource::inline(args.input.as_str())
    } else {
        TemplateSource::file(args.input.as_str())
    };

    let registry = Registry::new();
    let template = registry.create(source, &patch, scope)?;
    report(&registry);

    let mut output = String::new();
    for _ in 0..args.times {
        let result = template.render(&OptionsPatch::new());
        report(&registry);
        output = result?;
    }

    let stats = template.stats();
    info!(
        template = %template,
        full_renders = stats.full_renders,
        partial_renders = stats.partial_renders,
        static_renders = stats.static_renders,
        "done"
    );
    println!("{output}");
    Ok(())
}
