/*
 * stats.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `notpl stats`: render a template, then print registry statistics.

use anyhow::{Result, bail};

use notpl::{OptionsPatch, Registry, TemplateSource};

use super::report;

pub fn execute(input: &str, times: u32) -> Result<()> {
    if times == 0 {
        bail!("--times must be at least 1");
    }
    let registry = Registry::new();
    let template = registry.create(TemplateSource::file(input), &OptionsPatch::new(), None)?;
    for _ in 0..times {
        let result = template.render(&OptionsPatch::new());
        report(&registry);
        result?;
    }

    let json = serde_json::to_string_pretty(&registry.stats())?;
    println!("{json}");
    Ok(())
}
