/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Templates with embedded Lua fragments and tiered render caching.
//!
//! A template is literal text with code regions between a start and a stop
//! delimiter (`<$` and `$>` by default). Code regions are Lua, optionally
//! written with brace or colon blocks:
//!
//! ```text
//! <ul>
//! <$ for (_, item in ipairs(scope.items)) { $>
//!   <li><$ print(item) $></li>
//! <$ } $>
//! </ul>
//! <$ if (scope.footer): $><footer/><$ endif; $>
//! ```
//!
//! Fragments see four bindings: `print`/`echo` append to the output,
//! `scope` is the template's scope, and `render(source, options, scope)`
//! renders another template inline.
//!
//! # Pipeline
//!
//! A full render runs [`scanner`] → [`delimiter`] → [`assembler`] →
//! [`normalizer`] → [`adapter`]. The [`registry`] keeps each compiled
//! template keyed by content fingerprint so later renders can reuse the
//! compiled body (partial render) or the previous output (static render).
//!
//! # Example
//!
//! ```ignore
//! use notpl::{OptionsPatch, Registry, TemplateSource};
//!
//! let registry = Registry::new();
//! let html = registry.render(
//!     TemplateSource::inline("<p>Hello <$ print(scope.name) $></p>"),
//!     &OptionsPatch::new(),
//!     Some(serde_json::json!({"name": "World"})),
//! )?;
//! assert_eq!(html, "<p>Hello World</p>");
//! ```

pub mod adapter;
pub mod assembler;
pub mod delimiter;
pub mod diagnostics;
pub mod error;
pub mod fingerprint;
pub mod lexical;
pub mod lowering;
pub mod nested;
pub mod normalizer;
pub mod options;
pub mod output;
pub mod registry;
pub mod repair;
pub mod scanner;
pub mod stats;
pub mod template;

pub use delimiter::DelimiterPair;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{NotplError, Result};
pub use fingerprint::Fingerprint;
pub use options::{FilenameToken, OptionsPatch, OutputStyle, RenderOptions};
pub use registry::Registry;
pub use stats::{RenderType, TemplateStats};
pub use template::{Template, TemplateSource};
