/*
 * render_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end rendering through the registry.
 */

use notpl::diagnostics::codes;
use notpl::{
    DiagnosticKind, FilenameToken, NotplError, OptionsPatch, OutputStyle, Registry, RenderType,
    TemplateSource,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

fn render_inline(registry: &Registry, code: &str) -> notpl::Result<String> {
    registry.render(TemplateSource::inline(code), &OptionsPatch::new(), None)
}

fn diagnostic_codes(registry: &Registry) -> Vec<&'static str> {
    registry
        .take_diagnostics()
        .into_iter()
        .map(|d| d.code)
        .collect()
}

#[test]
fn test_literal_only_source_is_unchanged() {
    let registry = Registry::new();
    let output = render_inline(&registry, "<div>hello world</div>").unwrap();
    assert_eq!(output, "<div>hello world</div>");
}

#[test]
fn test_code_region_output_is_inlined() {
    let registry = Registry::new();
    let output = render_inline(&registry, "<div>hello world <$ print('foo bar'); $></div>").unwrap();
    assert_eq!(output, "<div>hello world foo bar</div>");
}

#[test]
fn test_same_code_with_other_delimiters() {
    let pairs = [("<$", "$>"), ("{%", "%}"), ("<?lua", "?>"), ("[[[", "]]]")];
    for (start, stop) in pairs {
        let registry = Registry::new();
        let source = format!("before {start} print('X'); {stop} after");
        let output = registry
            .render(
                TemplateSource::inline(source),
                &OptionsPatch::new().delimiters(start, stop).reporting(0),
                None,
            )
            .unwrap();
        assert_eq!(output, "before X after", "delimiters {start} {stop}");
    }
}

#[test]
fn test_unterminated_code_is_fatal() {
    let registry = Registry::new();
    let err = registry
        .render(
            TemplateSource::inline("<p>\n<$ print('x')"),
            &OptionsPatch::new().halt_on_error(false),
            None,
        )
        .unwrap_err();
    match err {
        NotplError::UnterminatedCode { line, column, .. } => assert_eq!((line, column), (2, 1)),
        other => panic!("expected an unterminated code error, got {other}"),
    }
}

#[test]
fn test_dangling_stop_is_reported_but_renders() {
    let registry = Registry::new();
    let output = render_inline(&registry, "a $> b").unwrap();
    assert_eq!(output, "a $> b");
    assert_eq!(diagnostic_codes(&registry), vec![codes::DANGLING_STOP]);
}

#[test]
fn test_valid_body_needs_no_repair() {
    let registry = Registry::new();
    let output = render_inline(&registry, "<$ print('baz') $>").unwrap();
    assert_eq!(output, "baz");
    assert!(registry.take_diagnostics().is_empty());
}

#[test]
fn test_missing_brace_is_repaired_once() {
    let registry = Registry::new();
    let output = render_inline(&registry, "<$ if (true) print('x'); $>").unwrap();
    assert_eq!(output, "x");
    assert_eq!(diagnostic_codes(&registry), vec![codes::SYNTAX_REPAIRED]);
}

#[test]
fn test_repair_can_be_disabled() {
    let registry = Registry::new();
    let err = registry
        .render(
            TemplateSource::inline("<$ if (true) print('x'); $>"),
            &OptionsPatch::new().auto_repair(false),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, NotplError::Execution { .. }));
}

#[test]
fn test_failure_without_halt_keeps_partial_output() {
    let registry = Registry::new();
    let output = registry
        .render(
            TemplateSource::inline("<p><$ print('a'); error('boom') $></p>"),
            &OptionsPatch::new().halt_on_error(false),
            None,
        )
        .unwrap();
    assert_eq!(output, "<p>a");
    assert_eq!(diagnostic_codes(&registry), vec![codes::EXECUTION_FAILED]);
}

#[test]
fn test_failure_with_halt_is_an_error() {
    let registry = Registry::new();
    let err = render_inline(&registry, "<$ error('boom') $>").unwrap_err();
    match err {
        NotplError::Execution { message, .. } => assert!(message.contains("boom")),
        other => panic!("expected an execution error, got {other}"),
    }
}

#[test]
fn test_second_render_is_partial() {
    let registry = Registry::new();
    let source = TemplateSource::inline("<p><$ print(scope.n) $></p>");
    let template = registry
        .create(source, &OptionsPatch::new(), Some(json!({"n": 1})))
        .unwrap();

    assert_eq!(template.render(&OptionsPatch::new()).unwrap(), "<p>1</p>");
    template.set_scope(json!({"n": 2}));
    assert_eq!(template.render(&OptionsPatch::new()).unwrap(), "<p>2</p>");

    let stats = template.stats();
    assert_eq!(stats.full_renders, 1);
    assert_eq!(stats.partial_renders, 1);
    assert_eq!(stats.last_render_type, Some(RenderType::Partial));
}

#[test]
fn test_registry_render_updates_scope() {
    let registry = Registry::new();
    let code = "<$ print(scope.greeting) $>";
    let first = registry
        .render(
            TemplateSource::inline(code),
            &OptionsPatch::new(),
            Some(json!({"greeting": "hi"})),
        )
        .unwrap();
    let second = registry
        .render(
            TemplateSource::inline(code),
            &OptionsPatch::new(),
            Some(json!({"greeting": "bye"})),
        )
        .unwrap();
    assert_eq!((first.as_str(), second.as_str()), ("hi", "bye"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_full_ttl_enables_static_renders() {
    let registry = Registry::new();
    let template = registry
        .create(
            TemplateSource::inline("<$ print(scope.n) $>"),
            &OptionsPatch::new().full_cache_ttl(60_000),
            Some(json!({"n": 1})),
        )
        .unwrap();
    let first = template.render(&OptionsPatch::new()).unwrap();
    template.set_scope(json!({"n": 2}));
    let second = template.render(&OptionsPatch::new()).unwrap();

    assert_eq!(first, second);
    assert_eq!(template.stats().last_render_type, Some(RenderType::Static));
}

#[test]
fn test_update_reruns_even_inside_static_window() {
    let registry = Registry::new();
    let template = registry
        .create(
            TemplateSource::inline("<$ print(scope.n) $>"),
            &OptionsPatch::new().full_cache_ttl(60_000),
            Some(json!({"n": 1})),
        )
        .unwrap();
    template.render(&OptionsPatch::new()).unwrap();
    template.set_scope(json!({"n": 2}));
    assert_eq!(template.update().unwrap(), "2");
    assert_eq!(template.stats().last_render_type, Some(RenderType::Partial));
}

#[test]
fn test_zero_ttls_always_render_full() {
    let registry = Registry::new();
    let template = registry
        .create(
            TemplateSource::inline("<$ print(1) $>"),
            &OptionsPatch::new().partial_cache_ttl(0),
            None,
        )
        .unwrap();
    for _ in 0..3 {
        template.render(&OptionsPatch::new()).unwrap();
    }
    let stats = template.stats();
    assert_eq!(stats.full_renders, 3);
    assert_eq!(stats.partial_renders + stats.static_renders, 0);
}

#[test]
fn test_force_full_render_is_one_shot() {
    let registry = Registry::new();
    let template = registry
        .create(TemplateSource::inline("<$ print(1) $>"), &OptionsPatch::new(), None)
        .unwrap();
    template.render(&OptionsPatch::new()).unwrap();
    template
        .render(&OptionsPatch::new().force_full_render(true))
        .unwrap();
    assert_eq!(template.stats().last_render_type, Some(RenderType::Full));
    assert!(!template.options().force_full_render);
    template.render(&OptionsPatch::new()).unwrap();

    let kinds: Vec<RenderType> = template
        .stats()
        .render_times
        .iter()
        .map(|t| t.render_type)
        .collect();
    assert_eq!(
        kinds,
        vec![RenderType::Full, RenderType::Full, RenderType::Partial]
    );
}

#[test]
fn test_changing_delimiters_forces_full_render() {
    let registry = Registry::new();
    let template = registry
        .create(
            TemplateSource::inline("a<$ print(1) $>{% print(2) %}"),
            &OptionsPatch::new(),
            None,
        )
        .unwrap();
    assert_eq!(template.render(&OptionsPatch::new()).unwrap(), "a1{% print(2) %}");

    let output = template
        .render(&OptionsPatch::new().delimiters("{%", "%}"))
        .unwrap();
    assert_eq!(output, "a<$ print(1) $>2");
    assert_eq!(template.stats().last_render_type, Some(RenderType::Full));
}

#[test]
fn test_rejected_options_keep_previous_values() {
    let registry = Registry::new();
    let template = registry
        .create(TemplateSource::inline("<$ print(1) $>"), &OptionsPatch::new(), None)
        .unwrap();
    template
        .render(&OptionsPatch::new().full_cache_ttl(5_000))
        .unwrap();
    template
        .render(&OptionsPatch::new().full_cache_ttl(10).delimiters("$$", "$$"))
        .unwrap();

    let options = template.options();
    assert_eq!(options.full_cache_ttl, 5_000);
    assert_eq!(options.delimiters.start, "<$");
    assert_eq!(
        diagnostic_codes(&registry),
        vec![codes::INVALID_OPTION, codes::TTL_DECREASE]
    );
}

#[test]
fn test_reporting_zero_silences_diagnostics() {
    let registry = Registry::new();
    registry
        .render(
            TemplateSource::inline("a $> b <$ if (true) print('x'); $>"),
            &OptionsPatch::new().reporting(0),
            None,
        )
        .unwrap();
    assert!(registry.take_diagnostics().is_empty());
}

#[test]
fn test_colon_block_fixture() {
    let registry = Registry::new();
    let source = TemplateSource::file(fixture_path("colon-blocks.html"));

    let signed_in = registry
        .render(source.clone(), &OptionsPatch::new(), Some(json!({"user": "Ada"})))
        .unwrap();
    assert_eq!(signed_in, "<p>Welcome back, Ada!</p>");

    let signed_out = registry
        .render(source, &OptionsPatch::new(), Some(json!({"user": null})))
        .unwrap();
    assert_eq!(signed_out, "<p>Please sign in.</p>");
}

#[test]
fn test_compact_style_keeps_whitespace() {
    let registry = Registry::new();
    let output = registry
        .render(
            TemplateSource::inline("<p>\n  <$ print('x') $>\n</p>"),
            &OptionsPatch::new().style(OutputStyle::Compact),
            None,
        )
        .unwrap();
    assert_eq!(output, "<p>\n  x\n</p>");
}

#[test]
fn test_output_is_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new();
    registry
        .render(
            TemplateSource::inline("<b><$ print('saved') $></b>"),
            &OptionsPatch::new()
                .output(true)
                .output_dir(dir.path())
                .output_format(vec![
                    FilenameToken::Filename,
                    FilenameToken::Type,
                    FilenameToken::Ext,
                ])
                .name("greeting"),
            None,
        )
        .unwrap();

    let written = std::fs::read_to_string(dir.path().join("greeting-full.html")).unwrap();
    assert_eq!(written, "<b>saved</b>");
}

#[test]
fn test_stats_snapshot() {
    let registry = Registry::new();
    let template = registry
        .create(
            TemplateSource::inline("<$ print(1) $>"),
            &OptionsPatch::new().name("counter"),
            None,
        )
        .unwrap();
    template.render(&OptionsPatch::new()).unwrap();
    template.render(&OptionsPatch::new()).unwrap();

    let all = registry.stats();
    assert_eq!(all.len(), 1);
    let stats = &all[0];
    assert_eq!(stats.path, "counter");
    assert_eq!(stats.total_renders(), 2);
    assert_eq!(stats.render_times.len(), 2);
    assert!(stats.last_render_duration.is_some());
    assert_eq!(stats.render_options.name.as_deref(), Some("counter"));
    assert_eq!(template.to_string(), "Template [counter]");
}

#[test]
fn test_diagnostic_messages() {
    let registry = Registry::new();
    let template = registry
        .create(
            TemplateSource::inline("a $> b"),
            &OptionsPatch::new().name("snap"),
            None,
        )
        .unwrap();
    template
        .render(&OptionsPatch::new().delimiters("$$", "$$"))
        .unwrap();

    let report = registry
        .take_diagnostics()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(report, @r"
    [N-2-3] Ignoring delimiters '$$' and '$$'; they must be non-empty and different (Template [snap])
    [N-1-1] Found '$>' without a matching '<$' (Template [snap]:1:3)
    ");
}

#[test]
fn test_native_lua_with_method_calls() {
    let registry = Registry::new();
    let output = render_inline(
        &registry,
        "<$ if (true) then print(tostring(12):rep(2)) end $>",
    )
    .unwrap();
    assert_eq!(output, "1212");

    let output = render_inline(
        &registry,
        "<$ local i = 0; while (i < 1) do i = i + 1; print(('x'):rep(2)) end $>",
    )
    .unwrap();
    assert_eq!(output, "xx");
    assert!(registry.take_diagnostics().is_empty());
}

#[test]
fn test_render_notice_needs_reporting_three() {
    let registry = Registry::new();
    registry
        .render(
            TemplateSource::inline("<$ print('loud') $>"),
            &OptionsPatch::new().reporting(3),
            None,
        )
        .unwrap();
    let notices = registry.take_diagnostics();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].code, codes::RENDERED);
    assert_eq!(notices[0].kind, DiagnosticKind::Notice);
    assert!(notices[0].message.starts_with("Rendered full in "));

    registry
        .render(
            TemplateSource::inline("<$ print('quiet') $>"),
            &OptionsPatch::new(),
            None,
        )
        .unwrap();
    assert!(registry.take_diagnostics().is_empty());
}
