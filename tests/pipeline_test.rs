//! Integration tests for outline extraction over synthetic span documents.

use std::sync::Arc;
use std::time::Duration;

use pdf_outline::render::to_json;
use pdf_outline::{
    BoundingBox, Degradation, DocumentResult, HeadingEntry, HeadingFilter, HeadingLevel,
    JsonFormat, OutlineConfig, OutlinePipeline, RawSpan, SemanticMode, SharedModel, SpanDocument,
    TextScore,
};

const PROSE: [&str; 4] = [
    "Applicants must submit the completed form together with proof of residence.",
    "Late submissions are reviewed only when the delay was caused by the office.",
    "Each regional board publishes its decisions within thirty working days.",
    "Appeals are heard by a panel that did not take part in the first review.",
];

fn span(text: &str, page: u32, top: f32, size: f32) -> RawSpan {
    let width = text.chars().count() as f32 * size * 0.5;
    RawSpan::new(text, page, BoundingBox::new(72.0, top, 72.0 + width, top + size), size)
}

/// Body paragraphs filling a page from `top` downward.
fn prose(page: u32, top: f32, lines: usize) -> Vec<RawSpan> {
    (0..lines)
        .map(|i| span(PROSE[(i + page as usize) % PROSE.len()], page, top + i as f32 * 20.0, 10.0))
        .collect()
}

fn rules_only() -> OutlinePipeline {
    OutlinePipeline::new(OutlineConfig::default().rules_only()).unwrap()
}

fn report() -> SpanDocument {
    let mut spans = vec![span("Regional Grant Programme", 0, 50.0, 24.0).bold()];
    spans.extend(prose(0, 100.0, 8));
    spans.push(span("Eligibility", 0, 260.0, 16.0).bold());
    spans.extend(prose(0, 290.0, 6));

    spans.push(span("Application Process", 1, 50.0, 16.0).bold());
    spans.extend(prose(1, 80.0, 6));
    spans.push(span("Required Documents", 1, 200.0, 12.5).bold());
    spans.extend(prose(1, 230.0, 6));

    spans.push(span("Appeals", 2, 50.0, 16.0).bold());
    spans.extend(prose(2, 80.0, 8));
    SpanDocument::new(spans, 3).with_source_name("grants.pdf")
}

/// Accepts every line after sleeping, to exhaust the time budget.
struct Slow(Duration);

impl HeadingFilter for Slow {
    fn score(&self, _text: &str) -> TextScore {
        std::thread::sleep(self.0);
        TextScore {
            probability: 0.95,
            level_hint: None,
        }
    }
}

fn pipelines() -> [OutlinePipeline; 2] {
    [rules_only(), OutlinePipeline::new(OutlineConfig::default()).unwrap()]
}

#[test]
fn test_levels_follow_size_tiers() {
    let result = rules_only().process(&report()).unwrap().result;
    assert_eq!(
        result.outline,
        vec![
            HeadingEntry::new(HeadingLevel::H1, "Regional Grant Programme", 1),
            HeadingEntry::new(HeadingLevel::H2, "Eligibility", 1),
            HeadingEntry::new(HeadingLevel::H2, "Application Process", 2),
            HeadingEntry::new(HeadingLevel::H3, "Required Documents", 2),
            HeadingEntry::new(HeadingLevel::H2, "Appeals", 3),
        ]
    );
}

#[test]
fn test_pages_within_document() {
    for pipeline in [rules_only(), OutlinePipeline::new(OutlineConfig::default()).unwrap()] {
        let doc = report();
        let result = pipeline.process(&doc).unwrap().result;
        assert!(!result.outline.is_empty());
        result.validate(doc.page_count).unwrap();
    }
}

#[test]
fn test_outline_in_reading_order() {
    // The parser delivered the heading after the body text it precedes.
    let mut spans = prose(0, 120.0, 8);
    spans.push(span("Background", 0, 60.0, 18.0).bold());
    spans.extend(prose(1, 160.0, 6));
    spans.push(span("Method", 1, 400.0, 18.0).bold());
    spans.push(span("Setup", 1, 80.0, 18.0).bold());
    let doc = SpanDocument::new(spans, 2);

    let result = rules_only().process(&doc).unwrap().result;
    let order: Vec<_> = result.outline.iter().map(|e| (e.page, e.text.as_str())).collect();
    assert_eq!(order, [(1, "Background"), (2, "Setup"), (2, "Method")]);
}

#[test]
fn test_idempotent_output() {
    let pipeline = OutlinePipeline::new(OutlineConfig::default()).unwrap();
    let doc = report();
    let first = to_json(&pipeline.process(&doc).unwrap().result, JsonFormat::Pretty).unwrap();
    let second = to_json(&pipeline.process(&doc).unwrap().result, JsonFormat::Pretty).unwrap();
    assert_eq!(first, second);

    let fresh = OutlinePipeline::new(OutlineConfig::default()).unwrap();
    let third = to_json(&fresh.process(&doc).unwrap().result, JsonFormat::Pretty).unwrap();
    assert_eq!(first, third);
}

#[test]
fn test_running_header_suppressed() {
    let mut spans = Vec::new();
    for page in 0..3 {
        spans.push(span("Company Confidential", page, 20.0, 14.0).bold());
        spans.extend(prose(page, 120.0, 8));
    }
    spans.push(span("Overview", 0, 70.0, 18.0).bold());
    let doc = SpanDocument::new(spans, 3);

    let processed = rules_only().process(&doc).unwrap();
    let repeated = processed
        .result
        .outline
        .iter()
        .filter(|e| e.text == "Company Confidential")
        .count();
    assert!(repeated <= 1);
    assert_eq!(repeated, 0);
    assert!(processed.result.outline.iter().any(|e| e.text == "Overview"));
    assert_eq!(processed.diagnostics.running_headers, 3);
}

#[test]
fn test_rule_only_single_large_span_is_h1() {
    let mut spans = vec![span("Statement of Work", 0, 40.0, 20.0).bold()];
    spans.extend(prose(0, 100.0, 10));
    let doc = SpanDocument::new(spans, 1);

    let processed = rules_only().process(&doc).unwrap();
    assert_eq!(processed.diagnostics.semantic, SemanticMode::Disabled);
    assert_eq!(
        processed.result.outline,
        vec![HeadingEntry::new(HeadingLevel::H1, "Statement of Work", 1)]
    );
    // The only large line is the first H1, so nothing is left for the title.
    assert_eq!(processed.result.title, "");
}

#[test]
fn test_single_paragraph_document() {
    let doc = SpanDocument::new(vec![span(PROSE[0], 0, 100.0, 11.0)], 1);
    for pipeline in [rules_only(), OutlinePipeline::new(OutlineConfig::default()).unwrap()] {
        let result = pipeline.process(&doc).unwrap().result;
        assert_eq!(
            to_json(&result, JsonFormat::Compact).unwrap(),
            r#"{"title":"","outline":[]}"#
        );
    }
}

#[test]
fn test_document_without_text() {
    let doc = SpanDocument::new(vec![span("   ", 0, 100.0, 11.0)], 2).with_source_name("scan.pdf");
    let processed = rules_only().process(&doc).unwrap();
    assert_eq!(processed.result, DocumentResult::empty(""));
    assert!(processed.diagnostics.has(Degradation::EmptyDocument));

    let pipeline = OutlinePipeline::new(
        OutlineConfig::default()
            .rules_only()
            .with_filename_title_fallback(true),
    )
    .unwrap();
    assert_eq!(pipeline.process(&doc).unwrap().result.title, "scan");
}

#[test]
fn test_split_title_concatenated() {
    let mut spans = vec![
        span("Machine Learning", 0, 60.0, 26.0),
        span("for Everyone", 0, 90.0, 26.0),
        span("A practical introduction", 0, 130.0, 15.0),
    ];
    spans.extend(prose(0, 180.0, 10));
    let doc = SpanDocument::new(spans, 1);

    for pipeline in pipelines() {
        let result = pipeline.process(&doc).unwrap().result;
        assert_eq!(result.title, "Machine Learning for Everyone");
        assert!(result
            .outline
            .iter()
            .all(|e| !e.text.contains("Everyone") && !e.text.contains("Machine")));
    }
}

#[test]
fn test_split_runs_on_one_line_form_title() {
    let mut spans = vec![
        RawSpan::new("Annual", 0, BoundingBox::new(72.0, 60.0, 150.0, 86.0), 26.0),
        RawSpan::new("Report", 0, BoundingBox::new(160.0, 60.0, 240.0, 86.0), 26.0),
    ];
    spans.extend(prose(0, 140.0, 10));
    let doc = SpanDocument::new(spans, 1);

    for pipeline in pipelines() {
        let result = pipeline.process(&doc).unwrap().result;
        assert_eq!(result.title, "Annual Report");
        assert!(result.outline.iter().all(|e| e.text != "Annual Report"));
    }
}

#[test]
fn test_numbered_chapters_at_same_height_are_kept() {
    let mut spans = Vec::new();
    for page in 0..3 {
        spans.push(span(&format!("Chapter {}", page + 1), page, 60.0, 20.0).bold());
        spans.extend(prose(page, 110.0, 10));
    }
    let doc = SpanDocument::new(spans, 3);

    for pipeline in pipelines() {
        let processed = pipeline.process(&doc).unwrap();
        assert_eq!(
            processed.result.outline,
            vec![
                HeadingEntry::new(HeadingLevel::H1, "Chapter 1", 1),
                HeadingEntry::new(HeadingLevel::H1, "Chapter 2", 2),
                HeadingEntry::new(HeadingLevel::H1, "Chapter 3", 3),
            ]
        );
        assert_eq!(processed.diagnostics.running_headers, 0);
    }
}

#[test]
fn test_heading_repeated_at_other_heights_is_kept() {
    let mut spans = Vec::new();
    for (page, top) in [(0u32, 50.0), (1, 300.0), (2, 500.0)] {
        if top > 100.0 {
            spans.extend(prose(page, 60.0, 6));
        }
        spans.push(span("Summary", page, top, 16.0).bold());
        spans.extend(prose(page, top + 30.0, 8));
    }
    let doc = SpanDocument::new(spans, 3);

    for pipeline in pipelines() {
        let processed = pipeline.process(&doc).unwrap();
        let pages: Vec<_> = processed
            .result
            .outline
            .iter()
            .filter(|e| e.text == "Summary")
            .map(|e| e.page)
            .collect();
        assert_eq!(pages, [1, 2, 3]);
        assert_eq!(processed.diagnostics.running_headers, 0);
    }
}

#[test]
fn test_semantic_filter_prunes_emphasis() {
    let mut spans = vec![span("Scope of Services", 0, 50.0, 16.0).bold()];
    spans.extend(prose(0, 90.0, 6));
    spans.push(span("Note that the deadline cannot be extended.", 0, 200.0, 16.0).bold());
    spans.extend(prose(0, 240.0, 6));
    let doc = SpanDocument::new(spans, 1);

    let with_rules = rules_only().process(&doc).unwrap().result;
    assert_eq!(with_rules.outline.len(), 2);

    let hybrid = OutlinePipeline::new(OutlineConfig::default()).unwrap();
    let processed = hybrid.process(&doc).unwrap();
    assert_eq!(processed.diagnostics.semantic, SemanticMode::Active);
    let texts: Vec<_> = processed.result.outline.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, ["Scope of Services"]);
}

#[test]
fn test_uniform_font_numbered_headings() {
    let mut spans = vec![span("1 Introduction", 0, 50.0, 10.0)];
    spans.extend(prose(0, 70.0, 4));
    spans.push(span("1.1 Scope", 0, 150.0, 10.0));
    spans.extend(prose(0, 170.0, 4));
    spans.push(span("2 Methods", 1, 50.0, 10.0));
    spans.extend(prose(1, 70.0, 4));
    let doc = SpanDocument::new(spans, 2);

    let processed = OutlinePipeline::new(OutlineConfig::default())
        .unwrap()
        .process(&doc)
        .unwrap();
    assert_eq!(
        processed.result.outline,
        vec![
            HeadingEntry::new(HeadingLevel::H1, "1 Introduction", 1),
            HeadingEntry::new(HeadingLevel::H2, "1.1 Scope", 1),
            HeadingEntry::new(HeadingLevel::H1, "2 Methods", 2),
        ]
    );
    assert_eq!(processed.diagnostics.fallback_headings, 3);

    // Without the semantic filter a uniform document has no outline.
    assert!(rules_only().process(&doc).unwrap().result.outline.is_empty());
}

#[test]
fn test_four_tiers_capped_at_three_levels() {
    let mut spans = vec![
        span("Part One", 0, 40.0, 28.0).bold(),
        span("Chapter", 0, 80.0, 22.0).bold(),
        span("Section", 0, 120.0, 17.0).bold(),
        span("Subsection", 0, 160.0, 13.0).bold(),
    ];
    spans.extend(prose(0, 200.0, 12));
    let result = rules_only().process(&SpanDocument::new(spans, 1)).unwrap().result;
    let levels: Vec<_> = result.outline.iter().map(|e| (e.level, e.text.as_str())).collect();
    assert_eq!(
        levels,
        [
            (HeadingLevel::H1, "Part One"),
            (HeadingLevel::H2, "Chapter"),
            (HeadingLevel::H3, "Section"),
        ]
    );
}

#[test]
fn test_timeout_keeps_document_alive() {
    let pipeline = OutlinePipeline::new(
        OutlineConfig::default().with_time_budget(Some(Duration::from_nanos(1))),
    )
    .unwrap();
    let processed = pipeline.process(&report()).unwrap();
    assert!(processed.diagnostics.has(Degradation::TimeoutExceeded));
    assert_eq!(processed.diagnostics.semantic, SemanticMode::TimedOut);
    processed.result.validate(3).unwrap();
}

#[test]
fn test_slow_filter_times_out_to_rule_outline() {
    let model = Arc::new(SharedModel::custom(Slow(Duration::from_millis(60))));
    let config = OutlineConfig::default().with_time_budget(Some(Duration::from_millis(150)));
    let pipeline = OutlinePipeline::with_model(config, model).unwrap();

    let processed = pipeline.process(&report()).unwrap();
    assert_eq!(processed.diagnostics.semantic, SemanticMode::TimedOut);
    assert!(processed.diagnostics.has(Degradation::TimeoutExceeded));
    assert!(!processed.result.outline.is_empty());
    assert_eq!(
        processed.result,
        rules_only().process(&report()).unwrap().result
    );
}

#[test]
fn test_missing_model_degrades_to_rules() {
    let config = OutlineConfig::default().with_model_path("/nonexistent/weights.json");
    let processed = OutlinePipeline::new(config).unwrap().process(&report()).unwrap();
    assert_eq!(processed.diagnostics.semantic, SemanticMode::Unavailable);
    assert!(processed.diagnostics.has(Degradation::ModelUnavailable));
    assert_eq!(
        processed.result,
        rules_only().process(&report()).unwrap().result
    );
}

#[test]
fn test_hierarchy_normalization() {
    let mut spans = vec![span("Summary", 0, 40.0, 24.0).bold()];
    spans.extend(prose(0, 80.0, 6));
    spans.push(span("Key Figures", 0, 200.0, 12.5).bold());
    spans.extend(prose(0, 230.0, 6));
    spans.push(span("Outlook", 1, 40.0, 16.0).bold());
    spans.extend(prose(1, 80.0, 6));
    let doc = SpanDocument::new(spans, 2);

    let plain = rules_only().process(&doc).unwrap().result;
    assert_eq!(plain.outline[1].level, HeadingLevel::H3);

    let pipeline = OutlinePipeline::new(
        OutlineConfig::default()
            .rules_only()
            .with_normalized_hierarchy(true),
    )
    .unwrap();
    let normalized = pipeline.process(&doc).unwrap().result;
    assert_eq!(normalized.outline[1].level, HeadingLevel::H2);
    assert_eq!(normalized.outline.len(), plain.outline.len());
}

#[test]
fn test_pipeline_shared_across_threads() {
    let pipeline = OutlinePipeline::new(OutlineConfig::default()).unwrap();
    let expected = pipeline.process(&report()).unwrap().result;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = pipeline.clone();
            std::thread::spawn(move || pipeline.process(&report()).unwrap().result)
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
    assert!(Arc::ptr_eq(pipeline.model(), pipeline.clone().model()));
}
