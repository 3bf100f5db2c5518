//! Span feature normalization.
//!
//! Raw spans are cleaned, merged into visual lines and annotated with their
//! size relative to the body text. Per-document font statistics are computed
//! here once and shared read-only by the later stages.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use log::{debug, warn};

use super::SpanId;
use crate::config::OutlineConfig;
use crate::model::{BoundingBox, SpanDocument};
use crate::text::{clean_text, ends_with_sentence_punctuation, needs_separator};

/// Ratios closer than this are treated as equal when matching tiers.
const RATIO_TOLERANCE: f32 = 1e-4;

/// Minimum share of the smaller height two spans must overlap vertically to
/// sit on the same line.
const LINE_OVERLAP_SHARE: f32 = 0.5;

/// A run of heading-candidate sizes merged within the tier epsilon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeTier {
    /// Largest ratio in the tier
    pub max: f32,
    /// Smallest ratio in the tier
    pub min: f32,
}

impl SizeTier {
    pub fn contains(&self, ratio: f32) -> bool {
        ratio >= self.min - RATIO_TOLERANCE && ratio <= self.max + RATIO_TOLERANCE
    }
}

/// Font statistics for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentStats {
    /// Dominant font size by character count (0 when no span has a usable size)
    pub body_size: f32,
    /// Sizes above body, largest first, merged within `tier_epsilon`
    pub tiers: Vec<SizeTier>,
    /// Characters per font size, keyed in tenths of a point
    pub size_histogram: BTreeMap<i32, usize>,
    /// Ratio difference under which sizes share a tier
    pub tier_epsilon: f32,
    /// Spans received from the parser
    pub span_count: usize,
    /// Spans dropped as empty or out of page range
    pub dropped_spans: usize,
    /// Number of pages in the document
    pub page_count: u32,
}

impl DocumentStats {
    /// Whether a ratio is distinguishable from body text.
    pub fn is_above_body(&self, ratio: f32) -> bool {
        ratio > 1.0 + self.tier_epsilon
    }

    /// 1-based rank of the tier holding `ratio`, or `None` at body size.
    pub fn tier_rank(&self, ratio: f32) -> Option<usize> {
        if !self.is_above_body(ratio) || self.tiers.is_empty() {
            return None;
        }
        if let Some(i) = self.tiers.iter().position(|t| t.contains(ratio)) {
            return Some(i + 1);
        }
        // Between tiers: rank below every tier that is strictly larger.
        Some(
            self.tiers
                .iter()
                .filter(|t| t.min > ratio + RATIO_TOLERANCE)
                .count()
                + 1,
        )
    }

    pub fn has_tiers(&self) -> bool {
        !self.tiers.is_empty()
    }
}

/// One visual line with its layout features.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSpan {
    pub id: SpanId,
    /// Cleaned text of all merged spans
    pub text: String,
    /// Page index (0-based)
    pub page: u32,
    /// Largest font size among merged spans
    pub font_size: f32,
    /// `font_size / body_size` (1.0 when either is unusable)
    pub ratio: f32,
    pub is_bold: bool,
    /// Left edge relative to page width, in `[0, 1]`
    pub indent: f32,
    /// Top edge relative to page height, in `[0, 1]`, growing downward
    pub position: f32,
    pub bbox: BoundingBox,
    /// No other line on the page shares its vertical range
    pub isolated: bool,
    /// Indices of the raw spans this line was built from
    pub sources: Range<usize>,
}

impl NormalizedSpan {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn has_trailing_punctuation(&self) -> bool {
        ends_with_sentence_punctuation(&self.text)
    }

    /// A bare line for unit tests: left-aligned, isolated, on page `page`.
    #[cfg(test)]
    pub(crate) fn synthetic(id: usize, text: &str, page: u32, ratio: f32) -> Self {
        Self {
            id: SpanId(id),
            text: text.to_string(),
            page,
            font_size: 10.0 * ratio,
            ratio,
            is_bold: false,
            indent: 0.1,
            position: 0.1 + id as f32 * 0.01,
            bbox: BoundingBox::new(60.0, 80.0, 300.0, 80.0 + 10.0 * ratio),
            isolated: true,
            sources: id..id + 1,
        }
    }
}

/// Lines and statistics for one document.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Lines in reading order; `lines[i].id == SpanId(i)`
    pub lines: Vec<NormalizedSpan>,
    pub stats: DocumentStats,
}

impl Normalized {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A span that survived cleanup.
struct CleanSpan {
    index: usize,
    text: String,
    page: u32,
    bbox: BoundingBox,
    /// Quantized size in tenths of a point; `None` when unusable
    size_key: Option<i32>,
    font_size: f32,
    is_bold: bool,
    page_width: f32,
    page_height: f32,
}

impl CleanSpan {
    fn em(&self) -> f32 {
        if self.font_size.is_finite() && self.font_size > 0.0 {
            self.font_size
        } else {
            self.bbox.height().max(1.0)
        }
    }
}

/// Reduce a document's raw spans to normalized lines plus statistics.
pub fn normalize(doc: &SpanDocument, config: &OutlineConfig) -> Normalized {
    let page_count = doc.effective_page_count();
    let mut spans = clean_spans(doc, page_count);
    let dropped = doc.spans.len() - spans.len();
    if dropped > 0 {
        debug!("Dropped {} empty or out-of-range spans", dropped);
    }

    // Keep the parser's reading order within each page.
    spans.sort_by_key(|s| s.page);

    let size_histogram = build_histogram(&spans);
    let body_key = body_size_key(&size_histogram);
    let body_size = body_key.map_or(0.0, |k| k as f32 / 10.0);
    let tiers = build_tiers(&size_histogram, body_key, config.tier_epsilon);

    let stats = DocumentStats {
        body_size,
        tiers,
        size_histogram,
        tier_epsilon: config.tier_epsilon,
        span_count: doc.spans.len(),
        dropped_spans: dropped,
        page_count,
    };

    let mut lines = merge_lines(spans, &stats, config.line_merge_gap);
    mark_isolated(&mut lines);

    debug!(
        "Normalized {} spans into {} lines; body size {:.1}pt, {} tiers",
        stats.span_count,
        lines.len(),
        stats.body_size,
        stats.tiers.len()
    );

    Normalized { lines, stats }
}

fn clean_spans(doc: &SpanDocument, page_count: u32) -> Vec<CleanSpan> {
    let mut out_of_range = 0usize;
    let mut spans = Vec::with_capacity(doc.spans.len());

    for (index, span) in doc.spans.iter().enumerate() {
        if span.page >= page_count {
            out_of_range += 1;
            continue;
        }
        let text = clean_text(&span.text);
        if text.is_empty() {
            continue;
        }
        let size_key = (span.font_size.is_finite() && span.font_size > 0.0)
            .then(|| (span.font_size * 10.0).round() as i32)
            .filter(|k| *k > 0);
        let bbox = if span.bbox.is_finite() {
            span.bbox
        } else {
            BoundingBox::default()
        };

        spans.push(CleanSpan {
            index,
            text,
            page: span.page,
            bbox,
            size_key,
            font_size: span.font_size,
            is_bold: span.is_bold,
            page_width: span.page_width,
            page_height: span.page_height,
        });
    }

    if out_of_range > 0 {
        warn!(
            "Ignored {} spans beyond the last page ({} pages)",
            out_of_range, page_count
        );
    }
    spans
}

/// Characters per quantized size.
fn build_histogram(spans: &[CleanSpan]) -> BTreeMap<i32, usize> {
    let mut histogram = BTreeMap::new();
    for span in spans {
        if let Some(key) = span.size_key {
            let chars = span.text.chars().filter(|c| !c.is_whitespace()).count();
            *histogram.entry(key).or_insert(0) += chars;
        }
    }
    histogram
}

/// Size with the most characters; ties go to the smaller size.
fn body_size_key(histogram: &BTreeMap<i32, usize>) -> Option<i32> {
    let mut best: Option<(i32, usize)> = None;
    for (&key, &chars) in histogram {
        // Ascending keys: only a strictly larger count replaces the best.
        if best.map_or(true, |(_, c)| chars > c) {
            best = Some((key, chars));
        }
    }
    best.map(|(key, _)| key)
}

fn build_tiers(histogram: &BTreeMap<i32, usize>, body_key: Option<i32>, epsilon: f32) -> Vec<SizeTier> {
    let Some(body_key) = body_key else {
        return Vec::new();
    };

    let mut tiers: Vec<SizeTier> = Vec::new();
    for &key in histogram.keys().rev() {
        let ratio = key as f32 / body_key as f32;
        if ratio <= 1.0 + epsilon {
            break;
        }
        match tiers.last_mut() {
            Some(tier) if tier.max - ratio < epsilon => tier.min = ratio,
            _ => tiers.push(SizeTier {
                max: ratio,
                min: ratio,
            }),
        }
    }
    tiers
}

fn same_line(prev: &CleanSpan, next: &CleanSpan, merge_gap: f32) -> bool {
    if prev.page != next.page {
        return false;
    }

    let em = prev.em().max(next.em());
    let min_height = prev.bbox.height().min(next.bbox.height());
    let overlaps = if min_height > 0.0 {
        prev.bbox.vertical_overlap(&next.bbox) >= LINE_OVERLAP_SHARE * min_height
    } else {
        (prev.bbox.y0 - next.bbox.y0).abs() <= 0.3 * em
    };
    if !overlaps || next.bbox.x0 < prev.bbox.x0 {
        return false;
    }

    next.bbox.x0 - prev.bbox.x1 <= merge_gap * em
}

fn merge_lines(spans: Vec<CleanSpan>, stats: &DocumentStats, merge_gap: f32) -> Vec<NormalizedSpan> {
    let mut groups: Vec<Vec<CleanSpan>> = Vec::new();
    for span in spans {
        match groups.last_mut() {
            Some(group) if group.last().map_or(false, |prev| same_line(prev, &span, merge_gap)) => {
                group.push(span)
            }
            _ => groups.push(vec![span]),
        }
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(i, group)| build_line(SpanId(i), group, stats))
        .collect()
}

fn build_line(id: SpanId, group: Vec<CleanSpan>, stats: &DocumentStats) -> NormalizedSpan {
    let first = &group[0];
    let mut text = String::new();
    let mut bbox = first.bbox;
    let mut size_key: Option<i32> = None;
    let mut font_size = 0.0f32;
    let mut is_bold = false;

    for span in &group {
        if needs_separator(&text, &span.text) {
            text.push(' ');
        }
        text.push_str(&span.text);
        bbox = bbox.union(&span.bbox);
        size_key = size_key.max(span.size_key);
        if span.font_size.is_finite() {
            font_size = font_size.max(span.font_size);
        }
        is_bold |= span.is_bold;
    }

    let ratio = match size_key {
        Some(key) if stats.body_size > 0.0 => key as f32 / 10.0 / stats.body_size,
        _ => 1.0,
    };

    let start = first.index;
    let end = group.last().map_or(start, |s| s.index) + 1;

    NormalizedSpan {
        id,
        text,
        page: first.page,
        font_size,
        ratio,
        is_bold,
        indent: relative(bbox.x0, first.page_width),
        position: relative(bbox.y0, first.page_height),
        bbox,
        isolated: true,
        sources: start..end,
    }
}

fn relative(value: f32, extent: f32) -> f32 {
    if extent > 0.0 && extent.is_finite() {
        (value / extent).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Flag lines that share their vertical range with another line on the page
/// (multi-column text, side-by-side labels).
fn mark_isolated(lines: &mut [NormalizedSpan]) {
    let mut by_page: HashMap<u32, Vec<usize>> = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        by_page.entry(line.page).or_default().push(i);
    }

    for mut indices in by_page.into_values() {
        indices.sort_by(|&a, &b| lines[a].bbox.y0.total_cmp(&lines[b].bbox.y0));
        for (pos, &a) in indices.iter().enumerate() {
            for &b in &indices[pos + 1..] {
                if lines[b].bbox.y0 >= lines[a].bbox.y1 {
                    break;
                }
                if lines[a].bbox.vertical_overlap(&lines[b].bbox) > 0.0 {
                    lines[a].isolated = false;
                    lines[b].isolated = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawSpan;

    fn span(text: &str, page: u32, x0: f32, y0: f32, size: f32) -> RawSpan {
        let width = text.chars().count() as f32 * size * 0.5;
        RawSpan::new(text, page, BoundingBox::new(x0, y0, x0 + width, y0 + size), size)
    }

    fn run(spans: Vec<RawSpan>, pages: u32) -> Normalized {
        normalize(&SpanDocument::new(spans, pages), &OutlineConfig::default())
    }

    #[test]
    fn test_body_size_weighted_by_characters() {
        // Many short bold labels at 12pt, one long paragraph at 10pt.
        let mut spans = vec![span(
            "This paragraph has many more characters than all of the labels together",
            0,
            72.0,
            300.0,
            10.0,
        )];
        for i in 0..8 {
            spans.push(span("Note", 0, 72.0, 100.0 + i as f32 * 20.0, 12.0));
        }
        let result = run(spans, 1);
        assert_eq!(result.stats.body_size, 10.0);
        assert_eq!(result.stats.tiers.len(), 1);
    }

    #[test]
    fn test_body_size_tie_prefers_smaller() {
        let result = run(
            vec![span("abcd", 0, 72.0, 100.0, 14.0), span("wxyz", 0, 72.0, 200.0, 10.0)],
            1,
        );
        assert_eq!(result.stats.body_size, 10.0);
    }

    #[test]
    fn test_tiers_sorted_and_merged() {
        let body = "body text that dominates the character histogram easily";
        let result = run(
            vec![
                span(body, 0, 72.0, 400.0, 10.0),
                span("A", 0, 72.0, 50.0, 20.0),
                span("B", 0, 72.0, 100.0, 20.1),
                span("C", 0, 72.0, 150.0, 14.0),
                span("D", 0, 72.0, 200.0, 10.1),
            ],
            1,
        );
        let stats = &result.stats;
        // 20.1 and 20.0 share a tier; 10.1 is within epsilon of body.
        assert_eq!(stats.tiers.len(), 2);
        assert!(stats.tiers[0].max > stats.tiers[1].max);
        assert_eq!(stats.tier_rank(2.0), Some(1));
        assert_eq!(stats.tier_rank(2.01), Some(1));
        assert_eq!(stats.tier_rank(1.4), Some(2));
        assert_eq!(stats.tier_rank(1.01), None);
    }

    #[test]
    fn test_tier_width_bounded_by_epsilon() {
        let body = "body text that dominates the character histogram easily";
        let mut spans = vec![span(body, 0, 72.0, 600.0, 10.0)];
        for (i, size) in [20.0, 19.9, 19.7, 19.6, 19.4].into_iter().enumerate() {
            spans.push(span("Heading", 0, 72.0, 50.0 + i as f32 * 60.0, size));
        }
        let stats = run(spans, 1).stats;
        assert_eq!(stats.tiers.len(), 3);
        assert!(stats
            .tiers
            .iter()
            .all(|t| t.max - t.min < stats.tier_epsilon));
        assert_eq!(stats.tier_rank(2.0), Some(1));
        assert_eq!(stats.tier_rank(1.94), Some(3));
    }

    #[test]
    fn test_uniform_font_has_no_tiers() {
        let result = run(
            vec![span("one", 0, 72.0, 100.0, 11.0), span("two", 0, 72.0, 130.0, 11.0)],
            1,
        );
        assert!(!result.stats.has_tiers());
        assert!(result.lines.iter().all(|l| l.ratio == 1.0));
    }

    #[test]
    fn test_same_line_spans_merge() {
        let result = run(
            vec![
                span("1.2", 0, 72.0, 100.0, 14.0),
                span("Scope", 0, 72.0 + 3.0 * 7.0 + 4.0, 100.0, 14.0).bold(),
                span("Body text below the heading line", 0, 72.0, 130.0, 10.0),
            ],
            1,
        );
        assert_eq!(result.lines.len(), 2);
        let line = &result.lines[0];
        assert_eq!(line.text, "1.2 Scope");
        assert!(line.is_bold);
        assert_eq!(line.font_size, 14.0);
        assert_eq!(line.sources, 0..2);
        assert_eq!(result.lines[1].id, SpanId(1));
    }

    #[test]
    fn test_far_apart_spans_do_not_merge() {
        let result = run(
            vec![
                span("Left", 0, 72.0, 100.0, 10.0),
                span("Right", 0, 400.0, 100.0, 10.0),
            ],
            1,
        );
        assert_eq!(result.lines.len(), 2);
        assert!(!result.lines[0].isolated);
        assert!(!result.lines[1].isolated);
    }

    #[test]
    fn test_cjk_spans_join_without_space() {
        let result = run(
            vec![span("概要", 0, 72.0, 100.0, 12.0), span("説明", 0, 96.0, 100.0, 12.0)],
            1,
        );
        assert_eq!(result.lines[0].text, "概要説明");
    }

    #[test]
    fn test_empty_and_out_of_range_spans_dropped() {
        let result = run(
            vec![
                span("   ", 0, 72.0, 100.0, 10.0),
                span("kept", 0, 72.0, 120.0, 10.0),
                span("ghost", 5, 72.0, 100.0, 10.0),
            ],
            2,
        );
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.stats.dropped_spans, 2);
        assert_eq!(result.stats.span_count, 3);
    }

    #[test]
    fn test_invalid_font_size_gets_neutral_ratio() {
        let mut bad = span("broken", 0, 72.0, 100.0, 10.0);
        bad.font_size = f32::NAN;
        let result = run(vec![bad, span("body text here", 0, 72.0, 200.0, 10.0)], 1);
        assert_eq!(result.lines[0].ratio, 1.0);
        assert_eq!(result.stats.body_size, 10.0);
    }

    #[test]
    fn test_relative_geometry() {
        let result = run(vec![span("Title", 0, 306.0, 396.0, 10.0)], 1);
        let line = &result.lines[0];
        assert!((line.indent - 0.5).abs() < 1e-6);
        assert!((line.position - 0.5).abs() < 1e-6);
        assert!(line.isolated);
    }
}
