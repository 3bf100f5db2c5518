//! Hybrid fusion of rule and semantic decisions into an ordered outline.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use super::{DocumentStats, LevelCandidate, NormalizedSpan, SpanId};
use crate::config::OutlineConfig;
use crate::model::HeadingLevel;
use crate::semantic::{is_page_label, SemanticScore};
use crate::text::{boilerplate_key, fold_digits};

/// Lowest semantic score that lets a numbered line through when the document
/// has no size tiers at all.
const FALLBACK_MIN_SCORE: f32 = 0.6;

/// Why a line did or did not make it into the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineDecision {
    Heading(HeadingLevel),
    /// No size or weight signal
    NotHeading,
    BelowRuleThreshold,
    RejectedBySemantic,
    RunningHeader,
    /// Same level, text and page as the previous heading
    Duplicate,
    /// Part of a title assembled from several lines or runs
    Title,
}

impl LineDecision {
    pub fn level(self) -> Option<HeadingLevel> {
        match self {
            LineDecision::Heading(level) => Some(level),
            _ => None,
        }
    }
}

/// A heading that survived fusion, in reading order.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHeading {
    pub span: SpanId,
    pub level: HeadingLevel,
    pub text: String,
    /// Page index (0-based)
    pub page: u32,
    pub position: f32,
}

/// Fusion output plus counters for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct FusionReport {
    pub headings: Vec<FusedHeading>,
    /// One decision per line, indexed by [`SpanId`]
    pub decisions: Vec<LineDecision>,
    pub running_headers: usize,
    /// Rule level and numbering hint disagree
    pub level_conflicts: usize,
    /// ... by more than one tier
    pub severe_conflicts: usize,
    /// Headings accepted through the uniform-font fallback
    pub fallback_headings: usize,
    pub duplicates_removed: usize,
    pub levels_adjusted: usize,
}

/// Lines whose normalized text repeats at the same relative height on
/// several pages.
///
/// Text must match exactly, except that page labels ("Page 3 of 10") match
/// whatever their numbers.
pub fn detect_running_headers(lines: &[NormalizedSpan], config: &OutlineConfig) -> HashSet<SpanId> {
    let mut groups: HashMap<String, Vec<&NormalizedSpan>> = HashMap::new();
    for line in lines {
        groups.entry(running_header_key(&line.text)).or_default().push(line);
    }

    let mut suppressed = HashSet::new();
    for group in groups.values() {
        if group.len() < config.running_header_min_pages {
            continue;
        }
        for line in group {
            let pages: HashSet<u32> = group
                .iter()
                .filter(|other| {
                    (other.position - line.position).abs() <= config.running_header_tolerance
                })
                .map(|other| other.page)
                .collect();
            if pages.len() >= config.running_header_min_pages {
                suppressed.insert(line.id);
            }
        }
    }
    suppressed
}

fn running_header_key(text: &str) -> String {
    let key = boilerplate_key(text);
    if is_page_label(text) {
        fold_digits(&key)
    } else {
        key
    }
}

/// Combine per-line rule candidates with semantic scores.
///
/// `semantic` is `None` when the filter is disabled, unavailable or timed
/// out; decisions then rest on rule confidence alone.
pub fn fuse(
    lines: &[NormalizedSpan],
    candidates: &[LevelCandidate],
    semantic: Option<&[SemanticScore]>,
    stats: &DocumentStats,
    config: &OutlineConfig,
) -> FusionReport {
    let mut report = FusionReport::default();
    let running = detect_running_headers(lines, config);
    report.running_headers = running.len();

    let mut accepted: Vec<FusedHeading> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let candidate = candidates
            .get(i)
            .copied()
            .unwrap_or_else(|| LevelCandidate::none(line.id));
        let score = semantic.and_then(|s| s.get(i));

        let decision = if running.contains(&line.id) {
            LineDecision::RunningHeader
        } else {
            decide(line, &candidate, score, stats, config, &mut report)
        };

        if let LineDecision::Heading(level) = decision {
            accepted.push(FusedHeading {
                span: line.id,
                level,
                text: line.text.clone(),
                page: line.page,
                position: line.position,
            });
        }
        report.decisions.push(decision);
    }

    // Reading order; ties keep the original line order.
    accepted.sort_by(|a, b| {
        a.page
            .cmp(&b.page)
            .then(a.position.total_cmp(&b.position))
            .then(a.span.cmp(&b.span))
    });

    if config.normalize_hierarchy {
        report.levels_adjusted = normalize_hierarchy(&mut accepted);
    }

    let mut headings: Vec<FusedHeading> = Vec::with_capacity(accepted.len());
    for heading in accepted {
        let duplicate = headings.last().map_or(false, |prev| {
            prev.level == heading.level && prev.text == heading.text && prev.page == heading.page
        });
        if duplicate {
            report.decisions[heading.span.index()] = LineDecision::Duplicate;
            report.duplicates_removed += 1;
        } else {
            headings.push(heading);
        }
    }
    report.headings = headings;

    debug!(
        "Fusion kept {} headings ({} running headers, {} conflicts, {} fallback)",
        report.headings.len(),
        report.running_headers,
        report.level_conflicts,
        report.fallback_headings
    );
    report
}

fn decide(
    line: &NormalizedSpan,
    candidate: &LevelCandidate,
    score: Option<&SemanticScore>,
    stats: &DocumentStats,
    config: &OutlineConfig,
    report: &mut FusionReport,
) -> LineDecision {
    let Some(level) = candidate.level else {
        return uniform_font_fallback(line, score, stats, config, report);
    };

    if candidate.confidence < config.rule_threshold {
        return LineDecision::BelowRuleThreshold;
    }
    if let Some(score) = score {
        if score.probability < config.semantic_threshold {
            return LineDecision::RejectedBySemantic;
        }
        if let Some(hint) = score.level_hint {
            if hint != level {
                report.level_conflicts += 1;
                if hint.distance(level) > 1 {
                    report.severe_conflicts += 1;
                    warn!(
                        "Level conflict on page {}: font size says {}, numbering says {} ({:?})",
                        line.page + 1,
                        level,
                        hint,
                        line.text
                    );
                }
            }
        }
    }
    LineDecision::Heading(level)
}

/// Numbered lines in documents set in one font size.
fn uniform_font_fallback(
    line: &NormalizedSpan,
    score: Option<&SemanticScore>,
    stats: &DocumentStats,
    config: &OutlineConfig,
    report: &mut FusionReport,
) -> LineDecision {
    let Some(score) = score else {
        return LineDecision::NotHeading;
    };
    if stats.has_tiers() || line.has_trailing_punctuation() {
        return LineDecision::NotHeading;
    }
    let Some(hint) = score.level_hint else {
        return LineDecision::NotHeading;
    };
    if score.probability < config.semantic_threshold.max(FALLBACK_MIN_SCORE) {
        return LineDecision::RejectedBySemantic;
    }
    report.fallback_headings += 1;
    LineDecision::Heading(hint)
}

/// Raise levels that skip a tier below the previous heading. Returns the
/// number of entries changed.
fn normalize_hierarchy(headings: &mut [FusedHeading]) -> usize {
    let mut adjusted = 0;
    let mut previous: Option<HeadingLevel> = None;
    for heading in headings.iter_mut() {
        if let Some(prev) = previous {
            if heading.level.depth() > prev.depth() + 1 {
                heading.level = prev.deeper();
                adjusted += 1;
            }
        }
        previous = Some(heading.level);
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SizeTier;

    fn stats(tiers: &[f32]) -> DocumentStats {
        DocumentStats {
            body_size: 10.0,
            tiers: tiers.iter().map(|&r| SizeTier { max: r, min: r }).collect(),
            tier_epsilon: 0.02,
            page_count: 3,
            ..Default::default()
        }
    }

    fn candidate(id: usize, level: Option<HeadingLevel>, confidence: f32) -> LevelCandidate {
        LevelCandidate {
            span: SpanId(id),
            level,
            confidence,
        }
    }

    fn score(id: usize, probability: f32, level_hint: Option<HeadingLevel>) -> SemanticScore {
        SemanticScore {
            span: SpanId(id),
            probability,
            level_hint,
        }
    }

    #[test]
    fn test_both_signals_required() {
        let lines = vec![
            NormalizedSpan::synthetic(0, "Overview", 0, 2.0),
            NormalizedSpan::synthetic(1, "bold emphasis", 0, 2.0),
            NormalizedSpan::synthetic(2, "Weak", 0, 2.0),
        ];
        let candidates = vec![
            candidate(0, Some(HeadingLevel::H1), 0.9),
            candidate(1, Some(HeadingLevel::H1), 0.9),
            candidate(2, Some(HeadingLevel::H1), 0.3),
        ];
        let scores = vec![score(0, 0.9, None), score(1, 0.1, None), score(2, 0.9, None)];

        let report = fuse(
            &lines,
            &candidates,
            Some(&scores),
            &stats(&[2.0]),
            &OutlineConfig::default(),
        );
        assert_eq!(report.headings.len(), 1);
        assert_eq!(report.headings[0].text, "Overview");
        assert_eq!(report.decisions[1], LineDecision::RejectedBySemantic);
        assert_eq!(report.decisions[2], LineDecision::BelowRuleThreshold);
    }

    #[test]
    fn test_rule_only_mode() {
        let lines = vec![NormalizedSpan::synthetic(0, "bold emphasis", 0, 2.0)];
        let candidates = vec![candidate(0, Some(HeadingLevel::H1), 0.9)];
        let report = fuse(&lines, &candidates, None, &stats(&[2.0]), &OutlineConfig::default());
        assert_eq!(report.headings.len(), 1);
    }

    #[test]
    fn test_rule_level_wins_conflicts() {
        let lines = vec![
            NormalizedSpan::synthetic(0, "2.1 Data", 0, 2.0),
            NormalizedSpan::synthetic(1, "1.1.1 Detail", 0, 2.0),
        ];
        let candidates = vec![
            candidate(0, Some(HeadingLevel::H1), 0.9),
            candidate(1, Some(HeadingLevel::H1), 0.9),
        ];
        let scores = vec![
            score(0, 0.9, Some(HeadingLevel::H2)),
            score(1, 0.9, Some(HeadingLevel::H3)),
        ];
        let report = fuse(
            &lines,
            &candidates,
            Some(&scores),
            &stats(&[2.0]),
            &OutlineConfig::default(),
        );
        assert!(report.headings.iter().all(|h| h.level == HeadingLevel::H1));
        assert_eq!(report.level_conflicts, 2);
        assert_eq!(report.severe_conflicts, 1);
    }

    #[test]
    fn test_running_headers_suppressed() {
        let mut lines = Vec::new();
        for page in 0..3 {
            let mut header = NormalizedSpan::synthetic(lines.len(), "Annual Report 2024", page, 1.5);
            header.position = 0.04;
            lines.push(header);
            let mut body = NormalizedSpan::synthetic(lines.len(), "Section text", page, 1.0);
            body.position = 0.3 + page as f32 * 0.1;
            lines.push(body);
        }
        let suppressed = detect_running_headers(&lines, &OutlineConfig::default());
        assert_eq!(suppressed.len(), 3);
        assert!(suppressed.contains(&SpanId(0)));
        assert!(!suppressed.contains(&SpanId(1)));
    }

    #[test]
    fn test_same_text_elsewhere_is_kept() {
        let mut first = NormalizedSpan::synthetic(0, "Summary", 0, 1.5);
        first.position = 0.1;
        let mut second = NormalizedSpan::synthetic(1, "Summary", 1, 1.5);
        second.position = 0.6;
        let suppressed = detect_running_headers(&[first, second], &OutlineConfig::default());
        assert!(suppressed.is_empty());
    }

    #[test]
    fn test_page_numbers_fold_together() {
        let lines: Vec<_> = (0..3)
            .map(|page| {
                let mut line = NormalizedSpan::synthetic(
                    page as usize,
                    &format!("Page {} of 3", page + 1),
                    page,
                    1.0,
                );
                line.position = 0.95;
                line
            })
            .collect();
        assert_eq!(detect_running_headers(&lines, &OutlineConfig::default()).len(), 3);
    }

    #[test]
    fn test_numbered_headings_at_same_height_are_kept() {
        let lines: Vec<_> = (0..3)
            .map(|page| {
                let mut line = NormalizedSpan::synthetic(
                    page as usize,
                    &format!("Chapter {}", page + 1),
                    page,
                    2.0,
                );
                line.position = 0.08;
                line
            })
            .collect();
        assert!(detect_running_headers(&lines, &OutlineConfig::default()).is_empty());

        let candidates: Vec<_> = (0..3)
            .map(|i| candidate(i, Some(HeadingLevel::H1), 0.9))
            .collect();
        let report = fuse(&lines, &candidates, None, &stats(&[2.0]), &OutlineConfig::default());
        let texts: Vec<_> = report.headings.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["Chapter 1", "Chapter 2", "Chapter 3"]);
    }

    #[test]
    fn test_ordering_by_page_then_position() {
        let mut a = NormalizedSpan::synthetic(0, "Later", 1, 2.0);
        a.position = 0.1;
        let mut b = NormalizedSpan::synthetic(1, "Lower", 0, 2.0);
        b.position = 0.5;
        let mut c = NormalizedSpan::synthetic(2, "Upper", 0, 2.0);
        c.position = 0.2;
        let lines = vec![a, b, c];
        let candidates: Vec<_> = (0..3)
            .map(|i| candidate(i, Some(HeadingLevel::H1), 0.9))
            .collect();
        let report = fuse(&lines, &candidates, None, &stats(&[2.0]), &OutlineConfig::default());
        let texts: Vec<_> = report.headings.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, ["Upper", "Lower", "Later"]);
    }

    #[test]
    fn test_consecutive_duplicates_collapse() {
        let mut lines = vec![
            NormalizedSpan::synthetic(0, "Scope", 0, 2.0),
            NormalizedSpan::synthetic(1, "Scope", 0, 2.0),
        ];
        lines[1].position = 0.5;
        let candidates = vec![
            candidate(0, Some(HeadingLevel::H1), 0.9),
            candidate(1, Some(HeadingLevel::H1), 0.9),
        ];
        let report = fuse(&lines, &candidates, None, &stats(&[2.0]), &OutlineConfig::default());
        assert_eq!(report.headings.len(), 1);
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.decisions[1], LineDecision::Duplicate);
    }

    #[test]
    fn test_uniform_font_fallback() {
        let lines = vec![
            NormalizedSpan::synthetic(0, "1 Introduction", 0, 1.0),
            NormalizedSpan::synthetic(1, "1.1 Scope", 0, 1.0),
            NormalizedSpan::synthetic(2, "2 items were shipped.", 0, 1.0),
            NormalizedSpan::synthetic(3, "Plain body", 0, 1.0),
        ];
        let candidates: Vec<_> = (0..4).map(|i| candidate(i, None, 0.0)).collect();
        let scores = vec![
            score(0, 0.95, Some(HeadingLevel::H1)),
            score(1, 0.9, Some(HeadingLevel::H2)),
            score(2, 0.9, Some(HeadingLevel::H1)),
            score(3, 0.9, None),
        ];
        let report = fuse(&lines, &candidates, Some(&scores), &stats(&[]), &OutlineConfig::default());
        let levels: Vec<_> = report.headings.iter().map(|h| h.level).collect();
        assert_eq!(levels, [HeadingLevel::H1, HeadingLevel::H2]);
        assert_eq!(report.fallback_headings, 2);

        // Without the semantic filter nothing fires.
        let report = fuse(&lines, &candidates, None, &stats(&[]), &OutlineConfig::default());
        assert!(report.headings.is_empty());
    }

    #[test]
    fn test_hierarchy_normalization() {
        let lines = vec![
            NormalizedSpan::synthetic(0, "Part", 0, 2.0),
            NormalizedSpan::synthetic(1, "Detail", 0, 1.2),
        ];
        let candidates = vec![
            candidate(0, Some(HeadingLevel::H1), 0.9),
            candidate(1, Some(HeadingLevel::H3), 0.9),
        ];
        let config = OutlineConfig::default().with_normalized_hierarchy(true);
        let report = fuse(&lines, &candidates, None, &stats(&[2.0, 1.5, 1.2]), &config);
        assert_eq!(report.headings[1].level, HeadingLevel::H2);
        assert_eq!(report.levels_adjusted, 1);

        let report = fuse(
            &lines,
            &candidates,
            None,
            &stats(&[2.0, 1.5, 1.2]),
            &OutlineConfig::default(),
        );
        assert_eq!(report.headings[1].level, HeadingLevel::H3);
    }
}
