//! Rule-based level classifier.
//!
//! Levels come only from font size: the largest tier above body text is H1,
//! the next H2, the next H3. Boldness and layout cues raise confidence but
//! never create a heading on their own.

use log::debug;

use super::{DocumentStats, NormalizedSpan, SpanId};
use crate::budget::Budget;
use crate::error::Result;
use crate::model::HeadingLevel;

/// Below this ratio a line must also be bold to count as a heading.
const WEAK_RATIO: f32 = 1.08;

/// Lines with at most this many words count as short.
const SHORT_WORDS: usize = 12;

/// Left edge (relative to page width) under which a line is "at the margin".
const MARGIN_INDENT: f32 = 0.2;

/// Rule verdict for one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelCandidate {
    pub span: SpanId,
    /// `None` means not a heading
    pub level: Option<HeadingLevel>,
    /// Confidence in `[0, 1]`; 0 when `level` is `None`
    pub confidence: f32,
}

impl LevelCandidate {
    pub fn none(span: SpanId) -> Self {
        Self {
            span,
            level: None,
            confidence: 0.0,
        }
    }
}

fn base_confidence(level: HeadingLevel) -> f32 {
    match level {
        HeadingLevel::H1 => 0.55,
        HeadingLevel::H2 => 0.45,
        HeadingLevel::H3 => 0.35,
    }
}

/// Classify one line.
pub fn classify(line: &NormalizedSpan, stats: &DocumentStats) -> LevelCandidate {
    let Some(mut rank) = stats.tier_rank(line.ratio) else {
        return LevelCandidate::none(line.id);
    };
    if line.ratio < WEAK_RATIO && !line.is_bold {
        return LevelCandidate::none(line.id);
    }

    // Bold breaks near-ties with the next larger tier.
    if line.is_bold && rank > 1 {
        let above = &stats.tiers[rank - 2];
        if above.min - line.ratio < 2.0 * stats.tier_epsilon {
            rank -= 1;
        }
    }

    let Some(level) = HeadingLevel::from_rank(rank) else {
        return LevelCandidate::none(line.id);
    };

    let mut confidence = base_confidence(level);
    if line.is_bold {
        confidence += 0.15;
    }
    if line.word_count() <= SHORT_WORDS {
        confidence += 0.1;
    }
    if !line.has_trailing_punctuation() {
        confidence += 0.1;
    }
    if line.indent < MARGIN_INDENT {
        confidence += 0.05;
    }
    if line.isolated {
        confidence += 0.05;
    }

    LevelCandidate {
        span: line.id,
        level: Some(level),
        confidence: confidence.min(1.0),
    }
}

/// Classify every line, in order.
///
/// When the budget runs out the remaining lines are left as non-headings and
/// the returned flag is `true`.
pub fn classify_lines(
    lines: &[NormalizedSpan],
    stats: &DocumentStats,
    budget: &Budget,
) -> Result<(Vec<LevelCandidate>, bool)> {
    let mut candidates = Vec::with_capacity(lines.len());
    let mut timed_out = false;

    for line in lines {
        budget.check_cancelled()?;
        if !timed_out && budget.expired() {
            debug!(
                "Rule classification stopped after {} of {} lines",
                candidates.len(),
                lines.len()
            );
            timed_out = true;
        }
        candidates.push(if timed_out {
            LevelCandidate::none(line.id)
        } else {
            classify(line, stats)
        });
    }

    Ok((candidates, timed_out))
}
