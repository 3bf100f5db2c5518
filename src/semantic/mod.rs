//! Semantic heading filter.
//!
//! A text-only classifier that answers "does this read like a heading?"
//! without seeing font or position data. It prunes lines the font rules would
//! accept for the wrong reasons: bold emphasis in prose, page furniture,
//! captions and table-of-contents rows.

mod cues;
mod filter;
mod model;

pub use cues::{is_page_label, TextCues};
pub use filter::{score_lines, ModelSource, ModelState, SharedModel, NEUTRAL_SCORE};
pub use model::{LinearHeadingModel, ModelWeights, ShapeWeights};

use crate::analysis::SpanId;
use crate::model::HeadingLevel;

/// Output of a filter for one piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextScore {
    /// Probability in `[0, 1]` that the text is a heading
    pub probability: f32,
    /// Level suggested by the text's numbering, if any
    pub level_hint: Option<HeadingLevel>,
}

/// Semantic verdict for one normalized line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticScore {
    pub span: SpanId,
    pub probability: f32,
    pub level_hint: Option<HeadingLevel>,
}

impl SemanticScore {
    /// Score used when no model is available.
    pub fn neutral(span: SpanId) -> Self {
        Self {
            span,
            probability: NEUTRAL_SCORE,
            level_hint: None,
        }
    }
}

/// A binary heading classifier over text.
///
/// Implementations must be stateless per call; one instance is shared by
/// every worker thread.
pub trait HeadingFilter: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str {
        "custom"
    }

    /// Score one line of text.
    fn score(&self, text: &str) -> TextScore;
}
