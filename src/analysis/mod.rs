//! Heading analysis: span normalization, rule classification, fusion with
//! the semantic filter, and title resolution.
//!
//! Every stage is a plain function over its own narrow input so it can be
//! tested and swapped on its own; [`crate::pipeline`] wires them together.

mod fusion;
mod normalize;
mod rules;
mod title;

pub use fusion::{detect_running_headers, fuse, FusedHeading, FusionReport, LineDecision};
pub use normalize::{normalize, DocumentStats, Normalized, NormalizedSpan, SizeTier};
pub use rules::{classify, classify_lines, LevelCandidate};
pub use title::{clean_title, resolve_title, Title};

/// Identity of a normalized line within one document.
///
/// Equal to the line's index in [`Normalized::lines`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpanId(pub usize);

impl SpanId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SpanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
