//! Data model shared by the parser, the analysis stages and the renderer.

mod outline;
mod span;

pub use outline::{DocumentResult, HeadingEntry, HeadingLevel, Outline};
pub use span::{font_name_is_bold, BoundingBox, RawSpan, SpanDocument};
