//! Positioned text spans as delivered by the PDF parser.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in page space, origin at the top-left corner, y growing
/// downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    /// Create a box, swapping coordinates so that `x0 <= x1` and `y0 <= y1`.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Length of the shared vertical range (0 when disjoint).
    pub fn vertical_overlap(&self, other: &BoundingBox) -> f32 {
        (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }
}

/// A contiguous run of text sharing one font, with its position on the page.
///
/// Produced once per document by the parser and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpan {
    /// Text content as decoded from the content stream
    pub text: String,
    /// Page index (0-based)
    pub page: u32,
    /// Bounding box in top-left page coordinates
    pub bbox: BoundingBox,
    /// Effective font size in points
    pub font_size: f32,
    /// Base font name (e.g. "Helvetica-Bold")
    pub font_name: String,
    /// Whether the font is bold
    pub is_bold: bool,
    /// Page width in points
    pub page_width: f32,
    /// Page height in points
    pub page_height: f32,
}

impl RawSpan {
    /// Create a span on a US Letter page; mostly useful for tests and
    /// synthetic documents.
    pub fn new(text: impl Into<String>, page: u32, bbox: BoundingBox, font_size: f32) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
            font_size,
            font_name: String::new(),
            is_bold: false,
            page_width: 612.0,
            page_height: 792.0,
        }
    }

    /// Mark the span as bold.
    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }

    /// Set the font name, deriving boldness from it.
    pub fn with_font(mut self, font_name: impl Into<String>) -> Self {
        self.font_name = font_name.into();
        self.is_bold = self.is_bold || font_name_is_bold(&self.font_name);
        self
    }

    /// Set page dimensions.
    pub fn with_page_size(mut self, width: f32, height: f32) -> Self {
        self.page_width = width;
        self.page_height = height;
        self
    }

    /// Number of characters, used as the weight in font statistics.
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// Whether a base font name denotes a bold weight.
///
/// Subset prefixes such as `ABCDEF+` are ignored by the substring match.
pub fn font_name_is_bold(font_name: &str) -> bool {
    let lower = font_name.to_ascii_lowercase();
    ["bold", "black", "heavy", "semibold", "demi"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// All spans of one document together with its page count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanDocument {
    /// Spans grouped by page, each page in reading order
    pub spans: Vec<RawSpan>,
    /// Number of pages in the source document
    pub page_count: u32,
    /// Name of the source (usually the file name), used for fallback titles
    pub source_name: Option<String>,
}

impl SpanDocument {
    pub fn new(spans: Vec<RawSpan>, page_count: u32) -> Self {
        Self {
            spans,
            page_count,
            source_name: None,
        }
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.trim().is_empty())
    }

    /// Page count, falling back to the highest page index seen when the
    /// parser did not report one.
    pub fn effective_page_count(&self) -> u32 {
        let seen = self.spans.iter().map(|s| s.page + 1).max().unwrap_or(0);
        if self.page_count == 0 {
            seen
        } else {
            self.page_count
        }
    }

    /// Source name without directory or extension.
    pub fn source_stem(&self) -> Option<String> {
        let name = self.source_name.as_deref()?;
        std::path::Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
    }
}
