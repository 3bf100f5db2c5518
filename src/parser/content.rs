//! Content stream interpretation: text operators to positioned spans.

use std::collections::HashMap;

use super::backend::{BackendFontInfo, ContentOp, PageId, PdfBackend, PdfValue};
use crate::model::{BoundingBox, RawSpan};
use crate::text::is_spaceless_script_char;

/// TJ adjustments (thousandths of an em) beyond which a word space is assumed.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_EM: f32 = 0.5;

/// Ascender and descender as fractions of the font size.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = 0.2;

/// Spans whose baselines differ by less than this share of the font size
/// are on the same line.
const BASELINE_TOLERANCE: f32 = 0.3;

/// Affine matrix `[a b c d e f]` as used by PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other` (apply `self` first, then `other`).
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Graphics and text state that survives `q`/`Q`.
#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font_resource: Vec<u8>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// Horizontal scaling as a factor (Tz / 100)
    horizontal_scaling: f32,
    leading: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font_resource: Vec::new(),
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
        }
    }
}

/// A span before conversion to page coordinates.
struct PendingSpan {
    text: String,
    /// Baseline origin in user space
    x: f32,
    y: f32,
    width: f32,
    size: f32,
    font: Option<BackendFontInfo>,
}

/// Walks the operators of one page and emits spans in reading order.
pub struct ContentInterpreter<'a, B: PdfBackend + ?Sized> {
    backend: &'a B,
    page: PageId,
    page_index: u32,
    media_box: [f32; 4],
    fonts: HashMap<Vec<u8>, BackendFontInfo>,
}

impl<'a, B: PdfBackend + ?Sized> ContentInterpreter<'a, B> {
    pub fn new(
        backend: &'a B,
        page: PageId,
        page_index: u32,
        media_box: [f32; 4],
        fonts: Vec<BackendFontInfo>,
    ) -> Self {
        Self {
            backend,
            page,
            page_index,
            media_box,
            fonts: fonts.into_iter().map(|f| (f.name.clone(), f)).collect(),
        }
    }

    fn page_width(&self) -> f32 {
        (self.media_box[2] - self.media_box[0]).abs()
    }

    fn page_height(&self) -> f32 {
        (self.media_box[3] - self.media_box[1]).abs()
    }

    /// Interpret the operations and return spans sorted top-to-bottom, then
    /// left-to-right.
    pub fn run(&self, ops: &[ContentOp]) -> Vec<RawSpan> {
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut state = GraphicsState::default();
        let mut text_matrix = Matrix::IDENTITY;
        let mut line_matrix = Matrix::IDENTITY;
        let mut in_text = false;
        let mut pending = Vec::new();

        for op in ops {
            match op.operator.as_str() {
                "q" => stack.push(state.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        state = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operands(op) {
                        state.ctm = m.multiply(&state.ctm);
                    }
                }
                "BT" => {
                    in_text = true;
                    text_matrix = Matrix::IDENTITY;
                    line_matrix = Matrix::IDENTITY;
                }
                "ET" => in_text = false,
                "Tf" => {
                    if let Some(PdfValue::Name(name)) = op.operands.first() {
                        state.font_resource = name.clone();
                    }
                    if let Some(size) = op.number(1) {
                        state.font_size = size;
                    }
                }
                "Tc" => state.char_spacing = op.number(0).unwrap_or(0.0),
                "Tw" => state.word_spacing = op.number(0).unwrap_or(0.0),
                "Tz" => state.horizontal_scaling = op.number(0).unwrap_or(100.0) / 100.0,
                "TL" => state.leading = op.number(0).unwrap_or(0.0),
                "Td" | "TD" => {
                    let tx = op.number(0).unwrap_or(0.0);
                    let ty = op.number(1).unwrap_or(0.0);
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    line_matrix = Matrix::translation(tx, ty).multiply(&line_matrix);
                    text_matrix = line_matrix;
                }
                "Tm" => {
                    if let Some(m) = matrix_operands(op) {
                        line_matrix = m;
                        text_matrix = m;
                    }
                }
                "T*" => {
                    line_matrix = self.next_line(&state, &line_matrix);
                    text_matrix = line_matrix;
                }
                "Tj" if in_text => {
                    if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                        self.show(&[PdfValue::Str(bytes.clone())], &state, &mut text_matrix, &mut pending);
                    }
                }
                "TJ" if in_text => {
                    if let Some(PdfValue::Array(items)) = op.operands.first() {
                        self.show(items, &state, &mut text_matrix, &mut pending);
                    }
                }
                "'" if in_text => {
                    line_matrix = self.next_line(&state, &line_matrix);
                    text_matrix = line_matrix;
                    if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                        self.show(&[PdfValue::Str(bytes.clone())], &state, &mut text_matrix, &mut pending);
                    }
                }
                "\"" if in_text => {
                    state.word_spacing = op.number(0).unwrap_or(state.word_spacing);
                    state.char_spacing = op.number(1).unwrap_or(state.char_spacing);
                    line_matrix = self.next_line(&state, &line_matrix);
                    text_matrix = line_matrix;
                    if let Some(PdfValue::Str(bytes)) = op.operands.get(2) {
                        self.show(&[PdfValue::Str(bytes.clone())], &state, &mut text_matrix, &mut pending);
                    }
                }
                _ => {}
            }
        }

        self.into_reading_order(pending)
    }

    fn next_line(&self, state: &GraphicsState, line_matrix: &Matrix) -> Matrix {
        let leading = if state.leading != 0.0 {
            state.leading
        } else {
            state.font_size * 1.2
        };
        Matrix::translation(0.0, -leading).multiply(line_matrix)
    }

    /// Show strings and TJ adjustments, advancing the text matrix.
    fn show(
        &self,
        items: &[PdfValue],
        state: &GraphicsState,
        text_matrix: &mut Matrix,
        pending: &mut Vec<PendingSpan>,
    ) {
        let start = *text_matrix;
        let mut text = String::new();
        let mut advance = 0.0f32;

        for item in items {
            match item {
                PdfValue::Str(bytes) => {
                    let decoded = self
                        .backend
                        .decode_text(self.page, &state.font_resource, bytes);
                    for ch in decoded.chars() {
                        advance += state.font_size * GLYPH_WIDTH_EM + state.char_spacing;
                        if ch == ' ' {
                            advance += state.word_spacing;
                        }
                    }
                    text.push_str(&decoded);
                }
                PdfValue::Integer(_) | PdfValue::Real(_) => {
                    let adjustment = -item.as_number().unwrap_or(0.0);
                    advance += adjustment / 1000.0 * state.font_size;
                    if adjustment > TJ_SPACE_THRESHOLD {
                        if let Some(last) = text.chars().next_back() {
                            if !last.is_whitespace() && !is_spaceless_script_char(last) {
                                text.push(' ');
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        advance *= state.horizontal_scaling;
        *text_matrix = Matrix::translation(advance, 0.0).multiply(text_matrix);

        if text.trim().is_empty() {
            return;
        }

        let rendering = start.multiply(&state.ctm);
        let (x, y) = rendering.apply(0.0, 0.0);
        let size = state.font_size.abs() * rendering.vertical_scale();
        let width = advance.max(0.0) * rendering.horizontal_scale();

        pending.push(PendingSpan {
            text,
            x,
            y,
            width,
            size,
            font: self.fonts.get(&state.font_resource).cloned(),
        });
    }

    /// Convert to top-left page coordinates and sort into reading order.
    fn into_reading_order(&self, pending: Vec<PendingSpan>) -> Vec<RawSpan> {
        let [llx, lly, _, _] = self.media_box;
        let page_height = self.page_height();
        let page_width = self.page_width();

        let mut spans: Vec<(f32, RawSpan)> = pending
            .into_iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite() && p.size.is_finite())
            .map(|p| {
                let baseline = page_height - (p.y - lly);
                let x0 = p.x - llx;
                let bbox = BoundingBox::new(
                    x0,
                    baseline - p.size * ASCENT,
                    x0 + p.width,
                    baseline + p.size * DESCENT,
                );
                let mut span = RawSpan::new(p.text, self.page_index, bbox, p.size)
                    .with_page_size(page_width, page_height);
                if let Some(font) = p.font {
                    span = span.with_font(font.base_font);
                    span.is_bold |= font.is_bold;
                }
                (baseline, span)
            })
            .collect();

        spans.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Cluster baselines into lines, then order each line left to right.
        let mut ordered = Vec::with_capacity(spans.len());
        let mut line: Vec<(f32, RawSpan)> = Vec::new();
        for entry in spans {
            let same_line = line.first().map_or(true, |(baseline, first)| {
                let tolerance = BASELINE_TOLERANCE * first.font_size.max(entry.1.font_size);
                (entry.0 - baseline).abs() <= tolerance
            });
            if !same_line {
                flush_line(&mut line, &mut ordered);
            }
            line.push(entry);
        }
        flush_line(&mut line, &mut ordered);
        ordered
    }
}

fn flush_line(line: &mut Vec<(f32, RawSpan)>, out: &mut Vec<RawSpan>) {
    line.sort_by(|a, b| a.1.bbox.x0.total_cmp(&b.1.bbox.x0));
    out.extend(line.drain(..).map(|(_, span)| span));
}

fn matrix_operands(op: &ContentOp) -> Option<Matrix> {
    Some(Matrix::new(
        op.number(0)?,
        op.number(1)?,
        op.number(2)?,
        op.number(3)?,
        op.number(4)?,
        op.number(5)?,
    ))
}
