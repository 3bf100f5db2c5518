//! # pdf-outline
//!
//! Title and H1/H2/H3 outline extraction from PDF documents.
//!
//! Headings are found by two independent signals: font-size rules over the
//! page layout, and a small text-only classifier that rejects lines which
//! merely look like headings (bold emphasis, running headers, captions).
//! The two are fused into one outline in reading order.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdf_outline::{extract_outline, render, JsonFormat};
//!
//! fn main() -> pdf_outline::Result<()> {
//!     let result = extract_outline("document.pdf")?;
//!     println!("{}", render::to_json(&result, JsonFormat::Pretty)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Hybrid classification**: font-size tiers plus a semantic filter
//! - **Graceful degradation**: rule-only mode when the model is missing,
//!   soft per-document time budgets, empty-document handling
//! - **Running header suppression**: repeated page furniture never reaches
//!   the outline
//! - **Parallel batches**: one document per worker, results streamed as
//!   they finish
//! - **CJK support**: spaceless scripts are joined without separators

pub mod analysis;
pub mod batch;
pub mod budget;
pub mod config;
pub mod detect;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod semantic;
pub mod text;

// Re-export commonly used types
pub use batch::{
    discover_pdfs, BatchOptions, BatchRunner, BatchSummary, DocumentJob, DocumentOutcome,
};
pub use config::OutlineConfig;
pub use detect::{has_pdf_extension, sniff_header, PdfHeader};
pub use error::{Error, Result};
pub use model::{
    BoundingBox, DocumentResult, HeadingEntry, HeadingLevel, Outline, RawSpan, SpanDocument,
};
pub use parser::{ErrorMode, ParseOptions, PdfParser};
pub use pipeline::{
    CancelToken, Degradation, Diagnostics, Explanation, LineReport, OutlinePipeline,
    ProcessedDocument, SemanticMode,
};
pub use render::JsonFormat;
pub use semantic::{HeadingFilter, LinearHeadingModel, SharedModel, TextScore};

use std::path::Path;

/// Extract the title and outline of a PDF file with default settings.
///
/// # Example
///
/// ```no_run
/// use pdf_outline::extract_outline;
///
/// let result = extract_outline("document.pdf").unwrap();
/// for entry in &result.outline {
///     println!("{} {} (p. {})", entry.level, entry.text, entry.page);
/// }
/// ```
pub fn extract_outline<P: AsRef<Path>>(path: P) -> Result<DocumentResult> {
    OutlineExtractor::new().extract(path)
}

/// Extract the title and outline of a PDF held in memory.
pub fn extract_outline_bytes(data: &[u8]) -> Result<DocumentResult> {
    OutlineExtractor::new().extract_bytes(data)
}

/// Extract the outline of an already parsed span document.
///
/// This is the entry point for callers that bring their own PDF parser.
pub fn extract_outline_from_spans(doc: &SpanDocument, config: OutlineConfig) -> Result<DocumentResult> {
    Ok(OutlinePipeline::new(config)?.process(doc)?.result)
}

/// Builder for one-off outline extraction.
///
/// # Example
///
/// ```no_run
/// use pdf_outline::OutlineExtractor;
///
/// let result = OutlineExtractor::new()
///     .rules_only()
///     .lenient()
///     .extract("document.pdf")?;
/// # Ok::<(), pdf_outline::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct OutlineExtractor {
    config: OutlineConfig,
    parse_options: ParseOptions,
}

impl OutlineExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole analysis configuration.
    pub fn with_config(mut self, config: OutlineConfig) -> Self {
        self.config = config;
        self
    }

    /// Decide on font rules alone.
    pub fn rules_only(mut self) -> Self {
        self.config = self.config.rules_only();
        self
    }

    /// Load semantic weights from a local file instead of the bundled ones.
    pub fn with_model_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config = self.config.with_model_path(path);
        self
    }

    /// Skip unreadable pages instead of failing the document.
    pub fn lenient(mut self) -> Self {
        self.parse_options = self.parse_options.lenient();
        self
    }

    /// Use the file name as title when page one has no title text.
    pub fn with_filename_title(mut self) -> Self {
        self.config = self.config.with_filename_title_fallback(true);
        self
    }

    /// Process a PDF file.
    pub fn extract<P: AsRef<Path>>(&self, path: P) -> Result<DocumentResult> {
        let pipeline = OutlinePipeline::new(self.config.clone())?;
        Ok(pipeline.process_file(path, &self.parse_options)?.result)
    }

    /// Process a PDF from bytes.
    pub fn extract_bytes(&self, data: &[u8]) -> Result<DocumentResult> {
        let pipeline = OutlinePipeline::new(self.config.clone())?;
        let parser = PdfParser::from_bytes_with_options(data, self.parse_options.clone())?;
        let doc = parser.extract_spans()?;
        Ok(pipeline.process(&doc)?.result)
    }
}
