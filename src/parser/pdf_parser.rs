//! PDF document parser: file or bytes in, positioned spans out.

use std::io::Read;
use std::path::Path;

use log::{debug, warn};

use crate::detect::{sniff_file, sniff_header};
use crate::error::{Error, Result};
use crate::model::{RawSpan, SpanDocument};

use super::backend::{LopdfBackend, PageId, PdfBackend};
use super::content::ContentInterpreter;
use super::options::{ErrorMode, ParseOptions};

/// PDF document parser.
///
/// Generic over the backend so the span extraction can be exercised without
/// a real PDF library; [`LopdfBackend`] is the default.
pub struct PdfParser<B: PdfBackend = LopdfBackend> {
    backend: B,
    options: ParseOptions,
    source_name: Option<String>,
}

impl PdfParser<LopdfBackend> {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ParseOptions::default())
    }

    /// Open a PDF file with custom options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<Self> {
        let path = path.as_ref();

        let header = sniff_file(path)?;
        debug!("{}: PDF {}.{}", path.display(), header.major, header.minor);

        let backend = LopdfBackend::load_file(path)?;
        let source_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());

        Ok(Self {
            backend,
            options,
            source_name,
        })
    }

    /// Parse a PDF from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, ParseOptions::default())
    }

    /// Parse a PDF from bytes with custom options.
    pub fn from_bytes_with_options(data: &[u8], options: ParseOptions) -> Result<Self> {
        sniff_header(data)?;
        let backend = LopdfBackend::load_bytes(data)?;
        Ok(Self::with_backend(backend, options))
    }

    /// Parse a PDF from a reader.
    pub fn from_reader<R: Read>(mut reader: R, options: ParseOptions) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes_with_options(&data, options)
    }

    /// PDF version string of the loaded document.
    pub fn version(&self) -> String {
        self.backend.version()
    }
}

impl<B: PdfBackend> PdfParser<B> {
    /// Use an already constructed backend.
    pub fn with_backend(backend: B, options: ParseOptions) -> Self {
        Self {
            backend,
            options,
            source_name: None,
        }
    }

    /// Name reported as the span document's source.
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    /// Total number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.backend.pages().len() as u32
    }

    /// Extract every text span, page by page in reading order.
    ///
    /// In [`ErrorMode::Lenient`] pages that fail to decode are skipped with a
    /// warning; in strict mode the first failure aborts the document.
    pub fn extract_spans(&self) -> Result<SpanDocument> {
        let pages = self.backend.pages();
        let page_count = pages.len() as u32;
        let limit = self.options.max_pages.unwrap_or(u32::MAX);

        let mut spans = Vec::new();
        for (index, (page_num, page_id)) in pages.into_iter().enumerate() {
            if index as u32 >= limit {
                break;
            }
            match self.extract_page(index as u32, page_id) {
                Ok(page_spans) => spans.extend(page_spans),
                Err(e) if self.options.error_mode == ErrorMode::Lenient => {
                    warn!("Skipping page {}: {}", page_num, e);
                }
                Err(e) => return Err(e),
            }
        }

        debug!("Extracted {} spans from {} pages", spans.len(), page_count);

        let mut document = SpanDocument::new(spans, page_count);
        document.source_name = self.source_name.clone();
        Ok(document)
    }

    /// Spans of a single page (0-based index).
    pub fn extract_page_spans(&self, index: u32) -> Result<Vec<RawSpan>> {
        let pages = self.backend.pages();
        let total = pages.len() as u32;
        let page_id = pages
            .into_values()
            .nth(index as usize)
            .ok_or(Error::PageOutOfRange(index + 1, total))?;
        self.extract_page(index, page_id)
    }

    fn extract_page(&self, index: u32, page_id: PageId) -> Result<Vec<RawSpan>> {
        let media_box = self.backend.media_box(page_id);
        let fonts = match self.backend.page_fonts(page_id) {
            Ok(fonts) => fonts,
            Err(e) => {
                // Text still decodes without font info, just never as bold.
                debug!("No fonts for page {}: {}", index + 1, e);
                Vec::new()
            }
        };

        let content = self.backend.page_content(page_id)?;
        if content.is_empty() {
            return Ok(Vec::new());
        }
        let ops = self.backend.decode_content(&content)?;

        let interpreter = ContentInterpreter::new(&self.backend, page_id, index, media_box, fonts);
        Ok(interpreter.run(&ops))
    }
}
