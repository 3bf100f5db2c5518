//! PDF header sniffing.
//!
//! Readers accept a `%PDF-x.y` marker anywhere in the first kilobyte of the
//! file, so leading garbage (mail headers, BOMs) is tolerated here as well.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Header marker.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// How far into the file the marker may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Version declared in a PDF header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PdfHeader {
    pub major: u8,
    pub minor: u8,
    /// Byte offset of the `%PDF-` marker.
    pub offset: usize,
}

impl std::fmt::Display for PdfHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}.{}", self.major, self.minor)
    }
}

/// Locate and validate the PDF header in a byte buffer.
pub fn sniff_header(data: &[u8]) -> Result<PdfHeader> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let version = data
        .get(offset + PDF_MAGIC.len()..offset + PDF_MAGIC.len() + 3)
        .ok_or(Error::UnknownFormat)?;

    match version {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9'] => {
            let header = PdfHeader {
                major: major - b'0',
                minor: minor - b'0',
                offset,
            };
            if header.major == 0 || header.major > 2 {
                return Err(Error::UnsupportedVersion(format!(
                    "{}.{}",
                    header.major, header.minor
                )));
            }
            Ok(header)
        }
        other => Err(Error::UnsupportedVersion(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

/// Read the beginning of a file and validate its PDF header.
pub fn sniff_file<P: AsRef<Path>>(path: P) -> Result<PdfHeader> {
    let mut buf = Vec::with_capacity(HEADER_SEARCH_WINDOW + 8);
    File::open(path)?
        .take((HEADER_SEARCH_WINDOW + 8) as u64)
        .read_to_end(&mut buf)?;
    sniff_header(&buf)
}

/// Whether a path has a `.pdf` extension (case-insensitive).
pub fn has_pdf_extension<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
