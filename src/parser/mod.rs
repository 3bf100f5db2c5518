//! PDF parsing module.

pub mod backend;
mod content;
mod options;
mod pdf_parser;

pub use backend::{BackendFontInfo, ContentOp, LopdfBackend, PageId, PdfBackend, PdfValue};
pub use content::{ContentInterpreter, Matrix};
pub use options::{ErrorMode, ParseOptions};
pub use pdf_parser::PdfParser;
