//! Error types for the docprep library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`PreprocessError`]: **Fatal**. The document cannot be processed at all
//!   (unknown extension, corrupt file, page window outside the document).
//!   Returned as `Err(PreprocessError)` from
//!   [`crate::DocumentPreprocessor::preprocess`].
//!
//! * [`UnitError`]: **Non-fatal**. One structural unit (a page, a table, a
//!   spreadsheet column) failed but the rest of the document is fine. Stored
//!   inside that unit's record in the intermediate output so callers can see
//!   exactly what was lost.
//!
//! * [`OcrError`]: raised by an [`crate::pipeline::ocr::OcrEngine`]. The
//!   extractors never propagate it; they convert it into a [`UnitError`].
//!
//! Image-enhancement failures are not errors at all: a failed step falls
//! back to its input image and is simply absent from
//! `DocumentMetadata::preprocessing_applied`.

use crate::output::DocumentType;
use thiserror::Error;

/// All fatal errors returned by the docprep library.
///
/// Unit-level failures use [`UnitError`] and are stored in the intermediate
/// record rather than propagated here.
#[derive(Debug, Error)]
pub enum PreprocessError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The filename extension is not in the supported-format table.
    #[error("Unsupported format '{extension}' for file '{filename}'\nSupported: .pdf, .xlsx, .xls, .csv, .png, .jpg, .jpeg, .tiff, .bmp")]
    UnsupportedFormat { filename: String, extension: String },

    /// The file exceeds the size limit configured for its document type.
    #[error("{document_type} file is {size_bytes} bytes, limit is {limit_bytes} bytes")]
    FileTooLarge {
        document_type: DocumentType,
        size_bytes: usize,
        limit_bytes: usize,
    },

    /// The requested page window lies outside the document or is inverted.
    #[error("Invalid page range {start}-{end} (document has {page_count} pages)")]
    InvalidPageRange {
        start: usize,
        end: usize,
        page_count: usize,
    },

    // ── Document errors ───────────────────────────────────────────────────
    /// The file could not be opened or decoded as its detected type.
    #[error("{document_type} document is corrupt or unreadable: {detail}")]
    CorruptDocument {
        document_type: DocumentType,
        detail: String,
    },

    /// The PDF is encrypted.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// Structured text could not be read from a page that opened fine.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// A page could not be rendered to a bitmap. Extractors absorb this into
    /// the page's [`UnitError`]; it only escapes from a [`crate::PdfSource`].
    #[error("Failed to rasterise page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium on the system \
library search path.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// The intermediate record could not be rendered as JSON or XML.
    #[error("Failed to serialise output: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A non-fatal error for a single structural unit.
///
/// Stored alongside the unit's record when it fails. The document as a whole
/// still succeeds.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum UnitError {
    /// Rasterisation or OCR of a page failed.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// A table found on a page could not be turned into a structured frame.
    #[error("Page {page}, table {table_id}: parsing failed: {detail}")]
    TableParseFailed {
        page: usize,
        table_id: usize,
        detail: String,
    },

    /// Summary statistics for one spreadsheet or table column failed.
    #[error("Column '{column}': summary failed: {detail}")]
    ColumnSummaryFailed { column: String, detail: String },
}

/// Errors raised by an OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("tesseract not found at '{path}'. Install it: brew install tesseract (macOS) or apt install tesseract-ocr (Linux)")]
    EngineNotFound { path: String },

    #[error("tesseract failed with exit code {code}: {stderr}")]
    EngineFailed { code: i32, stderr: String },

    #[error("failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),

    #[error("OCR IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Engine-specific failure that does not fit the variants above.
    #[error("{0}")]
    Other(String),
}
