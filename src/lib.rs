//! # docprep
//!
//! Quality-adaptive preprocessing of business documents (PDF, spreadsheet,
//! image) into clean text, metadata and a format-specific intermediate record
//! ready to be handed to a downstream field-extraction model.
//!
//! ## Why this crate?
//!
//! Real-world document batches mix born-digital PDFs, scanned PDFs, phone
//! photos of receipts and exported spreadsheets. Each needs a different
//! extraction path, and a scanned page silently producing no text is the most
//! common failure. docprep decides per page whether direct text extraction
//! suffices or whether the page must be rendered, enhanced and OCR'd, and it
//! reports how much of the result came from each path.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes + filename
//!  │
//!  ├─ 1. Classify  extension → pdf / excel / image, size limit
//!  ├─ 2. Extract   per page / sheet / image:
//!  │               PDF   text + tables, or render ▶ enhance ▶ OCR
//!  │               Sheet cleaned frame, dtypes, column statistics
//!  │               Image properties ▶ enhance ▶ OCR ▶ layout
//!  ├─ 3. Clean     line endings, whitespace, OCR digit confusions
//!  └─ 4. Output    text + DocumentMetadata + Intermediate
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docprep::{DocumentPreprocessor, PreprocessConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PreprocessConfig::builder().render_dpi(300).build()?;
//!     let preprocessor = DocumentPreprocessor::new(config);
//!     let output = preprocessor.preprocess_path("scan.pdf", None, None)?;
//!     println!("{}", output.text);
//!     eprintln!(
//!         "{} pages, quality {:.2}",
//!         output.metadata.page_count, output.metadata.estimated_quality
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `docprep` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `vision` | on      | Extended enhancement (grayscale, denoise, deskew, CLAHE) and contour layout detection via imageproc |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docprep = { version = "0.3", default-features = false, features = ["vision"] }
//! ```
//!
//! ## Runtime requirements
//!
//! PDFs need the pdfium shared library (`PDFIUM_LIB_PATH` or the system
//! search path); OCR needs the `tesseract` executable. Both can be replaced
//! through [`DocumentPreprocessor::builder`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preprocess;
pub mod progress;
pub mod xml;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    EnhancementSettings, FormatPolicy, FormatTable, OcrSettings, PdfSettings, PreprocessConfig,
    PreprocessConfigBuilder, QualityLabel, QualityThresholds, SpreadsheetSettings,
};
pub use error::{OcrError, PreprocessError, UnitError};
pub use output::{
    ColumnSummary, DataQuality, DocumentMetadata, DocumentType, EmbeddedImage, ExtractionMethod,
    FrameSummary, ImageIntermediate, ImageProperties, Intermediate, LayoutInfo, LayoutType,
    PageRecord, PdfIntermediate, PreprocessOutput, Shape, SheetRecord, SpreadsheetIntermediate,
    TableRecord, OCR_FAILED_MARKER,
};
pub use pipeline::enhance::{select_enhancer, BaselineEnhancer, Enhanced, ImageEnhancer};
pub use pipeline::input::{file_extension, is_format_supported};
pub use pipeline::ocr::{OcrEngine, TesseractOcr};
pub use pipeline::pdf::{LayoutLine, PageContent, PdfBackend, PdfSource};
pub use pipeline::pdfium::PdfiumBackend;
pub use pipeline::postprocess::clean_text;
pub use pipeline::quality::estimate_quality;
#[cfg(feature = "vision")]
pub use pipeline::vision::VisionEnhancer;
pub use preprocess::{DocumentPreprocessor, DocumentPreprocessorBuilder};
pub use progress::{PreprocessProgressCallback, UnitOutcome};
pub use xml::render_xml;
