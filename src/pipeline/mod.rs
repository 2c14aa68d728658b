//! Pipeline stages for document preprocessing.
//!
//! Each submodule implements one step or one format-specific extractor.
//! Extractors only talk to the outside world through the seams defined here
//! ([`pdf::PdfBackend`], [`ocr::OcrEngine`], [`enhance::ImageEnhancer`]), so
//! each can be tested without pdfium or tesseract installed.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ pdf ─────────▶ table / (render ▶ enhance ▶ ocr) ─┐
//! input ─────┼──▶ spreadsheet ─▶ frame ────────────────────────────┼──▶ postprocess ──▶ quality
//! (classify) └──▶ image ───────▶ enhance ▶ ocr ▶ layout ───────────┘     (cleanup)
//! ```
//!
//! 1. [`input`]  — extension lookup, size limit and page-window resolution
//! 2. [`pdf`]    — per-page text or OCR, table recovery via [`table`]
//! 3. [`spreadsheet`] — one cleaned [`frame::Frame`] per sheet
//! 4. [`image`]  — properties, enhancement, OCR and layout detection
//! 5. [`postprocess`] — deterministic text cleanup applied to every format
//! 6. [`quality`] — heuristic text-quality score for OCR output

pub mod encode;
pub mod enhance;
pub mod frame;
pub mod image;
pub mod input;
pub mod ocr;
pub mod pdf;
pub mod pdfium;
pub mod postprocess;
pub mod quality;
pub mod spreadsheet;
pub mod table;
#[cfg(feature = "vision")]
pub mod vision;

use crate::output::Intermediate;

/// Result of a format-specific extractor, before text cleanup.
#[derive(Debug)]
pub(crate) struct Extraction {
    pub text: String,
    pub intermediate: Intermediate,
}
