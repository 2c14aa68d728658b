//! Output types: document metadata, per-unit records and the intermediate
//! structured record handed to the downstream field-extraction step.
//!
//! Everything here is created fresh per [`crate::DocumentPreprocessor::preprocess`]
//! call and owned by the caller afterwards. Nothing is shared between calls.

use crate::config::{QualityLabel, QualityThresholds};
use crate::error::UnitError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Sentinel stored as a page's content when its OCR pass failed.
pub const OCR_FAILED_MARKER: &str = "[OCR_FAILED]";

// ── Document type ────────────────────────────────────────────────────────

/// Document family, decided purely from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    /// Spreadsheets and delimited text (`.xlsx`, `.xls`, `.csv`).
    Excel,
    Image,
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Excel => "excel",
            DocumentType::Image => "image",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Metadata ─────────────────────────────────────────────────────────────

/// Metadata describing one preprocessing run.
///
/// Produced once per call and never mutated after it is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_type: DocumentType,
    /// Literal lower-cased extension including the dot, e.g. `.pdf`.
    pub file_format: String,
    /// Total pages / sheets / images in the source, not just the processed window.
    pub page_count: usize,
    /// Score in `[0.0, 1.0]`. PDF: fraction of processed pages resolved by
    /// direct text. Image: text plausibility of the OCR output.
    /// Spreadsheet: always 1.0.
    pub estimated_quality: f64,
    /// PDF info-dictionary creation date, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    /// Every extraction / enhancement step that ran, in order.
    pub preprocessing_applied: Vec<String>,
    pub pages_processed_start: Option<usize>,
    pub pages_processed_end: Option<usize>,
    pub pages_processed_count: Option<usize>,
}

impl DocumentMetadata {
    /// Human-readable bucket for [`Self::estimated_quality`].
    pub fn quality_label(&self, thresholds: &QualityThresholds) -> QualityLabel {
        thresholds.label(self.estimated_quality)
    }
}

/// Per-call accumulator for [`DocumentMetadata`].
///
/// Extractors fill it in step by step; the orchestrator freezes it with
/// [`MetadataBuilder::build`] once the whole pipeline has run.
#[derive(Debug)]
pub(crate) struct MetadataBuilder {
    document_type: DocumentType,
    file_format: String,
    page_count: usize,
    estimated_quality: f64,
    creation_date: Option<String>,
    steps: Vec<String>,
    window: Option<(usize, usize)>,
}

impl MetadataBuilder {
    pub(crate) fn new(document_type: DocumentType, file_format: impl Into<String>) -> Self {
        Self {
            document_type,
            file_format: file_format.into(),
            page_count: 0,
            estimated_quality: 0.0,
            creation_date: None,
            steps: Vec::new(),
            window: None,
        }
    }

    pub(crate) fn page_count(&mut self, n: usize) -> &mut Self {
        self.page_count = n;
        self
    }

    pub(crate) fn quality(&mut self, score: f64) -> &mut Self {
        self.estimated_quality = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub(crate) fn creation_date(&mut self, date: Option<String>) -> &mut Self {
        self.creation_date = date;
        self
    }

    /// Append a step label.
    pub(crate) fn record(&mut self, step: impl Into<String>) -> &mut Self {
        self.steps.push(step.into());
        self
    }

    /// Append a step label unless it is already present.
    pub(crate) fn record_once(&mut self, step: &str) -> &mut Self {
        if !self.steps.iter().any(|s| s == step) {
            self.steps.push(step.to_string());
        }
        self
    }

    /// Set the inclusive, 1-indexed page window that was actually processed.
    pub(crate) fn page_window(&mut self, start: usize, end: usize) -> &mut Self {
        self.window = Some((start, end));
        self
    }

    pub(crate) fn build(self) -> DocumentMetadata {
        let (start, end, count) = match self.window {
            Some((s, e)) => (Some(s), Some(e), Some(e + 1 - s)),
            None => (None, None, None),
        };
        DocumentMetadata {
            document_type: self.document_type,
            file_format: self.file_format,
            page_count: self.page_count,
            estimated_quality: self.estimated_quality,
            creation_date: self.creation_date,
            preprocessing_applied: self.steps,
            pages_processed_start: start,
            pages_processed_end: end,
            pages_processed_count: count,
        }
    }
}

// ── Intermediate record ──────────────────────────────────────────────────

/// Format-specific structured record, tagged by `document_type` when
/// serialised so downstream consumers can branch on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "document_type", rename_all = "lowercase")]
pub enum Intermediate {
    Pdf(PdfIntermediate),
    Excel(SpreadsheetIntermediate),
    Image(ImageIntermediate),
}

impl Intermediate {
    pub fn as_pdf(&self) -> Option<&PdfIntermediate> {
        match self {
            Intermediate::Pdf(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_spreadsheet(&self) -> Option<&SpreadsheetIntermediate> {
        match self {
            Intermediate::Excel(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageIntermediate> {
        match self {
            Intermediate::Image(i) => Some(i),
            _ => None,
        }
    }
}

/// How a page's content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Text,
    Ocr,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Text => "text",
            ExtractionMethod::Ocr => "ocr",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfIntermediate {
    pub total_pages: usize,
    pub pages_processed_start: usize,
    pub pages_processed_end: usize,
    pub pages_processed_count: usize,
    pub text_based_pages: usize,
    pub image_based_pages: usize,
    pub failed_pages: usize,
    pub quality_score: f64,
    /// One record per processed page, in page order.
    pub pages: Vec<PageRecord>,
    /// Raw concatenated text before cleaning.
    pub full_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-indexed.
    pub page_number: usize,
    pub extraction_method: ExtractionMethod,
    /// Page text, or [`OCR_FAILED_MARKER`] when OCR failed.
    pub content: String,
    pub tables: Vec<TableRecord>,
    pub images: Vec<EmbeddedImage>,
    /// Text-plausibility score of the OCR output (OCR pages only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_quality: Option<f64>,
    /// OCR output scored below the configured confidence threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_confidence: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<UnitError>,
}

impl PageRecord {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// An image object embedded in a PDF page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedImage {
    /// 1-based position among the page's image objects.
    pub index: usize,
}

/// A table recovered from a text page.
///
/// A successfully parsed table carries `data` and `summary`; a table whose
/// parsing failed keeps its `raw` cell grid and a `processing_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRecord {
    pub table_id: usize,
    pub rows: usize,
    pub columns: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<FrameSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
}

// ── Tabular summaries ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Missing cells as a percentage of all cells.
    pub null_percentage: f64,
    pub duplicate_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub data_type: String,
    pub null_count: usize,
    pub unique_values: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ColumnSummary {
    /// Minimal record kept when statistics for a column could not be computed.
    pub fn degraded(error: &UnitError) -> Self {
        Self {
            data_type: "unknown".into(),
            null_count: 0,
            unique_values: 0,
            min: None,
            max: None,
            mean: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub shape: Shape,
    pub column_info: BTreeMap<String, ColumnSummary>,
    pub data_quality: DataQuality,
}

// ── Spreadsheet ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetIntermediate {
    pub total_sheets: usize,
    pub sheets: Vec<SheetRecord>,
    pub full_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetRecord {
    pub sheet_name: String,
    /// Post-cleaning row count.
    pub rows: usize,
    /// Post-cleaning column count.
    pub columns: usize,
    pub column_names: Vec<String>,
    pub data_types: BTreeMap<String, String>,
    pub sample_data: Vec<Map<String, Value>>,
    pub summary: FrameSummary,
}

// ── Image ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageIntermediate {
    pub image_properties: ImageProperties,
    pub layout_detection: LayoutInfo,
    pub ocr_confidence: f64,
    pub extracted_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_error: Option<UnitError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProperties {
    pub width: u32,
    pub height: u32,
    /// PIL-style colour mode (`L`, `LA`, `RGB`, `RGBA`, `I;16`, `F`).
    pub mode: String,
    pub format: Option<String>,
    pub aspect_ratio: f64,
    /// Declared (x, y) resolution; 72x72 when the file does not say.
    pub estimated_dpi: (u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutType {
    SingleColumn,
    MultiColumn,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub detected_regions: usize,
    pub layout_type: LayoutType,
    pub estimated_text_blocks: usize,
    pub vision_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_error: Option<String>,
}

impl LayoutInfo {
    /// Result reported when no region analysis is possible.
    pub fn unknown(vision_available: bool) -> Self {
        Self {
            detected_regions: 1,
            layout_type: LayoutType::Unknown,
            estimated_text_blocks: 1,
            vision_available,
            detection_error: None,
        }
    }
}

// ── Final output ─────────────────────────────────────────────────────────

/// Result of one preprocessing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessOutput {
    /// Cleaned, marker-delimited text.
    pub text: String,
    pub metadata: DocumentMetadata,
    pub intermediate: Intermediate,
}

impl PreprocessOutput {
    pub fn into_parts(self) -> (String, DocumentMetadata, Intermediate) {
        (self.text, self.metadata, self.intermediate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_derives_window_count() {
        let mut b = MetadataBuilder::new(DocumentType::Pdf, ".pdf");
        b.page_count(10).page_window(4, 7);
        let m = b.build();
        assert_eq!(m.pages_processed_start, Some(4));
        assert_eq!(m.pages_processed_end, Some(7));
        assert_eq!(m.pages_processed_count, Some(4));
        assert_eq!(m.page_count, 10);
    }

    #[test]
    fn builder_without_window_leaves_fields_empty() {
        let m = MetadataBuilder::new(DocumentType::Image, ".png").build();
        assert_eq!(m.pages_processed_start, None);
        assert_eq!(m.pages_processed_count, None);
    }

    #[test]
    fn builder_clamps_quality() {
        let mut b = MetadataBuilder::new(DocumentType::Image, ".png");
        b.quality(1.7);
        assert_eq!(b.build().estimated_quality, 1.0);

        let mut b = MetadataBuilder::new(DocumentType::Image, ".png");
        b.quality(f64::NAN);
        assert_eq!(b.build().estimated_quality, 0.0);
    }

    #[test]
    fn record_once_deduplicates() {
        let mut b = MetadataBuilder::new(DocumentType::Pdf, ".pdf");
        b.record_once("sharpen").record_once("sharpen").record("ocr_enhancement_page_2");
        assert_eq!(
            b.build().preprocessing_applied,
            vec!["sharpen", "ocr_enhancement_page_2"]
        );
    }

    #[test]
    fn intermediate_is_tagged_by_document_type() {
        let inter = Intermediate::Excel(SpreadsheetIntermediate {
            total_sheets: 0,
            sheets: vec![],
            full_text: String::new(),
        });
        let v = serde_json::to_value(&inter).unwrap();
        assert_eq!(v["document_type"], "excel");
        assert_eq!(v["total_sheets"], 0);
    }

    #[test]
    fn layout_type_serialises_snake_case() {
        let v = serde_json::to_value(LayoutType::MultiColumn).unwrap();
        assert_eq!(v, "multi_column");
    }
}
