//! Configuration and static policy for document preprocessing.
//!
//! All tunables live in [`PreprocessConfig`], built via its
//! [`PreprocessConfigBuilder`]. The defaults reproduce the production policy
//! tables: supported formats and their size limits, OCR engine parameters,
//! image-enhancement knobs and the quality-label thresholds.
//!
//! A config is handed to [`crate::DocumentPreprocessor`] once and never
//! mutated afterwards, so the same preprocessor can serve any number of
//! documents without cross-call state.

use crate::error::PreprocessError;
use crate::output::DocumentType;
use crate::progress::PreprocessProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a preprocessing run.
///
/// Built via [`PreprocessConfig::builder()`] or using
/// [`PreprocessConfig::default()`].
///
/// # Example
/// ```rust
/// use docprep::PreprocessConfig;
///
/// let config = PreprocessConfig::builder()
///     .render_dpi(200)
///     .ocr_language("eng+deu")
///     .vision(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.pdf.render_dpi, 200);
/// ```
#[derive(Clone, Default)]
pub struct PreprocessConfig {
    /// Extension → document type table with per-type limits.
    pub formats: FormatTable,
    pub ocr: OcrSettings,
    pub enhancement: EnhancementSettings,
    pub pdf: PdfSettings,
    pub spreadsheet: SpreadsheetSettings,
    pub quality: QualityThresholds,
    /// Optional observer notified as units (pages, sheets) are processed.
    pub progress_callback: Option<Arc<dyn PreprocessProgressCallback>>,
}

impl fmt::Debug for PreprocessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreprocessConfig")
            .field("formats", &self.formats)
            .field("ocr", &self.ocr)
            .field("enhancement", &self.enhancement)
            .field("pdf", &self.pdf)
            .field("spreadsheet", &self.spreadsheet)
            .field("quality", &self.quality)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PreprocessProgressCallback>"),
            )
            .finish()
    }
}

impl PreprocessConfig {
    /// Create a new builder for `PreprocessConfig`.
    pub fn builder() -> PreprocessConfigBuilder {
        PreprocessConfigBuilder {
            config: Self::default(),
        }
    }
}

// ── Format table ─────────────────────────────────────────────────────────

/// Policy for one document family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatPolicy {
    pub document_type: DocumentType,
    /// Lower-case extensions including the leading dot.
    pub extensions: Vec<String>,
    pub max_size_mb: u64,
    /// Nominal pipeline steps, for display and documentation.
    pub pipeline: Vec<String>,
}

impl FormatPolicy {
    pub fn max_size_bytes(&self) -> usize {
        (self.max_size_mb as usize).saturating_mul(1024 * 1024)
    }
}

/// Static extension → type table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatTable {
    policies: Vec<FormatPolicy>,
}

impl Default for FormatTable {
    fn default() -> Self {
        fn strings(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            policies: vec![
                FormatPolicy {
                    document_type: DocumentType::Pdf,
                    extensions: strings(&[".pdf"]),
                    max_size_mb: 50,
                    pipeline: strings(&["text_extraction", "table_extraction", "ocr_fallback"]),
                },
                FormatPolicy {
                    document_type: DocumentType::Excel,
                    extensions: strings(&[".xlsx", ".xls", ".csv"]),
                    max_size_mb: 25,
                    pipeline: strings(&["dataframe_processing", "data_cleaning", "type_inference"]),
                },
                FormatPolicy {
                    document_type: DocumentType::Image,
                    extensions: strings(&[".png", ".jpg", ".jpeg", ".tiff", ".bmp"]),
                    max_size_mb: 20,
                    pipeline: strings(&["image_enhancement", "ocr_extraction", "layout_detection"]),
                },
            ],
        }
    }
}

impl FormatTable {
    /// Policy whose extension list contains `extension` (lower-case, with dot).
    pub fn lookup(&self, extension: &str) -> Option<&FormatPolicy> {
        self.policies
            .iter()
            .find(|p| p.extensions.iter().any(|e| e == extension))
    }

    pub fn policy(&self, document_type: DocumentType) -> Option<&FormatPolicy> {
        self.policies.iter().find(|p| p.document_type == document_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormatPolicy> {
        self.policies.iter()
    }

    fn set_max_size_mb(&mut self, document_type: DocumentType, mb: u64) {
        if let Some(p) = self
            .policies
            .iter_mut()
            .find(|p| p.document_type == document_type)
        {
            p.max_size_mb = mb;
        }
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// Parameters passed to the OCR engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Tesseract language code(s), e.g. `eng` or `eng+fra`. Default: `eng`.
    pub language: String,
    /// Resolution hint handed to the engine. Default: 300.
    pub dpi: u32,
    /// Tesseract `--oem`. Default: 3 (default engine).
    pub engine_mode: u8,
    /// Tesseract `--psm`. Default: 6 (single uniform block of text).
    pub page_segmentation_mode: u8,
    /// OCR pages scoring below this are flagged `low_confidence`. Default: 0.5.
    pub confidence_threshold: f64,
    /// Executable name or path. Default: `tesseract`.
    pub tesseract_path: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "eng".into(),
            dpi: 300,
            engine_mode: 3,
            page_segmentation_mode: 6,
            confidence_threshold: 0.5,
            tesseract_path: "tesseract".into(),
        }
    }
}

// ── Image enhancement ────────────────────────────────────────────────────

/// Knobs for the image enhancement engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementSettings {
    /// Use the extended vision pipeline when it is compiled in. Default: true.
    pub enable_vision: bool,
    pub enable_sharpening: bool,
    pub enable_contrast_enhancement: bool,
    pub enable_denoising: bool,
    pub enable_deskewing: bool,
    /// CLAHE clip limit. Default: 2.0.
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid (columns, rows). Default: 8x8.
    pub clahe_tile_grid: (u32, u32),
    /// Denoise kernel size (odd). Default: 3.
    pub blur_kernel: u32,
    /// Global contrast multiplier around the mean grey level. Default: 1.2.
    pub contrast_multiplier: f32,
    /// Global brightness multiplier. Default: 1.1.
    pub brightness_multiplier: f32,
    /// Only rotate when the median detected skew exceeds this. Default: 0.5°.
    pub deskew_threshold_degrees: f32,
    /// Minimum Hough votes for a line to count. Default: 100.
    pub hough_vote_threshold: u32,
}

impl Default for EnhancementSettings {
    fn default() -> Self {
        Self {
            enable_vision: true,
            enable_sharpening: true,
            enable_contrast_enhancement: true,
            enable_denoising: true,
            enable_deskewing: true,
            clahe_clip_limit: 2.0,
            clahe_tile_grid: (8, 8),
            blur_kernel: 3,
            contrast_multiplier: 1.2,
            brightness_multiplier: 1.1,
            deskew_threshold_degrees: 0.5,
            hough_vote_threshold: 100,
        }
    }
}

// ── PDF ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfSettings {
    /// Detect and parse tables on text pages. Default: true.
    pub extract_tables: bool,
    /// Resolution for rasterising pages that need OCR. Range 72–600. Default: 300.
    pub render_dpi: u32,
    /// Vertical distance (points) within which glyphs share a layout row. Default: 3.0.
    pub snap_tolerance: f32,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            extract_tables: true,
            render_dpi: 300,
            snap_tolerance: 3.0,
        }
    }
}

// ── Spreadsheet ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetSettings {
    /// Rows copied into each sheet's `sample_data`. Default: 5.
    pub sample_rows: usize,
    /// Cap on rows in the text dump (head and tail halves). Default: None (all rows).
    pub max_rows_preview: Option<usize>,
}

impl Default for SpreadsheetSettings {
    fn default() -> Self {
        Self {
            sample_rows: 5,
            max_rows_preview: None,
        }
    }
}

// ── Quality labels ───────────────────────────────────────────────────────

/// Lower bounds for each quality label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            excellent: 0.9,
            good: 0.7,
            fair: 0.5,
            poor: 0.3,
        }
    }
}

impl QualityThresholds {
    pub fn label(&self, score: f64) -> QualityLabel {
        if score >= self.excellent {
            QualityLabel::Excellent
        } else if score >= self.good {
            QualityLabel::Good
        } else if score >= self.fair {
            QualityLabel::Fair
        } else if score >= self.poor {
            QualityLabel::Poor
        } else {
            QualityLabel::VeryPoor
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityLabel::Excellent => "excellent",
            QualityLabel::Good => "good",
            QualityLabel::Fair => "fair",
            QualityLabel::Poor => "poor",
            QualityLabel::VeryPoor => "very_poor",
        })
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Builder for [`PreprocessConfig`].
#[derive(Debug)]
pub struct PreprocessConfigBuilder {
    config: PreprocessConfig,
}

impl PreprocessConfigBuilder {
    /// Page rasterisation resolution, also passed to the OCR engine.
    pub fn render_dpi(mut self, dpi: u32) -> Self {
        let dpi = dpi.clamp(72, 600);
        self.config.pdf.render_dpi = dpi;
        self.config.ocr.dpi = dpi;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr.language = lang.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<String>) -> Self {
        self.config.ocr.tesseract_path = path.into();
        self
    }

    pub fn ocr_confidence_threshold(mut self, t: f64) -> Self {
        self.config.ocr.confidence_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn page_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.ocr.page_segmentation_mode = psm.min(13);
        self
    }

    pub fn vision(mut self, enabled: bool) -> Self {
        self.config.enhancement.enable_vision = enabled;
        self
    }

    pub fn deskew(mut self, enabled: bool) -> Self {
        self.config.enhancement.enable_deskewing = enabled;
        self
    }

    pub fn denoise(mut self, enabled: bool) -> Self {
        self.config.enhancement.enable_denoising = enabled;
        self
    }

    pub fn clahe_clip_limit(mut self, limit: f32) -> Self {
        self.config.enhancement.clahe_clip_limit = limit;
        self
    }

    pub fn contrast_multiplier(mut self, m: f32) -> Self {
        self.config.enhancement.contrast_multiplier = m;
        self
    }

    pub fn brightness_multiplier(mut self, m: f32) -> Self {
        self.config.enhancement.brightness_multiplier = m;
        self
    }

    pub fn extract_tables(mut self, v: bool) -> Self {
        self.config.pdf.extract_tables = v;
        self
    }

    pub fn sample_rows(mut self, n: usize) -> Self {
        self.config.spreadsheet.sample_rows = n;
        self
    }

    pub fn max_rows_preview(mut self, n: Option<usize>) -> Self {
        self.config.spreadsheet.max_rows_preview = n.map(|n| n.max(2));
        self
    }

    pub fn max_size_mb(mut self, document_type: DocumentType, mb: u64) -> Self {
        self.config.formats.set_max_size_mb(document_type, mb);
        self
    }

    pub fn quality_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.config.quality = thresholds;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn PreprocessProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PreprocessConfig, PreprocessError> {
        let c = &self.config;
        if c.pdf.render_dpi < 72 || c.pdf.render_dpi > 600 {
            return Err(PreprocessError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.pdf.render_dpi
            )));
        }
        if c.ocr.language.trim().is_empty() {
            return Err(PreprocessError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        let e = &c.enhancement;
        if e.contrast_multiplier <= 0.0 || e.brightness_multiplier <= 0.0 {
            return Err(PreprocessError::InvalidConfig(
                "Contrast and brightness multipliers must be > 0".into(),
            ));
        }
        if e.clahe_clip_limit < 1.0 {
            return Err(PreprocessError::InvalidConfig(format!(
                "CLAHE clip limit must be ≥ 1.0, got {}",
                e.clahe_clip_limit
            )));
        }
        if e.clahe_tile_grid.0 == 0 || e.clahe_tile_grid.1 == 0 {
            return Err(PreprocessError::InvalidConfig(
                "CLAHE tile grid must be at least 1x1".into(),
            ));
        }
        if e.blur_kernel == 0 || e.blur_kernel % 2 == 0 {
            return Err(PreprocessError::InvalidConfig(format!(
                "Blur kernel must be odd, got {}",
                e.blur_kernel
            )));
        }
        let q = &c.quality;
        let ordered = q.excellent >= q.good && q.good >= q.fair && q.fair >= q.poor;
        let in_range = [q.excellent, q.good, q.fair, q.poor]
            .iter()
            .all(|t| (0.0..=1.0).contains(t));
        if !ordered || !in_range {
            return Err(PreprocessError::InvalidConfig(
                "Quality thresholds must lie in [0, 1] and descend excellent → poor".into(),
            ));
        }
        Ok(self.config)
    }
}
