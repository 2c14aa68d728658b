//! PDF extractor: direct text where a page has it, OCR where it does not.
//!
//! ## Per-page decision
//!
//! ```text
//! page_content(n) ──▶ text non-empty? ──yes──▶ text page + table recovery
//!                          │
//!                          no
//!                          ▼
//!          render_page(n, dpi) ▶ enhance ▶ recognize ──▶ OCR page
//!                                                   └─(any failure)─▶ [OCR_FAILED]
//! ```
//!
//! Structural failures (cannot open, page window, unreadable page text)
//! abort the document. Rendering and OCR failures are local to their page:
//! the page is kept with the failure marker and a [`UnitError`], and the
//! loop moves on.
//!
//! The document reader sits behind [`PdfBackend`] / [`PdfSource`] so the
//! extractor can run against [`crate::pipeline::pdfium::PdfiumBackend`] or an
//! in-memory fake.

use crate::config::PreprocessConfig;
use crate::error::{PreprocessError, UnitError};
use crate::output::{
    EmbeddedImage, ExtractionMethod, Intermediate, MetadataBuilder, PageRecord, PdfIntermediate,
    OCR_FAILED_MARKER,
};
use crate::pipeline::enhance::ImageEnhancer;
use crate::pipeline::input::resolve_page_window;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::quality::estimate_quality;
use crate::pipeline::table::{detect_tables, process_tables};
use crate::pipeline::Extraction;
use crate::progress::Progress;
use image::DynamicImage;
use tracing::{debug, info, warn};

pub use crate::pipeline::table::LayoutLine;

// ── Backend seam ─────────────────────────────────────────────────────────

/// Opens PDF bytes into a [`PdfSource`].
pub trait PdfBackend: Send + Sync {
    /// Parse `content`. Encrypted files fail with
    /// [`PreprocessError::PasswordRequired`], unreadable ones with
    /// [`PreprocessError::CorruptDocument`].
    fn open<'a>(&'a self, content: &'a [u8]) -> Result<Box<dyn PdfSource + 'a>, PreprocessError>;

    fn backend_name(&self) -> &str;
}

/// An opened PDF. Page numbers are 1-based.
pub trait PdfSource {
    fn page_count(&self) -> usize;

    /// `CreationDate` from the document info dictionary, if present.
    fn creation_date(&self) -> Option<String> {
        None
    }

    fn page_content(&self, page: usize) -> Result<PageContent, PreprocessError>;

    /// Rasterise a page at `dpi`.
    fn render_page(&self, page: usize, dpi: u32) -> Result<DynamicImage, PreprocessError>;
}

/// Everything the extractor needs from one page without rendering it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    /// Plain text in reading order.
    pub text: String,
    /// Visual rows split into cells, used for table recovery.
    pub lines: Vec<LayoutLine>,
    pub image_count: usize,
}

impl PageContent {
    /// Page content whose layout lines are derived from the text itself.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = text.lines().map(LayoutLine::from_aligned_text).collect();
        Self {
            text,
            lines,
            image_count: 0,
        }
    }
}

// ── Extractor ────────────────────────────────────────────────────────────

pub(crate) struct PdfExtractor<'a> {
    pub config: &'a PreprocessConfig,
    pub backend: &'a dyn PdfBackend,
    pub enhancer: &'a dyn ImageEnhancer,
    pub ocr: &'a dyn OcrEngine,
}

/// A successful OCR pass over one page.
struct OcrPage {
    text: String,
    steps: Vec<&'static str>,
}

impl PdfExtractor<'_> {
    pub fn extract(
        &self,
        content: &[u8],
        filename: &str,
        meta: &mut MetadataBuilder,
        page_start: Option<usize>,
        page_end: Option<usize>,
    ) -> Result<Extraction, PreprocessError> {
        let document = self.backend.open(content)?;
        let total_pages = document.page_count();
        meta.page_count(total_pages)
            .creation_date(document.creation_date());

        let (start, end) = resolve_page_window(total_pages, page_start, page_end)?;
        let count = end - start + 1;
        meta.page_window(start, end);
        info!(
            "PDF '{}': {} pages, processing {}-{} via {}",
            filename,
            total_pages,
            start,
            end,
            self.backend.backend_name()
        );

        let mut progress = Progress::start(self.config, filename, count);

        let mut pages = Vec::with_capacity(count);
        let mut full_text = String::new();
        let (mut text_pages, mut ocr_pages, mut failed_pages) = (0usize, 0usize, 0usize);

        for (i, page_number) in (start..=end).enumerate() {
            let unit = i + 1;
            let page = document.page_content(page_number)?;
            let images = (1..=page.image_count)
                .map(|index| EmbeddedImage { index })
                .collect();

            if !page.text.trim().is_empty() {
                text_pages += 1;
                let tables = if self.config.pdf.extract_tables {
                    let grids = detect_tables(&page.lines);
                    if grids.is_empty() {
                        Vec::new()
                    } else {
                        debug!("Page {}: {} table(s) detected", page_number, grids.len());
                        meta.record(format!("table_extraction_page_{}", page_number));
                        process_tables(page_number, grids)
                    }
                } else {
                    Vec::new()
                };

                full_text.push_str(&format!("\n--- Page {} ---\n{}\n", page_number, page.text));
                progress.extracted(unit, page.text.len());
                pages.push(PageRecord {
                    page_number,
                    extraction_method: ExtractionMethod::Text,
                    content: page.text,
                    tables,
                    images,
                    ocr_quality: None,
                    low_confidence: None,
                    error: None,
                });
                continue;
            }

            ocr_pages += 1;
            match self.ocr_page(document.as_ref(), page_number) {
                Ok(ocr) => {
                    for step in &ocr.steps {
                        meta.record_once(step);
                    }
                    meta.record(format!("ocr_enhancement_page_{}", page_number));

                    let score = estimate_quality(&ocr.text);
                    let low_confidence = score < self.config.ocr.confidence_threshold;
                    if low_confidence {
                        debug!("Page {}: low OCR confidence ({:.2})", page_number, score);
                    }
                    full_text.push_str(&format!("\n--- Page {} (OCR) ---\n{}\n", page_number, ocr.text));
                    progress.extracted(unit, ocr.text.len());
                    pages.push(PageRecord {
                        page_number,
                        extraction_method: ExtractionMethod::Ocr,
                        content: ocr.text,
                        tables: Vec::new(),
                        images,
                        ocr_quality: Some(score),
                        low_confidence: Some(low_confidence),
                        error: None,
                    });
                }
                Err(err) => {
                    warn!("{}", err);
                    failed_pages += 1;
                    progress.failed(unit, &err.to_string());
                    pages.push(PageRecord {
                        page_number,
                        extraction_method: ExtractionMethod::Ocr,
                        content: OCR_FAILED_MARKER.to_string(),
                        tables: Vec::new(),
                        images,
                        ocr_quality: None,
                        low_confidence: None,
                        error: Some(err),
                    });
                }
            }
        }

        let quality = if count == 0 {
            0.0
        } else {
            text_pages as f64 / count as f64
        };
        meta.quality(quality);
        progress.finish();
        info!(
            "PDF processed: {} text, {} OCR ({} failed), quality {:.2}",
            text_pages, ocr_pages, failed_pages, quality
        );

        Ok(Extraction {
            text: full_text.clone(),
            intermediate: Intermediate::Pdf(PdfIntermediate {
                total_pages,
                pages_processed_start: start,
                pages_processed_end: end,
                pages_processed_count: count,
                text_based_pages: text_pages,
                image_based_pages: ocr_pages,
                failed_pages,
                quality_score: quality,
                pages,
                full_text,
            }),
        })
    }

    /// Render, enhance and recognise one page. Every failure is a [`UnitError`].
    fn ocr_page(&self, document: &dyn PdfSource, page: usize) -> Result<OcrPage, UnitError> {
        let failed = |detail: String| UnitError::OcrFailed { page, detail };

        let raster = document
            .render_page(page, self.config.pdf.render_dpi)
            .map_err(|e| failed(e.to_string()))?;
        let enhanced = self.enhancer.enhance(&raster);
        let text = self
            .ocr
            .recognize(&enhanced.image)
            .map_err(|e| failed(e.to_string()))?;

        Ok(OcrPage {
            text,
            steps: enhanced.steps,
        })
    }
}
