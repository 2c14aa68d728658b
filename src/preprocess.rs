//! The document preprocessor: classify, dispatch, clean.
//!
//! [`DocumentPreprocessor`] owns the three pluggable collaborators (PDF
//! backend, OCR engine, image enhancer) and a [`PreprocessConfig`]. Each
//! [`DocumentPreprocessor::preprocess`] call is independent: metadata and the
//! intermediate record are built fresh inside the call and nothing is shared
//! between documents, so one preprocessor can serve many threads.

use crate::config::PreprocessConfig;
use crate::error::PreprocessError;
use crate::output::{DocumentType, MetadataBuilder, PreprocessOutput};
use crate::pipeline::enhance::{select_enhancer, ImageEnhancer};
use crate::pipeline::image::ImageExtractor;
use crate::pipeline::input::classify_input;
use crate::pipeline::ocr::{OcrEngine, TesseractOcr};
use crate::pipeline::pdf::{PdfBackend, PdfExtractor};
use crate::pipeline::pdfium::PdfiumBackend;
use crate::pipeline::postprocess::clean_text;
use crate::pipeline::spreadsheet::SpreadsheetExtractor;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Turns document bytes into cleaned text, metadata and an intermediate record.
///
/// ```rust,no_run
/// use docprep::DocumentPreprocessor;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let preprocessor = DocumentPreprocessor::new(Default::default());
/// let bytes = std::fs::read("invoice.pdf")?;
/// let output = preprocessor.preprocess(&bytes, "invoice.pdf", None, None)?;
/// println!("{} ({:.2})", output.metadata.document_type, output.metadata.estimated_quality);
/// # Ok(())
/// # }
/// ```
pub struct DocumentPreprocessor {
    config: PreprocessConfig,
    pdf_backend: Box<dyn PdfBackend>,
    ocr: Box<dyn OcrEngine>,
    enhancer: Box<dyn ImageEnhancer>,
}

impl std::fmt::Debug for DocumentPreprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentPreprocessor")
            .field("config", &self.config)
            .field("pdf_backend", &self.pdf_backend.backend_name())
            .field("ocr", &self.ocr.engine_name())
            .field("enhancer", &self.enhancer.pipeline_name())
            .finish()
    }
}

impl DocumentPreprocessor {
    /// Preprocessor with the default collaborators: pdfium, tesseract and the
    /// enhancer chosen by [`select_enhancer`].
    pub fn new(config: PreprocessConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> DocumentPreprocessorBuilder {
        DocumentPreprocessorBuilder::default()
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Name of the active enhancement pipeline (`"baseline"` or `"vision"`).
    pub fn enhancer_name(&self) -> &str {
        self.enhancer.pipeline_name()
    }

    /// Preprocess one document held in memory.
    ///
    /// `page_start`/`page_end` (1-indexed, inclusive) only apply to PDFs and
    /// are ignored for other formats.
    ///
    /// # Errors
    /// Only fatal problems are returned: unsupported extension, oversize
    /// file, unreadable document, invalid page window. Per-page OCR and
    /// per-table failures are recorded inside the intermediate record.
    pub fn preprocess(
        &self,
        content: &[u8],
        filename: &str,
        page_start: Option<usize>,
        page_end: Option<usize>,
    ) -> Result<PreprocessOutput, PreprocessError> {
        let started = Instant::now();
        let input = classify_input(&self.config.formats, filename, content.len())?;
        let document_type = input.document_type();
        info!("Preprocessing '{}' as {} ({} bytes)", filename, document_type, content.len());

        let mut meta = MetadataBuilder::new(document_type, input.extension.clone());

        // ── Dispatch ─────────────────────────────────────────────────────
        let extraction = match document_type {
            DocumentType::Pdf => PdfExtractor {
                config: &self.config,
                backend: self.pdf_backend.as_ref(),
                enhancer: self.enhancer.as_ref(),
                ocr: self.ocr.as_ref(),
            }
            .extract(content, filename, &mut meta, page_start, page_end)?,
            DocumentType::Excel => SpreadsheetExtractor { config: &self.config }.extract(
                content,
                filename,
                &input.extension,
                &mut meta,
            )?,
            DocumentType::Image => ImageExtractor {
                config: &self.config,
                enhancer: self.enhancer.as_ref(),
                ocr: self.ocr.as_ref(),
            }
            .extract(content, filename, &mut meta)?,
            DocumentType::Unknown => {
                return Err(PreprocessError::UnsupportedFormat {
                    filename: filename.to_string(),
                    extension: input.extension,
                })
            }
        };

        // ── Text cleaning ────────────────────────────────────────────────
        let text = clean_text(&extraction.text);
        meta.record("text_cleaning");
        debug!(
            "Cleaned text: {} → {} chars",
            extraction.text.len(),
            text.len()
        );

        let metadata = meta.build();
        info!(
            "Preprocessed '{}' in {}ms: {} unit(s), quality {:.2}",
            filename,
            started.elapsed().as_millis(),
            metadata.page_count,
            metadata.estimated_quality
        );

        Ok(PreprocessOutput {
            text,
            metadata,
            intermediate: extraction.intermediate,
        })
    }

    /// Read `path` and preprocess it, using its file name for format detection.
    pub fn preprocess_path(
        &self,
        path: impl AsRef<Path>,
        page_start: Option<usize>,
        page_end: Option<usize>,
    ) -> Result<PreprocessOutput, PreprocessError> {
        let path = path.as_ref();
        let content = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        self.preprocess(&content, &filename, page_start, page_end)
    }
}

/// Builder for [`DocumentPreprocessor`]. Collaborators left unset get the
/// defaults derived from the config at [`DocumentPreprocessorBuilder::build`].
#[derive(Default)]
pub struct DocumentPreprocessorBuilder {
    config: PreprocessConfig,
    pdf_backend: Option<Box<dyn PdfBackend>>,
    ocr: Option<Box<dyn OcrEngine>>,
    enhancer: Option<Box<dyn ImageEnhancer>>,
}

impl DocumentPreprocessorBuilder {
    pub fn config(mut self, config: PreprocessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pdf_backend(mut self, backend: Box<dyn PdfBackend>) -> Self {
        self.pdf_backend = Some(backend);
        self
    }

    pub fn ocr_engine(mut self, engine: Box<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn enhancer(mut self, enhancer: Box<dyn ImageEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn build(self) -> DocumentPreprocessor {
        let config = self.config;
        let pdf_backend = self
            .pdf_backend
            .unwrap_or_else(|| Box::new(PdfiumBackend::new(config.pdf.snap_tolerance)));
        let ocr = self
            .ocr
            .unwrap_or_else(|| Box::new(TesseractOcr::new(config.ocr.clone())));
        let enhancer = self
            .enhancer
            .unwrap_or_else(|| select_enhancer(&config.enhancement));
        debug!(
            "Preprocessor ready: pdf={}, ocr={}, enhancer={}",
            pdf_backend.backend_name(),
            ocr.engine_name(),
            enhancer.pipeline_name()
        );
        DocumentPreprocessor {
            config,
            pdf_backend,
            ocr,
            enhancer,
        }
    }
}
