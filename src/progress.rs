//! Per-unit progress reporting.
//!
//! Extractors walk a document unit by unit: pages of a PDF, sheets of a
//! workbook, the single frame of an image. Each unit is reported to the
//! observer set with [`crate::config::PreprocessConfigBuilder::progress_callback`],
//! if any.

use crate::config::PreprocessConfig;

/// What happened to one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome<'a> {
    /// Text was produced; `text_len` is its byte length before cleaning.
    Extracted { text_len: usize },
    /// The unit failed without aborting the document (OCR error on a page).
    Failed { error: &'a str },
}

/// Observer of extraction progress.
///
/// Units are reported in order from one thread, but a single observer may be
/// shared by preprocessors running on several threads.
pub trait PreprocessProgressCallback: Send + Sync {
    fn on_document_start(&self, filename: &str, total_units: usize) {
        let _ = (filename, total_units);
    }

    /// `unit` is the 1-indexed position within the processed window.
    fn on_unit(&self, unit: usize, total_units: usize, outcome: UnitOutcome<'_>);

    fn on_document_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// Forwards extractor events to the configured observer and counts successes.
pub(crate) struct Progress<'a> {
    observer: Option<&'a dyn PreprocessProgressCallback>,
    total: usize,
    succeeded: usize,
}

impl<'a> Progress<'a> {
    pub fn start(config: &'a PreprocessConfig, filename: &str, total: usize) -> Self {
        let observer = config.progress_callback.as_deref();
        if let Some(o) = observer {
            o.on_document_start(filename, total);
        }
        Self {
            observer,
            total,
            succeeded: 0,
        }
    }

    pub fn extracted(&mut self, unit: usize, text_len: usize) {
        self.succeeded += 1;
        self.emit(unit, UnitOutcome::Extracted { text_len });
    }

    pub fn failed(&mut self, unit: usize, error: &str) {
        self.emit(unit, UnitOutcome::Failed { error });
    }

    pub fn finish(self) {
        if let Some(o) = self.observer {
            o.on_document_complete(self.total, self.succeeded);
        }
    }

    fn emit(&self, unit: usize, outcome: UnitOutcome<'_>) {
        if let Some(o) = self.observer {
            o.on_unit(unit, self.total, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnhancementSettings;
    use crate::error::OcrError;
    use crate::pipeline::enhance::BaselineEnhancer;
    use crate::pipeline::ocr::OcrEngine;
    use crate::preprocess::DocumentPreprocessor;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// Records every event as a compact string.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl PreprocessProgressCallback for Recorder {
        fn on_document_start(&self, filename: &str, total_units: usize) {
            self.push(format!("start {filename} {total_units}"));
        }

        fn on_unit(&self, unit: usize, total_units: usize, outcome: UnitOutcome<'_>) {
            match outcome {
                UnitOutcome::Extracted { .. } => self.push(format!("ok {unit}/{total_units}")),
                UnitOutcome::Failed { .. } => self.push(format!("failed {unit}/{total_units}")),
            }
        }

        fn on_document_complete(&self, total_units: usize, success_count: usize) {
            self.push(format!("done {success_count}/{total_units}"));
        }
    }

    struct BrokenOcr;

    impl OcrEngine for BrokenOcr {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            Err(OcrError::EngineFailed {
                code: 1,
                stderr: "no language data".into(),
            })
        }

        fn engine_name(&self) -> &str {
            "broken"
        }
    }

    fn preprocessor(recorder: Arc<Recorder>) -> DocumentPreprocessor {
        let config = PreprocessConfig::builder()
            .progress_callback(recorder)
            .build()
            .unwrap();
        DocumentPreprocessor::builder()
            .config(config)
            .ocr_engine(Box::new(BrokenOcr))
            .enhancer(Box::new(BaselineEnhancer::new(EnhancementSettings::default())))
            .build()
    }

    #[test]
    fn csv_reports_one_sheet() {
        let recorder = Arc::new(Recorder::default());
        let pre = preprocessor(recorder.clone());
        pre.preprocess(b"a,b\n1,2\n", "parts.csv", None, None).unwrap();
        assert_eq!(
            recorder.take(),
            vec!["start parts.csv 1", "ok 1/1", "done 1/1"]
        );
    }

    #[test]
    fn image_ocr_failure_is_reported_not_counted() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([255, 255, 255])));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();

        let recorder = Arc::new(Recorder::default());
        let pre = preprocessor(recorder.clone());
        pre.preprocess(&png, "receipt.png", None, None).unwrap();
        assert_eq!(
            recorder.take(),
            vec!["start receipt.png 1", "failed 1/1", "done 0/1"]
        );
    }

    #[test]
    fn unsupported_format_emits_nothing() {
        let recorder = Arc::new(Recorder::default());
        let pre = preprocessor(recorder.clone());
        assert!(pre.preprocess(b"x", "notes.docx", None, None).is_err());
        assert!(recorder.take().is_empty());
    }
}
