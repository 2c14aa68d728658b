//! OCR engines.
//!
//! Extractors depend only on the [`OcrEngine`] trait. The default engine,
//! [`TesseractOcr`], shells out to the `tesseract` CLI: the image is written
//! as PNG into a temporary directory and the recognised text is read from
//! stdout. The temp directory is removed when the call returns, including on
//! error paths.

use crate::config::OcrSettings;
use crate::error::OcrError;
use crate::pipeline::encode::encode_png;
use image::DynamicImage;
use std::io::ErrorKind;
use std::process::Command;
use tracing::debug;

/// Converts a raster image into text.
///
/// Implementations must be `Send + Sync`; one engine instance is shared by
/// every call a [`crate::DocumentPreprocessor`] makes.
pub trait OcrEngine: Send + Sync {
    /// Recognise the text in `image`.
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;

    /// Short identifier used in logs.
    fn engine_name(&self) -> &str;
}

/// Tesseract via its command-line interface.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    settings: OcrSettings,
}

impl TesseractOcr {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    /// Whether the configured tesseract executable can be launched.
    pub fn is_available(&self) -> bool {
        Command::new(&self.settings.tesseract_path)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn args(&self) -> Vec<String> {
        vec![
            "-l".into(),
            self.settings.language.clone(),
            "--oem".into(),
            self.settings.engine_mode.to_string(),
            "--psm".into(),
            self.settings.page_segmentation_mode.to_string(),
            "--dpi".into(),
            self.settings.dpi.to_string(),
        ]
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new(OcrSettings::default())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let png = encode_png(image)?;

        let dir = tempfile::tempdir()?;
        let input = dir.path().join("page.png");
        std::fs::write(&input, &png)?;

        let output = Command::new(&self.settings.tesseract_path)
            .arg(&input)
            .arg("stdout")
            .args(self.args())
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => OcrError::EngineNotFound {
                    path: self.settings.tesseract_path.clone(),
                },
                _ => OcrError::Io(e),
            })?;

        if !output.status.success() {
            return Err(OcrError::EngineFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "tesseract recognised {} chars from {}x{} image",
            text.len(),
            image.width(),
            image.height()
        );
        Ok(text)
    }

    fn engine_name(&self) -> &str {
        "tesseract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, GrayImage};

    #[test]
    fn args_follow_settings() {
        let engine = TesseractOcr::new(OcrSettings {
            language: "eng+deu".into(),
            dpi: 200,
            ..OcrSettings::default()
        });
        assert_eq!(
            engine.args(),
            vec!["-l", "eng+deu", "--oem", "3", "--psm", "6", "--dpi", "200"]
        );
    }

    #[test]
    fn missing_executable_maps_to_engine_not_found() {
        let engine = TesseractOcr::new(OcrSettings {
            tesseract_path: "/nonexistent/bin/tesseract-docprep".into(),
            ..OcrSettings::default()
        });
        assert!(!engine.is_available());
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([255])));
        let err = engine.recognize(&img).unwrap_err();
        assert!(matches!(err, OcrError::EngineNotFound { .. }), "got {err}");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_maps_to_engine_failed() {
        // `false` accepts any arguments and exits 1.
        let engine = TesseractOcr::new(OcrSettings {
            tesseract_path: "false".into(),
            ..OcrSettings::default()
        });
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([255])));
        let err = engine.recognize(&img).unwrap_err();
        assert!(matches!(err, OcrError::EngineFailed { code: 1, .. }), "got {err}");
    }

    #[test]
    fn engine_name() {
        assert_eq!(TesseractOcr::default().engine_name(), "tesseract");
    }
}
