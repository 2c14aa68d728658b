//! Image enhancement before OCR.
//!
//! Extractors only see the [`ImageEnhancer`] trait. Two implementations
//! exist:
//!
//! - [`BaselineEnhancer`]: pure `image`-crate pipeline, always available
//!   (sharpen → contrast → brightness).
//! - `VisionEnhancer` (cargo feature `vision`): the baseline followed by
//!   grayscale → median denoise → Hough deskew → CLAHE, plus contour-based
//!   layout detection.
//!
//! [`select_enhancer`] picks one at construction time. Enhancement never
//! fails from the caller's point of view: every step runs under
//! [`guarded`], and a step that panics leaves the previous image in place
//! and is missing from [`Enhanced::steps`].

use crate::config::EnhancementSettings;
use crate::output::LayoutInfo;
use image::{DynamicImage, RgbImage};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

pub const STEP_SHARPEN: &str = "sharpening";
pub const STEP_CONTRAST: &str = "contrast_adjustment";
pub const STEP_BRIGHTNESS: &str = "brightness_adjustment";
pub const STEP_GRAYSCALE: &str = "grayscale_conversion";
pub const STEP_DENOISE: &str = "noise_reduction";
pub const STEP_DESKEW: &str = "deskewing";
pub const STEP_CLAHE: &str = "clahe_equalization";

/// An enhanced image plus the steps that actually ran, in order.
#[derive(Debug, Clone)]
pub struct Enhanced {
    pub image: DynamicImage,
    pub steps: Vec<&'static str>,
}

/// Strategy for preparing a raster image for OCR.
pub trait ImageEnhancer: Send + Sync {
    /// Enhance `image`. Never fails; skipped steps are absent from `steps`.
    fn enhance(&self, image: &DynamicImage) -> Enhanced;

    /// Best-effort region analysis of an (enhanced) image.
    fn detect_layout(&self, image: &DynamicImage) -> LayoutInfo;

    /// `"baseline"` or `"vision"`; used in logs.
    fn pipeline_name(&self) -> &str;

    fn vision_available(&self) -> bool {
        false
    }
}

/// Choose the enhancement strategy for `settings`.
///
/// The vision pipeline is used when it is compiled in and enabled.
pub fn select_enhancer(settings: &EnhancementSettings) -> Box<dyn ImageEnhancer> {
    #[cfg(feature = "vision")]
    if settings.enable_vision {
        debug!("Using vision enhancement pipeline");
        return Box::new(crate::pipeline::vision::VisionEnhancer::new(settings.clone()));
    }
    debug!("Using baseline enhancement pipeline");
    Box::new(BaselineEnhancer::new(settings.clone()))
}

/// Run one enhancement step, absorbing panics from the imaging code.
pub(crate) fn guarded<T>(step: &str, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Enhancement step '{}' failed; keeping previous image", step);
            None
        }
    }
}

// ── Baseline pipeline ────────────────────────────────────────────────────────

/// 3x3 sharpen kernel, centre 32 and ring -2, normalised by 16.
const SHARPEN_KERNEL: [f32; 9] = [
    -2.0 / 16.0, -2.0 / 16.0, -2.0 / 16.0,
    -2.0 / 16.0, 32.0 / 16.0, -2.0 / 16.0,
    -2.0 / 16.0, -2.0 / 16.0, -2.0 / 16.0,
];

#[derive(Debug, Clone)]
pub struct BaselineEnhancer {
    settings: EnhancementSettings,
}

impl BaselineEnhancer {
    pub fn new(settings: EnhancementSettings) -> Self {
        Self { settings }
    }

    /// Run the baseline steps, appending labels to `steps`.
    pub(crate) fn run(&self, image: &DynamicImage, steps: &mut Vec<&'static str>) -> RgbImage {
        let mut current = image.to_rgb8();

        if self.settings.enable_sharpening {
            if let Some(img) = guarded(STEP_SHARPEN, || {
                DynamicImage::ImageRgb8(current.clone())
                    .filter3x3(&SHARPEN_KERNEL)
                    .to_rgb8()
            }) {
                current = img;
                steps.push(STEP_SHARPEN);
            }
        }

        if self.settings.enable_contrast_enhancement {
            let factor = self.settings.contrast_multiplier;
            if let Some(img) = guarded(STEP_CONTRAST, || adjust_contrast(&current, factor)) {
                current = img;
                steps.push(STEP_CONTRAST);
            }
        }

        let factor = self.settings.brightness_multiplier;
        if let Some(img) = guarded(STEP_BRIGHTNESS, || adjust_brightness(&current, factor)) {
            current = img;
            steps.push(STEP_BRIGHTNESS);
        }

        current
    }
}

impl ImageEnhancer for BaselineEnhancer {
    fn enhance(&self, image: &DynamicImage) -> Enhanced {
        let mut steps = Vec::new();
        let out = self.run(image, &mut steps);
        Enhanced {
            image: DynamicImage::ImageRgb8(out),
            steps,
        }
    }

    fn detect_layout(&self, _image: &DynamicImage) -> LayoutInfo {
        LayoutInfo::unknown(false)
    }

    fn pipeline_name(&self) -> &str {
        "baseline"
    }
}

/// ITU-R 601-2 luma, the grey level used as the contrast pivot.
fn luma(r: u8, g: u8, b: u8) -> f32 {
    (r as f32 * 299.0 + g as f32 * 587.0 + b as f32 * 114.0) / 1000.0
}

/// Scale every channel away from the image's mean grey level by `factor`.
pub(crate) fn adjust_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let n = (img.width() as u64 * img.height() as u64).max(1);
    let sum: f64 = img
        .pixels()
        .map(|p| luma(p.0[0], p.0[1], p.0[2]) as f64)
        .sum();
    let mean = (sum / n as f64).round() as f32;

    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in p.0.iter_mut() {
            *c = (mean + factor * (*c as f32 - mean)).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Multiply every channel by `factor`.
pub(crate) fn adjust_brightness(img: &RgbImage, factor: f32) -> RgbImage {
    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in p.0.iter_mut() {
            *c = (*c as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn settings() -> EnhancementSettings {
        EnhancementSettings::default()
    }

    #[test]
    fn baseline_records_steps_in_order() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([120, 120, 120])));
        let out = BaselineEnhancer::new(settings()).enhance(&img);
        assert_eq!(out.steps, vec![STEP_SHARPEN, STEP_CONTRAST, STEP_BRIGHTNESS]);
        assert_eq!((out.image.width(), out.image.height()), (16, 16));
    }

    #[test]
    fn baseline_respects_toggles() {
        let s = EnhancementSettings {
            enable_sharpening: false,
            enable_contrast_enhancement: false,
            ..settings()
        };
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let out = BaselineEnhancer::new(s).enhance(&img);
        assert_eq!(out.steps, vec![STEP_BRIGHTNESS]);
    }

    #[test]
    fn contrast_pivots_on_mean() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([100, 100, 100]));
        img.put_pixel(1, 0, Rgb([200, 200, 200]));
        let out = adjust_contrast(&img, 1.2);
        // mean 150: 150 + 1.2 * (100 - 150) = 90, 150 + 1.2 * 50 = 210
        assert_eq!(out.get_pixel(0, 0), &Rgb([90, 90, 90]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([210, 210, 210]));
    }

    #[test]
    fn brightness_saturates() {
        let img = RgbImage::from_pixel(1, 1, Rgb([250, 100, 0]));
        let out = adjust_brightness(&img, 1.1);
        assert_eq!(out.get_pixel(0, 0), &Rgb([255, 110, 0]));
    }

    #[test]
    fn sharpen_keeps_flat_regions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 5, Rgb([80, 80, 80])));
        let out = img.filter3x3(&SHARPEN_KERNEL).to_rgb8();
        assert_eq!(out.get_pixel(2, 2), &Rgb([80, 80, 80]));
    }

    #[test]
    fn guarded_absorbs_panics() {
        let r: Option<u8> = guarded("boom", || panic!("imaging failure"));
        assert!(r.is_none());
        assert_eq!(guarded("ok", || 7), Some(7));
    }

    #[test]
    fn baseline_layout_is_unknown() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let layout = BaselineEnhancer::new(settings()).detect_layout(&img);
        assert_eq!(layout, LayoutInfo::unknown(false));
    }

    #[test]
    fn select_enhancer_honours_disable() {
        let s = EnhancementSettings {
            enable_vision: false,
            ..settings()
        };
        assert_eq!(select_enhancer(&s).pipeline_name(), "baseline");
    }
}
