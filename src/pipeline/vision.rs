//! Extended enhancement pipeline built on `imageproc`.
//!
//! Runs the baseline steps, then grayscale → median denoise → deskew →
//! CLAHE. Each step is guarded independently so a failure only drops that
//! step. Layout detection binarises with Otsu's level and counts outer
//! contours.

use crate::config::EnhancementSettings;
use crate::output::{LayoutInfo, LayoutType};
use crate::pipeline::enhance::{
    guarded, BaselineEnhancer, Enhanced, ImageEnhancer, STEP_CLAHE, STEP_DENOISE, STEP_DESKEW,
    STEP_GRAYSCALE,
};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::edges::canny;
use imageproc::filter::median_filter;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use tracing::{debug, warn};

/// Canny hysteresis thresholds for skew line detection.
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
/// Only the strongest lines vote on the skew angle.
const MAX_SKEW_LINES: usize = 10;
/// Fewer outer regions than this reads as a single column.
const MULTI_COLUMN_REGIONS: usize = 5;
const MAX_TEXT_BLOCKS: usize = 10;

#[derive(Debug, Clone)]
pub struct VisionEnhancer {
    settings: EnhancementSettings,
    baseline: BaselineEnhancer,
}

impl VisionEnhancer {
    pub fn new(settings: EnhancementSettings) -> Self {
        Self {
            baseline: BaselineEnhancer::new(settings.clone()),
            settings,
        }
    }

    fn deskew(&self, gray: &GrayImage) -> GrayImage {
        let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
        let mut lines = detect_lines(
            &edges,
            LineDetectionOptions {
                vote_threshold: self.settings.hough_vote_threshold,
                suppression_radius: 8,
            },
        );
        lines.truncate(MAX_SKEW_LINES);

        match skew_angle(&lines) {
            Some(angle) if angle.abs() > self.settings.deskew_threshold_degrees => {
                debug!("Deskewing by {:.2}°", angle);
                rotate_about_center(
                    gray,
                    -angle.to_radians(),
                    Interpolation::Bicubic,
                    Luma([255]),
                )
            }
            _ => gray.clone(),
        }
    }
}

impl ImageEnhancer for VisionEnhancer {
    fn enhance(&self, image: &DynamicImage) -> Enhanced {
        let mut steps = Vec::new();
        let rgb = self.baseline.run(image, &mut steps);

        let Some(mut gray) = guarded(STEP_GRAYSCALE, || DynamicImage::ImageRgb8(rgb.clone()).to_luma8())
        else {
            return Enhanced {
                image: DynamicImage::ImageRgb8(rgb),
                steps,
            };
        };
        steps.push(STEP_GRAYSCALE);

        if self.settings.enable_denoising {
            let radius = self.settings.blur_kernel / 2;
            if let Some(img) = guarded(STEP_DENOISE, || median_filter(&gray, radius, radius)) {
                gray = img;
                steps.push(STEP_DENOISE);
            }
        }

        if self.settings.enable_deskewing {
            if let Some(img) = guarded(STEP_DESKEW, || self.deskew(&gray)) {
                gray = img;
                steps.push(STEP_DESKEW);
            }
        }

        if self.settings.enable_contrast_enhancement {
            let clip = self.settings.clahe_clip_limit;
            let grid = self.settings.clahe_tile_grid;
            if let Some(img) = guarded(STEP_CLAHE, || clahe(&gray, clip, grid)) {
                gray = img;
                steps.push(STEP_CLAHE);
            }
        }

        Enhanced {
            image: DynamicImage::ImageLuma8(gray),
            steps,
        }
    }

    fn detect_layout(&self, image: &DynamicImage) -> LayoutInfo {
        match guarded("layout_detection", || count_regions(&image.to_luma8())) {
            Some(regions) => LayoutInfo {
                detected_regions: regions,
                layout_type: if regions < MULTI_COLUMN_REGIONS {
                    LayoutType::SingleColumn
                } else {
                    LayoutType::MultiColumn
                },
                estimated_text_blocks: regions.min(MAX_TEXT_BLOCKS),
                vision_available: true,
                detection_error: None,
            },
            None => {
                warn!("Layout detection failed");
                LayoutInfo {
                    detected_regions: 0,
                    layout_type: LayoutType::Unknown,
                    estimated_text_blocks: 1,
                    vision_available: true,
                    detection_error: Some("contour analysis failed".into()),
                }
            }
        }
    }

    fn pipeline_name(&self) -> &str {
        "vision"
    }

    fn vision_available(&self) -> bool {
        true
    }
}

/// Median deviation of `lines` from the nearest image axis, in degrees.
///
/// Hough angles are the orientation of each line's normal in `[0, 180)`, so
/// horizontal text baselines sit near 90 and vertical rules near 0 or 180.
fn skew_angle(lines: &[PolarLine]) -> Option<f32> {
    let mut angles: Vec<f32> = lines
        .iter()
        .map(|l| {
            let a = l.angle_in_degrees as f32;
            if a < 45.0 {
                a
            } else if a > 135.0 {
                a - 180.0
            } else {
                a - 90.0
            }
        })
        .collect();
    median(&mut angles)
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Outer contours of the dark (ink) regions.
fn count_regions(gray: &GrayImage) -> usize {
    let level = otsu_level(gray);
    let ink = threshold(gray, level, ThresholdType::BinaryInverted);
    find_contours::<u32>(&ink)
        .iter()
        .filter(|c| c.parent.is_none())
        .count()
}

// ── CLAHE ────────────────────────────────────────────────────────────────────

/// Contrast-limited adaptive histogram equalisation.
///
/// The image is split into a `grid` of tiles; each tile's histogram is
/// clipped at `clip_limit` times the uniform bin height, the excess spread
/// evenly over all bins, and the resulting CDF used as that tile's mapping.
/// Pixels are mapped by bilinear interpolation between the four nearest
/// tile centres.
pub(crate) fn clahe(gray: &GrayImage, clip_limit: f32, grid: (u32, u32)) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let tiles_x = grid.0.clamp(1, w);
    let tiles_y = grid.1.clamp(1, h);
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            luts[(ty * tiles_x + tx) as usize] = tile_lut(gray, (x0, y0, x1, y1), clip_limit);
        }
    }

    let mut out = GrayImage::new(w, h);
    for (x, y, p) in out.enumerate_pixels_mut() {
        let v = gray.get_pixel(x, y).0[0] as usize;

        // Position relative to tile centres.
        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = fx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
        let ty0 = fy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = (fx - tx0 as f32).clamp(0.0, 1.0);
        let ay = (fy - ty0 as f32).clamp(0.0, 1.0);

        let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;
        let top = at(tx0, ty0) * (1.0 - ax) + at(tx1, ty0) * ax;
        let bottom = at(tx0, ty1) * (1.0 - ax) + at(tx1, ty1) * ax;
        *p = Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8]);
    }
    out
}

fn tile_lut(gray: &GrayImage, (x0, y0, x1, y1): (u32, u32, u32, u32), clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)).max(1);

    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cdf += bin;
        lut[i] = ((cdf as f32 * 255.0) / area as f32).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn line(angle: u32) -> PolarLine {
        PolarLine {
            r: 10.0,
            angle_in_degrees: angle,
        }
    }

    #[test]
    fn skew_from_mixed_lines() {
        let lines = [line(92), line(91), line(2), line(179), line(93)];
        // deviations: 2, 1, 2, -1, 3 → median 2
        assert_eq!(skew_angle(&lines), Some(2.0));
        assert_eq!(skew_angle(&[]), None);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn clahe_preserves_dimensions_and_flat_images() {
        let flat = GrayImage::from_pixel(40, 24, Luma([128]));
        let out = clahe(&flat, 2.0, (8, 8));
        assert_eq!(out.dimensions(), (40, 24));
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn clahe_stretches_low_contrast() {
        let mut img = GrayImage::new(32, 32);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = Luma([if x % 2 == 0 { 120 } else { 130 }]);
        }
        let out = clahe(&img, 4.0, (2, 2));
        let min = out.pixels().map(|p| p.0[0]).min().unwrap();
        let max = out.pixels().map(|p| p.0[0]).max().unwrap();
        assert!(max - min > 10, "range {min}..{max}");
    }

    #[test]
    fn clahe_handles_images_smaller_than_grid() {
        let img = GrayImage::from_pixel(3, 2, Luma([10]));
        assert_eq!(clahe(&img, 2.0, (8, 8)).dimensions(), (3, 2));
    }

    #[test]
    fn vision_pipeline_records_steps() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([230, 230, 230])));
        let out = VisionEnhancer::new(EnhancementSettings::default()).enhance(&img);
        for step in [STEP_GRAYSCALE, STEP_DENOISE, STEP_DESKEW, STEP_CLAHE] {
            assert!(out.steps.contains(&step), "missing {step}: {:?}", out.steps);
        }
        assert!(matches!(out.image, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn layout_counts_separate_blocks() {
        let mut img = GrayImage::from_pixel(100, 60, Luma([255]));
        for block in 0..6u32 {
            let x0 = 5 + block * 15;
            for y in 10..40 {
                for x in x0..x0 + 8 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        let layout = VisionEnhancer::new(EnhancementSettings::default())
            .detect_layout(&DynamicImage::ImageLuma8(img));
        assert_eq!(layout.detected_regions, 6);
        assert_eq!(layout.layout_type, LayoutType::MultiColumn);
        assert_eq!(layout.estimated_text_blocks, 6);
        assert!(layout.vision_available);
    }

    #[test]
    fn layout_single_block_is_single_column() {
        let mut img = GrayImage::from_pixel(50, 50, Luma([255]));
        for y in 10..40 {
            for x in 10..40 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let layout = VisionEnhancer::new(EnhancementSettings::default())
            .detect_layout(&DynamicImage::ImageLuma8(img));
        assert_eq!(layout.detected_regions, 1);
        assert_eq!(layout.layout_type, LayoutType::SingleColumn);
    }
}
