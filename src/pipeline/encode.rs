//! Image encoding: `DynamicImage` → PNG bytes for the OCR engine.
//!
//! PNG is lossless, so the enhanced image reaches the recogniser exactly as
//! the enhancement engine produced it. JPEG artefacts around glyph edges
//! measurably hurt tesseract accuracy on small print.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG.
///
/// 16-bit and floating-point images are narrowed to 8-bit first; the OCR
/// engine only reads 8-bit input.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let narrowed;
    let img = match img {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) | DynamicImage::ImageRgba16(_) => {
            narrowed = DynamicImage::ImageRgba8(img.to_rgba8());
            &narrowed
        }
        DynamicImage::ImageRgb16(_) => {
            narrowed = DynamicImage::ImageRgb8(img.to_rgb8());
            &narrowed
        }
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            narrowed = DynamicImage::ImageLuma8(img.to_luma8());
            &narrowed
        }
        other => other,
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!("Encoded {}x{} image → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}
