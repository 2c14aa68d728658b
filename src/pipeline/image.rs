//! Image extractor: properties → enhancement → OCR → layout detection.

use crate::config::PreprocessConfig;
use crate::error::{PreprocessError, UnitError};
use crate::output::{
    DocumentType, ImageIntermediate, ImageProperties, Intermediate, MetadataBuilder,
};
use crate::pipeline::enhance::ImageEnhancer;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::quality::estimate_quality;
use crate::pipeline::Extraction;
use crate::progress::Progress;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tiff::decoder::ifd::Value;
use tiff::tags::Tag;
use tracing::{debug, info, warn};

/// Resolution reported when the file does not declare one.
pub const DEFAULT_DPI: (u32, u32) = (72, 72);

pub(crate) struct ImageExtractor<'a> {
    pub config: &'a PreprocessConfig,
    pub enhancer: &'a dyn ImageEnhancer,
    pub ocr: &'a dyn OcrEngine,
}

impl ImageExtractor<'_> {
    pub fn extract(
        &self,
        content: &[u8],
        filename: &str,
        meta: &mut MetadataBuilder,
    ) -> Result<Extraction, PreprocessError> {
        let mut progress = Progress::start(self.config, filename, 1);

        let image = image::load_from_memory(content).map_err(|e| PreprocessError::CorruptDocument {
            document_type: DocumentType::Image,
            detail: e.to_string(),
        })?;
        let properties = analyze_image(&image, content);
        debug!(
            "Image {}x{} mode={} dpi={:?}",
            properties.width, properties.height, properties.mode, properties.estimated_dpi
        );

        let enhanced = self.enhancer.enhance(&image);
        meta.record("image_enhancement");
        for step in &enhanced.steps {
            meta.record(*step);
        }

        let (text, ocr_error) = match self.ocr.recognize(&enhanced.image) {
            Ok(text) => {
                meta.record("ocr_extraction");
                progress.extracted(1, text.len());
                (text, None)
            }
            Err(e) => {
                warn!("OCR failed for image '{}': {}", filename, e);
                progress.failed(1, &e.to_string());
                (
                    String::new(),
                    Some(UnitError::OcrFailed {
                        page: 1,
                        detail: e.to_string(),
                    }),
                )
            }
        };

        let layout = self.enhancer.detect_layout(&enhanced.image);
        if layout.vision_available {
            meta.record("layout_detection");
        }

        let quality = estimate_quality(&text);
        meta.page_count(1).quality(quality);
        progress.finish();
        info!(
            "Image processed with {} pipeline, OCR quality {:.2}",
            self.enhancer.pipeline_name(),
            quality
        );

        Ok(Extraction {
            text: text.clone(),
            intermediate: Intermediate::Image(ImageIntermediate {
                image_properties: properties,
                layout_detection: layout,
                ocr_confidence: quality,
                extracted_text: text,
                ocr_error,
            }),
        })
    }
}

/// Intrinsic properties of a decoded image and its source bytes.
pub fn analyze_image(image: &DynamicImage, bytes: &[u8]) -> ImageProperties {
    let (width, height) = (image.width(), image.height());
    let format = image::guess_format(bytes).ok();
    ImageProperties {
        width,
        height,
        mode: color_mode(image).to_string(),
        format: format.map(|f| format_name(f).to_string()),
        aspect_ratio: if height == 0 {
            0.0
        } else {
            width as f64 / height as f64
        },
        estimated_dpi: format
            .and_then(|f| declared_dpi(f, bytes))
            .unwrap_or(DEFAULT_DPI),
    }
}

fn color_mode(image: &DynamicImage) -> &'static str {
    match image {
        DynamicImage::ImageLuma8(_) => "L",
        DynamicImage::ImageLumaA8(_) => "LA",
        DynamicImage::ImageRgb8(_) => "RGB",
        DynamicImage::ImageRgba8(_) => "RGBA",
        DynamicImage::ImageLuma16(_) => "I;16",
        DynamicImage::ImageLumaA16(_) => "LA;16",
        DynamicImage::ImageRgb16(_) => "RGB;16",
        DynamicImage::ImageRgba16(_) => "RGBA;16",
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => "F",
        _ => "unknown",
    }
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Gif => "GIF",
        ImageFormat::WebP => "WEBP",
        _ => "UNKNOWN",
    }
}

/// Resolution declared in the file, for formats that carry one.
///
/// PNG `pHYs` and TIFF `XResolution`/`YResolution` are honoured; every other
/// format falls back to [`DEFAULT_DPI`].
fn declared_dpi(format: ImageFormat, bytes: &[u8]) -> Option<(u32, u32)> {
    match format {
        ImageFormat::Png => png_dpi(bytes),
        ImageFormat::Tiff => tiff_dpi(bytes),
        _ => None,
    }
}

const INCH_PER_METER: f64 = 0.0254;
const INCH_PER_CM: f64 = 2.54;

fn png_dpi(bytes: &[u8]) -> Option<(u32, u32)> {
    let reader = png::Decoder::new(Cursor::new(bytes)).read_info().ok()?;
    let dims = reader.info().pixel_dims?;
    match dims.unit {
        png::Unit::Meter => Some((
            (dims.xppu as f64 * INCH_PER_METER).round() as u32,
            (dims.yppu as f64 * INCH_PER_METER).round() as u32,
        )),
        _ => None,
    }
}

fn tiff_dpi(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut decoder = tiff::decoder::Decoder::new(Cursor::new(bytes)).ok()?;
    // ResolutionUnit defaults to inches when absent.
    let per_inch = match decoder
        .find_tag_unsigned::<u16>(Tag::ResolutionUnit)
        .ok()?
        .unwrap_or(2)
    {
        2 => 1.0,
        3 => INCH_PER_CM,
        _ => return None,
    };
    let x = rational(decoder.find_tag(Tag::XResolution).ok()??)?;
    let y = decoder
        .find_tag(Tag::YResolution)
        .ok()
        .flatten()
        .and_then(rational)
        .unwrap_or(x);
    Some(((x * per_inch).round() as u32, (y * per_inch).round() as u32))
}

fn rational(value: Value) -> Option<f64> {
    match value {
        Value::Rational(n, d) if d != 0 => Some(n as f64 / d as f64),
        Value::Unsigned(n) => Some(n as f64),
        Value::Short(n) => Some(n as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tiff::encoder::{colortype, Rational, TiffEncoder};
    use tiff::tags::ResolutionUnit;

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn png_with_dims(xppu: u32, yppu: u32, unit: png::Unit) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, 2, 2);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_pixel_dims(Some(png::PixelDimensions { xppu, yppu, unit }));
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 0, 0, 0]).unwrap();
        }
        buf
    }

    fn tiff_with_resolution(unit: ResolutionUnit, x: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buf).unwrap();
            let mut image = encoder.new_image::<colortype::Gray8>(2, 2).unwrap();
            image.resolution(unit, Rational { n: x, d: 1 });
            image.write_data(&[0, 0, 0, 0]).unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn properties_of_rgb_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([1, 2, 3])));
        let bytes = png_bytes(&img);
        let props = analyze_image(&img, &bytes);
        assert_eq!(props.width, 40);
        assert_eq!(props.height, 20);
        assert_eq!(props.mode, "RGB");
        assert_eq!(props.format.as_deref(), Some("PNG"));
        assert_eq!(props.aspect_ratio, 2.0);
        assert_eq!(props.estimated_dpi, DEFAULT_DPI);
    }

    #[test]
    fn grayscale_mode() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([9])));
        assert_eq!(color_mode(&img), "L");
    }

    #[test]
    fn png_phys_in_metres() {
        // 11811 px/m ≈ 300 dpi
        let bytes = png_with_dims(11811, 7874, png::Unit::Meter);
        assert_eq!(png_dpi(&bytes), Some((300, 200)));
        let unspecified = png_with_dims(11811, 11811, png::Unit::Unspecified);
        assert_eq!(png_dpi(&unspecified), None);
    }

    #[test]
    fn tiff_resolution_tags() {
        let bytes = tiff_with_resolution(ResolutionUnit::Inch, 300);
        assert_eq!(tiff_dpi(&bytes), Some((300, 300)));

        let img = image::load_from_memory(&bytes).unwrap();
        let props = analyze_image(&img, &bytes);
        assert_eq!(props.format.as_deref(), Some("TIFF"));
        assert_eq!(props.estimated_dpi, (300, 300));
    }

    #[test]
    fn tiff_resolution_in_centimetres() {
        let bytes = tiff_with_resolution(ResolutionUnit::Centimeter, 100);
        assert_eq!(tiff_dpi(&bytes), Some((254, 254)));
        let none = tiff_with_resolution(ResolutionUnit::None, 100);
        assert_eq!(tiff_dpi(&none), None);
    }

    #[test]
    fn jpeg_reports_default_dpi() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 10, 10])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg).unwrap();
        let props = analyze_image(&img, &bytes);
        assert_eq!(props.format.as_deref(), Some("JPEG"));
        assert_eq!(props.estimated_dpi, DEFAULT_DPI);
    }

    #[test]
    fn truncated_headers_do_not_panic() {
        assert_eq!(png_dpi(b"\x89PNG\r\n\x1a\n\x00\x00"), None);
        assert_eq!(tiff_dpi(b"II*\x00"), None);
    }
}
