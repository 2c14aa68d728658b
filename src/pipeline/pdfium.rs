//! Default [`PdfBackend`]: pdfium via `pdfium-render`.
//!
//! ## Binding
//!
//! The pdfium shared library is bound at most once per process, on the first
//! PDF that needs it, so spreadsheets and images never touch it. The library
//! is taken from `PDFIUM_LIB_PATH` when set (a file, or a directory holding
//! the platform library), otherwise from the system library search path.
//! A failed bind is not cached; the next PDF tries again.
//!
//! ## Layout lines
//!
//! pdfium's plain text loses column alignment, so table recovery works from
//! glyph positions instead: glyphs are grouped into rows whose tops lie
//! within `snap_tolerance` points, and a row is split into cells wherever
//! the horizontal gap between neighbouring glyphs is wider than
//! [`CELL_GAP_FACTOR`] average glyph widths.

use crate::error::PreprocessError;
use crate::output::DocumentType;
use crate::pipeline::pdf::{PageContent, PdfBackend, PdfSource};
use crate::pipeline::table::LayoutLine;
use image::DynamicImage;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// Gap, in average glyph widths, that separates two cells.
pub const CELL_GAP_FACTOR: f32 = 1.5;
/// Gap, in average glyph widths, that separates two words inside a cell.
const WORD_GAP_FACTOR: f32 = 0.15;

fn bind() -> Result<&'static Pdfium, PreprocessError> {
    PDFIUM.get_or_try_init(|| {
        let bindings = match std::env::var("PDFIUM_LIB_PATH") {
            Ok(path) if Path::new(&path).is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&path))
            }
            Ok(path) => Pdfium::bind_to_library(&path),
            Err(_) => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PreprocessError::PdfiumBindingFailed(format!("{:?}", e)))?;
        info!("pdfium library bound");
        Ok(Pdfium::new(bindings))
    })
}

/// PDF backend backed by the pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    snap_tolerance: f32,
}

impl PdfiumBackend {
    pub fn new(snap_tolerance: f32) -> Self {
        Self { snap_tolerance }
    }
}

impl Default for PdfiumBackend {
    fn default() -> Self {
        Self::new(3.0)
    }
}

impl PdfBackend for PdfiumBackend {
    fn open<'a>(&'a self, content: &'a [u8]) -> Result<Box<dyn PdfSource + 'a>, PreprocessError> {
        let pdfium = bind()?;
        let document = pdfium.load_pdf_from_byte_slice(content, None).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                PreprocessError::PasswordRequired
            } else {
                PreprocessError::CorruptDocument {
                    document_type: DocumentType::Pdf,
                    detail: err_str,
                }
            }
        })?;
        debug!("PDF loaded: {} pages", document.pages().len());

        Ok(Box::new(PdfiumSource {
            document,
            snap_tolerance: self.snap_tolerance,
        }))
    }

    fn backend_name(&self) -> &str {
        "pdfium"
    }
}

struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
    snap_tolerance: f32,
}

impl<'a> PdfiumSource<'a> {
    fn page(&self, page: usize) -> Result<PdfPage<'a>, String> {
        let index = u16::try_from(page.saturating_sub(1))
            .map_err(|_| format!("page {} is beyond pdfium's page index range", page))?;
        self.document.pages().get(index).map_err(|e| format!("{:?}", e))
    }
}

impl PdfSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn creation_date(&self) -> Option<String> {
        self.document
            .metadata()
            .get(PdfDocumentMetadataTagType::CreationDate)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    }

    fn page_content(&self, page: usize) -> Result<PageContent, PreprocessError> {
        let failed = |detail: String| PreprocessError::TextExtractionFailed { page, detail };
        let pdf_page = self.page(page).map_err(failed)?;
        let text_page = pdf_page.text().map_err(|e| failed(format!("{:?}", e)))?;

        let mut glyphs = Vec::new();
        for char_info in text_page.chars().iter() {
            let Some(ch) = char_info.unicode_string().and_then(|s| s.chars().next()) else {
                continue;
            };
            if ch.is_whitespace() {
                continue;
            }
            if let Ok(bounds) = char_info.loose_bounds() {
                glyphs.push(Glyph {
                    ch,
                    left: bounds.left().value,
                    right: bounds.right().value,
                    top: bounds.top().value,
                });
            }
        }

        let image_count = pdf_page
            .objects()
            .iter()
            .filter(|o| o.object_type() == PdfPageObjectType::Image)
            .count();

        Ok(PageContent {
            text: text_page.all(),
            lines: layout_lines(glyphs, self.snap_tolerance),
            image_count,
        })
    }

    fn render_page(&self, page: usize, dpi: u32) -> Result<DynamicImage, PreprocessError> {
        let failed = |detail: String| PreprocessError::RasterisationFailed { page, detail };
        let pdf_page = self.page(page).map_err(failed)?;

        // PDF user space is 72 points per inch.
        let scale = dpi as f32 / 72.0;
        let render_config = PdfRenderConfig::new()
            .set_target_width((pdf_page.width().value * scale) as i32)
            .set_target_height((pdf_page.height().value * scale) as i32);
        let bitmap = pdf_page
            .render_with_config(&render_config)
            .map_err(|e| failed(format!("{:?}", e)))?;

        let image = bitmap.as_image();
        debug!("Rendered page {} → {}x{} px", page, image.width(), image.height());
        Ok(image)
    }
}

/// A positioned glyph in PDF user space (y grows upwards).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Glyph {
    ch: char,
    left: f32,
    right: f32,
    top: f32,
}

/// Group glyphs into visual rows, top of page first, and split rows into cells.
fn layout_lines(mut glyphs: Vec<Glyph>, snap_tolerance: f32) -> Vec<LayoutLine> {
    glyphs.sort_by(|a, b| b.top.total_cmp(&a.top));

    let mut rows: Vec<Vec<Glyph>> = Vec::new();
    let mut row_top = f32::NAN;
    for g in glyphs {
        match rows.last_mut() {
            Some(row) if (row_top - g.top).abs() <= snap_tolerance => row.push(g),
            _ => {
                row_top = g.top;
                rows.push(vec![g]);
            }
        }
    }

    rows.into_iter().map(split_cells).collect()
}

fn split_cells(mut row: Vec<Glyph>) -> LayoutLine {
    row.sort_by(|a, b| a.left.total_cmp(&b.left));
    let total: f32 = row.iter().map(|g| (g.right - g.left).max(0.0)).sum();
    let avg = if total > 0.0 { total / row.len() as f32 } else { 1.0 };

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut prev_right: Option<f32> = None;
    for g in row {
        if let Some(right) = prev_right {
            let gap = g.left - right;
            if gap > CELL_GAP_FACTOR * avg {
                cells.push(std::mem::take(&mut cell));
            } else if gap > WORD_GAP_FACTOR * avg {
                cell.push(' ');
            }
        }
        cell.push(g.ch);
        prev_right = Some(g.right);
    }
    if !cell.is_empty() {
        cells.push(cell);
    }
    LayoutLine::new(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out `text` on one baseline with 5pt glyphs; a space adds a
    /// 2pt gap, each extra space 5pt more.
    fn row(text: &str, top: f32) -> Vec<Glyph> {
        let mut x = 0.0;
        let mut out = Vec::new();
        let mut pending_gap = 0.0;
        for ch in text.chars() {
            if ch == ' ' {
                pending_gap += if pending_gap == 0.0 { 2.0 } else { 5.0 };
                continue;
            }
            x += pending_gap;
            pending_gap = 0.0;
            out.push(Glyph {
                ch,
                left: x,
                right: x + 5.0,
                top,
            });
            x += 5.0;
        }
        out
    }

    #[test]
    fn rows_are_ordered_top_down_and_split_into_cells() {
        let mut glyphs = row("Bolt    3", 680.0);
        glyphs.extend(row("Item    Qty", 700.0));
        glyphs.extend(row("Thanks a lot", 600.0));

        let lines = layout_lines(glyphs, 3.0);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].cells, vec!["Item", "Qty"]);
        assert_eq!(lines[1].cells, vec!["Bolt", "3"]);
        assert_eq!(lines[2].cells, vec!["Thanks a lot"]);
    }

    #[test]
    fn glyphs_within_tolerance_share_a_row() {
        let mut glyphs = row("ab", 500.0);
        glyphs.extend(row("      cd", 501.5));
        let lines = layout_lines(glyphs, 3.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].cells, vec!["ab", "cd"]);
    }

    #[test]
    fn no_glyphs_no_lines() {
        assert!(layout_lines(Vec::new(), 3.0).is_empty());
    }
}
