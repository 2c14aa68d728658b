//! Input classification: filename → document type, plus the size guard.
//!
//! The document type is decided from the extension alone. Content sniffing
//! happens later, inside each extractor, where a mismatch surfaces as
//! [`PreprocessError::CorruptDocument`].

use crate::config::{FormatPolicy, FormatTable};
use crate::error::PreprocessError;
use crate::output::DocumentType;
use tracing::debug;

/// Lower-cased extension of `filename` including the leading dot, or an
/// empty string when the name has no dot.
///
/// Only the final path component is considered, so `reports.v2/summary`
/// has no extension.
pub fn file_extension(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rfind('.') {
        Some(idx) => base[idx..].to_lowercase(),
        None => String::new(),
    }
}

impl DocumentType {
    /// Map an extension (with dot, any case) through the default format table.
    pub fn from_extension(extension: &str) -> DocumentType {
        classify(&FormatTable::default(), &extension.to_lowercase())
    }
}

/// Whether `filename` has an extension in the default format table.
pub fn is_format_supported(filename: &str) -> bool {
    DocumentType::from_extension(&file_extension(filename)) != DocumentType::Unknown
}

pub(crate) fn classify(table: &FormatTable, extension: &str) -> DocumentType {
    table
        .lookup(extension)
        .map(|p| p.document_type)
        .unwrap_or(DocumentType::Unknown)
}

/// The classified input: extension, type and the policy that governs it.
#[derive(Debug, Clone)]
pub(crate) struct ClassifiedInput<'a> {
    pub extension: String,
    pub policy: &'a FormatPolicy,
}

impl ClassifiedInput<'_> {
    pub fn document_type(&self) -> DocumentType {
        self.policy.document_type
    }
}

/// Resolve `filename` against the format table and enforce the size limit.
pub(crate) fn classify_input<'a>(
    table: &'a FormatTable,
    filename: &str,
    size_bytes: usize,
) -> Result<ClassifiedInput<'a>, PreprocessError> {
    let extension = file_extension(filename);
    let policy = table
        .lookup(&extension)
        .ok_or_else(|| PreprocessError::UnsupportedFormat {
            filename: filename.to_string(),
            extension: extension.clone(),
        })?;

    let limit_bytes = policy.max_size_bytes();
    if size_bytes > limit_bytes {
        return Err(PreprocessError::FileTooLarge {
            document_type: policy.document_type,
            size_bytes,
            limit_bytes,
        });
    }

    debug!(
        "Classified '{}' as {} ({} bytes)",
        filename, policy.document_type, size_bytes
    );
    Ok(ClassifiedInput { extension, policy })
}

/// Resolve the inclusive, 1-indexed page window for a document of
/// `page_count` pages.
///
/// Missing bounds default to the whole document, and a bound of 0 counts as
/// missing (`end = Some(0)` runs to the last page). `start` is raised to 1 and
/// `end` is capped at `page_count`. A start past the end of the document or
/// an inverted window is a caller error.
pub fn resolve_page_window(
    page_count: usize,
    page_start: Option<usize>,
    page_end: Option<usize>,
) -> Result<(usize, usize), PreprocessError> {
    let start = page_start.unwrap_or(1).max(1);
    let end = page_end.filter(|&e| e > 0).unwrap_or(page_count).min(page_count);

    if start > page_count || end < start {
        return Err(PreprocessError::InvalidPageRange {
            start,
            end,
            page_count,
        });
    }
    Ok((start, end))
}
