//! Spreadsheet extractor: every sheet becomes a cleaned [`Frame`].
//!
//! Workbooks (`.xlsx`, `.xls`, and anything else calamine auto-detects) are
//! read with calamine; `.csv` files with the csv crate as a single sheet
//! named after the file stem. The first row of each sheet is the header.

use crate::config::PreprocessConfig;
use crate::error::PreprocessError;
use crate::output::{DocumentType, Intermediate, MetadataBuilder, SheetRecord, SpreadsheetIntermediate};
use crate::pipeline::frame::{Cell, Frame};
use crate::pipeline::Extraction;
use crate::progress::Progress;
use calamine::{Data, Reader};
use std::io::Cursor;
use tracing::{debug, info};

pub(crate) struct SpreadsheetExtractor<'a> {
    pub config: &'a PreprocessConfig,
}

impl SpreadsheetExtractor<'_> {
    pub fn extract(
        &self,
        content: &[u8],
        filename: &str,
        extension: &str,
        meta: &mut MetadataBuilder,
    ) -> Result<Extraction, PreprocessError> {
        let sheets = if extension == ".csv" {
            vec![(sheet_name_for(filename), read_csv(content)?)]
        } else {
            read_workbook(content)?
        };

        let total = sheets.len();
        let mut progress = Progress::start(self.config, filename, total);

        let settings = &self.config.spreadsheet;
        let mut records = Vec::with_capacity(total);
        let mut full_text = String::new();

        for (i, (name, raw)) in sheets.into_iter().enumerate() {
            let frame = raw.clean();
            let shape = frame.shape();
            debug!("Sheet '{}': {} rows x {} columns after cleaning", name, shape.rows, shape.columns);

            let sheet_text = format!(
                "\n--- Sheet: {} ---\nColumns: {}\nRows: {}\n\n{}\n",
                name,
                frame.columns().join(", "),
                shape.rows,
                frame.to_text(settings.max_rows_preview)
            );
            progress.extracted(i + 1, sheet_text.len());
            full_text.push_str(&sheet_text);

            records.push(SheetRecord {
                sheet_name: name,
                rows: shape.rows,
                columns: shape.columns,
                column_names: frame.columns().to_vec(),
                data_types: frame.dtypes(),
                sample_data: frame.records(Some(settings.sample_rows)),
                summary: frame.summary(),
            });
        }

        meta.page_count(total)
            .quality(1.0)
            .record("dataframe_cleaning")
            .record("data_type_detection");
        progress.finish();
        info!("Spreadsheet processed: {} sheet(s)", total);

        Ok(Extraction {
            text: full_text.clone(),
            intermediate: Intermediate::Excel(SpreadsheetIntermediate {
                total_sheets: records.len(),
                sheets: records,
                full_text,
            }),
        })
    }
}

fn corrupt(detail: impl ToString) -> PreprocessError {
    PreprocessError::CorruptDocument {
        document_type: DocumentType::Excel,
        detail: detail.to_string(),
    }
}

/// File stem of `filename`, used as the name of a CSV's only sheet.
fn sheet_name_for(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[..idx].to_string(),
        _ => base.to_string(),
    }
}

/// Parse delimited text. Fields are typed with [`Cell::parse`]; invalid
/// UTF-8 is replaced rather than rejected.
fn read_csv(content: &[u8]) -> Result<Frame, PreprocessError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(corrupt)?;
        let fields = record.iter().map(|f| String::from_utf8_lossy(f).into_owned());
        match header {
            None => header = Some(fields.collect()),
            Some(_) => rows.push(fields.map(|f| Cell::parse(&f)).collect()),
        }
    }

    Frame::from_rows(header.unwrap_or_default(), rows).map_err(corrupt)
}

fn read_workbook(content: &[u8]) -> Result<Vec<(String, Frame)>, PreprocessError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(content)).map_err(corrupt)?;

    workbook
        .worksheets()
        .into_iter()
        .map(|(name, range)| {
            let mut rows = range.rows().map(|r| r.iter().map(cell_from_data).collect::<Vec<_>>());
            let header = rows
                .next()
                .map(|h| {
                    h.into_iter()
                        .map(|c| if c.is_missing() { String::new() } else { c.display() })
                        .collect()
                })
                .unwrap_or_default();
            let frame = Frame::from_rows(header, rows.collect()).map_err(corrupt)?;
            Ok((name, frame))
        })
        .collect()
}

/// Whole numbers come back from workbooks as floats; they are read as integers.
fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Cell::Int(*f as i64),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => Cell::Text(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(content: &[u8], filename: &str, config: &PreprocessConfig) -> (Extraction, crate::output::DocumentMetadata) {
        let mut meta = MetadataBuilder::new(DocumentType::Excel, ".csv");
        let out = SpreadsheetExtractor { config }
            .extract(content, filename, ".csv", &mut meta)
            .unwrap();
        (out, meta.build())
    }

    #[test]
    fn sheet_name_is_file_stem() {
        assert_eq!(sheet_name_for("reports/q3.sales.csv"), "q3.sales");
        assert_eq!(sheet_name_for(".csv"), ".csv");
    }

    #[test]
    fn csv_sheet_is_cleaned() {
        let csv = b"Item,Notes,Qty\nbolt,,3\n,,\nnut,,5\n";
        let config = PreprocessConfig::default();
        let (out, meta) = run(csv, "parts.csv", &config);

        let sheets = out.intermediate.as_spreadsheet().unwrap();
        assert_eq!(sheets.total_sheets, 1);
        let sheet = &sheets.sheets[0];
        assert_eq!(sheet.sheet_name, "parts");
        assert_eq!(sheet.column_names, vec!["Item", "Qty"]);
        assert_eq!((sheet.rows, sheet.columns), (2, 2));
        assert_eq!(sheet.summary.shape.rows, 2);
        assert_eq!(sheet.data_types["Qty"], "int64");
        assert_eq!(sheet.sample_data.len(), 2);

        assert_eq!(meta.page_count, 1);
        assert_eq!(meta.estimated_quality, 1.0);
        assert_eq!(meta.preprocessing_applied, vec!["dataframe_cleaning", "data_type_detection"]);

        assert!(out.text.contains("--- Sheet: parts ---"));
        assert!(out.text.contains("Columns: Item, Qty"));
        assert!(out.text.contains("Rows: 2"));
    }

    #[test]
    fn sample_rows_are_capped() {
        let mut csv = String::from("n\n");
        for i in 0..20 {
            csv.push_str(&format!("{i}\n"));
        }
        let config = PreprocessConfig::default();
        let (out, _) = run(csv.as_bytes(), "n.csv", &config);
        assert_eq!(out.intermediate.as_spreadsheet().unwrap().sheets[0].sample_data.len(), 5);
    }

    #[test]
    fn ragged_csv_is_corrupt() {
        let config = PreprocessConfig::default();
        let mut meta = MetadataBuilder::new(DocumentType::Excel, ".csv");
        let err = SpreadsheetExtractor { config: &config }
            .extract(b"a,b\n1,2,3\n", "x.csv", ".csv", &mut meta)
            .unwrap_err();
        assert!(matches!(err, PreprocessError::CorruptDocument { .. }));
    }

    #[test]
    fn garbage_workbook_is_corrupt() {
        let config = PreprocessConfig::default();
        let mut meta = MetadataBuilder::new(DocumentType::Excel, ".xlsx");
        let err = SpreadsheetExtractor { config: &config }
            .extract(b"definitely not a zip", "x.xlsx", ".xlsx", &mut meta)
            .unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::CorruptDocument {
                document_type: DocumentType::Excel,
                ..
            }
        ));
    }

    #[test]
    fn workbook_cells_map_to_typed_cells() {
        assert_eq!(cell_from_data(&Data::Float(3.0)), Cell::Int(3));
        assert_eq!(cell_from_data(&Data::Float(3.5)), Cell::Float(3.5));
        assert_eq!(cell_from_data(&Data::String(String::new())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Bool(true));
    }
}
