//! Table recovery from positioned page text.
//!
//! A PDF backend reports each visual text row as a [`LayoutLine`]: the row's
//! text split into cells wherever a wide horizontal gap separates glyphs.
//! A table is a run of at least [`MIN_TABLE_ROWS`] consecutive lines that
//! each have two or more cells. Each detected grid is then parsed into a
//! [`Frame`] (first row as header) and summarised.

use crate::error::UnitError;
use crate::output::TableRecord;
use crate::pipeline::frame::{Cell, Frame};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

pub const MIN_TABLE_ROWS: usize = 2;

/// Gap between cells in aligned text: two or more whitespace characters.
static RE_CELL_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// One visual row of a page, split into cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayoutLine {
    pub cells: Vec<String>,
}

impl LayoutLine {
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    /// Split a space-aligned line (as produced by text layout) into cells.
    pub fn from_aligned_text(line: &str) -> Self {
        Self {
            cells: RE_CELL_GAP
                .split(line.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    fn is_tabular(&self) -> bool {
        self.cells.len() >= 2
    }
}

/// Raw cell grids of every table-like run of lines.
pub fn detect_tables(lines: &[LayoutLine]) -> Vec<Vec<Vec<String>>> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();
    for line in lines {
        if line.is_tabular() {
            current.push(line.cells.clone());
        } else {
            flush(&mut current, &mut tables);
        }
    }
    flush(&mut current, &mut tables);
    tables
}

fn flush(current: &mut Vec<Vec<String>>, tables: &mut Vec<Vec<Vec<String>>>) {
    if current.len() >= MIN_TABLE_ROWS {
        tables.push(std::mem::take(current));
    } else {
        current.clear();
    }
}

/// Parse raw grids into table records.
///
/// Grids whose frame is empty after cleaning are skipped. A grid that cannot
/// be framed keeps its raw cells and a `processing_error`.
pub fn process_tables(page: usize, grids: Vec<Vec<Vec<String>>>) -> Vec<TableRecord> {
    let mut out = Vec::with_capacity(grids.len());
    for (i, grid) in grids.into_iter().enumerate() {
        let table_id = i + 1;
        if grid.is_empty() {
            continue;
        }
        match frame_from_grid(&grid) {
            Ok(frame) if frame.is_empty() => {
                debug!("Page {} table {}: empty after parsing", page, table_id);
            }
            Ok(frame) => {
                let frame = frame.clean();
                let shape = frame.shape();
                out.push(TableRecord {
                    table_id,
                    rows: shape.rows,
                    columns: shape.columns,
                    data: frame.records(None),
                    summary: Some(frame.summary()),
                    raw: None,
                    processing_error: None,
                });
            }
            Err(detail) => {
                let err = UnitError::TableParseFailed {
                    page,
                    table_id,
                    detail,
                };
                warn!("{}", err);
                out.push(TableRecord {
                    table_id,
                    rows: grid.len(),
                    columns: grid.first().map_or(0, Vec::len),
                    data: Vec::new(),
                    summary: None,
                    raw: Some(grid),
                    processing_error: Some(err.to_string()),
                });
            }
        }
    }
    out
}

/// First row is the header when there is more than one row.
fn frame_from_grid(grid: &[Vec<String>]) -> Result<Frame, String> {
    let parse_row = |row: &Vec<String>| row.iter().map(|c| Cell::parse(c)).collect::<Vec<_>>();
    match grid {
        [header, body @ ..] if !body.is_empty() && !header.is_empty() => {
            Frame::from_rows(header.clone(), body.iter().map(parse_row).collect())
                .map_err(|e| e.to_string())
        }
        _ => Ok(Frame::headerless(grid.iter().map(parse_row).collect())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> LayoutLine {
        LayoutLine::from_aligned_text(s)
    }

    #[test]
    fn aligned_text_splits_on_wide_gaps() {
        assert_eq!(
            line("  Item    Unit Price   Qty ").cells,
            vec!["Item", "Unit Price", "Qty"]
        );
        assert_eq!(line("Plain sentence here").cells, vec!["Plain sentence here"]);
        assert!(line("   ").cells.is_empty());
    }

    #[test]
    fn detects_runs_of_tabular_lines() {
        let lines = vec![
            line("Invoice 42"),
            line("Item    Qty"),
            line("Bolt    3"),
            line("Nut     5"),
            line("Thanks for your business"),
            line("A    B"),
            line("single"),
        ];
        let tables = detect_tables(&lines);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 3);
        assert_eq!(tables[0][1], vec!["Bolt", "3"]);
    }

    #[test]
    fn table_at_end_of_page_is_kept() {
        let lines = vec![line("a    b"), line("1    2")];
        assert_eq!(detect_tables(&lines).len(), 1);
    }

    #[test]
    fn process_table_with_header() {
        let grid = vec![
            vec!["Item".to_string(), "Qty".to_string()],
            vec!["Bolt".to_string(), "3".to_string()],
            vec!["Nut".to_string(), "5".to_string()],
        ];
        let records = process_tables(1, vec![grid]);
        assert_eq!(records.len(), 1);
        let t = &records[0];
        assert_eq!((t.table_id, t.rows, t.columns), (1, 2, 2));
        assert_eq!(t.data[1]["Qty"], serde_json::json!(5));
        let summary = t.summary.as_ref().unwrap();
        assert_eq!(summary.column_info["Qty"].max, Some(5.0));
        assert!(t.processing_error.is_none());
    }

    #[test]
    fn ragged_table_falls_back_to_raw() {
        let grid = vec![
            vec!["A".to_string(), "B".to_string()],
            vec!["1".to_string(), "2".to_string(), "3".to_string()],
        ];
        let records = process_tables(2, vec![grid.clone()]);
        let t = &records[0];
        assert_eq!(t.raw.as_ref(), Some(&grid));
        assert_eq!((t.rows, t.columns), (2, 2));
        assert!(t.summary.is_none());
        let err = t.processing_error.as_deref().unwrap();
        assert!(err.contains("2 columns passed, passed data had 3 columns"), "{err}");
    }
}
