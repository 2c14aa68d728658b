//! A small column-typed table used for spreadsheet sheets and PDF tables.
//!
//! [`Frame`] keeps cells row-major with the original row labels so that
//! cleaning (dropping blank rows) does not renumber the rows shown in the
//! text rendering. Column dtypes are inferred on demand from the cells.

use crate::error::UnitError;
use crate::output::{ColumnSummary, DataQuality, FrameSummary, Shape};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::warn;

/// Cell strings read as missing values.
pub const NA_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"];

/// Rendering of a missing cell in the text dump.
const MISSING: &str = "NaN";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("{expected} columns passed, passed data had {found} columns")]
    ShapeMismatch { expected: usize, found: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    /// Parse a delimited-text field, recognising NA tokens, integers, floats
    /// and booleans.
    pub fn parse(raw: &str) -> Cell {
        let s = raw.trim();
        if NA_TOKENS.contains(&s) {
            return Cell::Empty;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                return Cell::Float(f);
            }
        }
        match s {
            "True" | "true" | "TRUE" => Cell::Bool(true),
            "False" | "false" | "FALSE" => Cell::Bool(false),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    /// Text shown in renderings and used when coercing to strings.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => MISSING.to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) if f.is_nan() => MISSING.to_string(),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() < 1e16 => format!("{f:.1}"),
            Cell::Float(f) => f.to_string(),
            Cell::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Empty => Value::Null,
            Cell::Int(i) => Value::Number((*i).into()),
            Cell::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Inferred column type, named the way downstream consumers expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Int64,
    Float64,
    Bool,
    Object,
}

impl Dtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::Int64 => "int64",
            Dtype::Float64 => "float64",
            Dtype::Bool => "bool",
            Dtype::Object => "object",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Dtype::Int64 | Dtype::Float64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    /// Original row labels, parallel to `rows`.
    index: Vec<usize>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    /// Build a frame from header names and data rows.
    ///
    /// Short rows are padded with missing cells; a row wider than the header
    /// is an error. Blank header names become `Unnamed: <i>` and repeated
    /// names get a `.1`, `.2`… suffix.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Frame, FrameError> {
        let expected = header.len();
        if let Some(found) = rows.iter().map(Vec::len).find(|&n| n > expected) {
            return Err(FrameError::ShapeMismatch { expected, found });
        }
        let rows: Vec<Vec<Cell>> = rows
            .into_iter()
            .map(|mut r| {
                r.resize(expected, Cell::Empty);
                r
            })
            .collect();
        Ok(Frame {
            columns: unique_names(header),
            index: (0..rows.len()).collect(),
            rows,
        })
    }

    /// Build a frame whose columns are numbered `0..n`, for grids without a
    /// header row.
    pub fn headerless(rows: Vec<Vec<Cell>>) -> Frame {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let header = (0..width).map(|i| i.to_string()).collect();
        // rows never exceed `width`
        Frame::from_rows(header, rows).unwrap_or_else(|_| Frame::empty())
    }

    pub fn empty() -> Frame {
        Frame {
            columns: Vec::new(),
            index: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn shape(&self) -> Shape {
        Shape {
            rows: self.rows.len(),
            columns: self.columns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    fn column(&self, c: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |r| &r[c])
    }

    /// Normalise names, drop all-missing rows then columns, and coerce
    /// object columns to trimmed strings.
    pub fn clean(self) -> Frame {
        let Frame {
            columns,
            index,
            rows,
        } = self;

        let columns: Vec<String> = columns
            .into_iter()
            .map(|c| c.trim().replace(['\n', '\r'], " "))
            .collect();

        let (index, rows): (Vec<usize>, Vec<Vec<Cell>>) = index
            .into_iter()
            .zip(rows)
            .filter(|(_, r)| !r.iter().all(Cell::is_missing))
            .unzip();

        let keep: Vec<usize> = (0..columns.len())
            .filter(|&c| rows.iter().any(|r| !r[c].is_missing()))
            .collect();

        let mut frame = Frame {
            columns: keep.iter().map(|&c| columns[c].clone()).collect(),
            index,
            rows: rows
                .into_iter()
                .map(|r| keep.iter().map(|&c| r[c].clone()).collect())
                .collect(),
        };

        for c in 0..frame.columns.len() {
            if frame.dtype(c) == Dtype::Object {
                for row in frame.rows.iter_mut() {
                    if !row[c].is_missing() {
                        row[c] = Cell::Text(row[c].display().trim().to_string());
                    }
                }
            }
        }
        frame
    }

    /// Infer the dtype of column `c`.
    pub fn dtype(&self, c: usize) -> Dtype {
        let mut ints = 0usize;
        let mut floats = 0usize;
        let mut bools = 0usize;
        let mut missing = 0usize;
        let mut other = 0usize;
        for cell in self.column(c) {
            match cell {
                _ if cell.is_missing() => missing += 1,
                Cell::Int(_) => ints += 1,
                Cell::Float(_) => floats += 1,
                Cell::Bool(_) => bools += 1,
                _ => other += 1,
            }
        }
        match (ints, floats, bools, other) {
            (0, 0, 0, 0) => Dtype::Float64,
            (_, 0, 0, 0) if missing == 0 => Dtype::Int64,
            (_, _, 0, 0) => Dtype::Float64,
            (0, 0, _, 0) if missing == 0 => Dtype::Bool,
            _ => Dtype::Object,
        }
    }

    pub fn dtypes(&self) -> BTreeMap<String, String> {
        (0..self.columns.len())
            .map(|c| (self.columns[c].clone(), self.dtype(c).as_str().to_string()))
            .collect()
    }

    /// Rows as JSON objects keyed by column name, optionally only the first `limit`.
    pub fn records(&self, limit: Option<usize>) -> Vec<Map<String, Value>> {
        let take = limit.unwrap_or(self.rows.len());
        self.rows
            .iter()
            .take(take)
            .map(|r| {
                self.columns
                    .iter()
                    .zip(r)
                    .map(|(name, cell)| (name.clone(), cell.to_json()))
                    .collect()
            })
            .collect()
    }

    pub fn duplicate_rows(&self) -> usize {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|r| !seen.insert(format!("{r:?}")))
            .count()
    }

    /// Shape, per-column statistics and data-quality figures.
    ///
    /// A column whose statistics cannot be computed gets a degraded entry;
    /// the other columns are unaffected.
    pub fn summary(&self) -> FrameSummary {
        let shape = self.shape();
        let cells = shape.rows * shape.columns;
        let nulls: usize = self
            .rows
            .iter()
            .map(|r| r.iter().filter(|c| c.is_missing()).count())
            .sum();

        let mut column_info = BTreeMap::new();
        for (c, name) in self.columns.iter().enumerate() {
            let info = self.column_summary(c).unwrap_or_else(|e| {
                warn!("{}", e);
                ColumnSummary::degraded(&e)
            });
            column_info.insert(name.clone(), info);
        }

        FrameSummary {
            shape,
            column_info,
            data_quality: DataQuality {
                null_percentage: if cells == 0 {
                    0.0
                } else {
                    nulls as f64 / cells as f64 * 100.0
                },
                duplicate_rows: self.duplicate_rows(),
            },
        }
    }

    fn column_summary(&self, c: usize) -> Result<ColumnSummary, UnitError> {
        let dtype = self.dtype(c);
        let null_count = self.column(c).filter(|v| v.is_missing()).count();
        let unique_values = self
            .column(c)
            .filter(|v| !v.is_missing())
            .map(|v| format!("{v:?}"))
            .collect::<HashSet<_>>()
            .len();

        let mut summary = ColumnSummary {
            data_type: dtype.as_str().to_string(),
            null_count,
            unique_values,
            min: None,
            max: None,
            mean: None,
            error: None,
        };

        if dtype.is_numeric() {
            let values: Vec<f64> = self.column(c).filter_map(Cell::as_f64).collect();
            if !values.is_empty() {
                let mean = values.iter().sum::<f64>() / values.len() as f64;
                if !mean.is_finite() {
                    return Err(UnitError::ColumnSummaryFailed {
                        column: self.columns[c].clone(),
                        detail: "numeric overflow while computing mean".into(),
                    });
                }
                summary.min = values.iter().copied().reduce(f64::min);
                summary.max = values.iter().copied().reduce(f64::max);
                summary.mean = Some(mean);
            }
        }
        Ok(summary)
    }

    /// Aligned text table with a row-label column.
    ///
    /// With `max_rows`, longer frames show the first and last `max_rows / 2`
    /// rows around a `...` line.
    pub fn to_text(&self, max_rows: Option<usize>) -> String {
        if self.is_empty() {
            let cols = self
                .columns
                .iter()
                .map(|c| format!("'{c}'"))
                .collect::<Vec<_>>()
                .join(", ");
            return format!("Empty DataFrame\nColumns: [{cols}]\nIndex: []");
        }

        let n = self.rows.len();
        let shown: Vec<Option<usize>> = match max_rows {
            Some(m) if n > m => {
                let half = (m / 2).max(1);
                (0..half)
                    .map(Some)
                    .chain(std::iter::once(None))
                    .chain((n - half..n).map(Some))
                    .collect()
            }
            _ => (0..n).map(Some).collect(),
        };

        let label = |r: Option<usize>| r.map_or("...".to_string(), |r| self.index[r].to_string());
        let cell = |r: Option<usize>, c: usize| r.map_or("...".to_string(), |r| self.rows[r][c].display());

        let label_width = shown.iter().map(|&r| label(r).chars().count()).max().unwrap_or(0);
        let widths: Vec<usize> = (0..self.columns.len())
            .map(|c| {
                shown
                    .iter()
                    .map(|&r| cell(r, c).chars().count())
                    .chain(std::iter::once(self.columns[c].chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::with_capacity(shown.len() + 1);
        let mut header = " ".repeat(label_width);
        for (c, name) in self.columns.iter().enumerate() {
            header.push_str(&format!("  {:>w$}", name, w = widths[c]));
        }
        lines.push(header);

        for &r in &shown {
            let mut line = format!("{:<w$}", label(r), w = label_width);
            for (c, &w) in widths.iter().enumerate() {
                line.push_str(&format!("  {:>w$}", cell(r, c), w = w));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

fn unique_names(header: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    header
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let base = if name.trim().is_empty() {
                format!("Unnamed: {i}")
            } else {
                name
            };
            let mut candidate = base.clone();
            let mut k = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}.{k}");
                k += 1;
            }
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_cells() {
        assert_eq!(Cell::parse("42"), Cell::Int(42));
        assert_eq!(Cell::parse(" 1.5 "), Cell::Float(1.5));
        assert_eq!(Cell::parse("N/A"), Cell::Empty);
        assert_eq!(Cell::parse(""), Cell::Empty);
        assert_eq!(Cell::parse("TRUE"), Cell::Bool(true));
        assert_eq!(Cell::parse("inf"), text("inf"));
        assert_eq!(Cell::parse("Acme "), text("Acme "));
    }

    #[test]
    fn display_floats_like_pandas() {
        assert_eq!(Cell::Float(2.0).display(), "2.0");
        assert_eq!(Cell::Float(2.25).display(), "2.25");
        assert_eq!(Cell::Empty.display(), "NaN");
    }

    #[test]
    fn from_rows_pads_and_rejects() {
        let f = Frame::from_rows(names(&["a", "b"]), vec![vec![Cell::Int(1)]]).unwrap();
        assert_eq!(f.rows[0], vec![Cell::Int(1), Cell::Empty]);

        let err = Frame::from_rows(names(&["a"]), vec![vec![Cell::Int(1), Cell::Int(2)]]).unwrap_err();
        assert_eq!(err.to_string(), "1 columns passed, passed data had 2 columns");
    }

    #[test]
    fn header_names_are_filled_and_deduplicated() {
        let f = Frame::from_rows(names(&["x", "", "x", "x"]), vec![]).unwrap();
        assert_eq!(f.columns(), &["x", "Unnamed: 1", "x.1", "x.2"]);
    }

    #[test]
    fn clean_drops_empty_rows_and_columns() {
        let f = Frame::from_rows(
            names(&[" Name\n", "Empty", "Qty"]),
            vec![
                vec![text("Bolt "), Cell::Empty, Cell::Int(3)],
                vec![Cell::Empty, Cell::Empty, Cell::Empty],
                vec![text("Nut"), Cell::Empty, Cell::Int(5)],
            ],
        )
        .unwrap()
        .clean();
        assert_eq!(f.columns(), &["Name", "Qty"]);
        assert_eq!(f.shape(), Shape { rows: 2, columns: 2 });
        assert_eq!(f.index, vec![0, 2]);
        assert_eq!(f.rows[0][0], text("Bolt"));
    }

    #[test]
    fn clean_coerces_mixed_columns_to_text() {
        let f = Frame::from_rows(
            names(&["code", "qty"]),
            vec![
                vec![Cell::Int(7), Cell::Int(1)],
                vec![text("A1"), Cell::Int(2)],
                vec![Cell::Empty, Cell::Int(3)],
            ],
        )
        .unwrap()
        .clean();
        assert_eq!(f.dtype(0), Dtype::Object);
        assert_eq!(f.dtype(1), Dtype::Int64);
        assert_eq!(f.rows[0][0], text("7"));
        assert_eq!(f.rows[2][0], Cell::Empty);
    }

    #[test]
    fn dtype_inference() {
        let f = Frame::from_rows(
            names(&["i", "f", "i_na", "b", "b_na", "s"]),
            vec![
                vec![Cell::Int(1), Cell::Float(1.5), Cell::Int(1), Cell::Bool(true), Cell::Bool(true), text("a")],
                vec![Cell::Int(2), Cell::Int(2), Cell::Empty, Cell::Bool(false), Cell::Empty, Cell::Int(1)],
            ],
        )
        .unwrap();
        let d: Vec<_> = (0..6).map(|c| f.dtype(c).as_str()).collect();
        assert_eq!(d, vec!["int64", "float64", "float64", "bool", "object", "object"]);
    }

    #[test]
    fn summary_statistics() {
        let f = Frame::from_rows(
            names(&["qty", "name"]),
            vec![
                vec![Cell::Int(2), text("a")],
                vec![Cell::Int(4), text("b")],
                vec![Cell::Int(2), text("a")],
                vec![Cell::Empty, text("c")],
            ],
        )
        .unwrap();
        let s = f.summary();
        assert_eq!(s.shape, Shape { rows: 4, columns: 2 });
        assert_eq!(s.data_quality.duplicate_rows, 1);
        assert!((s.data_quality.null_percentage - 12.5).abs() < 1e-9);

        let qty = &s.column_info["qty"];
        assert_eq!(qty.data_type, "float64");
        assert_eq!(qty.null_count, 1);
        assert_eq!(qty.unique_values, 2);
        assert_eq!(qty.min, Some(2.0));
        assert_eq!(qty.max, Some(4.0));
        assert!((qty.mean.unwrap() - 8.0 / 3.0).abs() < 1e-9);

        let name = &s.column_info["name"];
        assert_eq!(name.data_type, "object");
        assert_eq!(name.unique_values, 3);
        assert_eq!(name.min, None);
    }

    #[test]
    fn overflowing_column_degrades_alone() {
        let f = Frame::from_rows(
            names(&["big", "ok"]),
            vec![
                vec![Cell::Float(f64::MAX), Cell::Int(1)],
                vec![Cell::Float(f64::MAX), Cell::Int(2)],
            ],
        )
        .unwrap();
        let s = f.summary();
        let big = &s.column_info["big"];
        assert_eq!(big.data_type, "unknown");
        assert_eq!(big.unique_values, 0);
        assert!(big.error.as_deref().unwrap().contains("big"));
        assert_eq!(s.column_info["ok"].mean, Some(1.5));
    }

    #[test]
    fn records_use_null_for_missing() {
        let f = Frame::from_rows(names(&["a", "b"]), vec![vec![Cell::Int(1), Cell::Empty]]).unwrap();
        let r = f.records(None);
        assert_eq!(r[0]["a"], Value::from(1));
        assert_eq!(r[0]["b"], Value::Null);
        assert_eq!(f.records(Some(0)).len(), 0);
    }

    #[test]
    fn text_rendering_is_aligned() {
        let f = Frame::from_rows(
            names(&["item", "qty"]),
            vec![vec![text("bolt"), Cell::Int(12)], vec![text("nut"), Cell::Empty]],
        )
        .unwrap();
        assert_eq!(f.to_text(None), "   item  qty\n0  bolt   12\n1   nut  NaN");
    }

    #[test]
    fn text_rendering_truncates() {
        let rows = (0..10).map(|i| vec![Cell::Int(i)]).collect();
        let f = Frame::from_rows(names(&["n"]), rows).unwrap();
        let text = f.to_text(Some(4));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[3].starts_with("..."));
        assert!(lines[5].starts_with('9'));
    }

    #[test]
    fn empty_frame_rendering() {
        let f = Frame::from_rows(names(&["a"]), vec![]).unwrap();
        assert_eq!(f.to_text(None), "Empty DataFrame\nColumns: ['a']\nIndex: []");
    }
}
