//! The in-memory table model.
//!
//! A [`Table`] is a polars `DataFrame` plus a [`ColumnKind`] per column. The
//! kind is decided once from the column dtype when the table is built and
//! carried alongside the frame, so every component branches on the same
//! closed set of kinds instead of re-inspecting dtypes.

use crate::error::{QualityError, Result, ResultExt};
use crate::sanitize::{Sanitize, Value, sanitize_fields};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Logical kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Date,
    Text,
}

impl ColumnKind {
    /// Classify a polars dtype.
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ColumnKind::Integer,
            DataType::Float32 | DataType::Float64 => ColumnKind::Float,
            DataType::Boolean => ColumnKind::Boolean,
            DataType::Date | DataType::Datetime(_, _) | DataType::Time => ColumnKind::Date,
            _ => ColumnKind::Text,
        }
    }

    /// Integer and float columns are numeric; booleans are not.
    #[inline]
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Date => "date",
            ColumnKind::Text => "text",
        }
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Ordered, named, typed columns of equal length.
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
    kinds: Vec<ColumnKind>,
}

impl Table {
    /// Wrap a frame, classifying each column once.
    pub fn new(frame: DataFrame) -> Self {
        let kinds = frame
            .get_columns()
            .iter()
            .map(|col| ColumnKind::from_dtype(col.dtype()))
            .collect();
        Self { frame, kinds }
    }

    /// Read a CSV file with a header row.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(QualityError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .map_parse_options(|opts| opts.with_try_parse_dates(true))
            .try_into_reader_with_file_path(Some(path.into()))
            .map_err(|e| QualityError::Parse(e.to_string()))?
            .finish()
            .map_err(|e| QualityError::Parse(e.to_string()))?;

        Ok(Self::new(frame))
    }

    /// Parse uploaded CSV bytes.
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .map_parse_options(|opts| opts.with_try_parse_dates(true))
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()
            .map_err(|e| QualityError::Parse(e.to_string()))?;

        Ok(Self::new(frame))
    }

    /// Serialize as CSV text, header first, column and row order preserved.
    pub fn to_csv_string(&self) -> Result<String> {
        let mut frame = self.frame.clone();
        let mut buf: Vec<u8> = Vec::new();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .finish(&mut frame)
            .context("Writing CSV")?;
        String::from_utf8(buf).map_err(|e| QualityError::Parse(e.to_string()))
    }

    /// Write the table to a CSV file.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut frame = self.frame.clone();
        let mut file = File::create(path.as_ref())?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)
            .context("Writing CSV")?;
        Ok(())
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn total_cells(&self) -> usize {
        self.height() * self.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.frame
            .get_column_index(name)
            .and_then(|idx| self.kinds.get(idx).copied())
    }

    /// Column names paired with their kinds, in column order.
    pub fn columns(&self) -> impl Iterator<Item = (String, ColumnKind)> + '_ {
        self.frame
            .get_column_names()
            .into_iter()
            .zip(self.kinds.iter().copied())
            .map(|(name, kind)| (name.to_string(), kind))
    }

    /// Names of integer and float columns, in column order.
    pub fn numeric_columns(&self) -> Vec<String> {
        self.columns()
            .filter(|(_, kind)| kind.is_numeric())
            .map(|(name, _)| name)
            .collect()
    }

    /// Borrow a column as a materialized series.
    pub fn series(&self, name: &str) -> Result<&Series> {
        self.frame
            .column(name)
            .map(|col| col.as_materialized_series())
            .map_err(|_| QualityError::ColumnNotFound(name.to_string()))
    }

    /// Null count per column, in column order.
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.frame
            .get_columns()
            .iter()
            .map(|col| (col.name().to_string(), col.null_count()))
            .collect()
    }

    pub fn total_nulls(&self) -> usize {
        self.frame.get_columns().iter().map(|col| col.null_count()).sum()
    }

    /// The first `n` rows as a new table.
    pub fn head(&self, n: usize) -> Table {
        Table::new(self.frame.slice(0, n))
    }

    /// Render rows as JSON-safe cells aligned with the column list.
    pub fn preview(&self, n: usize) -> RowsPreview {
        let frame = self.frame.slice(0, n);
        let columns = self.column_names();
        let rows = (0..frame.height())
            .map(|i| {
                frame
                    .get_columns()
                    .iter()
                    .map(|col| col.get(i).map(Value::from_any).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        RowsPreview { columns, rows }
    }

    /// Cell-for-cell equality, treating nulls as equal.
    pub fn same_contents(&self, other: &Table) -> bool {
        self.kinds == other.kinds && self.frame.equals_missing(&other.frame)
    }
}

impl From<DataFrame> for Table {
    fn from(frame: DataFrame) -> Self {
        Table::new(frame)
    }
}

/// A block of rows ready for display: `rows[row][col]` aligned with `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsPreview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

sanitize_fields!(RowsPreview { rows });

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let frame = df![
            "well" => ["A", "B", "C"],
            "depth" => [100i64, 200, 300],
            "pressure" => [Some(1.5), None, Some(3.0)],
            "active" => [true, false, true],
        ]
        .unwrap();
        Table::new(frame)
    }

    #[test]
    fn test_column_kinds_from_dtype() {
        let table = sample();
        assert_eq!(
            table.kinds(),
            &[
                ColumnKind::Text,
                ColumnKind::Integer,
                ColumnKind::Float,
                ColumnKind::Boolean
            ]
        );
        assert_eq!(table.kind_of("depth"), Some(ColumnKind::Integer));
        assert_eq!(table.kind_of("missing"), None);
    }

    #[test]
    fn test_numeric_columns_exclude_booleans() {
        let table = sample();
        assert_eq!(table.numeric_columns(), vec!["depth", "pressure"]);
        assert!(!ColumnKind::Boolean.is_numeric());
        assert_eq!(ColumnKind::from_dtype(&DataType::Date), ColumnKind::Date);
    }

    #[test]
    fn test_null_counts_and_cells() {
        let table = sample();
        assert_eq!(table.total_cells(), 12);
        assert_eq!(table.total_nulls(), 1);
        assert_eq!(table.null_counts()[2], ("pressure".to_string(), 1));
    }

    #[test]
    fn test_missing_column_is_typed_error() {
        let table = sample();
        let err = table.series("nope").unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_csv_round_trip_preserves_order() {
        let csv = "well,depth,pressure\nB,2,0.5\nA,1,\nC,3,1.25\n";
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();
        assert_eq!(table.column_names(), vec!["well", "depth", "pressure"]);
        assert_eq!(table.height(), 3);

        let text = table.to_csv_string().unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("well,depth,pressure"));
        assert_eq!(lines.next(), Some("B,2,0.5"));
        assert_eq!(lines.next(), Some("A,1,"));
    }

    #[test]
    fn test_preview_rows() {
        let table = sample();
        let preview = table.preview(2);
        assert_eq!(preview.columns.len(), 4);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[0][0], Value::Text("A".into()));
        assert_eq!(preview.rows[1][2], Value::Null);
    }

    #[test]
    fn test_same_contents() {
        let a = sample();
        let b = sample();
        assert!(a.same_contents(&b));
        assert!(!a.same_contents(&a.head(2)));
    }
}
