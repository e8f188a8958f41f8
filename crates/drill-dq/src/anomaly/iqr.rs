//! Interquartile-range fences per numeric column.

use crate::error::{Result, ResultExt};
use crate::table::Table;
use crate::types::ColumnBounds;
use crate::utils::{f64_cells, quantile_sorted};
use std::collections::HashMap;

/// Per-column fences, per-cell flags and the row-level union.
#[derive(Debug, Clone, Default)]
pub struct IqrResult {
    /// One entry per numeric column with at least one finite value.
    pub bounds: Vec<ColumnBounds>,
    /// `cells[column][row]` is true when that cell lies outside the fences.
    pub cells: HashMap<String, Vec<bool>>,
    /// True for rows with any flagged cell.
    pub row_mask: Vec<bool>,
}

impl IqrResult {
    pub fn flagged_rows(&self) -> usize {
        self.row_mask.iter().filter(|f| **f).count()
    }

    pub fn is_cell_flagged(&self, column: &str, row: usize) -> bool {
        self.cells
            .get(column)
            .and_then(|flags| flags.get(row))
            .copied()
            .unwrap_or(false)
    }
}

/// Fences at `[Q1 − k·IQR, Q3 + k·IQR]`.
#[derive(Debug, Clone, Copy)]
pub struct IqrDetector {
    multiplier: f64,
}

impl Default for IqrDetector {
    fn default() -> Self {
        Self { multiplier: 1.5 }
    }
}

impl IqrDetector {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }

    /// Compute fences for every numeric column of `table`.
    ///
    /// Quartiles use finite values only. A column whose IQR is zero reports
    /// `[Q1, Q3]` with a count of zero and flags nothing.
    pub fn detect(&self, table: &Table) -> Result<IqrResult> {
        let rows = table.height();
        let mut result = IqrResult {
            row_mask: vec![false; rows],
            ..Default::default()
        };

        for name in table.numeric_columns() {
            let cells = f64_cells(table.series(&name)?)
                .computation(format!("IQR fences for '{}'", name))?;

            let mut finite: Vec<f64> = cells
                .iter()
                .flatten()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            finite.sort_by(f64::total_cmp);

            let q1 = quantile_sorted(&finite, 0.25);
            let q3 = quantile_sorted(&finite, 0.75);
            let (Some(q1), Some(q3)) = (q1, q3) else {
                continue;
            };

            let iqr = q3 - q1;
            if iqr == 0.0 {
                result.bounds.push(ColumnBounds {
                    column: name,
                    lower: q1,
                    upper: q3,
                    count: 0,
                });
                continue;
            }

            let lower = q1 - self.multiplier * iqr;
            let upper = q3 + self.multiplier * iqr;
            let flags: Vec<bool> = cells
                .iter()
                .map(|cell| matches!(cell, Some(v) if *v < lower || *v > upper))
                .collect();

            let count = flags.iter().filter(|f| **f).count();
            for (row, flagged) in flags.iter().enumerate() {
                result.row_mask[row] |= *flagged;
            }

            result.bounds.push(ColumnBounds {
                column: name.clone(),
                lower,
                upper,
                count,
            });
            result.cells.insert(name, flags);
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_reference_fences() {
        let table = Table::new(df!["x" => [1.0, 2.0, 3.0, 4.0, 5.0, 100.0]].unwrap());
        let result = IqrDetector::default().detect(&table).unwrap();

        let bounds = &result.bounds[0];
        assert!((bounds.lower - -1.5).abs() < 1e-12);
        assert!((bounds.upper - 8.5).abs() < 1e-12);
        assert_eq!(bounds.count, 1);
        assert_eq!(result.row_mask, vec![false, false, false, false, false, true]);
        assert!(result.is_cell_flagged("x", 5));
        assert!(!result.is_cell_flagged("x", 0));
    }

    #[test]
    fn test_zero_iqr_collapses_and_flags_nothing() {
        let table = Table::new(df!["flat" => [7i64, 7, 7, 7, 50]].unwrap());
        let result = IqrDetector::default().detect(&table).unwrap();

        let bounds = &result.bounds[0];
        assert_eq!((bounds.lower, bounds.upper, bounds.count), (7.0, 7.0, 0));
        assert_eq!(result.flagged_rows(), 0);
    }

    #[test]
    fn test_nulls_ignored_and_infinity_flagged() {
        let table = Table::new(
            df!["x" => [Some(1.0), None, Some(2.0), Some(3.0), Some(4.0), Some(f64::INFINITY)]]
                .unwrap(),
        );
        let result = IqrDetector::default().detect(&table).unwrap();
        assert_eq!(result.bounds[0].count, 1);
        assert!(result.row_mask[5]);
        assert!(!result.row_mask[1]);
    }

    #[test]
    fn test_non_numeric_and_empty_columns_skipped() {
        let table = Table::new(
            df![
                "well" => ["A", "B"],
                "empty" => [None::<f64>, None],
            ]
            .unwrap(),
        );
        let result = IqrDetector::default().detect(&table).unwrap();
        assert!(result.bounds.is_empty());
        assert_eq!(result.row_mask, vec![false, false]);
    }
}
