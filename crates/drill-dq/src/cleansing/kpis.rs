//! Before/after impact metrics.

use crate::error::{Result, ResultExt};
use crate::table::Table;
use crate::types::Kpis;
use crate::utils::{duplicate_row_count, round_to};

/// Percentage of non-null cells: `(1 − mean per-column null fraction) × 100`.
///
/// Zero for a table with no cells.
pub fn completeness_pct(table: &Table) -> f64 {
    if table.total_cells() == 0 {
        return 0.0;
    }
    let height = table.height() as f64;
    let mean_null_fraction = table
        .null_counts()
        .iter()
        .map(|(_, nulls)| *nulls as f64 / height)
        .sum::<f64>()
        / table.width() as f64;
    (1.0 - mean_null_fraction) * 100.0
}

/// Compare row counts, duplicates and completeness of two tables.
pub fn kpis(before: &Table, after: &Table) -> Result<Kpis> {
    Ok(Kpis {
        rows_before: before.height(),
        rows_after: after.height(),
        duplicates_before: duplicate_row_count(before.frame()).computation("Counting duplicates")?,
        duplicates_after: duplicate_row_count(after.frame()).computation("Counting duplicates")?,
        completeness_before_pct: round_to(completeness_pct(before), 2),
        completeness_after_pct: round_to(completeness_pct(after), 2),
    })
}
