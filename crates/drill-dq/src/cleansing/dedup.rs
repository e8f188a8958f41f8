//! Duplicate row removal.

use crate::error::{QualityError, Result, ResultExt};
use crate::table::Table;
use crate::types::DedupReport;
use crate::utils::unique_rows;
use tracing::debug;

/// A deduplicated table and what was removed.
#[derive(Debug, Clone)]
pub struct Deduplicated {
    pub table: Table,
    pub report: DedupReport,
}

/// Drop rows that repeat an earlier row, keeping the first occurrence.
///
/// With a `subset`, only those columns are compared. An empty subset means
/// whole rows. A subset naming a missing column is an error.
pub fn deduplicate(table: &Table, subset: Option<&[String]>) -> Result<Deduplicated> {
    let subset = subset.filter(|cols| !cols.is_empty());

    if let Some(missing) = subset
        .into_iter()
        .flatten()
        .find(|c| !table.has_column(c))
    {
        return Err(QualityError::ColumnNotFound(missing.clone()));
    }

    let rows_before = table.height();
    let frame = unique_rows(table.frame(), subset).computation("Dropping duplicate rows")?;

    let rows_after = frame.height();
    let removed = rows_before - rows_after;
    debug!(
        "Deduplicated {} -> {} rows ({} removed)",
        rows_before, rows_after, removed
    );

    Ok(Deduplicated {
        table: Table::new(frame),
        report: DedupReport {
            rows_before,
            rows_after,
            removed,
            subset: subset.map(<[String]>::to_vec),
        },
    })
}
