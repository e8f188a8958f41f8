//! Dataset-level quality score.

use crate::error::{Result, ResultExt};
use crate::sanitize::sanitize;
use crate::table::{ColumnKind, Table};
use crate::types::{ColumnMissing, ColumnTypeLabel, MissingStats, Overview};
use crate::utils::{duplicate_row_count, percent, round_to};
use std::collections::BTreeMap;
use tracing::debug;

const COMPLETENESS_WEIGHT: f64 = 0.6;
const UNIQUENESS_WEIGHT: f64 = 0.4;

/// Storage buckets reported in the type distribution, always all present.
const DISTRIBUTION_BUCKETS: [&str; 5] = ["Integer", "Float", "Date", "Boolean", "String"];

fn display_label(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => "Integer",
        ColumnKind::Float => "Numeric",
        ColumnKind::Date => "Date",
        ColumnKind::Boolean => "Boolean",
        ColumnKind::Text => "Text",
    }
}

fn distribution_bucket(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => "Integer",
        ColumnKind::Float => "Float",
        ColumnKind::Date => "Date",
        ColumnKind::Boolean => "Boolean",
        ColumnKind::Text => "String",
    }
}

/// Computes completeness, uniqueness and the weighted quality score.
///
/// `quality_score = 0.6 × completeness + 0.4 × uniqueness`, each rounded to
/// one decimal.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverviewCalculator;

impl OverviewCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn overview(&self, dataset_id: Option<&str>, table: &Table) -> Result<Overview> {
        let rows = table.height();
        let cells = table.total_cells();
        let total_missing = table.total_nulls();

        let completeness = if cells == 0 {
            0.0
        } else {
            100.0 - percent(total_missing, cells)
        };
        let duplicates = duplicate_row_count(table.frame()).computation("Counting unique rows")?;
        let uniqueness = percent(rows - duplicates, rows);
        let score = COMPLETENESS_WEIGHT * completeness + UNIQUENESS_WEIGHT * uniqueness;

        let null_counts = table.null_counts();
        let columns_with_missing = null_counts.iter().filter(|(_, n)| *n > 0).count();
        let missingness_by_column = null_counts
            .into_iter()
            .map(|(column, missing)| ColumnMissing {
                pct: round_to(percent(missing, rows), 2),
                column,
                missing,
            })
            .collect();

        let mut distribution: BTreeMap<String, usize> = DISTRIBUTION_BUCKETS
            .iter()
            .map(|b| (b.to_string(), 0))
            .collect();
        let mut column_types = Vec::with_capacity(table.width());
        for (column, kind) in table.columns() {
            *distribution
                .entry(distribution_bucket(kind).to_string())
                .or_default() += 1;
            column_types.push(ColumnTypeLabel {
                column,
                label: display_label(kind).to_string(),
            });
        }

        debug!(
            "Overview: completeness {:.1}, uniqueness {:.1}, score {:.1}",
            completeness, uniqueness, score
        );

        Ok(sanitize(Overview {
            dataset_id: dataset_id.map(str::to_string),
            rows,
            columns: table.width(),
            completeness_pct: round_to(completeness, 1),
            uniqueness_pct: round_to(uniqueness, 1),
            quality_score: round_to(score, 1),
            missingness_by_column,
            column_type_distribution: distribution,
            column_types,
            missing_stats: MissingStats {
                total_missing,
                columns_with_missing,
                missing_percentage: round_to(percent(total_missing, cells), 1),
            },
        }))
    }

    /// The zero-valued payload returned when no dataset resolves.
    pub fn empty() -> Overview {
        Overview {
            column_type_distribution: DISTRIBUTION_BUCKETS
                .iter()
                .map(|b| (b.to_string(), 0))
                .collect(),
            ..Overview::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_score_weights() {
        // complete, and every row appears twice
        let table = Table::new(
            df![
                "well" => ["A", "A", "B", "B"],
                "depth" => [1.0, 1.0, 2.0, 2.0],
            ]
            .unwrap(),
        );
        let overview = OverviewCalculator::new().overview(Some("ds"), &table).unwrap();

        assert_eq!(overview.completeness_pct, 100.0);
        assert_eq!(overview.uniqueness_pct, 50.0);
        assert_eq!(overview.quality_score, 80.0);
        assert_eq!(overview.dataset_id.as_deref(), Some("ds"));
    }

    #[test]
    fn test_types_and_missing_stats() {
        let table = Table::new(
            df![
                "n" => [Some(1i64), None, Some(3)],
                "x" => [0.5, 1.5, 2.5],
                "ok" => [true, false, true],
                "name" => [Some("a"), Some("b"), None],
            ]
            .unwrap(),
        );
        let overview = OverviewCalculator::new().overview(None, &table).unwrap();

        let labels: Vec<&str> = overview.column_types.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Integer", "Numeric", "Boolean", "Text"]);
        assert_eq!(overview.column_type_distribution["Float"], 1);
        assert_eq!(overview.column_type_distribution["String"], 1);
        assert_eq!(overview.column_type_distribution["Date"], 0);

        assert_eq!(overview.missing_stats.total_missing, 2);
        assert_eq!(overview.missing_stats.columns_with_missing, 2);
        assert_eq!(overview.missing_stats.missing_percentage, 16.7);
        assert_eq!(overview.completeness_pct, 83.3);
        assert_eq!(overview.missingness_by_column[0].pct, 33.33);
    }

    #[test]
    fn test_empty_payload() {
        let overview = OverviewCalculator::empty();
        assert_eq!(overview.rows, 0);
        assert_eq!(overview.quality_score, 0.0);
        assert_eq!(overview.column_type_distribution.len(), 5);
        assert!(overview.dataset_id.is_none());
    }

    #[test]
    fn test_zero_rows() {
        let table = Table::new(df!["x" => Vec::<f64>::new()].unwrap());
        let overview = OverviewCalculator::new().overview(None, &table).unwrap();
        assert_eq!(overview.completeness_pct, 0.0);
        assert_eq!(overview.uniqueness_pct, 0.0);
        assert_eq!(overview.quality_score, 0.0);
    }
}
