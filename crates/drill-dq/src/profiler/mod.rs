//! Per-column descriptive statistics.
//!
//! This module provides functionality for profiling tables, including:
//! - Null and distinct-value percentages for every column
//! - Min/max over finite values for numeric columns
//! - Z-score outlier counts for numeric columns
//!
//! A column that fails to profile is replaced by a zeroed record carrying a
//! note; the rest of the profile still completes.

mod statistics;

use crate::error::{Result, ResultExt};
use crate::table::{ColumnKind, Table};
use crate::types::ColumnProfile;
use crate::utils::{distinct_non_null, finite_values, percent, round_to};
use tracing::{debug, warn};

/// Column profiler.
#[derive(Debug, Clone, Copy)]
pub struct Profiler {
    zscore_threshold: f64,
}

impl Default for Profiler {
    fn default() -> Self {
        Self {
            zscore_threshold: 3.0,
        }
    }
}

impl Profiler {
    pub fn new(zscore_threshold: f64) -> Self {
        Self { zscore_threshold }
    }

    /// Profile every column, in column order.
    pub fn profile(&self, table: &Table) -> Vec<ColumnProfile> {
        let profiles: Vec<ColumnProfile> = table
            .columns()
            .map(|(name, kind)| match self.profile_column(table, &name, kind) {
                Ok(profile) => profile,
                Err(e) => {
                    warn!("Profiling column '{}' failed: {}", name, e);
                    Self::fallback(name, kind, e.to_string())
                }
            })
            .collect();

        debug!("Profiled {} columns", profiles.len());
        profiles
    }

    fn profile_column(&self, table: &Table, name: &str, kind: ColumnKind) -> Result<ColumnProfile> {
        let series = table.series(name)?;
        let rows = table.height();

        let null_pct = percent(series.null_count(), rows);
        let unique = distinct_non_null(series).computation(format!("Distinct values of '{}'", name))?;
        let unique_pct = percent(unique, rows);

        let (min, max, outlier_count) = if kind.is_numeric() {
            let values =
                finite_values(series).computation(format!("Numeric values of '{}'", name))?;
            let (min, max) = match statistics::min_max(&values) {
                Some((lo, hi)) => (Some(round_to(lo, 2)), Some(round_to(hi, 2))),
                None => (None, None),
            };
            let outliers = statistics::zscore_outliers(&values, self.zscore_threshold);
            (min, max, outliers)
        } else {
            (None, None, 0)
        };

        Ok(ColumnProfile {
            column: name.to_string(),
            kind,
            null_pct: round_to(null_pct, 2),
            unique_pct: round_to(unique_pct, 2),
            min,
            max,
            outlier_count,
            note: None,
        })
    }

    fn fallback(column: String, kind: ColumnKind, reason: String) -> ColumnProfile {
        ColumnProfile {
            column,
            kind,
            null_pct: 0.0,
            unique_pct: 0.0,
            min: None,
            max: None,
            outlier_count: 0,
            note: Some(format!("profiling failed: {}", reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_profile_numeric_and_text() {
        let table = Table::new(
            df![
                "well" => [Some("A"), Some("A"), Some("B"), None],
                "depth" => [Some(10.0), Some(20.0), None, Some(f64::INFINITY)],
            ]
            .unwrap(),
        );
        let profiles = Profiler::default().profile(&table);

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].column, "well");
        assert_eq!(profiles[0].null_pct, 25.0);
        assert_eq!(profiles[0].unique_pct, 50.0);
        assert_eq!(profiles[0].min, None);

        assert_eq!(profiles[1].kind, ColumnKind::Float);
        assert_eq!(profiles[1].min, Some(10.0));
        assert_eq!(profiles[1].max, Some(20.0));
        assert_eq!(profiles[1].outlier_count, 0);
    }

    #[test]
    fn test_profile_all_null_numeric_has_no_bounds() {
        let table = Table::new(df!["x" => [None::<f64>, None]].unwrap());
        let profiles = Profiler::default().profile(&table);
        let profile = &profiles[0];
        assert_eq!(profile.null_pct, 100.0);
        assert_eq!(profile.min, None);
        assert_eq!(profile.max, None);
    }

    #[test]
    fn test_profile_counts_zscore_outliers() {
        let mut values: Vec<f64> = vec![5.0; 30];
        values.push(500.0);
        let table = Table::new(df!["p" => values].unwrap());
        assert_eq!(Profiler::default().profile(&table)[0].outlier_count, 1);
    }

    #[test]
    fn test_profile_empty_table() {
        let table = Table::new(df!["x" => Vec::<i64>::new()].unwrap());
        let profiles = Profiler::default().profile(&table);
        let profile = &profiles[0];
        assert_eq!(profile.null_pct, 0.0);
        assert_eq!(profile.unique_pct, 0.0);
    }

    #[test]
    fn test_fallback_record() {
        let record = Profiler::fallback("bad".to_string(), ColumnKind::Text, "boom".to_string());
        assert_eq!(record.outlier_count, 0);
        assert!(record.note.unwrap().contains("boom"));
    }
}
