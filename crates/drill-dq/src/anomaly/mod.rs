//! Outlier detection and dataset anomaly reporting.
//!
//! Two detectors run side by side:
//! - [`IqrDetector`]: per-column interquartile fences
//! - [`ModelDetector`]: a seeded Isolation Forest over all numeric columns
//!
//! [`AnomalyEngine`] combines them into an [`AnomalySummary`] and a sample of
//! [`FlaggedRows`] with per-cell [`attribution`]. A model that cannot run
//! contributes no flags and a note; it never fails the report.

pub mod attribution;
pub mod forest;
pub mod iqr;

pub use attribution::Attributor;
pub use forest::{FeatureMatrix, IsolationForest, ModelDetector, ModelOutcome, ModelUnavailable};
pub use iqr::{IqrDetector, IqrResult};

use crate::config::EngineConfig;
use crate::error::{Result, ResultExt};
use crate::sanitize::{Value, sanitize};
use crate::table::Table;
use crate::types::{
    AnomalySummary, ColumnKindEntry, ColumnMissing, ColumnsSummary, DuplicateSummary,
    FlaggedRow, FlaggedRows, IqrSummary, MissingSummary, ModelSummary, Shape,
};
use crate::utils::{distinct_with_null, duplicate_row_count, percent, round_to};
use tracing::{debug, info, warn};

/// Both detector results for one table.
#[derive(Debug)]
pub struct Detection {
    pub iqr: IqrResult,
    pub model: std::result::Result<ModelOutcome, ModelUnavailable>,
}

impl Detection {
    pub fn model_outcome(&self) -> Option<&ModelOutcome> {
        self.model.as_ref().ok()
    }

    pub fn is_model_flagged(&self, row: usize) -> bool {
        self.model_outcome()
            .and_then(|m| m.mask.get(row).copied())
            .unwrap_or(false)
    }

    /// Rows flagged by either detector. Equals the IQR mask when the model is unavailable.
    pub fn union_mask(&self) -> Vec<bool> {
        self.iqr
            .row_mask
            .iter()
            .enumerate()
            .map(|(row, flagged)| *flagged || self.is_model_flagged(row))
            .collect()
    }
}

/// Runs the detectors and shapes their output for display.
#[derive(Debug, Clone, Default)]
pub struct AnomalyEngine {
    config: EngineConfig,
}

impl AnomalyEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Run both detectors on `table`.
    pub fn detect(&self, table: &Table) -> Result<Detection> {
        let iqr = IqrDetector::new(self.config.iqr_multiplier)
            .detect(table)
            .context("IQR detection")?;

        let model = ModelDetector::new(self.config.forest.clone()).detect(table);
        if let Err(reason) = &model {
            warn!("{}", reason);
        }

        Ok(Detection { iqr, model })
    }

    /// Dataset-level report: shape, missingness, duplicates, both detectors, column kinds.
    pub fn summary(&self, dataset_id: &str, table: &Table) -> Result<AnomalySummary> {
        let detection = self.detect(table)?;
        let rows = table.height();

        let by_column: Vec<ColumnMissing> = table
            .null_counts()
            .into_iter()
            .map(|(column, missing)| ColumnMissing {
                pct: round_to(percent(missing, rows), 2),
                column,
                missing,
            })
            .collect();
        let total_missing = table.total_nulls();

        let row_duplicates = duplicate_row_count(table.frame()).computation("Counting duplicates")?;

        let attributor = Attributor::new(
            &detection.iqr,
            detection.model_outcome(),
            self.config.attribution_lower_quantile,
            self.config.attribution_upper_quantile,
        );
        let iforest = match &detection.model {
            Ok(outcome) => {
                let per_column = attributor.model_column_counts();
                let flagged_columns = per_column.iter().map(|c| c.column.clone()).collect();
                ModelSummary {
                    available: true,
                    n_rows_flagged: outcome.flagged_rows(),
                    pct_rows_flagged: round_to(percent(outcome.flagged_rows(), rows), 2),
                    note: None,
                    per_column,
                    flagged_columns,
                }
            }
            Err(reason) => ModelSummary {
                available: false,
                n_rows_flagged: 0,
                pct_rows_flagged: 0.0,
                note: Some(reason.to_string()),
                per_column: Vec::new(),
                flagged_columns: Vec::new(),
            },
        };

        let mut constants = Vec::new();
        for name in table.column_names() {
            let distinct = distinct_with_null(table.series(&name)?)
                .computation(format!("Distinct values of '{}'", name))?;
            if distinct <= 1 {
                constants.push(name);
            }
        }

        let n_rows_flagged_union = detection.union_mask().iter().filter(|f| **f).count();
        info!(
            "Anomaly summary for {}: {} IQR rows, {} model rows, {} union",
            dataset_id,
            detection.iqr.flagged_rows(),
            iforest.n_rows_flagged,
            n_rows_flagged_union
        );

        Ok(sanitize(AnomalySummary {
            dataset_id: dataset_id.to_string(),
            shape: Shape {
                rows,
                columns: table.width(),
            },
            missing: MissingSummary {
                total_missing,
                pct_missing: round_to(percent(total_missing, table.total_cells()), 2),
                by_column,
            },
            duplicates: DuplicateSummary {
                row_duplicates,
                row_duplicates_pct: round_to(percent(row_duplicates, rows), 2),
            },
            outliers: IqrSummary {
                method: "iqr".to_string(),
                per_column: detection.iqr.bounds.clone(),
                n_rows_flagged: detection.iqr.flagged_rows(),
            },
            iforest,
            n_rows_flagged_union,
            columns: ColumnsSummary {
                kinds: table
                    .columns()
                    .map(|(column, kind)| ColumnKindEntry { column, kind })
                    .collect(),
                constants,
            },
        }))
    }

    /// Up to `limit` union-flagged rows in table order, showing at most
    /// `max_display_columns` columns. A limit of zero is raised to one.
    pub fn flagged_rows(
        &self,
        dataset_id: &str,
        table: &Table,
        limit: Option<usize>,
    ) -> Result<FlaggedRows> {
        let detection = self.detect(table)?;
        let limit = limit.unwrap_or(self.config.default_sample_limit).max(1);

        let mut columns = table.column_names();
        columns.truncate(self.config.max_display_columns);

        let attributor = Attributor::new(
            &detection.iqr,
            detection.model_outcome(),
            self.config.attribution_lower_quantile,
            self.config.attribution_upper_quantile,
        );

        let flagged: Vec<usize> = detection
            .union_mask()
            .iter()
            .enumerate()
            .filter_map(|(row, f)| f.then_some(row))
            .collect();

        let frame = table.frame();
        let rows = flagged
            .iter()
            .take(limit)
            .map(|&row| {
                let values = columns
                    .iter()
                    .map(|name| {
                        let cell = frame
                            .column(name)
                            .and_then(|col| col.get(row))
                            .computation(format!("Reading '{}' row {}", name, row))?;
                        Ok(Value::from_any(cell))
                    })
                    .collect::<Result<Vec<Value>>>()?;
                Ok(FlaggedRow {
                    row_index: row,
                    is_outlier_iqr: detection.iqr.row_mask[row],
                    is_outlier_iforest: detection.is_model_flagged(row),
                    values,
                    attribution: attributor.row_attribution(&columns, row),
                })
            })
            .collect::<Result<Vec<FlaggedRow>>>()?;

        debug!(
            "Returning {} of {} flagged rows for {}",
            rows.len(),
            flagged.len(),
            dataset_id
        );

        Ok(sanitize(FlaggedRows {
            dataset_id: dataset_id.to_string(),
            columns,
            total_flagged: flagged.len(),
            rows,
        }))
    }
}
