//! Per-cell detector attribution.
//!
//! The model gives only a row verdict. For flagged rows a cell is tagged
//! `iforest` when its model-input value falls outside a central quantile band
//! of its column. This is a display heuristic, not a feature importance.

use super::forest::ModelOutcome;
use super::iqr::IqrResult;
use crate::types::{AttributionTags, ModelColumnCount};
use crate::utils::quantile_sorted;
use std::collections::{BTreeMap, HashMap};

/// Builds attribution maps from both detector results.
#[derive(Debug)]
pub struct Attributor<'a> {
    iqr: &'a IqrResult,
    model: Option<&'a ModelOutcome>,
    /// Column name to (index into the model matrix, lower, upper).
    bands: HashMap<&'a str, (usize, f64, f64)>,
}

impl<'a> Attributor<'a> {
    pub fn new(
        iqr: &'a IqrResult,
        model: Option<&'a ModelOutcome>,
        lower_q: f64,
        upper_q: f64,
    ) -> Self {
        let mut bands = HashMap::new();
        if let Some(outcome) = model {
            for (idx, column) in outcome.matrix.columns.iter().enumerate() {
                let mut sorted = outcome.matrix.values[idx].clone();
                sorted.sort_by(f64::total_cmp);
                if let (Some(lo), Some(hi)) = (
                    quantile_sorted(&sorted, lower_q),
                    quantile_sorted(&sorted, upper_q),
                ) {
                    bands.insert(column.as_str(), (idx, lo, hi));
                }
            }
        }
        Self { iqr, model, bands }
    }

    pub fn is_model_flagged(&self, row: usize) -> bool {
        self.model
            .and_then(|m| m.mask.get(row).copied())
            .unwrap_or(false)
    }

    fn model_tags_cell(&self, column: &str, row: usize) -> bool {
        let (Some(outcome), Some(&(idx, lo, hi))) = (self.model, self.bands.get(column)) else {
            return false;
        };
        if !self.is_model_flagged(row) {
            return false;
        }
        let v = outcome.matrix.values[idx][row];
        v < lo || v > hi
    }

    /// Tags for one cell.
    pub fn tags(&self, column: &str, row: usize) -> AttributionTags {
        AttributionTags {
            iqr: self.iqr.is_cell_flagged(column, row),
            iforest: self.model_tags_cell(column, row),
        }
    }

    /// Non-empty tags for `row` over `columns`.
    pub fn row_attribution(&self, columns: &[String], row: usize) -> BTreeMap<String, AttributionTags> {
        columns
            .iter()
            .filter_map(|c| {
                let tags = self.tags(c, row);
                (!tags.is_empty()).then(|| (c.clone(), tags))
            })
            .collect()
    }

    /// Count of `iforest`-tagged cells per model column across all
    /// model-flagged rows, in matrix column order, zero counts omitted.
    pub fn model_column_counts(&self) -> Vec<ModelColumnCount> {
        let Some(outcome) = self.model else {
            return Vec::new();
        };
        outcome
            .matrix
            .columns
            .iter()
            .filter_map(|column| {
                let count = (0..outcome.matrix.rows)
                    .filter(|row| self.model_tags_cell(column, *row))
                    .count();
                (count > 0).then(|| ModelColumnCount {
                    column: column.clone(),
                    count_in_flagged: count,
                })
            })
            .collect()
    }
}
