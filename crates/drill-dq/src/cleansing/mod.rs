//! Cleansing transforms and their composition.
//!
//! This module provides:
//! - [`deduplicate`]: drop repeated rows, keeping the first
//! - [`standardize`]: add canonical alias and unit-converted columns
//! - [`impute_simple`]: fill nulls by median or mode
//! - [`compose`]: run a selection of the above in fixed order
//! - [`kpis`] and [`preview`]: before/after and pre-run summaries
//!
//! Every transform takes a table by reference and returns a new one.

mod dedup;
mod impute;
mod kpis;
mod standardize;

pub use dedup::{Deduplicated, deduplicate};
pub use impute::{Imputed, impute_simple};
pub use kpis::{completeness_pct, kpis};
pub use standardize::{AliasRule, StandardizationRules, Standardized, UnitRule, standardize};

use crate::error::{Result, ResultExt};
use crate::table::Table;
use crate::types::{
    ApplyActions, CleansingPreview, ColumnMissing, DedupReport, Imputation, PreviewStats,
    StandardizeReport,
};
use crate::utils::{duplicate_row_count, percent, round_to};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

/// Column names that usually identify a well or a record.
static KEY_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(well|well_id|id|uuid)$").expect("Invalid regex: key column"));

/// Output of [`compose`].
#[derive(Debug, Clone)]
pub struct Composed {
    pub table: Table,
    /// One human-readable line per step that ran.
    pub applied: Vec<String>,
    pub dedup: Option<DedupReport>,
    pub standardize: Option<StandardizeReport>,
    pub imputations: Vec<Imputation>,
}

/// Run the enabled transforms as deduplicate → standardize → impute.
///
/// The order is fixed regardless of how the request lists them; each step
/// consumes the previous step's output.
pub fn compose(
    table: &Table,
    actions: &ApplyActions,
    rules: &StandardizationRules,
) -> Result<Composed> {
    let mut current = table.clone();
    let mut composed = Composed {
        table: table.clone(),
        applied: Vec::new(),
        dedup: None,
        standardize: None,
        imputations: Vec::new(),
    };

    if let Some(options) = &actions.deduplicate {
        let result = deduplicate(&current, options.subset.as_deref()).context("Deduplicate")?;
        let subset = match &result.report.subset {
            Some(cols) => cols.join(", "),
            None => "ALL COLUMNS".to_string(),
        };
        composed
            .applied
            .push(format!("Deduplicated rows (subset={})", subset));
        composed.dedup = Some(result.report);
        current = result.table;
    }

    if actions.standardize.is_some() {
        let result = standardize(&current, rules).context("Standardize")?;
        composed.applied.push("Standardized aliases/units".to_string());
        composed.standardize = Some(result.report);
        current = result.table;
    }

    if actions.impute.is_some() {
        let result = impute_simple(&current).context("Impute")?;
        let total: usize = result.imputations.iter().map(|i| i.filled).sum();
        composed
            .applied
            .push(format!("Imputed missing values (total filled={})", total));
        composed.imputations = result.imputations;
        current = result.table;
    }

    info!("Composed {} cleansing steps", composed.applied.len());
    composed.table = current;
    Ok(composed)
}

/// Summarize what cleansing could do for a table, without changing it.
pub fn preview(
    dataset_id: &str,
    table: &Table,
    rules: &StandardizationRules,
) -> Result<CleansingPreview> {
    let columns = table.column_names();
    let height = table.height();

    let missing_by_column: Vec<ColumnMissing> = table
        .null_counts()
        .into_iter()
        .map(|(column, missing)| ColumnMissing {
            pct: round_to(percent(missing, height), 2),
            column,
            missing,
        })
        .collect();

    let columns_with_missing = missing_by_column.iter().filter(|c| c.missing > 0).count();
    let missing_pct = if missing_by_column.is_empty() {
        0.0
    } else {
        missing_by_column
            .iter()
            .map(|c| percent(c.missing, height))
            .sum::<f64>()
            / missing_by_column.len() as f64
    };
    let duplicates = duplicate_row_count(table.frame()).computation("Counting duplicates")?;

    let mut suggestions = Vec::new();
    if duplicates > 0 {
        suggestions.push(format!(
            "{} duplicate rows detected. Enable 'Remove duplicates'.",
            duplicates
        ));
    }
    if columns_with_missing > 0 {
        suggestions.push(format!(
            "{} columns contain missing values. Consider imputation.",
            columns_with_missing
        ));
    }
    if let Some(key) = columns.iter().find(|c| KEY_COLUMN.is_match(c)) {
        suggestions.push(format!(
            "Likely key column detected ({}). Use it for dedup subset.",
            key
        ));
    }
    suggestions.push(
        "Standardization can harmonize aliases (e.g., well→well_id) and convert units."
            .to_string(),
    );

    Ok(CleansingPreview {
        dataset_id: dataset_id.to_string(),
        columns,
        missing_by_column,
        stats: PreviewStats {
            rows: height,
            duplicates,
            missing_pct: round_to(missing_pct, 2),
            columns_with_missing,
            completeness_pct: round_to(completeness_pct(table), 2),
        },
        suggestions,
        standardization_targets: rules.target_labels(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DedupOptions, StepOptions};
    use polars::prelude::*;

    fn raw() -> Table {
        Table::new(
            df![
                "well" => [Some("A"), Some("A"), Some("B"), None],
                "pressure_psi" => [Some(100.0), Some(100.0), None, Some(300.0)],
            ]
            .unwrap(),
        )
    }

    fn all_actions() -> ApplyActions {
        ApplyActions {
            deduplicate: Some(DedupOptions::default()),
            standardize: Some(StepOptions::default()),
            impute: Some(StepOptions::default()),
        }
    }

    #[test]
    fn test_compose_runs_in_fixed_order() {
        let composed = compose(&raw(), &all_actions(), &StandardizationRules::builtin()).unwrap();

        assert_eq!(composed.applied.len(), 3);
        assert!(composed.applied[0].starts_with("Deduplicated rows (subset=ALL COLUMNS)"));
        assert_eq!(composed.applied[1], "Standardized aliases/units");
        assert!(composed.applied[2].starts_with("Imputed missing values"));

        assert_eq!(composed.table.height(), 3);
        assert_eq!(composed.table.total_nulls(), 0);
        // imputation saw the columns added by standardize
        let imputed: Vec<&str> = composed
            .imputations
            .iter()
            .map(|i| i.column.as_str())
            .collect();
        assert!(imputed.contains(&"well_id"));
        assert!(imputed.contains(&"pressure_bar"));
    }

    #[test]
    fn test_compose_with_nothing_enabled_is_identity() {
        let table = raw();
        let composed =
            compose(&table, &ApplyActions::default(), &StandardizationRules::builtin()).unwrap();
        assert!(composed.applied.is_empty());
        assert!(composed.table.same_contents(&table));
    }

    #[test]
    fn test_compose_subset_label() {
        let actions = ApplyActions {
            deduplicate: Some(DedupOptions {
                subset: Some(vec!["well".to_string()]),
            }),
            ..Default::default()
        };
        let composed = compose(&raw(), &actions, &StandardizationRules::builtin()).unwrap();
        assert_eq!(composed.applied[0], "Deduplicated rows (subset=well)");
        assert_eq!(composed.table.height(), 3);
    }

    #[test]
    fn test_preview_suggestions() {
        let preview = preview("ds", &raw(), &StandardizationRules::builtin()).unwrap();
        assert_eq!(preview.stats.rows, 4);
        assert_eq!(preview.stats.duplicates, 1);
        assert_eq!(preview.stats.columns_with_missing, 2);
        assert_eq!(preview.stats.missing_pct, 25.0);
        assert_eq!(preview.stats.completeness_pct, 75.0);
        assert_eq!(preview.missing_by_column[0].pct, 25.0);
        assert_eq!(preview.suggestions.len(), 4);
        assert!(preview.suggestions[2].contains("well"));
        assert_eq!(preview.standardization_targets.len(), 3);
    }

    #[test]
    fn test_key_column_pattern() {
        assert!(KEY_COLUMN.is_match("WELL_ID"));
        assert!(KEY_COLUMN.is_match("uuid"));
        assert!(!KEY_COLUMN.is_match("well_name"));
    }
}
