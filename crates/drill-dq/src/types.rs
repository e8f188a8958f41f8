//! Serializable result records returned by the engine.
//!
//! Every record implements [`Sanitize`](crate::sanitize::Sanitize) so the
//! boundary can strip non-finite floats before handing results out.

use crate::sanitize::{Value, sanitize_fields};
use crate::table::{ColumnKind, RowsPreview};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

// ============================================================================
// Shared
// ============================================================================

/// Missing-value count for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub column: String,
    pub missing: usize,
    /// Share of the column's cells that are null, 0-100.
    pub pct: f64,
}

sanitize_fields!(ColumnMissing { pct });

// ============================================================================
// Cleansing
// ============================================================================

/// Outcome of removing duplicate rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub removed: usize,
    /// Columns compared, or `None` when whole rows were compared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subset: Option<Vec<String>>,
}

sanitize_fields!(DedupReport {});

/// A canonical column created from an alternate spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedAlias {
    pub canonical: String,
    pub source: String,
}

/// A derived column computed by unit conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedUnit {
    pub derived: String,
    pub source: String,
    pub multiplier: f64,
    pub offset: f64,
    /// Source cells that could not be read as numbers and became null.
    pub failed_cells: usize,
}

sanitize_fields!(AppliedUnit { multiplier, offset });

/// Outcome of alias resolution and unit conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardizeReport {
    pub applied_aliases: Vec<AppliedAlias>,
    pub applied_units: Vec<AppliedUnit>,
}

impl StandardizeReport {
    pub fn is_empty(&self) -> bool {
        self.applied_aliases.is_empty() && self.applied_units.is_empty()
    }
}

sanitize_fields!(StandardizeReport { applied_units });

/// How a column's nulls were filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImputeMethod {
    Median,
    Mode,
}

impl ImputeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ImputeMethod::Median => "median",
            ImputeMethod::Mode => "mode",
        }
    }
}

/// One column touched by imputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputation {
    pub column: String,
    pub filled: usize,
    pub method: ImputeMethod,
}

sanitize_fields!(Imputation {});

/// Before/after comparison of two tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub rows_before: usize,
    pub rows_after: usize,
    pub duplicates_before: usize,
    pub duplicates_after: usize,
    pub completeness_before_pct: f64,
    pub completeness_after_pct: f64,
}

sanitize_fields!(Kpis {
    completeness_before_pct,
    completeness_after_pct
});

/// Headline numbers of the cleansing preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewStats {
    pub rows: usize,
    pub duplicates: usize,
    pub missing_pct: f64,
    pub columns_with_missing: usize,
    pub completeness_pct: f64,
}

sanitize_fields!(PreviewStats {
    missing_pct,
    completeness_pct
});

/// What a cleansing run would do to a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleansingPreview {
    pub dataset_id: String,
    pub columns: Vec<String>,
    pub missing_by_column: Vec<ColumnMissing>,
    pub stats: PreviewStats,
    pub suggestions: Vec<String>,
    pub standardization_targets: Vec<String>,
}

sanitize_fields!(CleansingPreview {
    missing_by_column,
    stats
});

/// Options for the deduplicate step of an apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subset: Option<Vec<String>>,
}

/// Placeholder options for steps that take none. Presence enables the step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOptions {}

/// Transforms requested by an apply. A present key enables that step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyActions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduplicate: Option<DedupOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standardize: Option<StepOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impute: Option<StepOptions>,
}

impl ApplyActions {
    pub fn is_empty(&self) -> bool {
        self.deduplicate.is_none() && self.standardize.is_none() && self.impute.is_none()
    }
}

fn default_dry_run() -> bool {
    true
}

/// Request for a composed cleansing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub actions: ApplyActions,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

impl Default for ApplyRequest {
    fn default() -> Self {
        Self {
            dataset_id: None,
            actions: ApplyActions::default(),
            dry_run: true,
        }
    }
}

/// Result of a composed cleansing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub dataset_id: String,
    pub dry_run: bool,
    /// Human-readable list of the steps that ran, in execution order.
    pub applied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup: Option<DedupReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standardize: Option<StandardizeReport>,
    pub imputations: Vec<Imputation>,
    pub kpis: Kpis,
    pub preview_before: RowsPreview,
    pub preview_after: RowsPreview,
    /// Id of the derived dataset, set only when `dry_run` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_dataset_id: Option<String>,
}

sanitize_fields!(ApplyResult {
    standardize,
    kpis,
    preview_before,
    preview_after
});

// ============================================================================
// Profiling
// ============================================================================

/// Descriptive statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub column: String,
    pub kind: ColumnKind,
    pub null_pct: f64,
    pub unique_pct: f64,
    /// Numeric columns with at least one finite value only.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub outlier_count: usize,
    /// Set when the column could not be profiled and zeros were substituted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

sanitize_fields!(ColumnProfile {
    null_pct,
    unique_pct,
    min,
    max
});

// ============================================================================
// Anomalies
// ============================================================================

/// IQR fences and violation count for a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBounds {
    pub column: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

sanitize_fields!(ColumnBounds { lower, upper });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub rows: usize,
    pub columns: usize,
}

sanitize_fields!(Shape {});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingSummary {
    pub total_missing: usize,
    pub pct_missing: f64,
    pub by_column: Vec<ColumnMissing>,
}

sanitize_fields!(MissingSummary {
    pct_missing,
    by_column
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSummary {
    pub row_duplicates: usize,
    pub row_duplicates_pct: f64,
}

sanitize_fields!(DuplicateSummary { row_duplicates_pct });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqrSummary {
    pub method: String,
    pub per_column: Vec<ColumnBounds>,
    pub n_rows_flagged: usize,
}

sanitize_fields!(IqrSummary { per_column });

/// Cells attributed to the model among model-flagged rows, per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelColumnCount {
    pub column: String,
    pub count_in_flagged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub available: bool,
    pub n_rows_flagged: usize,
    pub pct_rows_flagged: f64,
    /// Why the model did not run, when unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub per_column: Vec<ModelColumnCount>,
    pub flagged_columns: Vec<String>,
}

sanitize_fields!(ModelSummary { pct_rows_flagged });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnKindEntry {
    pub column: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnsSummary {
    pub kinds: Vec<ColumnKindEntry>,
    /// Columns with at most one distinct value, null counted as a value.
    pub constants: Vec<String>,
}

sanitize_fields!(ColumnsSummary {});

/// Dataset-level anomaly report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub dataset_id: String,
    pub shape: Shape,
    pub missing: MissingSummary,
    pub duplicates: DuplicateSummary,
    pub outliers: IqrSummary,
    pub iforest: ModelSummary,
    /// Rows flagged by either detector.
    pub n_rows_flagged_union: usize,
    pub columns: ColumnsSummary,
}

sanitize_fields!(AnomalySummary {
    missing,
    duplicates,
    outliers,
    iforest
});

/// Detector tags for one cell of a flagged row.
///
/// Serializes as `"iqr"`, `"iforest"` or `"iqr,iforest"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributionTags {
    pub iqr: bool,
    pub iforest: bool,
}

impl AttributionTags {
    pub fn is_empty(&self) -> bool {
        !self.iqr && !self.iforest
    }

    pub fn label(&self) -> &'static str {
        match (self.iqr, self.iforest) {
            (true, true) => "iqr,iforest",
            (true, false) => "iqr",
            (false, true) => "iforest",
            (false, false) => "",
        }
    }
}

impl Serialize for AttributionTags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for AttributionTags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let mut tags = AttributionTags::default();
        for part in raw.split(',').map(str::trim) {
            match part {
                "iqr" => tags.iqr = true,
                "iforest" => tags.iforest = true,
                "" => {}
                other => {
                    return Err(serde::de::Error::custom(format!(
                        "unknown attribution tag '{}'",
                        other
                    )));
                }
            }
        }
        Ok(tags)
    }
}

/// One row flagged by either detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedRow {
    pub row_index: usize,
    pub is_outlier_iqr: bool,
    pub is_outlier_iforest: bool,
    /// Cells aligned with [`FlaggedRows::columns`].
    pub values: Vec<Value>,
    pub attribution: BTreeMap<String, AttributionTags>,
}

sanitize_fields!(FlaggedRow { values });

/// A sample of flagged rows for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedRows {
    pub dataset_id: String,
    pub columns: Vec<String>,
    pub total_flagged: usize,
    pub rows: Vec<FlaggedRow>,
}

sanitize_fields!(FlaggedRows { rows });

// ============================================================================
// Overview
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTypeLabel {
    pub column: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingStats {
    pub total_missing: usize,
    pub columns_with_missing: usize,
    pub missing_percentage: f64,
}

sanitize_fields!(MissingStats { missing_percentage });

/// Dataset-level quality score and type distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    pub rows: usize,
    pub columns: usize,
    pub completeness_pct: f64,
    pub uniqueness_pct: f64,
    pub quality_score: f64,
    pub missingness_by_column: Vec<ColumnMissing>,
    /// Column counts per storage category (Integer, Float, Date, Boolean, String).
    pub column_type_distribution: BTreeMap<String, usize>,
    /// Display label per column (Integer, Numeric, Date, Boolean, Text).
    pub column_types: Vec<ColumnTypeLabel>,
    pub missing_stats: MissingStats,
}

sanitize_fields!(Overview {
    completeness_pct,
    uniqueness_pct,
    quality_score,
    missingness_by_column,
    missing_stats
});

// ============================================================================
// Upload
// ============================================================================

/// Returned by an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub dataset_id: String,
    pub columns: Vec<String>,
    pub rows: usize,
    pub persistence: crate::store::PersistStatus,
}

sanitize_fields!(UploadReceipt {});
