//! Drilling Data-Quality Engine
//!
//! Profiling, cleansing and anomaly detection for tabular drilling datasets,
//! built on Polars.
//!
//! # Overview
//!
//! - **Store**: [`TableStore`] keeps each uploaded dataset as a raw table plus
//!   an optional cleansed version, shared by handle across callers
//! - **Cleansing**: deduplication, alias/unit standardization and median/mode
//!   imputation, composable in a fixed order with before/after KPIs
//! - **Profiling**: per-column null and distinct percentages, min/max and
//!   z-score outlier counts
//! - **Anomalies**: IQR fences and a seeded Isolation Forest, with per-cell
//!   attribution of flagged rows
//! - **Overview**: completeness, uniqueness and a weighted quality score
//!
//! Every record leaving the engine is passed through [`sanitize`] so it holds
//! no NaN or infinite values.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use drill_dq::{ApplyActions, ApplyRequest, QualityService, StepOptions, Table, TableStore};
//! use std::sync::Arc;
//!
//! let service = QualityService::builder()
//!     .store(Arc::new(TableStore::new()))
//!     .build()?;
//!
//! let receipt = service.upload(Table::from_csv_path("wells.csv")?, "wells.csv");
//!
//! let result = service.apply(ApplyRequest {
//!     dataset_id: Some(receipt.dataset_id.clone()),
//!     actions: ApplyActions {
//!         impute: Some(StepOptions::default()),
//!         ..Default::default()
//!     },
//!     dry_run: false,
//! })?;
//!
//! let summary = service.anomaly_summary(result.new_dataset_id.as_deref())?;
//! println!("{} rows flagged", summary.n_rows_flagged_union);
//! ```
//!
//! # Configuration
//!
//! ```rust,ignore
//! use drill_dq::EngineConfig;
//!
//! let config = EngineConfig::builder()
//!     .iqr_multiplier(3.0)
//!     .contamination(0.05)
//!     .max_display_columns(12)
//!     .build()?;
//! ```

pub mod anomaly;
pub mod cleansing;
pub mod config;
pub mod error;
pub mod overview;
pub mod profiler;
pub mod sanitize;
pub mod service;
pub mod store;
pub mod table;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use anomaly::{AnomalyEngine, IqrDetector, ModelDetector, ModelOutcome, ModelUnavailable};
pub use cleansing::{AliasRule, StandardizationRules, UnitRule};
pub use config::{ConfigValidationError, EngineConfig, EngineConfigBuilder, ForestConfig};
pub use error::{QualityError, Result as QualityResult, ResultExt};
pub use overview::OverviewCalculator;
pub use profiler::Profiler;
pub use sanitize::{Sanitize, Value, sanitize};
pub use service::{QualityService, QualityServiceBuilder};
pub use store::{
    AddOutcome, DatasetEntry, DatasetMeta, EvictionPolicy, KeepLatest, PersistStatus, RetainAll,
    TableStore,
};
pub use table::{ColumnKind, RowsPreview, Table};
pub use types::{
    AnomalySummary, ApplyActions, ApplyRequest, ApplyResult, AttributionTags, CleansingPreview,
    ColumnProfile, DedupOptions, DedupReport, FlaggedRow, FlaggedRows, Imputation, ImputeMethod,
    Kpis, Overview, StandardizeReport, StepOptions, UploadReceipt,
};
