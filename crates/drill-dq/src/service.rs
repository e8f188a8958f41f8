//! The request-facing operations of the engine.
//!
//! [`QualityService`] resolves datasets in a shared [`TableStore`], copies the
//! table out, and runs the computation with no store lock held. Every record
//! it returns has passed through [`sanitize`].

use crate::anomaly::AnomalyEngine;
use crate::cleansing::{self, StandardizationRules};
use crate::config::EngineConfig;
use crate::error::{QualityError, Result, ResultExt};
use crate::overview::OverviewCalculator;
use crate::profiler::Profiler;
use crate::sanitize::sanitize;
use crate::store::{DatasetMeta, TableStore};
use crate::table::Table;
use crate::types::{
    AnomalySummary, ApplyRequest, ApplyResult, CleansingPreview, ColumnProfile, DedupReport,
    FlaggedRows, Imputation, Kpis, Overview, StandardizeReport, UploadReceipt,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Boundary service over a shared store.
///
/// # Example
///
/// ```rust,ignore
/// use drill_dq::{QualityService, TableStore, Table};
/// use std::sync::Arc;
///
/// let store = Arc::new(TableStore::new());
/// let service = QualityService::builder().store(store).build()?;
///
/// let receipt = service.upload(Table::from_csv_path("wells.csv")?, "wells.csv");
/// let summary = service.anomaly_summary(Some(&receipt.dataset_id))?;
/// ```
#[derive(Debug, Clone)]
pub struct QualityService {
    store: Arc<TableStore>,
    config: EngineConfig,
    rules: StandardizationRules,
    anomaly: AnomalyEngine,
    profiler: Profiler,
}

static_assertions::assert_impl_all!(QualityService: Send, Sync);

impl QualityService {
    pub fn builder() -> QualityServiceBuilder {
        QualityServiceBuilder::default()
    }

    pub fn store(&self) -> &Arc<TableStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Store a parsed table as a new dataset.
    pub fn upload(&self, table: Table, name: &str) -> UploadReceipt {
        let columns = table.column_names();
        let rows = table.height();
        let outcome = self.store.add(table, name);
        info!("Uploaded '{}' as {} ({} rows)", name, outcome.id, rows);
        UploadReceipt {
            dataset_id: outcome.id,
            columns,
            rows,
            persistence: outcome.persistence,
        }
    }

    /// Parse CSV bytes and store them. Nothing is stored when parsing fails.
    pub fn upload_csv(&self, bytes: &[u8], name: &str) -> Result<UploadReceipt> {
        let table = Table::from_csv_bytes(bytes).context(format!("Parsing '{}'", name))?;
        Ok(self.upload(table, name))
    }

    pub fn datasets(&self) -> Vec<DatasetMeta> {
        self.store.list()
    }

    pub fn profile(&self, id: Option<&str>) -> Result<Vec<ColumnProfile>> {
        let (_, table) = self.store.resolve(id)?;
        Ok(sanitize(self.profiler.profile(&table)))
    }

    pub fn cleansing_preview(&self, id: Option<&str>) -> Result<CleansingPreview> {
        let (id, table) = self.store.resolve(id)?;
        let preview = cleansing::preview(&id, &table, &self.rules).context("Cleansing preview")?;
        Ok(sanitize(preview))
    }

    /// Run the requested transforms on the dataset's current table.
    ///
    /// A dry run never touches the store. Otherwise the result is stored as a
    /// new dataset derived from the input, and its id returned.
    pub fn apply(&self, request: ApplyRequest) -> Result<ApplyResult> {
        let (id, before) = self.store.resolve(request.dataset_id.as_deref())?;
        let composed = cleansing::compose(&before, &request.actions, &self.rules)
            .context("Cleansing apply")?;
        let kpis = cleansing::kpis(&before, &composed.table)?;

        let preview_rows = self.config.preview_rows;
        let preview_before = before.preview(preview_rows);
        let preview_after = composed.table.preview(preview_rows);

        let new_dataset_id = if request.dry_run {
            debug!("Dry run on {}: {} steps", id, composed.applied.len());
            None
        } else {
            let parent_name = self.store.entry_snapshot(&id)?.name;
            let new_id = self.store.add_derived(
                before,
                composed.table,
                &format!("{} (cleansed)", parent_name),
                &id,
            );
            info!("Applied cleansing to {} as {}", id, new_id);
            Some(new_id)
        };

        Ok(sanitize(ApplyResult {
            dataset_id: id,
            dry_run: request.dry_run,
            applied: composed.applied,
            dedup: composed.dedup,
            standardize: composed.standardize,
            imputations: composed.imputations,
            kpis,
            preview_before,
            preview_after,
            new_dataset_id,
        }))
    }

    /// Deduplicate the dataset's current table in place.
    pub fn deduplicate(&self, id: &str, subset: Option<&[String]>) -> Result<DedupReport> {
        let table = self.store.get_clean(id)?;
        let result = cleansing::deduplicate(&table, subset)?;
        self.store.set_clean(id, result.table)?;
        Ok(sanitize(result.report))
    }

    /// Standardize the dataset's current table in place.
    pub fn standardize(&self, id: &str) -> Result<StandardizeReport> {
        let table = self.store.get_clean(id)?;
        let result = cleansing::standardize(&table, &self.rules)?;
        self.store.set_clean(id, result.table)?;
        Ok(sanitize(result.report))
    }

    /// Impute the dataset's current table in place.
    pub fn impute(&self, id: &str) -> Result<Vec<Imputation>> {
        let table = self.store.get_clean(id)?;
        let result = cleansing::impute_simple(&table)?;
        self.store.set_clean(id, result.table)?;
        Ok(sanitize(result.imputations))
    }

    /// Raw table against current table.
    pub fn kpis(&self, id: &str) -> Result<Kpis> {
        let raw = self.store.get_raw(id)?;
        let clean = self.store.get_clean(id)?;
        Ok(sanitize(cleansing::kpis(&raw, &clean)?))
    }

    pub fn anomaly_summary(&self, id: Option<&str>) -> Result<AnomalySummary> {
        let (id, table) = self.store.resolve(id)?;
        self.anomaly.summary(&id, &table)
    }

    pub fn anomaly_rows(&self, id: Option<&str>, limit: Option<usize>) -> Result<FlaggedRows> {
        let (id, table) = self.store.resolve(id)?;
        self.anomaly.flagged_rows(&id, &table, limit)
    }

    /// Quality overview, or the zero-valued payload when no dataset resolves.
    pub fn overview(&self, id: Option<&str>) -> Result<Overview> {
        match self.store.resolve(id) {
            Ok((id, table)) => OverviewCalculator::new().overview(Some(&id), &table),
            Err(e) if e.is_missing_dataset() => {
                warn!("Overview falls back to empty payload: {}", e);
                Ok(OverviewCalculator::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// The dataset's current table as CSV text, column and row order preserved.
    pub fn export_csv(&self, id: Option<&str>) -> Result<String> {
        let (id, table) = self.store.resolve(id)?;
        debug!("Exporting {} ({} rows)", id, table.height());
        table.to_csv_string()
    }
}

/// Builder for [`QualityService`].
#[derive(Debug, Default)]
pub struct QualityServiceBuilder {
    store: Option<Arc<TableStore>>,
    config: Option<EngineConfig>,
    rules: Option<StandardizationRules>,
}

impl QualityServiceBuilder {
    /// Share an existing store. Without one, a fresh store is created that
    /// persists into the configured `persist_dir`, if any.
    pub fn store(mut self, store: Arc<TableStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the built-in alias and unit registries.
    pub fn rules(mut self, rules: StandardizationRules) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn build(self) -> Result<QualityService> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| QualityError::InvalidConfig(e.to_string()))?;

        let store = self.store.unwrap_or_else(|| {
            let store = TableStore::new();
            Arc::new(match &config.persist_dir {
                Some(dir) => store.with_persist_dir(dir.clone()),
                None => store,
            })
        });

        Ok(QualityService {
            anomaly: AnomalyEngine::new(config.clone()),
            profiler: Profiler::new(config.zscore_threshold),
            rules: self.rules.unwrap_or_default(),
            store,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ApplyActions, DedupOptions, StepOptions};
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn service() -> QualityService {
        QualityService::builder().build().unwrap()
    }

    fn wells() -> Table {
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
    fn test_empty_store_errors_except_overview() {
        let service = service();
        assert!(matches!(service.profile(None), Err(QualityError::Empty)));
        assert!(matches!(service.anomaly_summary(None), Err(QualityError::Empty)));
        assert!(matches!(
            service.export_csv(Some("nope")),
            Err(QualityError::NotFound(_))
        ));

        let overview = service.overview(None).unwrap();
        assert_eq!(overview, OverviewCalculator::empty());
    }

    #[test]
    fn test_upload_receipt() {
        let service = service();
        let receipt = service.upload(wells(), "wells.csv");
        assert_eq!(receipt.rows, 4);
        assert_eq!(receipt.columns, vec!["well", "pressure_psi"]);
        assert_eq!(receipt.persistence, crate::store::PersistStatus::Disabled);
        assert_eq!(service.datasets().len(), 1);
    }

    #[test]
    fn test_upload_csv_parse_failure_stores_nothing() {
        let service = service();
        assert!(service.upload_csv(b"", "empty.csv").is_err());
        assert!(service.store().is_empty());
    }

    #[test]
    fn test_dry_run_leaves_store_untouched() {
        let service = service();
        let id = service.upload(wells(), "wells.csv").dataset_id;

        let result = service
            .apply(ApplyRequest {
                dataset_id: Some(id.clone()),
                actions: all_actions(),
                dry_run: true,
            })
            .unwrap();

        assert_eq!(result.applied.len(), 3);
        assert!(result.new_dataset_id.is_none());
        assert_eq!(result.kpis.rows_before, 4);
        assert_eq!(result.kpis.rows_after, 3);
        assert_eq!(result.preview_before.rows.len(), 4);
        assert_eq!(service.store().len(), 1);
        assert!(service.store().get_clean(&id).unwrap().same_contents(&wells()));
    }

    #[test]
    fn test_apply_persists_derived_dataset() {
        let service = service();
        let id = service.upload(wells(), "wells.csv").dataset_id;

        let result = service
            .apply(ApplyRequest {
                dataset_id: None,
                actions: all_actions(),
                dry_run: false,
            })
            .unwrap();

        let new_id = result.new_dataset_id.unwrap();
        assert_ne!(new_id, id);
        assert_eq!(service.store().latest_id().unwrap(), new_id);

        let entry = service.store().entry_snapshot(&new_id).unwrap();
        assert_eq!(entry.parent_id.as_deref(), Some(id.as_str()));
        assert_eq!(entry.current().total_nulls(), 0);
        assert!(entry.current().has_column("pressure_bar"));

        let kpis = service.kpis(&new_id).unwrap();
        assert_eq!(kpis.rows_before, 4);
        assert_eq!(kpis.rows_after, 3);
        assert_eq!(kpis.completeness_after_pct, 100.0);
    }

    #[test]
    fn test_in_place_steps_update_clean() {
        let service = service();
        let id = service.upload(wells(), "wells.csv").dataset_id;

        let report = service.deduplicate(&id, None).unwrap();
        assert_eq!(report.removed, 1);
        let report = service.standardize(&id).unwrap();
        assert_eq!(report.applied_units.len(), 1);
        let imputations = service.impute(&id).unwrap();
        assert!(!imputations.is_empty());

        assert_eq!(service.store().get_raw(&id).unwrap().height(), 4);
        assert_eq!(service.store().get_clean(&id).unwrap().total_nulls(), 0);

        let kpis = service.kpis(&id).unwrap();
        assert_eq!(kpis.duplicates_before, 1);
        assert_eq!(kpis.duplicates_after, 0);
    }

    #[test]
    fn test_deduplicate_unknown_subset_column() {
        let service = service();
        let id = service.upload(wells(), "wells.csv").dataset_id;
        let err = service
            .deduplicate(&id, Some(&["missing".to_string()]))
            .unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_export_preserves_order() {
        let service = service();
        service.upload(wells(), "wells.csv");
        let csv = service.export_csv(None).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("well,pressure_psi"));
        assert_eq!(lines.next(), Some("A,100.0"));
        assert_eq!(csv.lines().count(), 5);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.forest.contamination = 0.9;
        let err = QualityService::builder().config(config).build().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
