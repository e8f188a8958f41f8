//! Configuration types for the data-quality engine.
//!
//! This module provides the engine's tunables using the builder pattern.
//! Defaults reproduce the reference behaviour (1.5×IQR fences, |z| > 3,
//! a 200-tree forest at 2% contamination seeded with 42).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the Isolation Forest model detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of isolation trees in the ensemble.
    /// Default: 200
    pub n_estimators: usize,

    /// Maximum rows sub-sampled per tree (capped at the row count).
    /// Default: 256
    pub max_samples: usize,

    /// Expected share of anomalous rows, in (0.0, 0.5].
    /// Default: 0.02
    pub contamination: f64,

    /// Seed for the tree sampler, fixed for reproducible masks.
    /// Default: 42
    pub random_seed: u64,

    /// Minimum row count before the model runs at all.
    /// Default: 10
    pub min_rows: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_samples: 256,
            contamination: 0.02,
            random_seed: 42,
            min_rows: 10,
        }
    }
}

/// Configuration for the data-quality engine.
///
/// Use [`EngineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use drill_dq::config::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .iqr_multiplier(3.0)
///     .contamination(0.05)
///     .persist_dir("data")
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fence width in interquartile ranges beyond Q1/Q3.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Absolute z-score above which the profiler counts a value as outlier.
    /// Default: 3.0
    pub zscore_threshold: f64,

    /// Model detector settings.
    pub forest: ForestConfig,

    /// Lower quantile of the band used to attribute model flags to cells.
    /// Default: 0.30
    pub attribution_lower_quantile: f64,

    /// Upper quantile of the band used to attribute model flags to cells.
    /// Default: 0.70
    pub attribution_upper_quantile: f64,

    /// Maximum number of data columns returned with flagged sample rows.
    /// Default: 18
    pub max_display_columns: usize,

    /// Row limit for flagged samples when the caller gives none.
    /// Default: 100
    pub default_sample_limit: usize,

    /// Rows shown in before/after previews of an apply.
    /// Default: 5
    pub preview_rows: usize,

    /// Directory where uploaded raw tables are written as CSV.
    /// If None, uploads are held in memory only.
    /// Default: None
    pub persist_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iqr_multiplier: 1.5,
            zscore_threshold: 3.0,
            forest: ForestConfig::default(),
            attribution_lower_quantile: 0.30,
            attribution_upper_quantile: 0.70,
            max_display_columns: 18,
            default_sample_limit: 100,
            preview_rows: 5,
            persist_dir: None,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.iqr_multiplier.is_finite() && self.iqr_multiplier > 0.0) {
            return Err(ConfigValidationError::NonPositive {
                field: "iqr_multiplier".to_string(),
                value: self.iqr_multiplier,
            });
        }

        if !(self.zscore_threshold.is_finite() && self.zscore_threshold > 0.0) {
            return Err(ConfigValidationError::NonPositive {
                field: "zscore_threshold".to_string(),
                value: self.zscore_threshold,
            });
        }

        if !(self.forest.contamination > 0.0 && self.forest.contamination <= 0.5) {
            return Err(ConfigValidationError::InvalidContamination(
                self.forest.contamination,
            ));
        }

        if self.forest.n_estimators == 0 {
            return Err(ConfigValidationError::ZeroCount("n_estimators".to_string()));
        }

        if self.forest.max_samples < 2 {
            return Err(ConfigValidationError::ZeroCount("max_samples".to_string()));
        }

        if self.max_display_columns == 0 {
            return Err(ConfigValidationError::ZeroCount(
                "max_display_columns".to_string(),
            ));
        }

        let lo = self.attribution_lower_quantile;
        let hi = self.attribution_upper_quantile;
        if !((0.0..=1.0).contains(&lo) && (0.0..=1.0).contains(&hi) && lo < hi) {
            return Err(ConfigValidationError::InvalidQuantileBand { lower: lo, upper: hi });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be a positive number)")]
    NonPositive { field: String, value: f64 },

    #[error("Invalid contamination: {0} (must be in (0.0, 0.5])")]
    InvalidContamination(f64),

    #[error("Invalid count for '{0}' (too small)")]
    ZeroCount(String),

    #[error("Invalid attribution band [{lower}, {upper}] (need 0 <= lower < upper <= 1)")]
    InvalidQuantileBand { lower: f64, upper: f64 },
}

/// Builder for [`EngineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    iqr_multiplier: Option<f64>,
    zscore_threshold: Option<f64>,
    n_estimators: Option<usize>,
    max_samples: Option<usize>,
    contamination: Option<f64>,
    random_seed: Option<u64>,
    min_model_rows: Option<usize>,
    attribution_band: Option<(f64, f64)>,
    max_display_columns: Option<usize>,
    default_sample_limit: Option<usize>,
    preview_rows: Option<usize>,
    persist_dir: Option<PathBuf>,
}

impl EngineConfigBuilder {
    /// Set the IQR fence multiplier.
    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    /// Set the z-score threshold used by the profiler.
    pub fn zscore_threshold(mut self, threshold: f64) -> Self {
        self.zscore_threshold = Some(threshold);
        self
    }

    /// Set the number of trees in the forest.
    pub fn n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = Some(n);
        self
    }

    /// Set the per-tree sub-sample size.
    pub fn max_samples(mut self, n: usize) -> Self {
        self.max_samples = Some(n);
        self
    }

    /// Set the expected share of anomalous rows.
    pub fn contamination(mut self, contamination: f64) -> Self {
        self.contamination = Some(contamination);
        self
    }

    /// Set the forest seed.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Set the minimum number of rows before the model detector runs.
    pub fn min_model_rows(mut self, rows: usize) -> Self {
        self.min_model_rows = Some(rows);
        self
    }

    /// Set the quantile band used for model attribution.
    ///
    /// # Arguments
    /// * `lower` - lower quantile (e.g., 0.30)
    /// * `upper` - upper quantile (e.g., 0.70)
    pub fn attribution_band(mut self, lower: f64, upper: f64) -> Self {
        self.attribution_band = Some((lower, upper));
        self
    }

    /// Set the column cap for flagged sample rows.
    pub fn max_display_columns(mut self, n: usize) -> Self {
        self.max_display_columns = Some(n);
        self
    }

    /// Set the fallback row limit for flagged samples.
    pub fn default_sample_limit(mut self, n: usize) -> Self {
        self.default_sample_limit = Some(n);
        self
    }

    /// Set the number of rows in apply previews.
    pub fn preview_rows(mut self, n: usize) -> Self {
        self.preview_rows = Some(n);
        self
    }

    /// Write uploaded raw tables into this directory.
    pub fn persist_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EngineConfig` or an error if validation fails.
    pub fn build(self) -> Result<EngineConfig, ConfigValidationError> {
        let defaults = EngineConfig::default();
        let (lower, upper) = self.attribution_band.unwrap_or((
            defaults.attribution_lower_quantile,
            defaults.attribution_upper_quantile,
        ));

        let config = EngineConfig {
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            zscore_threshold: self.zscore_threshold.unwrap_or(defaults.zscore_threshold),
            forest: ForestConfig {
                n_estimators: self.n_estimators.unwrap_or(defaults.forest.n_estimators),
                max_samples: self.max_samples.unwrap_or(defaults.forest.max_samples),
                contamination: self.contamination.unwrap_or(defaults.forest.contamination),
                random_seed: self.random_seed.unwrap_or(defaults.forest.random_seed),
                min_rows: self.min_model_rows.unwrap_or(defaults.forest.min_rows),
            },
            attribution_lower_quantile: lower,
            attribution_upper_quantile: upper,
            max_display_columns: self
                .max_display_columns
                .unwrap_or(defaults.max_display_columns),
            default_sample_limit: self
                .default_sample_limit
                .unwrap_or(defaults.default_sample_limit),
            preview_rows: self.preview_rows.unwrap_or(defaults.preview_rows),
            persist_dir: self.persist_dir,
        };

        config.validate()?;
        Ok(config)
    }
}
