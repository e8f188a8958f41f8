//! Isolation Forest outlier model.
//!
//! Trees isolate rows by recursive random splits on random features. Rows
//! that isolate in few splits score close to 1. The contamination share
//! sets the threshold: the most anomalous `contamination × n` rows (by
//! interpolated percentile of the scores) are flagged.

use crate::config::ForestConfig;
use crate::error::QualityError;
use crate::table::Table;
use crate::utils::{f64_cells, median, quantile};
use rand::SeedableRng;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use thiserror::Error;
use tracing::{debug, info};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Why the model detector produced no flags.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelUnavailable {
    #[error("IsolationForest unavailable: {rows} rows, at least {required} required")]
    InsufficientRows { rows: usize, required: usize },

    #[error("IsolationForest unavailable: no numeric column with values")]
    NoNumericColumns,

    #[error("IsolationForest error: {0}")]
    Failed(String),
}

impl From<QualityError> for ModelUnavailable {
    fn from(e: QualityError) -> Self {
        ModelUnavailable::Failed(e.to_string())
    }
}

/// Numeric input to the model: Infinity and NaN replaced by the column median.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    /// Column-major: `values[feature][row]`.
    pub values: Vec<Vec<f64>>,
    pub rows: usize,
}

impl FeatureMatrix {
    /// Build from the numeric columns of `table`, dropping columns with no finite value.
    pub fn from_table(table: &Table) -> Result<Self, QualityError> {
        let mut columns = Vec::new();
        let mut values = Vec::new();

        for name in table.numeric_columns() {
            let cells: Vec<Option<f64>> = f64_cells(table.series(&name)?)?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            let finite: Vec<f64> = cells.iter().flatten().copied().collect();
            let Some(fill) = median(&finite) else {
                debug!("Model input skips '{}': no finite values", name);
                continue;
            };

            values.push(cells.into_iter().map(|v| v.unwrap_or(fill)).collect());
            columns.push(name);
        }

        Ok(Self {
            columns,
            values,
            rows: table.height(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[inline]
    fn value(&self, feature: usize, row: usize) -> f64 {
        self.values[feature][row]
    }
}

/// Row mask and scores from a successful model run.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub matrix: FeatureMatrix,
    /// Anomaly score per row in (0, 1]; higher is more anomalous.
    pub scores: Vec<f64>,
    pub mask: Vec<bool>,
}

impl ModelOutcome {
    pub fn flagged_rows(&self) -> usize {
        self.mask.iter().filter(|f| **f).count()
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted ensemble of isolation trees.
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit `n_estimators` trees, each on `min(max_samples, rows)` rows drawn
    /// without replacement.
    pub fn fit(matrix: &FeatureMatrix, n_estimators: usize, max_samples: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let sample_size = max_samples.min(matrix.rows);
        let max_depth = (sample_size as f64).log2().ceil().max(0.0) as usize;

        let trees = (0..n_estimators)
            .map(|_| {
                let rows = sample(&mut rng, matrix.rows, sample_size).into_vec();
                build_tree(matrix, rows, 0, max_depth, &mut rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Anomaly score per row: `2^(−E[h(x)] / c(ψ))`.
    pub fn score(&self, matrix: &FeatureMatrix) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        (0..matrix.rows)
            .map(|row| {
                let mean_depth = self
                    .trees
                    .iter()
                    .map(|tree| path_length(tree, matrix, row, 0))
                    .sum::<f64>()
                    / self.trees.len().max(1) as f64;
                if norm > 0.0 {
                    2f64.powf(-mean_depth / norm)
                } else {
                    0.5
                }
            })
            .collect()
    }
}

fn build_tree(
    matrix: &FeatureMatrix,
    rows: Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= max_depth || rows.len() <= 1 {
        return Node::Leaf { size: rows.len() };
    }

    // Only features that still vary within this node can split it.
    let ranges: Vec<(usize, f64, f64)> = (0..matrix.columns.len())
        .filter_map(|feature| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let v = matrix.value(feature, r);
                (lo.min(v), hi.max(v))
            });
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();

    if ranges.is_empty() {
        return Node::Leaf { size: rows.len() };
    }

    let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
    let threshold = split_point(lo, hi, rng.r#gen::<f64>());
    let (left, right): (Vec<usize>, Vec<usize>) = rows
        .into_iter()
        .partition(|&r| matrix.value(feature, r) <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(matrix, left, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(matrix, right, depth + 1, max_depth, rng)),
    }
}

/// A point in `[lo, hi)` at fraction `u` of the range.
///
/// Interpolates without forming `hi - lo`, which is not finite for ranges
/// near the limits of `f64`.
fn split_point(lo: f64, hi: f64, u: f64) -> f64 {
    let threshold = lo * (1.0 - u) + hi * u;
    if threshold.is_finite() && threshold < hi {
        threshold.max(lo)
    } else {
        lo
    }
}

fn path_length(node: &Node, matrix: &FeatureMatrix, row: usize, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let next = if matrix.value(*feature, row) <= *threshold {
                left
            } else {
                right
            };
            path_length(next, matrix, row, depth + 1)
        }
    }
}

/// Expected path length of an unsuccessful search in a binary search tree of `n` nodes.
pub(crate) fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Runs the forest on a table when it has enough rows and numeric data.
#[derive(Debug, Clone)]
pub struct ModelDetector {
    config: ForestConfig,
}

impl Default for ModelDetector {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

impl ModelDetector {
    pub fn new(config: ForestConfig) -> Self {
        Self { config }
    }

    /// Fit and flag, or explain why the model could not run.
    pub fn detect(&self, table: &Table) -> Result<ModelOutcome, ModelUnavailable> {
        let rows = table.height();
        if rows < self.config.min_rows {
            return Err(ModelUnavailable::InsufficientRows {
                rows,
                required: self.config.min_rows,
            });
        }

        let matrix = FeatureMatrix::from_table(table)?;
        if matrix.is_empty() {
            return Err(ModelUnavailable::NoNumericColumns);
        }

        let forest = IsolationForest::fit(
            &matrix,
            self.config.n_estimators,
            self.config.max_samples,
            self.config.random_seed,
        );
        let scores = forest.score(&matrix);

        let negated: Vec<f64> = scores.iter().map(|s| -s).collect();
        let offset = quantile(&negated, self.config.contamination)
            .ok_or_else(|| ModelUnavailable::Failed("no scores".to_string()))?;
        let mask: Vec<bool> = negated.iter().map(|s| *s < offset).collect();

        let outcome = ModelOutcome {
            matrix,
            scores,
            mask,
        };
        info!(
            "IsolationForest flagged {} of {} rows",
            outcome.flagged_rows(),
            rows
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn clustered_with_outlier(n: usize) -> Table {
        let mut x: Vec<f64> = (0..n).map(|i| 10.0 + (i % 7) as f64 * 0.1).collect();
        let mut y: Vec<f64> = (0..n).map(|i| 50.0 + (i % 5) as f64 * 0.2).collect();
        x.push(500.0);
        y.push(-400.0);
        Table::new(df!["x" => x, "y" => y].unwrap())
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) is about 10.24
        assert!((average_path_length(256) - 10.24).abs() < 0.01);
    }

    #[test]
    fn test_flags_obvious_outlier() {
        let table = clustered_with_outlier(99);
        let outcome = ModelDetector::default().detect(&table).unwrap();

        assert_eq!(outcome.mask.len(), 100);
        assert!(outcome.mask[99]);
        assert!(outcome.flagged_rows() <= 3);
        let top = outcome
            .scores
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(outcome.scores[99], top);
    }

    #[test]
    fn test_split_point_stays_in_range() {
        assert_eq!(split_point(0.0, 10.0, 0.25), 2.5);
        assert_eq!(split_point(3.0, 4.0, 0.0), 3.0);

        let t = split_point(-1e308, 1e308, 0.75);
        assert!(t.is_finite());
        assert!(t >= -1e308 && t < 1e308);
        assert_eq!(split_point(-f64::MAX, f64::MAX, 0.5), 0.0);
    }

    #[test]
    fn test_extreme_magnitudes_do_not_break_the_model() {
        let mut x = vec![-1e308, 1e308];
        x.extend((2..12).map(|v| v as f64));
        let table = Table::new(df!["x" => x].unwrap());

        let outcome = ModelDetector::default().detect(&table).unwrap();
        assert_eq!(outcome.mask.len(), 12);
        assert!(outcome.scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_same_seed_same_mask() {
        let table = clustered_with_outlier(60);
        let a = ModelDetector::default().detect(&table).unwrap();
        let b = ModelDetector::default().detect(&table).unwrap();
        assert_eq!(a.mask, b.mask);
        assert_eq!(a.scores, b.scores);
    }

    #[test]
    fn test_too_few_rows() {
        let table = Table::new(df!["x" => [1.0, 2.0, 3.0]].unwrap());
        let err = ModelDetector::default().detect(&table).unwrap_err();
        assert_eq!(
            err,
            ModelUnavailable::InsufficientRows {
                rows: 3,
                required: 10
            }
        );
        assert!(err.to_string().contains("at least 10"));
    }

    #[test]
    fn test_no_numeric_columns() {
        let names: Vec<String> = (0..12).map(|i| format!("w{}", i)).collect();
        let table = Table::new(df!["well" => names].unwrap());
        let err = ModelDetector::default().detect(&table).unwrap_err();
        assert_eq!(err, ModelUnavailable::NoNumericColumns);
    }

    #[test]
    fn test_matrix_fills_infinity_with_median() {
        let table = Table::new(
            df![
                "x" => [Some(1.0), Some(f64::INFINITY), None, Some(3.0)],
                "dead" => [None::<f64>, None, None, None],
            ]
            .unwrap(),
        );
        let matrix = FeatureMatrix::from_table(&table).unwrap();
        assert_eq!(matrix.columns, vec!["x"]);
        assert_eq!(matrix.values[0], vec![1.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn test_constant_data_flags_nothing() {
        let table = Table::new(df!["x" => vec![4.0; 20]].unwrap());
        let outcome = ModelDetector::default().detect(&table).unwrap();
        assert_eq!(outcome.flagged_rows(), 0);
    }
}
