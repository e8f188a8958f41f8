//! Statistical helpers for column profiling.

/// Arithmetic mean, `None` for an empty slice.
pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`).
pub(crate) fn population_std(values: &[f64]) -> f64 {
    let Some(mean) = mean(values) else {
        return 0.0;
    };
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Count values whose absolute z-score exceeds `threshold`.
///
/// A zero standard deviation is replaced by one, so constant columns count zero.
pub(crate) fn zscore_outliers(values: &[f64], threshold: f64) -> usize {
    let Some(mean) = mean(values) else {
        return 0;
    };
    let std = match population_std(values) {
        s if s == 0.0 => 1.0,
        s => s,
    };
    values
        .iter()
        .filter(|v| ((*v - mean) / std).abs() > threshold)
        .count()
}

/// Smallest and largest value, `None` for an empty slice.
pub(crate) fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}
