//! Shared utilities for the quality engine.
//!
//! This module contains common helper functions used across multiple modules
//! to reduce code duplication and ensure consistency.

use polars::prelude::*;

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Parse a text cell as a plain decimal number.
///
/// Only surrounding whitespace is ignored. Thousands separators, currency
/// and percent signs make the cell unparseable.
pub fn parse_f64_cell(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

// =============================================================================
// Series Extraction Utilities
// =============================================================================

/// Cast a numeric series to `f64` cells, keeping nulls.
pub fn f64_cells(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

/// Non-null, finite values of a numeric series.
pub fn finite_values(series: &Series) -> PolarsResult<Vec<f64>> {
    Ok(f64_cells(series)?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect())
}

/// Render every cell as text, keeping nulls.
pub fn string_cells(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Number of distinct non-null values.
pub fn distinct_non_null(series: &Series) -> PolarsResult<usize> {
    let distinct = series.n_unique()?;
    Ok(if series.null_count() > 0 { distinct - 1 } else { distinct })
}

/// Number of distinct values counting null as a value of its own.
pub fn distinct_with_null(series: &Series) -> PolarsResult<usize> {
    series.n_unique()
}

// =============================================================================
// Row Uniqueness Utilities
// =============================================================================

/// Keep the first occurrence of each row over `subset` (all columns when
/// `None`), preserving row order. Nulls compare equal, as do `0.0` and `-0.0`.
pub fn unique_rows(df: &DataFrame, subset: Option<&[String]>) -> PolarsResult<DataFrame> {
    if df.width() == 0 || df.height() == 0 {
        return Ok(df.clone());
    }
    df.unique_stable(subset, UniqueKeepStrategy::First, None)
}

/// Count of full-row duplicates (rows minus distinct rows).
pub fn duplicate_row_count(df: &DataFrame) -> PolarsResult<usize> {
    Ok(df.height() - unique_rows(df, None)?.height())
}

// =============================================================================
// Numeric Utilities
// =============================================================================

/// Quantile of already-sorted values using linear interpolation between
/// the two nearest ranks. Returns `None` for an empty slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Sort a copy of the values and take the quantile.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Round to a fixed number of decimal places.
#[inline]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `part / whole × 100`, or `0` when `whole` is zero.
#[inline]
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

// =============================================================================
// Tests
// =============================================================================
