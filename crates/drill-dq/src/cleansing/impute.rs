//! Simple imputation: median for numeric columns, mode for everything else.

use crate::error::{Result, ResultExt};
use crate::table::{ColumnKind, Table};
use crate::types::{ImputeMethod, Imputation};
use crate::utils::{f64_cells, finite_values, median, string_cells};
use polars::prelude::*;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::{debug, warn};

/// An imputed table and one report entry per filled column.
#[derive(Debug, Clone)]
pub struct Imputed {
    pub table: Table,
    pub imputations: Vec<Imputation>,
}

/// Fill every null in every column that has at least one.
///
/// Numeric columns take the median of their finite values and become
/// floats; a numeric column with no values at all is left as is and
/// reported as a median imputation that filled nothing. Other
/// columns take their most frequent value, ties going to the smallest. A
/// non-numeric column with no values at all becomes text filled with `""`.
pub fn impute_simple(table: &Table) -> Result<Imputed> {
    let mut frame = table.frame().clone();
    let mut imputations = Vec::new();

    for (name, kind) in table.columns() {
        let series = table.series(&name)?;
        let nulls = series.null_count();
        if nulls == 0 {
            continue;
        }

        if kind.is_numeric() && nulls == series.len() {
            warn!("Column '{}' has no values to take a median from, left unfilled", name);
            imputations.push(Imputation {
                column: name,
                filled: 0,
                method: ImputeMethod::Median,
            });
            continue;
        }

        let (filled, method) = if kind.is_numeric() {
            (fill_median(series)?, ImputeMethod::Median)
        } else {
            (fill_mode(series, kind)?, ImputeMethod::Mode)
        };

        frame
            .replace(&name, filled)
            .computation(format!("Replacing column '{}'", name))?;

        debug!("Filled {} nulls in '{}' with {}", nulls, name, method.as_str());
        imputations.push(Imputation {
            column: name,
            filled: nulls,
            method,
        });
    }

    Ok(Imputed {
        table: Table::new(frame),
        imputations,
    })
}

fn fill_median(series: &Series) -> Result<Series> {
    let values = finite_values(series).computation("Reading numeric values")?;
    // Columns holding only NaN or infinities have no finite median.
    let fill = median(&values).unwrap_or(0.0);

    let cells: Vec<Option<f64>> = f64_cells(series)
        .computation("Reading numeric cells")?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill)))
        .collect();
    Ok(Series::new(series.name().clone(), cells))
}

fn fill_mode(series: &Series, kind: ColumnKind) -> Result<Series> {
    let name = series.name().clone();

    if series.null_count() == series.len() {
        let cells = vec![Some(String::new()); series.len()];
        return Ok(Series::new(name, cells));
    }

    match kind {
        ColumnKind::Boolean => {
            let cells: Vec<Option<bool>> = series
                .bool()
                .computation("Reading booleans")?
                .into_iter()
                .collect();
            let fill = mode(cells.iter().flatten().copied());
            Ok(Series::new(name, fill_cells(cells, fill)))
        }
        ColumnKind::Date => {
            let physical_dtype = series.dtype().to_physical();
            let cells: Vec<Option<i64>> = series
                .to_physical_repr()
                .cast(&DataType::Int64)
                .computation("Reading date values")?
                .i64()
                .computation("Reading date values")?
                .into_iter()
                .collect();
            let fill = mode(cells.iter().flatten().copied());
            let filled = Series::new(name, fill_cells(cells, fill))
                .cast(&physical_dtype)
                .computation("Restoring date type")?
                .cast(series.dtype())
                .computation("Restoring date type")?;
            Ok(filled)
        }
        ColumnKind::Text | ColumnKind::Integer | ColumnKind::Float => {
            let cells = string_cells(series).computation("Reading text values")?;
            let fill = mode(cells.iter().flatten().cloned());
            Ok(Series::new(name, fill_cells(cells, fill)))
        }
    }
}

fn fill_cells<T: Clone>(cells: Vec<Option<T>>, fill: Option<T>) -> Vec<Option<T>> {
    cells
        .into_iter()
        .map(|cell| cell.or_else(|| fill.clone()))
        .collect()
}

/// Most frequent value; ties go to the smallest value.
fn mode<T: Ord + Hash + Clone>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(va, ca), (vb, cb)| ca.cmp(cb).then_with(|| vb.cmp(va)))
        .map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::Value;

    #[test]
    fn test_numeric_median_fill() {
        let table = Table::new(df!["depth" => [Some(1i64), None, Some(3), Some(10)]].unwrap());
        let result = impute_simple(&table).unwrap();

        assert_eq!(result.imputations.len(), 1);
        assert_eq!(result.imputations[0].filled, 1);
        assert_eq!(result.imputations[0].method, ImputeMethod::Median);
        assert_eq!(result.table.kind_of("depth"), Some(ColumnKind::Float));
        assert_eq!(result.table.preview(4).rows[1][0], Value::Float(3.0));
    }

    #[test]
    fn test_text_mode_fill_with_tie_break() {
        let table = Table::new(
            df!["well" => [Some("B"), Some("A"), None, Some("B"), Some("A")]].unwrap(),
        );
        let result = impute_simple(&table).unwrap();
        assert_eq!(result.imputations[0].method, ImputeMethod::Mode);
        assert_eq!(result.table.preview(5).rows[2][0], Value::Text("A".to_string()));
    }

    #[test]
    fn test_all_null_text_column_gets_empty_string() {
        let table = Table::new(
            df![
                "note" => [None::<&str>, None],
                "x" => [1i64, 2],
            ]
            .unwrap(),
        );
        let result = impute_simple(&table).unwrap();
        assert_eq!(result.imputations.len(), 1);
        assert_eq!(result.table.series("note").unwrap().null_count(), 0);
        assert_eq!(result.table.preview(1).rows[0][0], Value::Text(String::new()));
    }

    #[test]
    fn test_boolean_mode_keeps_kind() {
        let table = Table::new(df!["active" => [Some(true), None, Some(true), Some(false)]].unwrap());
        let result = impute_simple(&table).unwrap();
        assert_eq!(result.table.kind_of("active"), Some(ColumnKind::Boolean));
        assert_eq!(result.table.preview(2).rows[1][0], Value::Bool(true));
    }

    #[test]
    fn test_no_nulls_remain_where_values_existed() {
        let table = Table::new(
            df![
                "a" => [Some(1.0), None, Some(f64::NAN)],
                "b" => [None, Some("x"), None],
                "c" => [Some(5i64), Some(6), Some(7)],
            ]
            .unwrap(),
        );
        let result = impute_simple(&table).unwrap();
        assert_eq!(result.table.total_nulls(), 0);
        let columns: Vec<&str> = result.imputations.iter().map(|i| i.column.as_str()).collect();
        assert_eq!(columns, vec!["a", "b"]);
    }

    #[test]
    fn test_all_null_numeric_column_reported_unfilled() {
        let table = Table::new(
            df![
                "gamma" => [None::<f64>, None, None],
                "x" => [1i64, 2, 3],
            ]
            .unwrap(),
        );
        let result = impute_simple(&table).unwrap();
        assert_eq!(
            result.imputations,
            vec![Imputation {
                column: "gamma".to_string(),
                filled: 0,
                method: ImputeMethod::Median,
            }]
        );
        assert_eq!(result.table.series("gamma").unwrap().null_count(), 3);
    }

    #[test]
    fn test_date_mode_fill_keeps_kind() {
        let spud = Series::new(
            "spud".into(),
            [Some(19_000i32), None, Some(19_000), Some(19_001)],
        )
        .cast(&DataType::Date)
        .unwrap();
        let table = Table::new(DataFrame::new(vec![spud.into()]).unwrap());
        assert_eq!(table.kind_of("spud"), Some(ColumnKind::Date));

        let result = impute_simple(&table).unwrap();
        assert_eq!(result.imputations[0].method, ImputeMethod::Mode);
        assert_eq!(result.imputations[0].filled, 1);
        assert_eq!(result.table.kind_of("spud"), Some(ColumnKind::Date));

        let filled = result.table.series("spud").unwrap();
        assert_eq!(filled.dtype(), &DataType::Date);
        assert_eq!(filled.null_count(), 0);
        let days = filled.to_physical_repr();
        assert_eq!(days.i32().unwrap().get(1), Some(19_000));
    }

    #[test]
    fn test_mode_helper() {
        assert_eq!(mode(vec![3, 1, 3, 1, 2].into_iter()), Some(1));
        assert_eq!(mode(Vec::<i64>::new().into_iter()), None);
    }
}
