//! Column alias resolution and unit conversion.
//!
//! Both steps only ever add columns. A canonical or derived column that
//! already exists is left alone, which makes a second run a no-op.

use crate::error::{Result, ResultExt};
use crate::table::{ColumnKind, Table};
use crate::types::{AppliedAlias, AppliedUnit, StandardizeReport};
use crate::utils::{f64_cells, parse_f64_cell, string_cells};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A canonical column name and its known alternate spellings, in search order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasRule {
    pub canonical: String,
    pub alternates: Vec<String>,
}

/// `derived = source × multiplier + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRule {
    pub derived: String,
    pub source: String,
    pub multiplier: f64,
    pub offset: f64,
}

/// Ordered alias and unit registries, loaded once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizationRules {
    aliases: Vec<AliasRule>,
    units: Vec<UnitRule>,
}

impl Default for StandardizationRules {
    fn default() -> Self {
        Self::builtin()
    }
}

impl StandardizationRules {
    pub fn new(aliases: Vec<AliasRule>, units: Vec<UnitRule>) -> Self {
        Self { aliases, units }
    }

    /// Drilling defaults: well and depth aliases, psi to bar.
    pub fn builtin() -> Self {
        Self::new(
            vec![
                AliasRule {
                    canonical: "well_id".to_string(),
                    alternates: vec!["well".to_string(), "WELL_ID".to_string()],
                },
                AliasRule {
                    canonical: "depth_m".to_string(),
                    alternates: vec!["depth".to_string(), "DEPTH_M".to_string()],
                },
            ],
            vec![UnitRule {
                derived: "pressure_bar".to_string(),
                source: "pressure_psi".to_string(),
                multiplier: 0.0689476,
                offset: 0.0,
            }],
        )
    }

    pub fn aliases(&self) -> &[AliasRule] {
        &self.aliases
    }

    pub fn units(&self) -> &[UnitRule] {
        &self.units
    }

    /// Display labels for every registered target, aliases first.
    pub fn target_labels(&self) -> Vec<String> {
        self.aliases
            .iter()
            .map(|rule| format!("Alias → {}", rule.canonical))
            .chain(self.units.iter().map(|rule| format!("Unit → {}", rule.derived)))
            .collect()
    }
}

/// A standardized table and the rules that fired.
#[derive(Debug, Clone)]
pub struct Standardized {
    pub table: Table,
    pub report: StandardizeReport,
}

/// Apply alias resolution, then unit conversion.
pub fn standardize(table: &Table, rules: &StandardizationRules) -> Result<Standardized> {
    let mut frame = table.frame().clone();
    let mut report = StandardizeReport::default();

    for rule in rules.aliases() {
        if frame.column(&rule.canonical).is_ok() {
            continue;
        }
        let Some(source) = rule
            .alternates
            .iter()
            .find(|alt| frame.column(alt.as_str()).is_ok())
        else {
            continue;
        };

        let mut copy = frame
            .column(source)
            .computation("Reading alias source")?
            .as_materialized_series()
            .clone();
        copy.rename(rule.canonical.as_str().into());
        frame.with_column(copy).computation("Adding alias column")?;

        debug!("Alias {} -> {}", source, rule.canonical);
        report.applied_aliases.push(AppliedAlias {
            canonical: rule.canonical.clone(),
            source: source.clone(),
        });
    }

    for rule in rules.units() {
        if frame.column(&rule.source).is_err() || frame.column(&rule.derived).is_ok() {
            continue;
        }

        let source = frame
            .column(&rule.source)
            .computation("Reading unit source")?
            .as_materialized_series();
        let (cells, failed_cells) = coerce_to_f64(source)?;
        let converted: Vec<Option<f64>> = cells
            .into_iter()
            .map(|v| v.map(|x| x * rule.multiplier + rule.offset))
            .collect();

        frame
            .with_column(Series::new(rule.derived.as_str().into(), converted))
            .computation("Adding converted column")?;

        debug!(
            "Unit {} -> {} ({} cells not numeric)",
            rule.source, rule.derived, failed_cells
        );
        report.applied_units.push(AppliedUnit {
            derived: rule.derived.clone(),
            source: rule.source.clone(),
            multiplier: rule.multiplier,
            offset: rule.offset,
            failed_cells,
        });
    }

    Ok(Standardized {
        table: Table::new(frame),
        report,
    })
}

/// Read a column as floats. Cells that cannot be read become null and are counted.
fn coerce_to_f64(series: &Series) -> Result<(Vec<Option<f64>>, usize)> {
    let kind = ColumnKind::from_dtype(series.dtype());
    match kind {
        ColumnKind::Integer | ColumnKind::Float | ColumnKind::Boolean => {
            Ok((f64_cells(series).computation("Casting unit source")?, 0))
        }
        ColumnKind::Date => {
            let non_null = series.len() - series.null_count();
            Ok((vec![None; series.len()], non_null))
        }
        ColumnKind::Text => {
            let mut failed = 0;
            let cells = string_cells(series)
                .computation("Reading unit source text")?
                .into_iter()
                .map(|cell| {
                    let text = cell?;
                    let parsed = parse_f64_cell(&text);
                    if parsed.is_none() {
                        failed += 1;
                    }
                    parsed
                })
                .collect();
            Ok((cells, failed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::Value;

    fn raw() -> Table {
        Table::new(
            df![
                "well" => ["A", "B"],
                "DEPTH_M" => [100.0, 200.0],
                "pressure_psi" => [1000.0, 2000.0],
            ]
            .unwrap(),
        )
    }

    #[test]
    fn test_aliases_and_units_added() {
        let result = standardize(&raw(), &StandardizationRules::builtin()).unwrap();
        let names = result.table.column_names();
        assert_eq!(
            names,
            vec!["well", "DEPTH_M", "pressure_psi", "well_id", "depth_m", "pressure_bar"]
        );
        assert_eq!(result.report.applied_aliases.len(), 2);
        assert_eq!(result.report.applied_aliases[1].source, "DEPTH_M");
        assert_eq!(result.report.applied_units[0].failed_cells, 0);

        let preview = result.table.preview(1);
        match &preview.rows[0][5] {
            Value::Float(bar) => assert!((bar - 68.9476).abs() < 1e-9),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_first_alternate_wins() {
        let table = Table::new(df!["WELL_ID" => ["x"], "well" => ["y"]].unwrap());
        let result = standardize(&table, &StandardizationRules::builtin()).unwrap();
        assert_eq!(result.report.applied_aliases[0].source, "well");
    }

    #[test]
    fn test_existing_columns_never_overwritten() {
        let table = Table::new(df!["well" => ["A"], "well_id" => ["keep"]].unwrap());
        let result = standardize(&table, &StandardizationRules::builtin()).unwrap();
        assert!(result.report.applied_aliases.is_empty());
        assert_eq!(
            result.table.preview(1).rows[0][1],
            Value::Text("keep".to_string())
        );
    }

    #[test]
    fn test_standardize_is_idempotent() {
        let rules = StandardizationRules::builtin();
        let once = standardize(&raw(), &rules).unwrap();
        let twice = standardize(&once.table, &rules).unwrap();
        assert!(twice.report.is_empty());
        assert!(once.table.same_contents(&twice.table));
    }

    #[test]
    fn test_text_source_coerces_per_cell() {
        let table = Table::new(df!["pressure_psi" => [Some("100"), Some("bad"), None]].unwrap());
        let result = standardize(&table, &StandardizationRules::builtin()).unwrap();
        assert_eq!(result.report.applied_units[0].failed_cells, 1);

        let bar = result.table.series("pressure_bar").unwrap();
        assert_eq!(bar.null_count(), 2);
        assert_eq!(result.table.kind_of("pressure_bar"), Some(ColumnKind::Float));
    }

    #[test]
    fn test_formatted_text_is_not_coerced() {
        let table = Table::new(
            df!["pressure_psi" => [Some("1,5"), Some("50%"), Some("$100"), Some(" 200 ")]].unwrap(),
        );
        let result = standardize(&table, &StandardizationRules::builtin()).unwrap();
        assert_eq!(result.report.applied_units[0].failed_cells, 3);

        let bar = result.table.series("pressure_bar").unwrap();
        assert_eq!(bar.null_count(), 3);
        let last = bar.f64().unwrap().get(3).unwrap();
        assert!((last - 13.78952).abs() < 1e-9);
    }

    #[test]
    fn test_target_labels() {
        assert_eq!(
            StandardizationRules::builtin().target_labels(),
            vec!["Alias → well_id", "Alias → depth_m", "Unit → pressure_bar"]
        );
    }
}
