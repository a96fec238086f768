//! Joins the per-source tables into the final dataset.
//!
//! The join is a left-to-right inner join on the canonical municipality name:
//! a municipality missing from any table is dropped. That loss is intended
//! (only complete rows are analysable) and is recorded stage by stage in
//! [`MergeReport`].

use crate::config::ZeroSurfacePolicy;
use crate::error::{PipelineError, Result};
use crate::names::NameMapping;
use crate::sources::price::AVG_PRICE;
use crate::sources::surface::AVG_SURFACE;
use crate::table::{Row, Table, Value};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

pub const M2_PRICE: &str = "m2_price";

#[derive(Debug, Clone, PartialEq)]
pub struct JoinStage {
    pub table: String,
    pub table_rows: usize,
    pub rows_after: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    pub stages: Vec<JoinStage>,
    /// Municipalities removed because their `avg_surface` was zero.
    pub zero_surface: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MergedDataset {
    pub table: Table,
    pub report: MergeReport,
}

/// Rows keyed by canonical name; the first row wins on collisions.
fn canonical_index<'a>(table: &'a Table, names: &'a NameMapping) -> HashMap<&'a str, &'a Row> {
    let mut index = HashMap::with_capacity(table.len());
    for row in table.rows() {
        let key = names.canonicalize(&row.municipality);
        if index.contains_key(key) {
            warn!(table = table.name(), municipality = key, "duplicate key at merge, keeping first row");
            continue;
        }
        index.insert(key, row);
    }
    index
}

/// Inner-joins `tables` in order. The first table fixes the row order.
pub fn join(tables: &[Table], names: &NameMapping) -> Result<(Table, Vec<JoinStage>)> {
    let mut columns = Vec::new();
    let mut seen_columns = HashSet::new();
    for table in tables {
        for column in table.columns() {
            if !seen_columns.insert(column.as_str()) {
                return Err(PipelineError::DuplicateColumn {
                    column: column.clone(),
                });
            }
            columns.push(column.clone());
        }
    }

    let indexes: Vec<HashMap<&str, &Row>> = tables.iter().map(|t| canonical_index(t, names)).collect();
    let mut stages = Vec::with_capacity(tables.len());

    let mut keys: Vec<&str> = match tables.first() {
        Some(first) => {
            let mut seen = HashSet::new();
            first
                .rows()
                .iter()
                .map(|r| names.canonicalize(&r.municipality))
                .filter(|k| seen.insert(*k))
                .collect()
        }
        None => Vec::new(),
    };

    for (table, index) in tables.iter().zip(&indexes) {
        keys.retain(|k| index.contains_key(k));
        info!(
            table = table.name(),
            table_rows = table.len(),
            rows_after = keys.len(),
            "joined"
        );
        stages.push(JoinStage {
            table: table.name().to_string(),
            table_rows: table.len(),
            rows_after: keys.len(),
        });
    }

    let mut joined = Table::new("dataset", columns);
    for key in keys {
        let values: Vec<Value> = indexes
            .iter()
            .flat_map(|index| index[key].values.iter().copied())
            .collect();
        joined.insert(key, values);
    }

    Ok((joined, stages))
}

/// Appends `m2_price = avg_price / avg_surface`. Rows with a zero surface
/// are dropped or fail the run according to `policy`; the names of dropped
/// municipalities are returned.
pub fn derive_m2_price(table: &Table, policy: ZeroSurfacePolicy) -> Result<(Table, Vec<String>)> {
    let column = |name: &str| {
        table.column_index(name).ok_or_else(|| PipelineError::MissingColumn {
            column: name.to_string(),
        })
    };
    let price_idx = column(AVG_PRICE)?;
    let surface_idx = column(AVG_SURFACE)?;

    let mut columns = table.columns().to_vec();
    columns.push(M2_PRICE.to_string());
    let mut derived = Table::new(table.name(), columns);
    let mut zero_surface = Vec::new();

    for row in table.rows() {
        let price = row.values[price_idx].as_f64();
        let surface = row.values[surface_idx].as_f64();
        let m2_price = price / surface;

        if surface == 0.0 || !m2_price.is_finite() {
            if policy == ZeroSurfacePolicy::Fail {
                return Err(PipelineError::DivisionByZero {
                    municipality: row.municipality.clone(),
                });
            }
            warn!(municipality = %row.municipality, "avg_surface is zero, dropping row");
            zero_surface.push(row.municipality.clone());
            continue;
        }

        let mut values = row.values.clone();
        values.push(Value::Float(m2_price));
        derived.insert(row.municipality.clone(), values);
    }

    Ok((derived, zero_surface))
}

pub fn merge(tables: &[Table], names: &NameMapping, policy: ZeroSurfacePolicy) -> Result<MergedDataset> {
    let (joined, stages) = join(tables, names)?;
    let (table, zero_surface) = derive_m2_price(&joined, policy)?;

    info!(rows = table.len(), "merged dataset");
    Ok(MergedDataset {
        table,
        report: MergeReport { stages, zero_surface },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single(name: &str, column: &str, rows: &[(&str, f64)]) -> Table {
        let mut table = Table::new(name, vec![column.to_string()]);
        for (m, v) in rows {
            table.insert(*m, vec![Value::Float(*v)]);
        }
        table
    }

    fn prices() -> Table {
        single(
            "prices",
            AVG_PRICE,
            &[("Amsterdam", 600000.0), ("Utrecht", 450000.0), ("Ede", 380000.0)],
        )
    }

    fn surfaces() -> Table {
        single(
            "surface",
            AVG_SURFACE,
            &[("Ede", 125.0), ("Utrecht", 90.0), ("Zwolle", 110.0)],
        )
    }

    #[test]
    fn inner_join_keeps_common_keys_in_first_table_order() {
        let (joined, stages) = join(&[prices(), surfaces()], &NameMapping::default()).unwrap();

        assert_eq!(joined.municipalities().collect::<Vec<_>>(), vec!["Utrecht", "Ede"]);
        assert_eq!(joined.columns(), &[AVG_PRICE, AVG_SURFACE]);
        assert_eq!(
            stages.iter().map(|s| s.rows_after).collect::<Vec<_>>(),
            vec![3, 2]
        );
    }

    #[test]
    fn keys_are_reconciled_before_joining() {
        let names = NameMapping::new(
            [("Utrecht (gemeente)".to_string(), "Utrecht".to_string())].into_iter().collect(),
        )
        .unwrap();
        let surfaces = single("surface", AVG_SURFACE, &[("Utrecht (gemeente)", 90.0)]);
        let (joined, _) = join(&[prices(), surfaces], &names).unwrap();
        assert_eq!(joined.municipalities().collect::<Vec<_>>(), vec!["Utrecht"]);
    }

    #[test]
    fn shared_column_is_rejected() {
        let err = join(&[prices(), prices()], &NameMapping::default()).unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateColumn { .. }));
    }

    #[test]
    fn m2_price_is_price_over_surface() {
        let merged = merge(&[prices(), surfaces()], &NameMapping::default(), ZeroSurfacePolicy::Drop).unwrap();
        for row in merged.table.rows() {
            let price = merged.table.value(&row.municipality, AVG_PRICE).unwrap().as_f64();
            let surface = merged.table.value(&row.municipality, AVG_SURFACE).unwrap().as_f64();
            let m2 = merged.table.value(&row.municipality, M2_PRICE).unwrap().as_f64();
            assert_eq!(m2, price / surface);
        }
        assert_eq!(merged.table.value("Utrecht", M2_PRICE), Some(Value::Float(5000.0)));
    }

    #[test]
    fn zero_surface_is_dropped_and_reported() {
        let surfaces = single("surface", AVG_SURFACE, &[("Utrecht", 0.0), ("Ede", 125.0)]);
        let merged = merge(&[prices(), surfaces], &NameMapping::default(), ZeroSurfacePolicy::Drop).unwrap();

        assert_eq!(merged.table.len(), 1);
        assert_eq!(merged.report.zero_surface, vec!["Utrecht".to_string()]);
        assert!(merged
            .table
            .rows()
            .iter()
            .all(|r| merged.table.value(&r.municipality, AVG_SURFACE) != Some(Value::Float(0.0))));
    }

    #[test]
    fn zero_surface_fails_under_strict_policy() {
        let surfaces = single("surface", AVG_SURFACE, &[("Utrecht", 0.0)]);
        let err = merge(&[prices(), surfaces], &NameMapping::default(), ZeroSurfacePolicy::Fail).unwrap_err();
        assert!(matches!(err, PipelineError::DivisionByZero { municipality } if municipality == "Utrecht"));
    }

    #[test]
    fn missing_price_column_is_reported() {
        let err = merge(&[surfaces()], &NameMapping::default(), ZeroSurfacePolicy::Drop).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    proptest! {
        #[test]
        fn join_size_is_the_key_intersection(
            a in proptest::collection::btree_set("[a-h]", 0..8),
            b in proptest::collection::btree_set("[a-h]", 0..8),
            c in proptest::collection::btree_set("[a-h]", 0..8),
        ) {
            let tables = [
                single("a", "x", &a.iter().map(|k| (k.as_str(), 1.0)).collect::<Vec<_>>()),
                single("b", "y", &b.iter().map(|k| (k.as_str(), 2.0)).collect::<Vec<_>>()),
                single("c", "z", &c.iter().map(|k| (k.as_str(), 3.0)).collect::<Vec<_>>()),
            ];
            let (joined, _) = join(&tables, &NameMapping::default()).unwrap();

            let common = a.iter().filter(|k| b.contains(*k) && c.contains(*k)).count();
            prop_assert_eq!(joined.len(), common);
            prop_assert!(joined.len() <= tables.iter().map(Table::len).min().unwrap_or(0));
        }
    }
}
