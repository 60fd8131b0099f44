//! Immutable copies of table state for the report log.

use crate::utils::{is_numeric_dtype, series_to_f64, series_to_strings};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One column of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotColumn {
    pub name: String,
    pub dtype: String,
    /// Numbers for numeric columns, strings otherwise; `null` where missing.
    pub values: Vec<Value>,
}

/// Detached copy of a table, labelled by sample id.
///
/// Holds plain values only, so later mutation of the live table can never
/// reach a snapshot already stored in the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub sample_ids: Vec<String>,
    pub columns: Vec<SnapshotColumn>,
}

impl DataSnapshot {
    /// Copy `df` (one row per entry of `sample_ids`).
    pub fn from_frame(sample_ids: &[String], df: &DataFrame) -> PolarsResult<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let values = if is_numeric_dtype(series.dtype()) {
                series_to_f64(series)?
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, Value::from))
                    .collect()
            } else {
                series_to_strings(series)?
                    .into_iter()
                    .map(|v| v.map_or(Value::Null, Value::String))
                    .collect()
            };
            columns.push(SnapshotColumn {
                name: series.name().to_string(),
                dtype: series.dtype().to_string(),
                values,
            });
        }
        Ok(Self {
            sample_ids: sample_ids.to_vec(),
            columns,
        })
    }

    pub fn column(&self, name: &str) -> Option<&SnapshotColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.sample_ids.len(), self.columns.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_copies_values() {
        let df = df![
            "gene_a" => [Some(1.0), None, Some(f64::NAN)],
            "group" => [Some("x"), Some("y"), None],
        ]
        .unwrap();
        let ids = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];

        let snap = DataSnapshot::from_frame(&ids, &df).unwrap();
        assert_eq!(snap.shape(), (3, 2));

        let gene = snap.column("gene_a").unwrap();
        assert_eq!(gene.values, vec![Value::from(1.0), Value::Null, Value::Null]);

        let group = snap.column("group").unwrap();
        assert_eq!(group.values[0], Value::String("x".into()));
        assert_eq!(group.values[2], Value::Null);
    }
}
