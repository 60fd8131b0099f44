//! The working dataset: samples × features, plus derived views and the report log.
//!
//! Rows are samples keyed by `sample_ids`; `data` holds only feature columns.
//! The numeric and categorical views are recomputed from `data` after every
//! structural change, so they are never edited independently.

mod snapshot;

pub use snapshot::{DataSnapshot, SnapshotColumn};

use crate::error::{QcpError, Result, ResultExt};
use crate::types::{ColumnKind, ReportEntry};
use crate::utils::{is_numeric_dtype, series_to_f64, series_to_strings};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Samples removed from the working table by a train/test split.
#[derive(Debug, Clone)]
pub struct HeldOut {
    pub sample_ids: Vec<String>,
    pub data: DataFrame,
}

impl HeldOut {
    pub fn snapshot(&self) -> Result<DataSnapshot> {
        Ok(DataSnapshot::from_frame(&self.sample_ids, &self.data)?)
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    sample_ids: Vec<String>,
    data: DataFrame,
    numeric: DataFrame,
    categorical: DataFrame,
    held_out: Option<HeldOut>,
    report: Vec<ReportEntry>,
}

impl Dataset {
    /// Build from sample ids and a feature-only frame of the same height.
    pub fn new(sample_ids: Vec<String>, data: DataFrame) -> Result<Self> {
        if data.width() > 0 && data.height() != sample_ids.len() {
            return Err(QcpError::Validation(format!(
                "{} sample ids for a table of {} rows",
                sample_ids.len(),
                data.height()
            )));
        }
        ensure_unique("sample id", sample_ids.iter().map(String::as_str))?;

        let mut dataset = Self {
            sample_ids,
            data,
            numeric: DataFrame::empty(),
            categorical: DataFrame::empty(),
            held_out: None,
            report: Vec::new(),
        };
        dataset.split_numeric_categorical()?;
        Ok(dataset)
    }

    /// Build from a loaded table whose first column is the index.
    ///
    /// With `features_cols` false the table has features in rows, and is
    /// transposed so that rows become samples.
    pub fn from_frame(df: DataFrame, features_cols: bool) -> Result<Self> {
        let Some(index_col) = df.get_columns().first() else {
            return Err(QcpError::Validation("input table has no columns".into()));
        };
        let index_name = index_col.name().to_string();
        let labels = index_labels(index_col.as_materialized_series())?;
        let body = df.drop(&index_name)?;

        if features_cols {
            Self::new(labels, body)
        } else {
            ensure_unique("feature", labels.iter().map(String::as_str))?;
            let (sample_ids, data) = transpose(&labels, &body)?;
            debug!(
                "Transposed input: {} samples, {} features",
                sample_ids.len(),
                data.width()
            );
            Self::new(sample_ids, data)
        }
    }

    // ===== Accessors =====

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn data(&self) -> &DataFrame {
        &self.data
    }

    pub fn numeric(&self) -> &DataFrame {
        &self.numeric
    }

    pub fn categorical(&self) -> &DataFrame {
        &self.categorical
    }

    /// (samples, features)
    pub fn shape(&self) -> (usize, usize) {
        (self.sample_ids.len(), self.data.width())
    }

    pub fn held_out(&self) -> Option<&HeldOut> {
        self.held_out.as_ref()
    }

    pub fn report(&self) -> &[ReportEntry] {
        &self.report
    }

    pub fn into_report(self) -> Vec<ReportEntry> {
        self.report
    }

    pub fn numeric_names(&self) -> Vec<String> {
        column_names(&self.numeric)
    }

    pub fn categorical_names(&self) -> Vec<String> {
        column_names(&self.categorical)
    }

    /// Numeric view as `(name, values)` pairs, missing entries as `None`.
    pub fn numeric_columns(&self) -> Result<Vec<(String, Vec<Option<f64>>)>> {
        self.numeric
            .get_columns()
            .iter()
            .map(|col| {
                let series = col.as_materialized_series();
                Ok((series.name().to_string(), series_to_f64(series)?))
            })
            .collect()
    }

    /// Categorical view as `(name, values)` pairs.
    pub fn categorical_columns(&self) -> Result<Vec<(String, Vec<Option<String>>)>> {
        self.categorical
            .get_columns()
            .iter()
            .map(|col| {
                let series = col.as_materialized_series();
                Ok((series.name().to_string(), series_to_strings(series)?))
            })
            .collect()
    }

    // ===== Mutation =====

    /// Cast columns to their declared kinds.
    ///
    /// The whole mapping is checked before any column changes, so a bad entry
    /// leaves the table untouched.
    pub fn apply_type_mapping(&mut self, mapping: &BTreeMap<String, String>) -> Result<()> {
        let mut resolved = Vec::with_capacity(mapping.len());
        for (column, token) in mapping {
            if self.data.column(column).is_err() {
                return Err(QcpError::UnknownColumn(column.clone()));
            }
            let kind = ColumnKind::from_token(token).ok_or_else(|| QcpError::UnsupportedDtype {
                column: column.clone(),
                dtype: token.clone(),
            })?;
            resolved.push((column, kind));
        }

        for (column, kind) in resolved {
            let series = self.data.column(column)?.as_materialized_series().clone();
            let target = match kind {
                ColumnKind::Category => DataType::String,
                ColumnKind::Int => DataType::Int64,
                ColumnKind::Float => DataType::Float64,
            };
            if series.dtype() == &target {
                continue;
            }
            let cast = series
                .strict_cast(&target)
                .map_err(|e| QcpError::TypeConversionFailed {
                    column: column.clone(),
                    target_type: target.to_string(),
                    reason: e.to_string(),
                })?;
            debug!("Cast '{}' from {} to {}", column, series.dtype(), target);
            self.data.replace(column, cast)?;
        }

        self.split_numeric_categorical()
    }

    /// Recompute both views from the current column types.
    pub fn split_numeric_categorical(&mut self) -> Result<()> {
        let (numeric, categorical): (Vec<Column>, Vec<Column>) = self
            .data
            .get_columns()
            .iter()
            .cloned()
            .partition(|col| is_numeric_dtype(col.dtype()));
        self.numeric = DataFrame::new(numeric)?;
        self.categorical = DataFrame::new(categorical)?;
        Ok(())
    }

    /// Remove columns from the table and both views.
    pub fn drop_columns(&mut self, names: &[String]) -> Result<()> {
        if let Some(missing) = names.iter().find(|n| self.data.column(n).is_err()) {
            return Err(QcpError::UnknownColumn(missing.clone()));
        }
        for name in names {
            self.data = self.data.drop(name)?;
        }
        self.split_numeric_categorical()
    }

    /// Overwrite a column with float values. The column keeps its position.
    pub fn set_numeric_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        self.replace_column(Series::new(name.into(), values))
    }

    /// Swap in a series for the column of the same name.
    pub fn replace_column(&mut self, series: Series) -> Result<()> {
        let name = series.name().to_string();
        self.data
            .replace(&name, series)
            .context(format!("replacing column '{name}'"))?;
        self.split_numeric_categorical()
    }

    /// Overwrite every column of the numeric view at once.
    pub fn replace_numeric(&mut self, columns: Vec<(String, Vec<Option<f64>>)>) -> Result<()> {
        for (name, values) in columns {
            self.data
                .replace(&name, Series::new(name.as_str().into(), values))
                .context(format!("replacing column '{name}'"))?;
        }
        self.split_numeric_categorical()
    }

    pub fn set_categorical_column(&mut self, name: &str, values: Vec<Option<String>>) -> Result<()> {
        self.data
            .replace(name, Series::new(name.into(), values))
            .context(format!("replacing column '{name}'"))?;
        self.split_numeric_categorical()
    }

    /// Keep the rows where `mask` is true; the rest become the held-out set.
    ///
    /// A dataset is split at most once.
    pub fn hold_out(&mut self, mask: &[bool]) -> Result<&HeldOut> {
        if self.held_out.is_some() {
            return Err(QcpError::Validation(
                "dataset is already split into train and test samples".into(),
            ));
        }
        if mask.len() != self.sample_ids.len() {
            return Err(QcpError::Validation(format!(
                "row mask of length {} for {} samples",
                mask.len(),
                self.sample_ids.len()
            )));
        }
        let keep = BooleanChunked::from_slice("mask".into(), mask);
        let inverse: Vec<bool> = mask.iter().map(|m| !m).collect();
        let drop = BooleanChunked::from_slice("mask".into(), &inverse);

        let (train_ids, test_ids): (Vec<_>, Vec<_>) = self
            .sample_ids
            .iter()
            .cloned()
            .zip(mask)
            .partition(|(_, keep)| **keep);

        let held = HeldOut {
            sample_ids: test_ids.into_iter().map(|(id, _)| id).collect(),
            data: self.data.filter(&drop)?,
        };
        self.data = self.data.filter(&keep)?;
        self.sample_ids = train_ids.into_iter().map(|(id, _)| id).collect();
        self.split_numeric_categorical()?;

        Ok(&*self.held_out.insert(held))
    }

    // ===== Reporting =====

    /// Detached copy of the current table.
    pub fn snapshot(&self) -> Result<DataSnapshot> {
        Ok(DataSnapshot::from_frame(&self.sample_ids, &self.data)?)
    }

    /// Append to the report log.
    pub fn record_step(&mut self, entry: ReportEntry) {
        self.report.push(entry);
    }
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

fn ensure_unique<'a>(what: &str, labels: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    let duplicates: Vec<&str> = labels.into_iter().filter(|l| !seen.insert(*l)).collect();
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(QcpError::Validation(format!(
            "duplicate {what} labels: {}",
            duplicates.join(", ")
        )))
    }
}

fn index_labels(series: &Series) -> Result<Vec<String>> {
    series_to_strings(series)?
        .into_iter()
        .enumerate()
        .map(|(row, label)| {
            label.ok_or_else(|| QcpError::Validation(format!("index column is empty at row {row}")))
        })
        .collect()
}

/// Swap rows and columns. `labels` name the rows of `body` and become the new
/// column names; the column names of `body` become the new row labels.
///
/// Cells pass through their string form, and each new column is typed Int64,
/// Float64 or String depending on what all of its values parse as.
fn transpose(labels: &[String], body: &DataFrame) -> Result<(Vec<String>, DataFrame)> {
    let sample_ids = column_names(body);
    let cells: Vec<Vec<Option<String>>> = body
        .get_columns()
        .iter()
        .map(|col| series_to_strings(col.as_materialized_series()))
        .collect::<PolarsResult<_>>()?;

    let columns = labels
        .iter()
        .enumerate()
        .map(|(row, label)| {
            let values: Vec<Option<String>> = cells.iter().map(|col| col[row].clone()).collect();
            Column::from(infer_series(label, values))
        })
        .collect();

    Ok((sample_ids, DataFrame::new(columns)?))
}

fn infer_series(name: &str, values: Vec<Option<String>>) -> Series {
    let present = || values.iter().flatten();
    if present().all(|v| v.trim().parse::<i64>().is_ok()) {
        let parsed: Vec<Option<i64>> = values
            .iter()
            .map(|v| v.as_ref().and_then(|s| s.trim().parse().ok()))
            .collect();
        return Series::new(name.into(), parsed);
    }
    if present().all(|v| v.trim().parse::<f64>().is_ok()) {
        let parsed: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.as_ref().and_then(|s| s.trim().parse().ok()))
            .collect();
        return Series::new(name.into(), parsed);
    }
    Series::new(name.into(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepOutput;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("s{i}")).collect()
    }

    fn sample() -> Dataset {
        let df = df![
            "gene_a" => [1.0, 2.0, 3.0],
            "gene_b" => [10i64, 20, 30],
            "group" => ["x", "y", "x"],
        ]
        .unwrap();
        Dataset::new(ids(3), df).unwrap()
    }

    // ===== Construction =====

    #[test]
    fn test_views_are_disjoint_and_cover_table() {
        let ds = sample();
        assert_eq!(ds.numeric_names(), vec!["gene_a", "gene_b"]);
        assert_eq!(ds.categorical_names(), vec!["group"]);
        assert_eq!(ds.shape(), (3, 3));
    }

    #[test]
    fn test_duplicate_sample_ids_rejected() {
        let df = df!["gene_a" => [1.0, 2.0]].unwrap();
        let err = Dataset::new(vec!["s1".into(), "s1".into()], df).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_from_frame_uses_first_column_as_index() {
        let df = df![
            "sample" => ["p1", "p2"],
            "gene_a" => [1.0, 2.0],
        ]
        .unwrap();
        let ds = Dataset::from_frame(df, true).unwrap();
        assert_eq!(ds.sample_ids(), &["p1".to_string(), "p2".to_string()]);
        assert_eq!(ds.numeric_names(), vec!["gene_a"]);
    }

    #[test]
    fn test_from_frame_transposes_features_in_rows() {
        let df = df![
            "feature" => ["gene_a", "gene_b"],
            "p1" => [1.5, 10.0],
            "p2" => [2.5, 20.0],
            "p3" => [3.5, 30.0],
        ]
        .unwrap();
        let ds = Dataset::from_frame(df, false).unwrap();
        assert_eq!(ds.shape(), (3, 2));
        assert_eq!(ds.sample_ids()[2], "p3");
        let cols = ds.numeric_columns().unwrap();
        assert_eq!(cols[0].0, "gene_a");
        assert_eq!(cols[0].1, vec![Some(1.5), Some(2.5), Some(3.5)]);
        assert_eq!(cols[1].1, vec![Some(10.0), Some(20.0), Some(30.0)]);
    }

    // ===== Type mapping =====

    #[test]
    fn test_type_mapping_moves_columns_between_views() {
        let mut ds = sample();
        let mapping = BTreeMap::from([
            ("gene_b".to_string(), "category".to_string()),
            ("gene_a".to_string(), "float".to_string()),
        ]);
        ds.apply_type_mapping(&mapping).unwrap();
        assert_eq!(ds.numeric_names(), vec!["gene_a"]);
        assert_eq!(ds.categorical_names(), vec!["gene_b", "group"]);
    }

    #[test]
    fn test_type_mapping_unknown_column() {
        let mut ds = sample();
        let mapping = BTreeMap::from([("nope".to_string(), "int".to_string())]);
        let err = ds.apply_type_mapping(&mapping).unwrap_err();
        assert!(matches!(err, QcpError::UnknownColumn(c) if c == "nope"));
    }

    #[test]
    fn test_type_mapping_unknown_dtype_leaves_table_untouched() {
        let mut ds = sample();
        let mapping = BTreeMap::from([
            ("gene_a".to_string(), "category".to_string()),
            ("gene_b".to_string(), "complex".to_string()),
        ]);
        let err = ds.apply_type_mapping(&mapping).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_DTYPE");
        assert_eq!(ds.numeric_names(), vec!["gene_a", "gene_b"]);
    }

    #[test]
    fn test_type_mapping_failed_cast() {
        let mut ds = sample();
        let mapping = BTreeMap::from([("group".to_string(), "int".to_string())]);
        let err = ds.apply_type_mapping(&mapping).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
    }

    // ===== Mutation =====

    #[test]
    fn test_drop_columns_updates_views() {
        let mut ds = sample();
        ds.drop_columns(&["gene_b".to_string(), "group".to_string()]).unwrap();
        assert_eq!(ds.numeric_names(), vec!["gene_a"]);
        assert!(ds.categorical_names().is_empty());
        assert!(ds.drop_columns(&["gene_b".to_string()]).is_err());
    }

    #[test]
    fn test_set_numeric_column_keeps_position() {
        let mut ds = sample();
        ds.set_numeric_column("gene_b", vec![Some(0.5), None, Some(1.5)]).unwrap();
        assert_eq!(ds.numeric_names(), vec!["gene_a", "gene_b"]);
        assert_eq!(ds.numeric_columns().unwrap()[1].1, vec![Some(0.5), None, Some(1.5)]);
    }

    #[test]
    fn test_hold_out_partitions_rows() {
        let mut ds = sample();
        let held = ds.hold_out(&[true, false, true]).unwrap();
        assert_eq!(held.sample_ids, vec!["s2".to_string()]);
        assert_eq!(held.data.height(), 1);
        assert_eq!(ds.sample_ids(), &["s1".to_string(), "s3".to_string()]);
        assert_eq!(ds.numeric().height(), 2);
    }

    #[test]
    fn test_hold_out_only_once() {
        let mut ds = sample();
        ds.hold_out(&[true, false, true]).unwrap();
        assert!(ds.hold_out(&[true, false]).is_err());
        assert_eq!(ds.sample_ids().len(), 2);
        assert_eq!(ds.held_out().unwrap().sample_ids, vec!["s2".to_string()]);
    }

    // ===== Reporting =====

    #[test]
    fn test_snapshot_is_detached() {
        let mut ds = sample();
        let before = ds.snapshot().unwrap();
        ds.set_numeric_column("gene_a", vec![Some(9.0); 3]).unwrap();
        assert_eq!(before.column("gene_a").unwrap().values[0], serde_json::json!(1.0));
    }

    #[test]
    fn test_record_step_appends() {
        let mut ds = sample();
        for step in ["first", "second"] {
            ds.record_step(ReportEntry {
                step: step.to_string(),
                method: None,
                snapshot: None,
                output: Some(StepOutput::NoColumns {
                    reason: "none".into(),
                }),
            });
        }
        let steps: Vec<_> = ds.report().iter().map(|e| e.step.as_str()).collect();
        assert_eq!(steps, vec!["first", "second"]);
    }
}
