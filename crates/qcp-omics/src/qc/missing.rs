//! Missing-value identification and handling.

use crate::config::RunConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::types::{ImputedColumn, MissingColumn, MissingValueReport};
use crate::utils::{is_numeric_dtype, missing_count, series_to_f64, series_to_strings, string_mode};
use polars::prelude::*;
use tracing::{debug, warn};

/// Only numeric strategy; other tokens fall back to it.
const IMPUTE_MEAN: &str = "impute_mean";

/// Percentage of missing entries per column, for columns with any missing,
/// sorted descending. Ties keep table order.
pub fn identify_missing_values(dataset: &Dataset) -> Result<Vec<MissingColumn>> {
    let rows = dataset.sample_ids().len();
    if rows == 0 {
        return Ok(Vec::new());
    }

    let mut missing = Vec::new();
    for col in dataset.data().get_columns() {
        let count = missing_count(col.as_materialized_series())?;
        if count > 0 {
            missing.push(MissingColumn {
                column: col.name().to_string(),
                percentage: count as f64 / rows as f64 * 100.0,
            });
        }
    }
    missing.sort_by(|a, b| b.percentage.total_cmp(&a.percentage));
    Ok(missing)
}

/// Drop columns at or above the missing threshold, then fill the rest:
/// categorical columns with their mode, numeric columns with their mean.
pub fn handle_missing_values(
    dataset: &mut Dataset,
    method: &str,
    config: &RunConfig,
) -> Result<MissingValueReport> {
    if method != IMPUTE_MEAN {
        warn!(
            "Unknown imputation method '{}', falling back to {}",
            method, IMPUTE_MEAN
        );
    }

    let missing = identify_missing_values(dataset)?;
    let (to_drop, to_fill): (Vec<MissingColumn>, Vec<MissingColumn>) = missing
        .into_iter()
        .partition(|m| m.percentage >= config.missing_column_threshold);

    let mut report = MissingValueReport {
        dropped: to_drop.into_iter().map(|m| m.column).collect(),
        imputed: Vec::new(),
    };
    if !report.dropped.is_empty() {
        debug!(
            "Dropping {} columns with >= {}% missing: {:?}",
            report.dropped.len(),
            config.missing_column_threshold,
            report.dropped
        );
        dataset.drop_columns(&report.dropped)?;
    }

    for MissingColumn { column, .. } in to_fill {
        let numeric = is_numeric_dtype(dataset.data().column(&column)?.dtype());
        let imputed = if numeric {
            fill_numeric(dataset, &column)?
        } else {
            fill_categorical(dataset, &column)?
        };
        report.imputed.extend(imputed);
    }

    Ok(report)
}

fn fill_numeric(dataset: &mut Dataset, column: &str) -> Result<Option<ImputedColumn>> {
    let series = dataset.data().column(column)?.as_materialized_series();
    // NaN counts as missing, so it becomes null before polars fills.
    let values = Series::new(column.into(), series_to_f64(series)?);
    let Some(fill) = values.mean() else {
        return Ok(None);
    };

    let filled = values.null_count();
    dataset.replace_column(values.fill_null(FillNullStrategy::Mean)?)?;

    debug!("Imputed {} values in '{}' with mean {}", filled, column, fill);
    Ok(Some(ImputedColumn {
        column: column.to_string(),
        strategy: "mean".to_string(),
        value: fill.to_string(),
        filled,
    }))
}

fn fill_categorical(dataset: &mut Dataset, column: &str) -> Result<Option<ImputedColumn>> {
    let series = dataset.data().column(column)?.as_materialized_series();
    let values = series_to_strings(series)?;
    let Some(fill) = string_mode(values.iter().flatten().map(String::as_str)) else {
        return Ok(None);
    };

    let filled = values.iter().filter(|v| v.is_none()).count();
    let values = values
        .into_iter()
        .map(|v| Some(v.unwrap_or_else(|| fill.clone())))
        .collect();
    dataset.set_categorical_column(column, values)?;

    debug!("Imputed {} values in '{}' with mode '{}'", filled, column, fill);
    Ok(Some(ImputedColumn {
        column: column.to_string(),
        strategy: "mode".to_string(),
        value: fill,
        filled,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        let df = df![
            "gene_a" => [Some(1.0), None, Some(3.0), Some(4.0), Some(2.0)],
            "gene_b" => [Some(1i64), None, None, Some(4), None],
            "gene_c" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "group" => [Some("x"), Some("y"), None, Some("y"), Some("x")],
        ]
        .unwrap();
        let ids = (1..=5).map(|i| format!("s{i}")).collect();
        Dataset::new(ids, df).unwrap()
    }

    // ===== identify_missing_values =====

    #[test]
    fn test_identify_sorted_descending() {
        let missing = identify_missing_values(&dataset()).unwrap();
        let names: Vec<_> = missing.iter().map(|m| m.column.as_str()).collect();
        assert_eq!(names, vec!["gene_b", "gene_a", "group"]);
        assert_eq!(missing[0].percentage, 60.0);
        assert_eq!(missing[1].percentage, 20.0);
    }

    #[test]
    fn test_identify_counts_nan() {
        let df = df!["v" => [1.0, f64::NAN, 3.0, 4.0]].unwrap();
        let ds = Dataset::new((0..4).map(|i| i.to_string()).collect(), df).unwrap();
        let missing = identify_missing_values(&ds).unwrap();
        assert_eq!(missing[0].percentage, 25.0);
    }

    #[test]
    fn test_identify_does_not_mutate() {
        let ds = dataset();
        let before = ds.snapshot().unwrap();
        identify_missing_values(&ds).unwrap();
        assert_eq!(ds.snapshot().unwrap(), before);
    }

    // ===== handle_missing_values =====

    #[test]
    fn test_handle_drops_and_imputes() {
        let mut ds = dataset();
        let report = handle_missing_values(&mut ds, "impute_mean", &RunConfig::default()).unwrap();

        assert_eq!(report.dropped, vec!["gene_b".to_string()]);
        assert_eq!(ds.numeric_names(), vec!["gene_a", "gene_c"]);

        let gene_a = &ds.numeric_columns().unwrap()[0].1;
        assert_eq!(gene_a[1], Some(2.5));

        let group = &ds.categorical_columns().unwrap()[0].1;
        // "x" and "y" tie, smallest wins
        assert_eq!(group[2].as_deref(), Some("x"));

        assert!(identify_missing_values(&ds).unwrap().is_empty());
        assert_eq!(report.imputed.len(), 2);
    }

    #[test]
    fn test_handle_is_idempotent() {
        let mut ds = dataset();
        let config = RunConfig::default();
        handle_missing_values(&mut ds, "impute_mean", &config).unwrap();
        let after_first = ds.snapshot().unwrap();

        let second = handle_missing_values(&mut ds, "impute_mean", &config).unwrap();
        assert!(second.dropped.is_empty());
        assert!(second.imputed.is_empty());
        assert_eq!(ds.snapshot().unwrap(), after_first);
    }

    #[test]
    fn test_nan_is_filled_like_null() {
        let df = df![
            "v" => [Some(1.0), Some(f64::NAN), None, Some(5.0), Some(3.0), Some(3.0), Some(3.0), Some(3.0)],
        ]
        .unwrap();
        let mut ds = Dataset::new((0..8).map(|i| i.to_string()).collect(), df).unwrap();
        let report = handle_missing_values(&mut ds, "impute_mean", &RunConfig::default()).unwrap();

        assert!(report.dropped.is_empty());
        assert_eq!(report.imputed[0].filled, 2);
        assert_eq!(report.imputed[0].value, "3");
        let values = &ds.numeric_columns().unwrap()[0].1;
        assert_eq!(values[..4], [Some(1.0), Some(3.0), Some(3.0), Some(5.0)]);
    }

    #[test]
    fn test_unknown_method_falls_back_to_mean() {
        let mut ds = dataset();
        handle_missing_values(&mut ds, "impute_knn", &RunConfig::default()).unwrap();
        assert_eq!(ds.numeric_columns().unwrap()[0].1[1], Some(2.5));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let df = df![
            "a" => [Some(1.0), None, None, Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0), Some(7.0), None],
        ]
        .unwrap();
        let mut ds = Dataset::new((0..10).map(|i| i.to_string()).collect(), df).unwrap();
        let report = handle_missing_values(&mut ds, "impute_mean", &RunConfig::default()).unwrap();
        assert_eq!(report.dropped, vec!["a".to_string()]);
    }
}
