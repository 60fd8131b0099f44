//! Outlier detection and replacement over the numeric view.

use crate::config::RunConfig;
use crate::dataset::Dataset;
use crate::error::{QcpError, Result};
use crate::plotting::{Artifact, BoxSummary, PlotRequest, Plotter};
use crate::types::{ColumnOutliers, OutlierCell};
use crate::utils::{is_constant, mean, median, present, quantile_sorted, sorted, std_dev};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Outlier detection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Values outside [Q1 - k·IQR, Q3 + k·IQR]
    #[default]
    Iqr,
    /// Values whose absolute standard score exceeds the threshold
    Zscore,
}

impl OutlierMethod {
    pub fn parse(step: &str, method: &str) -> Result<Self> {
        match method {
            "iqr" => Ok(Self::Iqr),
            "zscore" => Ok(Self::Zscore),
            other => Err(QcpError::UnsupportedMethod {
                step: step.to_string(),
                method: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Iqr => "iqr",
            Self::Zscore => "zscore",
        })
    }
}

/// Row positions of flagged values. Zero-variance columns flag nothing.
fn flag(values: &[Option<f64>], method: OutlierMethod, config: &RunConfig) -> Vec<usize> {
    let observed = present(values);
    if is_constant(&observed) {
        return Vec::new();
    }

    let is_outlier: Box<dyn Fn(f64) -> bool> = match method {
        OutlierMethod::Iqr => {
            let s = sorted(&observed);
            let (Some(q1), Some(q3)) = (quantile_sorted(&s, 0.25), quantile_sorted(&s, 0.75)) else {
                return Vec::new();
            };
            let fence = config.iqr_multiplier * (q3 - q1);
            let (lower, upper) = (q1 - fence, q3 + fence);
            Box::new(move |v| v < lower || v > upper)
        }
        OutlierMethod::Zscore => {
            let (Some(m), Some(s)) = (mean(&observed), std_dev(&observed, 1)) else {
                return Vec::new();
            };
            if s == 0.0 {
                return Vec::new();
            }
            let threshold = config.zscore_threshold;
            Box::new(move |v| ((v - m) / s).abs() > threshold)
        }
    };

    values
        .iter()
        .enumerate()
        .filter_map(|(row, v)| v.filter(|x| is_outlier(*x)).map(|_| row))
        .collect()
}

fn cells(dataset: &Dataset, values: &[Option<f64>], rows: &[usize]) -> Vec<OutlierCell> {
    rows.iter()
        .filter_map(|&row| {
            Some(OutlierCell {
                row: dataset.sample_ids()[row].clone(),
                value: values[row]?,
            })
        })
        .collect()
}

/// Flagged cells per numeric column, omitting columns without outliers.
pub fn detect_outliers(
    dataset: &Dataset,
    method: OutlierMethod,
    config: &RunConfig,
) -> Result<Vec<ColumnOutliers>> {
    let mut found = Vec::new();
    for (column, values) in dataset.numeric_columns()? {
        let rows = flag(&values, method, config);
        if !rows.is_empty() {
            found.push(ColumnOutliers {
                cells: cells(dataset, &values, &rows),
                column,
            });
        }
    }
    debug!("{} columns with {} outliers", found.len(), method);
    Ok(found)
}

/// Replace every flagged value with its column's median, computed before
/// any replacement. Returns the detection result and a box plot of the
/// affected columns as they were before replacement.
pub fn handle_outliers(
    dataset: &mut Dataset,
    method: OutlierMethod,
    config: &RunConfig,
    plotter: &dyn Plotter,
) -> Result<(Vec<ColumnOutliers>, Artifact)> {
    let mut found = Vec::new();
    let mut boxes = Vec::new();
    let mut replaced = Vec::new();

    for (column, values) in dataset.numeric_columns()? {
        let rows = flag(&values, method, config);
        if rows.is_empty() {
            continue;
        }
        let observed = present(&values);
        let Some(fill) = median(&observed) else {
            continue;
        };
        boxes.extend(BoxSummary::from_values(&column, &observed));
        found.push(ColumnOutliers {
            cells: cells(dataset, &values, &rows),
            column: column.clone(),
        });

        let mut updated = values;
        for row in rows {
            updated[row] = Some(fill);
        }
        replaced.push((column, updated));
    }

    if !replaced.is_empty() {
        dataset.replace_numeric(replaced)?;
    }

    let artifact = plotter.render(&PlotRequest::BoxPlot {
        title: format!("Columns with outliers ({method}), before replacement"),
        boxes,
    });
    Ok((found, artifact))
}
