//! Principal component analysis of the numeric view.
//!
//! Report-only: the live table is never modified.

use crate::config::RunConfig;
use crate::dataset::Dataset;
use crate::error::{QcpError, Result};
use crate::plotting::{Artifact, PlotRequest, Plotter};
use crate::types::PcaResult;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, Axis, s};
use polars::prelude::*;
use tracing::debug;

const STEP_NAME: &str = "dimensionality_reduction";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionMethod {
    Pca,
}

impl ReductionMethod {
    pub fn parse(step: &str, method: &str) -> Result<Self> {
        match method {
            "pca" => Ok(Self::Pca),
            other => Err(QcpError::UnsupportedMethod {
                step: step.to_string(),
                method: other.to_string(),
            }),
        }
    }
}

/// Projection plus its two plots: explained variance per component and the
/// samples on the first two components.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub result: PcaResult,
    pub variance_plot: Artifact,
    pub projection_plot: Artifact,
}

/// Project the centred numeric view onto its principal components.
///
/// Returns `None` when there are no numeric columns or fewer than two
/// samples. Missing values must have been handled first.
pub fn reduce_dimensions(
    dataset: &Dataset,
    method: ReductionMethod,
    config: &RunConfig,
    plotter: &dyn Plotter,
) -> Result<Option<Reduction>> {
    let ReductionMethod::Pca = method;
    let columns = dataset.numeric_columns()?;
    let rows = dataset.sample_ids().len();
    if columns.is_empty() || rows < 2 {
        return Ok(None);
    }

    let incomplete: Vec<String> = columns
        .iter()
        .filter(|(_, values)| values.iter().any(Option::is_none))
        .map(|(name, _)| name.clone())
        .collect();
    if !incomplete.is_empty() {
        return Err(QcpError::MissingValues {
            step: STEP_NAME.to_string(),
            columns: incomplete,
        });
    }

    let x: Array2<f64> = dataset.numeric().to_ndarray::<Float64Type>(IndexOrder::C)?;
    let Some(means) = x.mean_axis(Axis(0)) else {
        return Ok(None);
    };
    let centred = &x - &means;
    let covariance = centred.t().dot(&centred) / (rows - 1) as f64;

    let p = covariance.nrows();
    let (eigenvalues, axes) = principal_axes(&covariance);
    let total: f64 = eigenvalues.iter().map(|v| v.max(0.0)).sum();
    let k = config.pca_components.unwrap_or(rows.min(p)).min(p);

    let scores = centred.dot(&axes.slice(s![.., ..k]));
    let coordinates: Vec<Vec<f64>> = scores.outer_iter().map(|row| row.to_vec()).collect();
    let explained_variance: Vec<f64> = eigenvalues
        .iter()
        .take(k)
        .map(|v| if total > 0.0 { v.max(0.0) / total * 100.0 } else { 0.0 })
        .collect();
    debug!("PCA kept {} components: {:?}", k, explained_variance);

    let labels: Vec<String> = (1..=k).map(|i| format!("PC{i}")).collect();
    let variance_plot = plotter.render(&PlotRequest::BarChart {
        title: "Explained variance (%)".to_string(),
        labels,
        values: explained_variance.clone(),
    });
    let projection_plot = plotter.render(&PlotRequest::Scatter {
        title: "PCA projection".to_string(),
        x_label: "PC1".to_string(),
        y_label: "PC2".to_string(),
        points: dataset
            .sample_ids()
            .iter()
            .zip(&coordinates)
            .map(|(id, c)| {
                let x = c.first().copied().unwrap_or(0.0);
                let y = c.get(1).copied().unwrap_or(0.0);
                (id.clone(), x, y)
            })
            .collect(),
    });

    Ok(Some(Reduction {
        result: PcaResult {
            sample_ids: dataset.sample_ids().to_vec(),
            coordinates,
            explained_variance,
        },
        variance_plot,
        projection_plot,
    }))
}

/// Eigen decomposition of a covariance matrix.
///
/// Returns eigenvalues sorted descending and the matching unit eigenvectors
/// as columns, each oriented so its largest-magnitude entry is positive.
fn principal_axes(covariance: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let p = covariance.nrows();
    let eigen = SymmetricEigen::new(DMatrix::from_fn(p, p, |i, j| covariance[[i, j]]));

    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let values = order.iter().map(|&j| eigen.eigenvalues[j]).collect();
    let mut axes = Array2::<f64>::zeros((p, p));
    for (col, &j) in order.iter().enumerate() {
        let vector = eigen.eigenvectors.column(j);
        let pivot = vector
            .iter()
            .copied()
            .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        for i in 0..p {
            axes[[i, col]] = sign * vector[i];
        }
    }
    (values, axes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plotting::SummaryPlotter;

    fn dataset(df: DataFrame) -> Dataset {
        let ids = (0..df.height()).map(|i| format!("s{i}")).collect();
        Dataset::new(ids, df).unwrap()
    }

    #[test]
    fn test_principal_axes_sorted_and_oriented() {
        let covariance = ndarray::array![[2.0, 1.0], [1.0, 2.0]];
        let (values, axes) = principal_axes(&covariance);
        assert!((values[0] - 3.0).abs() < 1e-10);
        assert!((values[1] - 1.0).abs() < 1e-10);
        let h = 1.0 / 2f64.sqrt();
        assert!((axes[[0, 0]] - h).abs() < 1e-10 && (axes[[1, 0]] - h).abs() < 1e-10);
    }

    #[test]
    fn test_perfectly_correlated_columns() {
        let ds = dataset(
            df![
                "gene_a" => [1.0, 2.0, 3.0, 4.0],
                "gene_b" => [2.0, 4.0, 6.0, 8.0],
            ]
            .unwrap(),
        );
        let reduction = reduce_dimensions(&ds, ReductionMethod::Pca, &RunConfig::default(), &SummaryPlotter)
            .unwrap()
            .unwrap();
        let explained = &reduction.result.explained_variance;
        assert_eq!(explained.len(), 2);
        assert!((explained[0] - 100.0).abs() < 1e-8);
        assert!(explained[1].abs() < 1e-8);
        assert_eq!(reduction.result.coordinates.len(), 4);
        assert!(reduction.projection_plot.as_str().contains("s3"));
    }

    #[test]
    fn test_explained_variance_sums_to_100() {
        let ds = dataset(
            df![
                "a" => [1.0, 5.0, 2.0, 8.0, 3.0],
                "b" => [4.0, 1.0, 6.0, 2.0, 9.0],
                "c" => [7.0, 3.0, 3.0, 1.0, 0.5],
            ]
            .unwrap(),
        );
        let reduction = reduce_dimensions(&ds, ReductionMethod::Pca, &RunConfig::default(), &SummaryPlotter)
            .unwrap()
            .unwrap();
        let sum: f64 = reduction.result.explained_variance.iter().sum();
        assert!((sum - 100.0).abs() < 1e-8);
        let ev = &reduction.result.explained_variance;
        assert!(ev.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_component_limit() {
        let ds = dataset(df!["a" => [1.0, 5.0, 2.0], "b" => [4.0, 1.0, 6.0]].unwrap());
        let config = RunConfig::builder().pca_components(1).build().unwrap();
        let reduction = reduce_dimensions(&ds, ReductionMethod::Pca, &config, &SummaryPlotter)
            .unwrap()
            .unwrap();
        assert!(reduction.result.coordinates.iter().all(|row| row.len() == 1));
    }

    #[test]
    fn test_missing_values_rejected() {
        let ds = dataset(df!["a" => [Some(1.0), None, Some(2.0)]].unwrap());
        let err = reduce_dimensions(&ds, ReductionMethod::Pca, &RunConfig::default(), &SummaryPlotter)
            .unwrap_err();
        assert_eq!(err.error_code(), "MISSING_VALUES");
    }

    #[test]
    fn test_no_numeric_columns() {
        let ds = dataset(df!["group" => ["x", "y"]].unwrap());
        let result = reduce_dimensions(&ds, ReductionMethod::Pca, &RunConfig::default(), &SummaryPlotter)
            .unwrap();
        assert!(result.is_none());
    }
}
