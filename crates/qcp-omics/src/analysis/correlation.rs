//! Correlation matrices over the numeric view.

use crate::dataset::Dataset;
use crate::error::{QcpError, Result};
use crate::plotting::{Artifact, PlotRequest, Plotter};
use crate::types::CorrelationMatrix;
use crate::utils::{average_ranks, mean};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    /// Pearson correlation of average ranks
    Spearman,
}

impl CorrelationMethod {
    pub fn parse(step: &str, method: &str) -> Result<Self> {
        match method {
            "pearson" => Ok(Self::Pearson),
            "spearman" => Ok(Self::Spearman),
            other => Err(QcpError::UnsupportedMethod {
                step: step.to_string(),
                method: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pearson => "pearson",
            Self::Spearman => "spearman",
        })
    }
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let (mx, my) = (mean(x)?, mean(y)?);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Correlation of two columns over the rows where both are present.
///
/// `None` with fewer than two complete pairs or when either side is constant.
pub fn correlation(x: &[Option<f64>], y: &[Option<f64>], method: CorrelationMethod) -> Option<f64> {
    let (a, b): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .unzip();
    if a.len() < 2 {
        return None;
    }
    match method {
        CorrelationMethod::Pearson => pearson(&a, &b),
        CorrelationMethod::Spearman => pearson(&average_ranks(&a), &average_ranks(&b)),
    }
}

/// Correlation matrix of every pair of numeric columns.
pub fn pairwise_correlations(dataset: &Dataset, method: CorrelationMethod) -> Result<CorrelationMatrix> {
    let columns = dataset.numeric_columns()?;
    let values = columns
        .iter()
        .map(|(_, x)| {
            columns
                .iter()
                .map(|(_, y)| correlation(x, y, method))
                .collect()
        })
        .collect();
    Ok(CorrelationMatrix {
        method: method.to_string(),
        columns: columns.into_iter().map(|(name, _)| name).collect(),
        values,
    })
}

/// Heatmap of a correlation matrix.
pub fn correlation_heatmap(matrix: &CorrelationMatrix, plotter: &dyn Plotter) -> Artifact {
    plotter.render(&PlotRequest::Heatmap {
        title: format!("Correlation heatmap ({})", matrix.method),
        labels: matrix.columns.clone(),
        values: matrix.values.clone(),
    })
}
