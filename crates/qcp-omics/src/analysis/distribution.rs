//! Distribution summaries: histograms and box plots.

use crate::config::RunConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::plotting::{Artifact, BoxSummary, HistogramBin, PlotRequest, Plotter};
use crate::types::ColumnArtifact;
use crate::utils::present;

/// Equal-width bins over [min, max]; the last bin includes `max`.
///
/// Constant data lands in a single bin.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let (Some(min), Some(max)) = (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) else {
        return Vec::new();
    };
    if min == max || bins <= 1 {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins { max } else { min + width * (i + 1) as f64 },
            count,
        })
        .collect()
}

/// One histogram artifact per numeric column; `None` without numeric columns.
pub fn evaluate_distribution_features(
    dataset: &Dataset,
    config: &RunConfig,
    plotter: &dyn Plotter,
) -> Result<Option<Vec<ColumnArtifact>>> {
    let columns = dataset.numeric_columns()?;
    if columns.is_empty() {
        return Ok(None);
    }
    Ok(Some(
        columns
            .into_iter()
            .map(|(column, values)| {
                let artifact = plotter.render(&PlotRequest::Histogram {
                    column: column.clone(),
                    bins: histogram(&present(&values), config.histogram_bins),
                });
                ColumnArtifact { column, artifact }
            })
            .collect(),
    ))
}

/// Box plot of every numeric column; `None` without numeric columns.
pub fn box_plots(dataset: &Dataset, plotter: &dyn Plotter) -> Result<Option<Artifact>> {
    let columns = dataset.numeric_columns()?;
    if columns.is_empty() {
        return Ok(None);
    }
    let boxes = columns
        .iter()
        .filter_map(|(name, values)| BoxSummary::from_values(name, &present(values)))
        .collect();
    Ok(Some(plotter.render(&PlotRequest::BoxPlot {
        title: "Numeric features".to_string(),
        boxes,
    })))
}
