//! Read-only analyses and visualizations over the numeric view.

mod correlation;
mod distribution;
mod statistics;

pub use correlation::{
    CorrelationMethod, correlation, correlation_heatmap, pairwise_correlations,
};
pub use distribution::{box_plots, evaluate_distribution_features, histogram};
pub use statistics::{column_statistics, descriptive_statistics};
