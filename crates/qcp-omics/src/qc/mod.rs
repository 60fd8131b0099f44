//! Quality control: missing values and outliers.
//!
//! Every operation takes the [`Dataset`](crate::Dataset) explicitly; nothing
//! here records report entries, that is the executor's job.

mod missing;
mod outliers;

pub use missing::{handle_missing_values, identify_missing_values};
pub use outliers::{OutlierMethod, detect_outliers, handle_outliers};
