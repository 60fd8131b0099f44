//! Preprocessing: scaling, power/log transforms, train/test split and
//! dimensionality reduction over the numeric view.

mod pca;
mod scaling;
mod split;
mod transform;

pub use pca::{Reduction, ReductionMethod, reduce_dimensions};
pub use scaling::{ScalingMethod, scale_numerical_features};
pub use split::{SplitSummary, split_train_test};
pub use transform::{TransformMethod, transform_numerical_features};
