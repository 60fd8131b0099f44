//! Column-wise scaling of the numeric view.

use crate::dataset::Dataset;
use crate::error::{QcpError, Result};
use crate::utils::{mean, present, quantile_sorted, sorted, std_dev};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingMethod {
    /// (x - mean) / population std
    StandardScaler,
    /// (x - median) / IQR
    RobustScaler,
}

impl ScalingMethod {
    pub fn parse(step: &str, method: &str) -> Result<Self> {
        match method {
            "standard_scaler" => Ok(Self::StandardScaler),
            "robust_scaler" => Ok(Self::RobustScaler),
            other => Err(QcpError::UnsupportedMethod {
                step: step.to_string(),
                method: other.to_string(),
            }),
        }
    }

    /// Centre and scale of a column. A zero scale becomes 1 so the column is
    /// only centred.
    fn parameters(self, observed: &[f64]) -> Option<(f64, f64)> {
        let (center, scale) = match self {
            Self::StandardScaler => (mean(observed)?, std_dev(observed, 0)?),
            Self::RobustScaler => {
                let s = sorted(observed);
                let q1 = quantile_sorted(&s, 0.25)?;
                let q3 = quantile_sorted(&s, 0.75)?;
                (quantile_sorted(&s, 0.5)?, q3 - q1)
            }
        };
        Some((center, if scale == 0.0 { 1.0 } else { scale }))
    }
}

/// Replace every numeric column with its scaled version. Missing values stay
/// missing.
pub fn scale_numerical_features(dataset: &mut Dataset, method: ScalingMethod) -> Result<()> {
    let mut scaled = Vec::new();
    for (column, values) in dataset.numeric_columns()? {
        let Some((center, scale)) = method.parameters(&present(&values)) else {
            continue;
        };
        debug!("Scaling '{}' with center {} and scale {}", column, center, scale);
        let values = values
            .into_iter()
            .map(|v| v.map(|x| (x - center) / scale))
            .collect();
        scaled.push((column, values));
    }
    dataset.replace_numeric(scaled)
}
