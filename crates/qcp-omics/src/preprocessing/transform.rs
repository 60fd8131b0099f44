//! Power and log transforms of the numeric view.

use crate::dataset::Dataset;
use crate::error::{QcpError, Result};
use crate::utils::{is_constant, present, variance};
use tracing::debug;

/// Search interval for the Box-Cox λ.
const LAMBDA_RANGE: (f64, f64) = (-5.0, 5.0);
const LAMBDA_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMethod {
    BoxCox,
    Log2,
}

impl TransformMethod {
    pub fn parse(step: &str, method: &str) -> Result<Self> {
        match method {
            "box-cox" => Ok(Self::BoxCox),
            "log2" => Ok(Self::Log2),
            other => Err(QcpError::UnsupportedMethod {
                step: step.to_string(),
                method: other.to_string(),
            }),
        }
    }
}

/// Transform every numeric column.
///
/// If the smallest value of the whole numeric view is not positive, every
/// value is first shifted by `|min| + 1`. Zero-variance columns are left as
/// they are after the shift.
pub fn transform_numerical_features(dataset: &mut Dataset, method: TransformMethod) -> Result<()> {
    let columns = dataset.numeric_columns()?;
    let min = columns
        .iter()
        .flat_map(|(_, values)| values.iter().flatten())
        .copied()
        .reduce(f64::min);
    let shift = match min {
        Some(m) if m <= 0.0 => m.abs() + 1.0,
        _ => 0.0,
    };
    if shift > 0.0 {
        debug!("Shifting numeric view by {} before transform", shift);
    }

    let mut transformed = Vec::with_capacity(columns.len());
    for (column, values) in columns {
        let shifted: Vec<Option<f64>> = values.into_iter().map(|v| v.map(|x| x + shift)).collect();
        let observed = present(&shifted);
        if is_constant(&observed) {
            transformed.push((column, shifted));
            continue;
        }

        let apply: Box<dyn Fn(f64) -> f64> = match method {
            TransformMethod::Log2 => Box::new(f64::log2),
            TransformMethod::BoxCox => {
                let lambda = boxcox_lambda(&observed);
                debug!("Box-Cox lambda for '{}': {:.4}", column, lambda);
                Box::new(move |x| boxcox(x, lambda))
            }
        };
        let values = shifted.into_iter().map(|v| v.map(&apply)).collect();
        transformed.push((column, values));
    }

    dataset.replace_numeric(transformed)
}

fn boxcox(x: f64, lambda: f64) -> f64 {
    if lambda.abs() < 1e-12 {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    }
}

/// Box-Cox profile log-likelihood (up to a constant) for strictly positive data.
fn boxcox_llf(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let log_sum: f64 = values.iter().map(|x| x.ln()).sum();
    let transformed: Vec<f64> = values.iter().map(|&x| boxcox(x, lambda)).collect();
    match variance(&transformed, 0) {
        Some(var) if var > 0.0 => (lambda - 1.0) * log_sum - n / 2.0 * var.ln(),
        _ => f64::NEG_INFINITY,
    }
}

/// Maximum-likelihood λ by golden-section search over [`LAMBDA_RANGE`].
pub(crate) fn boxcox_lambda(values: &[f64]) -> f64 {
    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = LAMBDA_RANGE;
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let mut fc = boxcox_llf(values, c);
    let mut fd = boxcox_llf(values, d);

    while (b - a).abs() > LAMBDA_TOLERANCE {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = boxcox_llf(values, c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = boxcox_llf(values, d);
        }
    }
    (a + b) / 2.0
}
