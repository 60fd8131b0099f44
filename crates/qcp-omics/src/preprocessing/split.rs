//! Reproducible train/test split.

use crate::config::RunConfig;
use crate::dataset::Dataset;
use crate::error::{QcpError, Result};
use rand::prelude::*;
use tracing::debug;

/// Sizes of the two partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSummary {
    pub train_samples: usize,
    pub test_samples: usize,
}

/// Number of test samples for `rows` rows: at least one on each side.
fn test_size(rows: usize, fraction: f64) -> usize {
    ((rows as f64 * fraction).round() as usize).clamp(1, rows - 1)
}

/// Move a seeded random share of the samples into the held-out set. The live
/// table keeps the training samples in their original order.
pub fn split_train_test(dataset: &mut Dataset, config: &RunConfig) -> Result<SplitSummary> {
    let rows = dataset.sample_ids().len();
    if rows < 2 {
        return Err(QcpError::Validation(format!(
            "train/test split needs at least 2 samples, found {rows}"
        )));
    }

    let mut order: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(config.random_seed);
    order.shuffle(&mut rng);

    let n_test = test_size(rows, config.test_fraction);
    let mut keep = vec![true; rows];
    for &row in &order[..n_test] {
        keep[row] = false;
    }

    dataset.hold_out(&keep)?;
    debug!(
        "Split {} samples into {} train / {} test (seed {})",
        rows,
        rows - n_test,
        n_test,
        config.random_seed
    );
    Ok(SplitSummary {
        train_samples: rows - n_test,
        test_samples: n_test,
    })
}
