//! Numeric settings for the QC, preprocessing and analysis steps.
//!
//! Defaults reproduce the behaviour of the command-line tool; the builder
//! exists for library callers that want different thresholds.

use serde::{Deserialize, Serialize};

/// Configuration for a pipeline run.
///
/// # Example
///
/// ```rust,ignore
/// use qcp_omics::RunConfig;
///
/// let config = RunConfig::builder()
///     .test_fraction(0.25)
///     .random_seed(7)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Columns with at least this percentage (0-100) of missing values are
    /// dropped by `handle_missing_values`.
    /// Default: 30.0
    pub missing_column_threshold: f64,

    /// Multiplier applied to the IQR to get the outlier fences.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Absolute z-score above which a value is an outlier.
    /// Default: 3.0
    pub zscore_threshold: f64,

    /// Share of samples held out by `split_train_test` (exclusive 0-1).
    /// Default: 0.2
    pub test_fraction: f64,

    /// Seed for the train/test shuffle.
    /// Default: 42
    pub random_seed: u64,

    /// Number of principal components to keep; `None` keeps min(rows, columns).
    pub pca_components: Option<usize>,

    /// Number of bins for distribution histograms.
    /// Default: 10
    pub histogram_bins: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            missing_column_threshold: 30.0,
            iqr_multiplier: 1.5,
            zscore_threshold: 3.0,
            test_fraction: 0.2,
            random_seed: 42,
            pca_components: None,
            histogram_bins: 10,
        }
    }
}

impl RunConfig {
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(0.0..=100.0).contains(&self.missing_column_threshold) {
            return Err(ConfigValidationError::InvalidPercentage {
                field: "missing_column_threshold".to_string(),
                value: self.missing_column_threshold,
            });
        }

        for (field, value) in [
            ("iqr_multiplier", self.iqr_multiplier),
            ("zscore_threshold", self.zscore_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigValidationError::NonPositive {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigValidationError::InvalidFraction(self.test_fraction));
        }

        if self.pca_components == Some(0) {
            return Err(ConfigValidationError::ZeroCount {
                field: "pca_components".to_string(),
            });
        }

        if self.histogram_bins == 0 {
            return Err(ConfigValidationError::ZeroCount {
                field: "histogram_bins".to_string(),
            });
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid percentage for '{field}': {value} (must be between 0 and 100)")]
    InvalidPercentage { field: String, value: f64 },

    #[error("Invalid value for '{field}': {value} (must be positive)")]
    NonPositive { field: String, value: f64 },

    #[error("Invalid test fraction: {0} (must be strictly between 0.0 and 1.0)")]
    InvalidFraction(f64),

    #[error("Invalid value for '{field}': must be at least 1")]
    ZeroCount { field: String },
}

/// Builder for [`RunConfig`].
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    missing_column_threshold: Option<f64>,
    iqr_multiplier: Option<f64>,
    zscore_threshold: Option<f64>,
    test_fraction: Option<f64>,
    random_seed: Option<u64>,
    pca_components: Option<usize>,
    histogram_bins: Option<usize>,
}

impl RunConfigBuilder {
    /// Missing percentage (0-100) at which a column is dropped instead of imputed.
    pub fn missing_column_threshold(mut self, percent: f64) -> Self {
        self.missing_column_threshold = Some(percent);
        self
    }

    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    pub fn zscore_threshold(mut self, threshold: f64) -> Self {
        self.zscore_threshold = Some(threshold);
        self
    }

    pub fn test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = Some(fraction);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn pca_components(mut self, components: usize) -> Self {
        self.pca_components = Some(components);
        self
    }

    pub fn histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = Some(bins);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `RunConfig` or an error if validation fails.
    pub fn build(self) -> Result<RunConfig, ConfigValidationError> {
        let defaults = RunConfig::default();
        let config = RunConfig {
            missing_column_threshold: self
                .missing_column_threshold
                .unwrap_or(defaults.missing_column_threshold),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            zscore_threshold: self.zscore_threshold.unwrap_or(defaults.zscore_threshold),
            test_fraction: self.test_fraction.unwrap_or(defaults.test_fraction),
            random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            pca_components: self.pca_components,
            histogram_bins: self.histogram_bins.unwrap_or(defaults.histogram_bins),
        };

        config.validate()?;
        Ok(config)
    }
}
