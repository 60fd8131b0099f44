//! Custom error types for the omics QC pipeline.
//!
//! This module provides the error hierarchy using `thiserror`. Structural
//! problems (bad input, rejected plans, shape mismatches) surface before any
//! step runs; engine errors abort the remaining plan.
//!
//! Errors are serializable so a report renderer or frontend can display them
//! as `{ code, message }` pairs.

use crate::steps::PlanViolation;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// Recoverable warning raised when the declared orientation of the dataset
/// conflicts with its shape.
///
/// The caller decides whether to proceed (see
/// [`PipelineBuilder::confirm_shape`](crate::PipelineBuilder::confirm_shape)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShapeWarning {
    pub message: String,
    pub rows: usize,
    pub columns: usize,
}

impl std::fmt::Display for ShapeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} rows, {} columns", self.message, self.rows, self.columns)
    }
}

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum QcpError {
    /// Input metadata or table failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested step plan broke one or more registry constraints.
    #[error("Step plan rejected with {} violation(s): {}", .0.len(), summarize_violations(.0))]
    PlanRejected(Vec<PlanViolation>),

    /// Declared orientation conflicts with the table shape.
    #[error("Shape warning: {0}")]
    ShapeMismatch(ShapeWarning),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    UnknownColumn(String),

    /// Type mapping token is not one of `category`, `int`, `float`.
    #[error("Unsupported dtype '{dtype}' for column '{column}'")]
    UnsupportedDtype { column: String, dtype: String },

    /// Step was invoked with a method it does not implement.
    #[error("Unsupported method '{method}' for step '{step}'")]
    UnsupportedMethod { step: String, method: String },

    /// Type conversion failed.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// A step needs complete data but the numeric view still has gaps.
    #[error("Step '{step}' requires complete data, missing values found in: {}", .columns.join(", "))]
    MissingValues { step: String, columns: Vec<String> },

    /// A step failed while the executor was running the plan.
    #[error("Step '{step}' (#{index}) failed: {source}")]
    StepFailed {
        step: String,
        index: usize,
        #[source]
        source: Box<QcpError>,
    },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<QcpError>,
    },
}

fn summarize_violations(violations: &[PlanViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl QcpError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        QcpError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::PlanRejected(_) => "PLAN_VIOLATION",
            Self::ShapeMismatch(_) => "SHAPE_WARNING",
            Self::UnknownColumn(_) => "UNKNOWN_COLUMN",
            Self::UnsupportedDtype { .. } => "UNSUPPORTED_DTYPE",
            Self::UnsupportedMethod { .. } => "UNSUPPORTED_METHOD",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::MissingValues { .. } => "MISSING_VALUES",
            Self::StepFailed { source, .. } => source.error_code(),
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Shape warnings can be overridden by the caller; everything else is final.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ShapeMismatch(_))
    }

    /// Plan violations, if this error is a rejected plan.
    pub fn violations(&self) -> Option<&[PlanViolation]> {
        match self {
            Self::PlanRejected(v) => Some(v),
            Self::WithContext { source, .. } => source.violations(),
            _ => None,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for QcpError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("QcpError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, QcpError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| QcpError::Polars(e).with_context(context))
    }
}
