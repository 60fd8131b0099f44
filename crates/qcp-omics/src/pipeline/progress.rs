//! Progress reporting for pipeline runs.
//!
//! The executor emits one [`ProgressUpdate`] per state transition; the
//! pipeline adds updates for the stages before and after execution.
//!
//! # Example
//!
//! ```rust,ignore
//! use qcp_omics::Pipeline;
//!
//! let report = Pipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(df, &metadata)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    /// Checking metadata, shape and the step plan
    Validating,
    /// Building the dataset and applying the type mapping
    Loading,
    /// Running plan entries
    Executing,
    Complete,
    Failed,
}

impl RunStage {
    /// Human-readable name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Validating => "Validating Input",
            Self::Loading => "Loading Dataset",
            Self::Executing => "Executing Steps",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }
}

/// A progress update emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: RunStage,

    /// Step being run, during [`RunStage::Executing`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    /// Overall progress (0.0 - 1.0).
    pub progress: f32,

    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: RunStage, progress: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            step: None,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Step `index` of `total` has started.
    pub fn step_started(index: usize, total: usize, step: &str) -> Self {
        let progress = if total == 0 { 1.0 } else { index as f32 / total as f32 };
        Self {
            stage: RunStage::Executing,
            step: Some(step.to_string()),
            progress,
            message: format!("Running step {}/{}: {}", index + 1, total, step),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(RunStage::Complete, 1.0, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(RunStage::Failed, 0.0, message)
    }
}

/// Receives progress updates from a run.
///
/// Implementations must be thread-safe (`Send + Sync`) so a configured
/// pipeline can be moved to a worker thread.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}
