//! Pipeline module.
//!
//! The [`Pipeline`] checks input and plan, builds the dataset, and hands the
//! plan to the [`StepExecutor`].

mod builder;
mod executor;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder};
pub use executor::{ExecutorState, StepExecutor};
pub use progress::{ClosureProgressReporter, ProgressReporter, ProgressUpdate, RunStage};
