//! Omics QC/Preprocessing Pipeline Library
//!
//! Quality control, preprocessing and analysis of tabular omics datasets
//! (genomics, proteomics, clinical), built on Polars.
//!
//! # Overview
//!
//! A run takes a table, a metadata description and an ordered list of named
//! steps, and produces a report log:
//!
//! - **Step Registry**: the fixed catalog of steps in four ordered categories
//!   (qc, preprocessing, visualization, analysis), see [`steps`]
//! - **Plan Validation**: category ordering, method requirements and the
//!   stricter rules for raw datasets, with every violation collected
//! - **Dataset Model**: working table plus derived numeric/categorical views
//!   and an append-only report log, see [`Dataset`]
//! - **Engines**: [`qc`], [`preprocessing`] and [`analysis`] operations, each
//!   taking the dataset explicitly
//! - **Executor**: runs a plan, snapshotting and recording per registry flags
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use qcp_omics::{Pipeline, RunMetadata};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("cohort.csv".into()))?
//!     .finish()?;
//! let metadata = RunMetadata::from_path("metadata.json".as_ref())?;
//!
//! let report = Pipeline::builder().build()?.run(df, &metadata)?;
//! for entry in &report.steps {
//!     println!("{} {:?}", entry.step, entry.method);
//! }
//! ```
//!
//! # Plans
//!
//! ```rust,ignore
//! use qcp_omics::steps::{registry, validate, StepRequest};
//!
//! let requests = vec![
//!     StepRequest::new("identify_missing_values"),
//!     StepRequest::with_method("handle_outliers", "iqr"),
//! ];
//! match validate(&requests, true, registry()) {
//!     Ok(plan) => println!("{} steps", plan.len()),
//!     Err(violations) => violations.iter().for_each(|v| println!("{v}")),
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod plotting;
pub mod preprocessing;
pub mod qc;
pub mod reporting;
pub mod steps;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{ConfigValidationError, RunConfig, RunConfigBuilder};
pub use dataset::{DataSnapshot, Dataset, HeldOut};
pub use error::{QcpError, Result as QcpResult, ResultExt, ShapeWarning};
pub use input::{RunMetadata, check_shape};
pub use pipeline::{
    ClosureProgressReporter, ExecutorState, Pipeline, PipelineBuilder, ProgressReporter,
    ProgressUpdate, RunStage, StepExecutor,
};
pub use plotting::{Artifact, PlotRequest, Plotter, SummaryPlotter};
pub use reporting::{ReportWriter, RunReport};
pub use steps::{
    Category, PlanViolation, StepPlan, StepRegistry, StepRequest, ViolationKind, registry,
    validate,
};
pub use types::{ColumnKind, DatasetType, ReportEntry, StepOutput};
