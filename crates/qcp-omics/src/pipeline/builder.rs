//! The pipeline and its builder.

use crate::config::{ConfigValidationError, RunConfig};
use crate::dataset::Dataset;
use crate::error::{QcpError, Result};
use crate::input::{RunMetadata, check_shape};
use crate::pipeline::executor::StepExecutor;
use crate::pipeline::progress::{
    ClosureProgressReporter, ProgressReporter, ProgressUpdate, RunStage,
};
use crate::plotting::{Plotter, SummaryPlotter};
use crate::reporting::RunReport;
use crate::steps::{StepPlan, registry, validate};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// A configured pipeline, reusable across runs.
///
/// # Example
///
/// ```rust,ignore
/// use qcp_omics::{Pipeline, RunConfig, RunMetadata};
///
/// let metadata = RunMetadata::from_path("metadata.json".as_ref())?;
/// let report = Pipeline::builder()
///     .config(RunConfig::builder().random_seed(7).build()?)
///     .confirm_shape(true)
///     .build()?
///     .run(df, &metadata)?;
/// ```
pub struct Pipeline {
    config: RunConfig,
    plotter: Arc<dyn Plotter>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    confirm_shape: bool,
    validate_plan: bool,
}

// Ensure Pipeline is Send (can be moved to another thread)
static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the steps listed in `metadata` against `df`.
    ///
    /// The first column of `df` is the sample-id index (or the feature-name
    /// index when `features_cols` is false).
    ///
    /// # Errors
    ///
    /// Input and plan problems are reported before any step runs:
    /// [`QcpError::PlanRejected`] with every violation,
    /// [`QcpError::ShapeMismatch`] unless the shape was confirmed, and
    /// [`QcpError::Validation`] for bad labels. A failing step aborts the run
    /// with [`QcpError::StepFailed`].
    pub fn run(&self, df: DataFrame, metadata: &RunMetadata) -> Result<RunReport> {
        match self.run_internal(df, metadata) {
            Ok(report) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(report)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Check the requested steps without running anything.
    pub fn plan(&self, metadata: &RunMetadata) -> Result<StepPlan> {
        if self.validate_plan {
            validate(&metadata.steps_to_run, metadata.is_raw, registry())
                .map_err(QcpError::PlanRejected)
        } else {
            Ok(StepPlan::best_effort(&metadata.steps_to_run, registry()))
        }
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, df: DataFrame, metadata: &RunMetadata) -> Result<RunReport> {
        let start_time = Instant::now();

        info!("Starting pipeline ({:?} dataset)", metadata.dataset_type);
        self.report_progress(ProgressUpdate::new(
            RunStage::Validating,
            0.0,
            "Validating step plan...",
        ));

        let plan = self.plan(metadata)?;
        debug!("Plan has {} steps", plan.len());

        let (rows, columns) = (df.height(), df.width().saturating_sub(1));
        if let Err(warning) = check_shape(rows, columns, metadata.features_cols) {
            if !self.confirm_shape {
                return Err(QcpError::ShapeMismatch(warning));
            }
            warn!("{}; continuing as confirmed", warning);
        }

        self.report_progress(ProgressUpdate::new(
            RunStage::Loading,
            0.0,
            "Loading dataset...",
        ));
        let mut dataset = Dataset::from_frame(df, metadata.features_cols)?;
        metadata.check_labels(&dataset)?;
        dataset.apply_type_mapping(&metadata.dtypes)?;
        let (samples, features) = dataset.shape();
        info!(
            "Dataset ready: {} samples, {} features ({} numeric, {} categorical)",
            samples,
            features,
            dataset.numeric().width(),
            dataset.categorical().width()
        );

        let mut executor = StepExecutor::new(&self.config, self.plotter.as_ref());
        if let Some(reporter) = &self.progress_reporter {
            executor = executor.with_progress(reporter.as_ref());
        }
        executor.execute(&plan, &mut dataset)?;

        let skipped = executor.skipped_steps().to_vec();
        let state = executor.state();
        RunReport::new(metadata.clone(), dataset, state, skipped, start_time.elapsed())
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<RunConfig>,
    plotter: Option<Arc<dyn Plotter>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    confirm_shape: bool,
    skip_plan_validation: bool,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the numeric configuration.
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom plotting collaborator instead of [`SummaryPlotter`].
    pub fn plotter(mut self, plotter: Arc<dyn Plotter>) -> Self {
        self.plotter = Some(plotter);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Proceed even when the table's shape contradicts `features_cols`.
    pub fn confirm_shape(mut self, confirm: bool) -> Self {
        self.confirm_shape = confirm;
        self
    }

    /// Check the plan against the registry before running (default `true`).
    ///
    /// When disabled, unknown steps are skipped at run time with a warning.
    pub fn validate_plan(mut self, validate: bool) -> Self {
        self.skip_plan_validation = !validate;
        self
    }

    pub fn build(self) -> std::result::Result<Pipeline, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            config,
            plotter: self.plotter.unwrap_or_else(|| Arc::new(SummaryPlotter)),
            progress_reporter: self.progress_reporter,
            confirm_shape: self.confirm_shape,
            validate_plan: !self.skip_plan_validation,
        })
    }
}
