//! Step executor.
//!
//! Walks a validated [`StepPlan`], dispatches each entry on its
//! [`StepKind`], and records one report entry per executed step. Whether a
//! "before" snapshot or the output is kept is decided here from the step's
//! registry flags, so the step implementations never deal with reporting.

use crate::analysis::{
    CorrelationMethod, box_plots, correlation_heatmap, descriptive_statistics,
    evaluate_distribution_features, pairwise_correlations,
};
use crate::config::RunConfig;
use crate::dataset::Dataset;
use crate::error::{QcpError, Result};
use crate::pipeline::progress::{ProgressReporter, ProgressUpdate};
use crate::plotting::Plotter;
use crate::preprocessing::{
    ReductionMethod, ScalingMethod, TransformMethod, reduce_dimensions, scale_numerical_features,
    split_train_test, transform_numerical_features,
};
use crate::qc::{
    OutlierMethod, detect_outliers, handle_missing_values, handle_outliers,
    identify_missing_values,
};
use crate::steps::{PlanEntry, StepDefinition, StepKind, StepPlan};
use crate::types::{ReportEntry, StepOutput};
use serde::Serialize;
use tracing::{debug, info, warn};

const NO_NUMERIC_COLUMNS: &str = "no numeric columns";

/// Lifecycle of a plan execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum ExecutorState {
    Pending,
    /// Running the plan entry at this index
    Running(usize),
    Completed,
    /// Aborted by the plan entry at this index
    Failed(usize),
}

/// Runs plan entries against a dataset.
pub struct StepExecutor<'a> {
    config: &'a RunConfig,
    plotter: &'a dyn Plotter,
    progress: Option<&'a dyn ProgressReporter>,
    state: ExecutorState,
    skipped: Vec<String>,
}

impl<'a> StepExecutor<'a> {
    pub fn new(config: &'a RunConfig, plotter: &'a dyn Plotter) -> Self {
        Self {
            config,
            plotter,
            progress: None,
            state: ExecutorState::Pending,
            skipped: Vec::new(),
        }
    }

    pub fn with_progress(mut self, reporter: &'a dyn ProgressReporter) -> Self {
        self.progress = Some(reporter);
        self
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Plan entries that had no registry definition and were skipped.
    pub fn skipped_steps(&self) -> &[String] {
        &self.skipped
    }

    fn transition(&mut self, state: ExecutorState, update: ProgressUpdate) {
        self.state = state;
        if let Some(reporter) = self.progress {
            reporter.report(update);
        }
    }

    /// Execute every entry in order.
    ///
    /// Entries without a definition are skipped with a warning. The first
    /// engine error stops the run; report entries recorded before it stay in
    /// the dataset's log.
    pub fn execute(&mut self, plan: &StepPlan, dataset: &mut Dataset) -> Result<()> {
        let total = plan.len();
        info!("Executing {} steps", total);

        for (index, entry) in plan.entries().iter().enumerate() {
            self.transition(
                ExecutorState::Running(index),
                ProgressUpdate::step_started(index, total, &entry.name),
            );

            let Some(definition) = entry.definition else {
                warn!("Step '{}' not recognised, will be skipped", entry.name);
                self.skipped.push(entry.name.clone());
                continue;
            };

            info!("Step {}/{}: {}", index + 1, total, entry.name);
            if let Err(source) = self.run_entry(definition, entry, dataset) {
                self.transition(
                    ExecutorState::Failed(index),
                    ProgressUpdate::failed(format!("Step '{}' failed: {}", entry.name, source)),
                );
                return Err(QcpError::StepFailed {
                    step: entry.name.clone(),
                    index,
                    source: Box::new(source),
                });
            }
        }

        self.transition(
            ExecutorState::Completed,
            ProgressUpdate::complete(format!("Executed {} steps", total - self.skipped.len())),
        );
        Ok(())
    }

    fn run_entry(
        &self,
        definition: &StepDefinition,
        entry: &PlanEntry,
        dataset: &mut Dataset,
    ) -> Result<()> {
        let snapshot = if definition.mutates() {
            Some(dataset.snapshot()?)
        } else {
            None
        };

        let output = self.dispatch(definition, entry.method.as_deref(), dataset)?;

        dataset.record_step(ReportEntry {
            step: entry.name.clone(),
            method: entry.method.clone(),
            snapshot,
            output: output.filter(|_| definition.output),
        });
        Ok(())
    }

    fn dispatch(
        &self,
        definition: &StepDefinition,
        method: Option<&str>,
        dataset: &mut Dataset,
    ) -> Result<Option<StepOutput>> {
        let step = definition.name;
        let output = match definition.kind {
            StepKind::IdentifyMissingValues => StepOutput::MissingValues {
                columns: identify_missing_values(dataset)?,
            },
            StepKind::HandleMissingValues => {
                let method = method.unwrap_or("impute_mean");
                StepOutput::MissingValuesHandled(handle_missing_values(dataset, method, self.config)?)
            }
            StepKind::DetectOutliers => {
                let method = OutlierMethod::parse(step, method.unwrap_or("iqr"))?;
                StepOutput::Outliers {
                    columns: detect_outliers(dataset, method, self.config)?,
                }
            }
            StepKind::HandleOutliers => {
                let method = OutlierMethod::parse(step, required(step, method)?)?;
                let (columns, artifact) =
                    handle_outliers(dataset, method, self.config, self.plotter)?;
                StepOutput::OutliersHandled { columns, artifact }
            }
            StepKind::SplitTrainTest => {
                let summary = split_train_test(dataset, self.config)?;
                StepOutput::TrainTestSplit {
                    train_samples: summary.train_samples,
                    test_samples: summary.test_samples,
                    seed: self.config.random_seed,
                }
            }
            StepKind::ScaleNumericalFeatures => {
                let method = ScalingMethod::parse(step, required(step, method)?)?;
                scale_numerical_features(dataset, method)?;
                return Ok(None);
            }
            StepKind::TransformNumericalFeatures => {
                let method = TransformMethod::parse(step, required(step, method)?)?;
                transform_numerical_features(dataset, method)?;
                return Ok(None);
            }
            StepKind::DimensionalityReduction => {
                let method = ReductionMethod::parse(step, method.unwrap_or("pca"))?;
                match reduce_dimensions(dataset, method, self.config, self.plotter)? {
                    Some(r) => StepOutput::DimensionalityReduction {
                        result: r.result,
                        variance_plot: r.variance_plot,
                        projection_plot: r.projection_plot,
                    },
                    None => no_columns(),
                }
            }
            StepKind::BoxPlots => match box_plots(dataset, self.plotter)? {
                Some(artifact) => StepOutput::Plot { artifact },
                None => no_columns(),
            },
            StepKind::CorrelationHeatmap => {
                let method = CorrelationMethod::parse(step, method.unwrap_or("pearson"))?;
                let matrix = pairwise_correlations(dataset, method)?;
                StepOutput::Plot {
                    artifact: correlation_heatmap(&matrix, self.plotter),
                }
            }
            StepKind::DescriptiveStatistics => StepOutput::DescriptiveStatistics {
                columns: descriptive_statistics(dataset)?,
            },
            StepKind::PairwiseCorrelations => {
                let method = CorrelationMethod::parse(step, method.unwrap_or("pearson"))?;
                let matrix = pairwise_correlations(dataset, method)?;
                let heatmap = correlation_heatmap(&matrix, self.plotter);
                StepOutput::Correlation { matrix, heatmap }
            }
            StepKind::EvaluateDistributionFeatures => {
                match evaluate_distribution_features(dataset, self.config, self.plotter)? {
                    Some(histograms) => StepOutput::Distributions { histograms },
                    None => no_columns(),
                }
            }
            StepKind::Placeholder => {
                debug!("Step '{}' has no implementation yet, nothing to do", step);
                return Ok(None);
            }
        };
        Ok(Some(output))
    }
}

fn no_columns() -> StepOutput {
    StepOutput::NoColumns {
        reason: NO_NUMERIC_COLUMNS.to_string(),
    }
}

/// Method of a step that cannot run without one. Only reachable through
/// best-effort plans, since validation rejects a missing mandatory method.
fn required<'m>(step: &str, method: Option<&'m str>) -> Result<&'m str> {
    method.ok_or_else(|| QcpError::UnsupportedMethod {
        step: step.to_string(),
        method: "<none>".to_string(),
    })
}
