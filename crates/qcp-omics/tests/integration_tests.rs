//! Integration tests for the omics QC pipeline.
//!
//! These tests drive the engines and the full pipeline end-to-end on small
//! in-memory tables.

use pretty_assertions::assert_eq;
use qcp_omics::qc::{OutlierMethod, detect_outliers, handle_missing_values, handle_outliers, identify_missing_values};
use qcp_omics::steps::{StepRequest, ViolationKind, registry, validate};
use qcp_omics::{
    Dataset, ExecutorState, Pipeline, ProgressUpdate, QcpError, RunConfig, RunMetadata, RunStage,
    SummaryPlotter,
};
use polars::prelude::*;
use serde_json::json;
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

fn ids(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("s{i}")).collect()
}

/// 5 samples x 3 numeric features, one extreme value in `a`, one gap in `b`.
fn outlier_table() -> Dataset {
    let df = df![
        "a" => [1i64, 2, 3, 4, 100],
        "b" => [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)],
        "c" => [10.0, 11.0, 12.0, 13.0, 14.0],
    ]
    .unwrap();
    Dataset::new(ids(5), df).unwrap()
}

/// 10 samples with an id column, three numeric features and one categorical.
fn cohort_frame() -> DataFrame {
    df![
        "sample" => ids(10),
        "g1" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        "g2" => [Some(2.5), None, Some(3.1), Some(4.8), Some(5.2), Some(1.9), Some(2.2), Some(3.3), Some(4.4), Some(5.5)],
        "g3" => [10i64, 12, 11, 13, 250, 12, 11, 10, 14, 13],
        "group" => [Some("a"), Some("b"), Some("a"), None, Some("b"), Some("a"), Some("a"), Some("b"), Some("a"), Some("b")],
    ]
    .unwrap()
}

fn metadata(is_raw: bool, steps: serde_json::Value) -> RunMetadata {
    let value = json!({
        "dataset_type": "proteomics",
        "features_cols": true,
        "is_raw": is_raw,
        "steps_to_run": steps,
    });
    RunMetadata::from_json(&value.to_string()).unwrap()
}

fn column(dataset: &Dataset, name: &str) -> Vec<Option<f64>> {
    dataset
        .numeric_columns()
        .unwrap()
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
        .unwrap()
}

// ============================================================================
// Engine Chains
// ============================================================================

#[test]
fn test_qc_chain_replaces_extreme_value_and_fills_gaps() {
    let mut dataset = outlier_table();
    let config = RunConfig::default();

    let missing = identify_missing_values(&dataset).unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].column, "b");
    assert_eq!(missing[0].percentage, 20.0);

    let handled = handle_missing_values(&mut dataset, "impute_mean", &config).unwrap();
    assert!(handled.dropped.is_empty());
    assert_eq!(column(&dataset, "b"), vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]);

    let detected = detect_outliers(&dataset, OutlierMethod::Iqr, &config).unwrap();
    assert_eq!(detected.len(), 1);
    assert_eq!(detected[0].column, "a");
    assert_eq!(detected[0].cells[0].row, "s5");
    assert_eq!(detected[0].cells[0].value, 100.0);

    let (handled, artifact) =
        handle_outliers(&mut dataset, OutlierMethod::Iqr, &config, &SummaryPlotter).unwrap();
    assert_eq!(handled, detected);
    assert!(!artifact.as_str().is_empty());

    assert_eq!(column(&dataset, "a"), vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(3.0)]);
    assert!(identify_missing_values(&dataset).unwrap().is_empty());
}

// ============================================================================
// Plan Validation
// ============================================================================

#[test]
fn test_raw_plan_with_reversed_qc_steps_is_rejected() {
    let requests = vec![
        StepRequest::new("handle_missing_values"),
        StepRequest::new("identify_missing_values"),
    ];
    let violations = validate(&requests, true, registry()).unwrap_err();
    assert!(violations.iter().any(|v| matches!(
        v.kind,
        ViolationKind::OutOfOrder | ViolationKind::IncompleteOrMisorderedForRaw
    )));
}

#[test]
fn test_handle_outliers_without_method_is_invalid() {
    let requests = vec![
        StepRequest::new("identify_missing_values"),
        StepRequest::new("handle_missing_values"),
        StepRequest::new("detect_outliers"),
        StepRequest::new("handle_outliers"),
    ];
    let violations = validate(&requests, true, registry()).unwrap_err();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::InvalidMethod);
    assert_eq!(violations[0].step, "handle_outliers");
}

#[test]
fn test_run_all_request_is_valid_for_raw_data() {
    let requests = registry().run_all();
    let plan = validate(&requests, true, registry()).unwrap();
    assert_eq!(plan.len(), registry().steps().len());
}

// ============================================================================
// Full Pipeline
// ============================================================================

#[test]
fn test_pipeline_runs_qc_plan() {
    let metadata = metadata(
        true,
        json!([
            {"step": "identify_missing_values"},
            {"step": "handle_missing_values"},
            {"step": "detect_outliers", "method": "iqr"},
            {"step": "handle_outliers", "method": "iqr"},
        ]),
    );

    let report = Pipeline::builder()
        .build()
        .unwrap()
        .run(cohort_frame(), &metadata)
        .unwrap();

    assert_eq!(report.state, ExecutorState::Completed);
    let names: Vec<&str> = report.steps.iter().map(|e| e.step.as_str()).collect();
    assert_eq!(
        names,
        vec!["identify_missing_values", "handle_missing_values", "detect_outliers", "handle_outliers"]
    );

    // Resolved default method is recorded
    assert_eq!(
        report.step("handle_missing_values").unwrap().method.as_deref(),
        Some("impute_mean")
    );

    // Mutating steps keep a before-snapshot; read-only ones do not
    assert!(report.step("handle_outliers").unwrap().snapshot.is_some());
    assert!(report.step("detect_outliers").unwrap().snapshot.is_none());

    let g3 = report.final_data.column("g3").unwrap();
    assert_eq!(g3.values[4], json!(12.0));
    let group = report.final_data.column("group").unwrap();
    assert_eq!(group.values[3], json!("a"));
    assert!(report.held_out.is_none());
}

#[test]
fn test_pipeline_runs_every_registered_step() {
    let requests = serde_json::to_value(registry().run_all()).unwrap();
    let metadata = metadata(true, requests);

    let report = Pipeline::builder()
        .build()
        .unwrap()
        .run(cohort_frame(), &metadata)
        .unwrap();

    assert_eq!(report.state, ExecutorState::Completed);
    assert_eq!(report.steps.len(), registry().steps().len());
    assert!(report.skipped_steps.is_empty());
    assert_eq!(report.final_data.shape(), (8, 4));
    assert_eq!(report.held_out.as_ref().map(|h| h.shape()), Some((2, 4)));

    for name in ["descriptive_statistics", "pairwise_correlations_numerical", "dimensionality_reduction"] {
        assert!(report.step(name).unwrap().output.is_some(), "{name} has no output");
    }
    assert!(report.step("scale_numerical_features").unwrap().output.is_none());
}

#[test]
fn test_pipeline_transposes_features_in_rows() {
    let df = df![
        "feature" => ["g1", "g2"],
        "s1" => [1.0, 5.0],
        "s2" => [2.0, 6.0],
        "s3" => [3.0, 7.0],
        "s4" => [4.0, 8.0],
    ]
    .unwrap();
    let mut metadata = metadata(false, json!([{"step": "descriptive_statistics"}]));
    metadata.features_cols = false;

    let report = Pipeline::builder().build().unwrap().run(df, &metadata).unwrap();

    assert_eq!(report.final_data.sample_ids, ids(4));
    assert_eq!(report.final_data.shape(), (4, 2));
    assert_eq!(
        report.final_data.column("g2").unwrap().values,
        vec![json!(5.0), json!(6.0), json!(7.0), json!(8.0)]
    );
}

#[test]
fn test_shape_warning_requires_confirmation() {
    let df = df![
        "sample" => ["s1", "s2"],
        "g1" => [1.0, 2.0],
        "g2" => [3.0, 4.0],
        "g3" => [5.0, 6.0],
    ]
    .unwrap();
    let metadata = metadata(false, json!([{"step": "descriptive_statistics"}]));

    let err = Pipeline::builder()
        .build()
        .unwrap()
        .run(df.clone(), &metadata)
        .unwrap_err();
    assert!(err.is_recoverable());
    match err {
        QcpError::ShapeMismatch(warning) => {
            assert_eq!((warning.rows, warning.columns), (2, 3));
        }
        other => panic!("expected shape warning, got {other}"),
    }

    let report = Pipeline::builder()
        .confirm_shape(true)
        .build()
        .unwrap()
        .run(df, &metadata)
        .unwrap();
    assert_eq!(report.state, ExecutorState::Completed);
}

#[test]
fn test_rejected_plan_reports_all_violations() {
    let metadata = metadata(
        false,
        json!([
            {"step": "descriptive_statistics"},
            {"step": "box_plots"},
            {"step": "no_such_step"},
        ]),
    );

    let err = Pipeline::builder()
        .build()
        .unwrap()
        .run(cohort_frame(), &metadata)
        .unwrap_err();

    assert_eq!(err.error_code(), "PLAN_VIOLATION");
    let kinds: Vec<ViolationKind> = err.violations().unwrap().iter().map(|v| v.kind).collect();
    assert!(kinds.contains(&ViolationKind::OutOfOrder));
    assert!(kinds.contains(&ViolationKind::UnknownStep));
}

#[test]
fn test_unvalidated_plan_skips_unknown_steps() {
    let metadata = metadata(
        false,
        json!([
            {"step": "identify_missing_values"},
            {"step": "no_such_step"},
            {"step": "descriptive_statistics"},
        ]),
    );

    let report = Pipeline::builder()
        .validate_plan(false)
        .build()
        .unwrap()
        .run(cohort_frame(), &metadata)
        .unwrap();

    assert_eq!(report.state, ExecutorState::Completed);
    assert_eq!(report.skipped_steps, vec!["no_such_step".to_string()]);
    assert_eq!(report.steps.len(), 2);
}

#[test]
fn test_step_failure_aborts_run() {
    let metadata = metadata(false, json!([{"step": "dimensionality_reduction"}]));

    let err = Pipeline::builder()
        .build()
        .unwrap()
        .run(cohort_frame(), &metadata)
        .unwrap_err();

    assert_eq!(err.error_code(), "MISSING_VALUES");
    assert!(matches!(err, QcpError::StepFailed { index: 0, .. }));
}

#[test]
fn test_second_split_is_rejected() {
    let metadata = metadata(
        false,
        json!([
            {"step": "identify_missing_values"},
            {"step": "split_train_test"},
            {"step": "split_train_test"},
        ]),
    );

    let err = Pipeline::builder()
        .build()
        .unwrap()
        .run(cohort_frame(), &metadata)
        .unwrap_err();

    assert_eq!(err.error_code(), "VALIDATION_ERROR");
    assert!(matches!(err, QcpError::StepFailed { index: 2, .. }));
}

#[test]
fn test_type_mapping_rejects_unknown_column() {
    let mut metadata = metadata(false, json!([{"step": "descriptive_statistics"}]));
    metadata.dtypes.insert("not_there".to_string(), "float".to_string());

    let err = Pipeline::builder()
        .build()
        .unwrap()
        .run(cohort_frame(), &metadata)
        .unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_COLUMN");
}

#[test]
fn test_progress_updates_follow_run() {
    let stages: Arc<Mutex<Vec<RunStage>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let metadata = metadata(
        false,
        json!([
            {"step": "descriptive_statistics"},
            {"step": "pairwise_correlations_numerical", "method": "spearman"},
        ]),
    );

    Pipeline::builder()
        .on_progress(move |update: ProgressUpdate| sink.lock().unwrap().push(update.stage))
        .build()
        .unwrap()
        .run(cohort_frame(), &metadata)
        .unwrap();

    let stages = stages.lock().unwrap();
    assert_eq!(stages.first(), Some(&RunStage::Validating));
    assert_eq!(stages.last(), Some(&RunStage::Complete));
    assert_eq!(stages.iter().filter(|s| **s == RunStage::Executing).count(), 2);
}
