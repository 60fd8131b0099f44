//! Static catalog of every step the pipeline knows about.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Step categories, in the order a plan must visit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Qc,
    Preprocessing,
    Visualization,
    Analysis,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Qc,
        Category::Preprocessing,
        Category::Visualization,
        Category::Analysis,
    ];

    /// Position of the category in the mandatory ordering.
    pub fn index(&self) -> usize {
        match self {
            Self::Qc => 0,
            Self::Preprocessing => 1,
            Self::Visualization => 2,
            Self::Analysis => 3,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Qc => "qc",
            Self::Preprocessing => "preprocessing",
            Self::Visualization => "visualization",
            Self::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which method tokens a step accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodRule {
    /// The step takes no method; supplying one is a violation.
    Forbidden,
    /// Any token is accepted. The step decides what to do with unknown ones.
    Any { required: bool },
    /// Only the listed tokens are accepted.
    OneOf {
        values: &'static [&'static str],
        required: bool,
    },
}

impl MethodRule {
    pub fn accepts_method(&self) -> bool {
        !matches!(self, Self::Forbidden)
    }

    pub fn is_required(&self) -> bool {
        match self {
            Self::Forbidden => false,
            Self::Any { required } | Self::OneOf { required, .. } => *required,
        }
    }

    /// Allowed tokens, or `None` when any token is accepted.
    pub fn allowed(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::OneOf { values, .. } => Some(values),
            Self::Forbidden => Some(&[]),
            Self::Any { .. } => None,
        }
    }

    pub fn allows(&self, method: &str) -> bool {
        match self {
            Self::Forbidden => false,
            Self::Any { .. } => true,
            Self::OneOf { values, .. } => values.contains(&method),
        }
    }
}

/// Handler tag each step dispatches to.
///
/// Resolved once during validation; the executor matches on it instead of
/// looking anything up by name at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    IdentifyMissingValues,
    HandleMissingValues,
    DetectOutliers,
    HandleOutliers,
    SplitTrainTest,
    ScaleNumericalFeatures,
    TransformNumericalFeatures,
    DimensionalityReduction,
    BoxPlots,
    CorrelationHeatmap,
    DescriptiveStatistics,
    PairwiseCorrelations,
    EvaluateDistributionFeatures,
    /// Registered so plans stay valid, but not implemented yet.
    Placeholder,
}

/// A single entry of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    pub name: &'static str,
    pub category: Category,
    pub method: MethodRule,
    /// Method resolved when the step is selected without one.
    pub default_method: Option<&'static str>,
    /// Capture a "before" snapshot of the data for the report.
    pub snapshot: bool,
    /// Store the step's structured output in the report.
    pub output: bool,
    pub kind: StepKind,
}

impl StepDefinition {
    fn new(name: &'static str, category: Category, kind: StepKind) -> Self {
        Self {
            name,
            category,
            method: MethodRule::Forbidden,
            default_method: None,
            snapshot: false,
            output: false,
            kind,
        }
    }

    fn method(mut self, rule: MethodRule, default_method: Option<&'static str>) -> Self {
        self.method = rule;
        self.default_method = default_method;
        self
    }

    fn snapshot(mut self) -> Self {
        self.snapshot = true;
        self
    }

    fn output(mut self) -> Self {
        self.output = true;
        self
    }

    /// Whether the step changes the working table.
    pub fn mutates(&self) -> bool {
        self.snapshot
    }

    /// The method to use when none was requested.
    pub fn resolve_method(&self, requested: Option<&str>) -> Option<String> {
        requested
            .map(str::to_string)
            .or_else(|| self.default_method.map(str::to_string))
    }
}

pub const OUTLIER_METHODS: &[&str] = &["iqr", "zscore"];
pub const SCALER_METHODS: &[&str] = &["standard_scaler", "robust_scaler"];
pub const TRANSFORM_METHODS: &[&str] = &["box-cox", "log2"];
pub const REDUCTION_METHODS: &[&str] = &["pca"];
pub const CORRELATION_METHODS: &[&str] = &["pearson", "spearman"];

const ANY_OPTIONAL: MethodRule = MethodRule::Any { required: false };

/// Immutable catalog of steps, grouped by category in registry order.
#[derive(Debug)]
pub struct StepRegistry {
    steps: Vec<StepDefinition>,
}

static REGISTRY: Lazy<StepRegistry> = Lazy::new(StepRegistry::build);

/// The process-wide registry.
pub fn registry() -> &'static StepRegistry {
    &REGISTRY
}

impl StepRegistry {
    fn build() -> Self {
        use Category::*;
        use StepKind as K;

        let steps = vec![
            // qc
            StepDefinition::new("identify_missing_values", Qc, K::IdentifyMissingValues).output(),
            StepDefinition::new("handle_missing_values", Qc, K::HandleMissingValues)
                .method(ANY_OPTIONAL, Some("impute_mean"))
                .snapshot()
                .output(),
            StepDefinition::new("detect_outliers", Qc, K::DetectOutliers)
                .method(
                    MethodRule::OneOf { values: OUTLIER_METHODS, required: false },
                    Some("iqr"),
                )
                .output(),
            StepDefinition::new("handle_outliers", Qc, K::HandleOutliers)
                .method(MethodRule::OneOf { values: OUTLIER_METHODS, required: true }, None)
                .snapshot()
                .output(),
            // preprocessing
            StepDefinition::new("split_train_test", Preprocessing, K::SplitTrainTest)
                .snapshot()
                .output(),
            StepDefinition::new("scale_numerical_features", Preprocessing, K::ScaleNumericalFeatures)
                .method(MethodRule::OneOf { values: SCALER_METHODS, required: true }, None)
                .snapshot(),
            StepDefinition::new(
                "transform_numerical_features",
                Preprocessing,
                K::TransformNumericalFeatures,
            )
            .method(MethodRule::OneOf { values: TRANSFORM_METHODS, required: true }, None)
            .snapshot(),
            StepDefinition::new("encode_categorical", Preprocessing, K::Placeholder)
                .method(ANY_OPTIONAL, None),
            StepDefinition::new("remove_highly_correlated_features", Preprocessing, K::Placeholder)
                .method(ANY_OPTIONAL, None),
            StepDefinition::new("create_new_features", Preprocessing, K::Placeholder)
                .method(ANY_OPTIONAL, None),
            StepDefinition::new("feature_selection", Preprocessing, K::Placeholder)
                .method(ANY_OPTIONAL, None),
            StepDefinition::new("dimensionality_reduction", Preprocessing, K::DimensionalityReduction)
                .method(
                    MethodRule::OneOf { values: REDUCTION_METHODS, required: false },
                    Some("pca"),
                )
                .output(),
            // visualization
            StepDefinition::new("box_plots", Visualization, K::BoxPlots).output(),
            StepDefinition::new("correlation_heatmap", Visualization, K::CorrelationHeatmap)
                .method(
                    MethodRule::OneOf { values: CORRELATION_METHODS, required: false },
                    Some("pearson"),
                )
                .output(),
            // analysis
            StepDefinition::new("descriptive_statistics", Analysis, K::DescriptiveStatistics).output(),
            StepDefinition::new("pairwise_correlations_numerical", Analysis, K::PairwiseCorrelations)
                .method(
                    MethodRule::OneOf { values: CORRELATION_METHODS, required: false },
                    Some("pearson"),
                )
                .output(),
            StepDefinition::new(
                "evaluate_distribution_features",
                Analysis,
                K::EvaluateDistributionFeatures,
            )
            .output(),
        ];

        Self { steps }
    }

    /// Look up a step by name.
    pub fn get(&self, name: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// All steps in registry order.
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Steps of one category, in registry order.
    pub fn category_steps(&self, category: Category) -> impl Iterator<Item = &StepDefinition> {
        self.steps.iter().filter(move |s| s.category == category)
    }

    /// Position of a step within its own category.
    pub fn position_in_category(&self, name: &str) -> Option<usize> {
        let step = self.get(name)?;
        self.category_steps(step.category).position(|s| s.name == name)
    }

    /// Request for "run every step in the given order".
    ///
    /// Mandatory methods are filled with the first allowed token.
    pub fn run_all(&self) -> Vec<super::StepRequest> {
        self.steps
            .iter()
            .map(|s| {
                let method = match s.method {
                    MethodRule::OneOf { values, required: true } => values.first().map(|m| m.to_string()),
                    _ => None,
                };
                super::StepRequest {
                    step: s.name.to_string(),
                    method,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_step_names_are_unique() {
        let names: HashSet<_> = registry().steps().iter().map(|s| s.name).collect();
        assert_eq!(names.len(), registry().steps().len());
    }

    #[test]
    fn test_registry_is_grouped_by_category() {
        let indices: Vec<usize> = registry().steps().iter().map(|s| s.category.index()).collect();
        let mut sorted = indices.clone();
        sorted.sort();
        assert_eq!(indices, sorted);
    }

    #[test]
    fn test_every_category_has_steps() {
        for category in Category::ALL {
            assert!(registry().category_steps(category).count() > 0, "{category} is empty");
        }
    }

    #[test]
    fn test_method_rules() {
        let handle = registry().get("handle_outliers").unwrap();
        assert!(handle.method.is_required());
        assert!(handle.method.allows("zscore"));
        assert!(!handle.method.allows("capping"));

        let identify = registry().get("identify_missing_values").unwrap();
        assert!(!identify.method.accepts_method());
        assert_eq!(identify.method.allowed(), Some(&[][..]));

        let impute = registry().get("handle_missing_values").unwrap();
        assert!(impute.method.allows("anything"));
        assert_eq!(impute.method.allowed(), None);
    }

    #[test]
    fn test_resolve_method_uses_default() {
        let detect = registry().get("detect_outliers").unwrap();
        assert_eq!(detect.resolve_method(None).as_deref(), Some("iqr"));
        assert_eq!(detect.resolve_method(Some("zscore")).as_deref(), Some("zscore"));
    }

    #[test]
    fn test_position_in_category() {
        assert_eq!(registry().position_in_category("identify_missing_values"), Some(0));
        assert_eq!(registry().position_in_category("handle_outliers"), Some(3));
        assert_eq!(registry().position_in_category("descriptive_statistics"), Some(0));
        assert_eq!(registry().position_in_category("nope"), None);
    }

    #[test]
    fn test_run_all_fills_required_methods() {
        let all = registry().run_all();
        assert_eq!(all.len(), registry().steps().len());
        let scale = all.iter().find(|r| r.step == "scale_numerical_features").unwrap();
        assert_eq!(scale.method.as_deref(), Some("standard_scaler"));
        let detect = all.iter().find(|r| r.step == "detect_outliers").unwrap();
        assert_eq!(detect.method, None);
    }
}
