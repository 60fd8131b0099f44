//! Shared data types: column kinds, report entries, and step outputs.

use crate::dataset::DataSnapshot;
use crate::plotting::Artifact;
use serde::{Deserialize, Serialize};

/// Declared type of a column, as given in the metadata `dtypes` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Category,
    Int,
    Float,
}

impl ColumnKind {
    /// Parse a dtype token; `None` for anything other than `category`, `int`, `float`.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "category" => Some(Self::Category),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            _ => None,
        }
    }
}

/// Kind of omics data the run describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    Genomics,
    Proteomics,
    Clinical,
}

/// One row of the report log, appended per executed step.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Data as it was before the step ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<DataSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<StepOutput>,
}

/// Percentage of missing entries in one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingColumn {
    pub column: String,
    pub percentage: f64,
}

/// How a column's gaps were filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputedColumn {
    pub column: String,
    pub strategy: String,
    pub value: String,
    pub filled: usize,
}

/// Outcome of missing-value handling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingValueReport {
    pub dropped: Vec<String>,
    pub imputed: Vec<ImputedColumn>,
}

/// A flagged cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierCell {
    pub row: String,
    pub value: f64,
}

/// Flagged cells of one column, in row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnOutliers {
    pub column: String,
    pub cells: Vec<OutlierCell>,
}

/// Distribution summary of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
}

/// Correlation matrix over the numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub method: String,
    pub columns: Vec<String>,
    /// Row-major; `None` where a pair has no variance or too few observations.
    pub values: Vec<Vec<Option<f64>>>,
}

/// Principal component projection of the numeric view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaResult {
    pub sample_ids: Vec<String>,
    /// One row per sample, one value per component.
    pub coordinates: Vec<Vec<f64>>,
    /// Percentage of total variance explained by each component.
    pub explained_variance: Vec<f64>,
}

/// Histogram artifact for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnArtifact {
    pub column: String,
    pub artifact: Artifact,
}

/// Structured result of a step, stored in the report when the step is
/// flagged as result-producing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutput {
    MissingValues { columns: Vec<MissingColumn> },
    MissingValuesHandled(MissingValueReport),
    Outliers { columns: Vec<ColumnOutliers> },
    OutliersHandled {
        columns: Vec<ColumnOutliers>,
        artifact: Artifact,
    },
    TrainTestSplit {
        train_samples: usize,
        test_samples: usize,
        seed: u64,
    },
    DimensionalityReduction {
        result: PcaResult,
        variance_plot: Artifact,
        projection_plot: Artifact,
    },
    Plot { artifact: Artifact },
    DescriptiveStatistics { columns: Vec<ColumnStatistics> },
    Correlation {
        matrix: CorrelationMatrix,
        heatmap: Artifact,
    },
    Distributions { histograms: Vec<ColumnArtifact> },
    /// Explicit marker for analyses that found nothing to work on.
    NoColumns { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_kind_tokens() {
        assert_eq!(ColumnKind::from_token("category"), Some(ColumnKind::Category));
        assert_eq!(ColumnKind::from_token("int"), Some(ColumnKind::Int));
        assert_eq!(ColumnKind::from_token("float"), Some(ColumnKind::Float));
        assert_eq!(ColumnKind::from_token("double"), None);
    }

    #[test]
    fn test_dataset_type_from_json() {
        let t: DatasetType = serde_json::from_str("\"proteomics\"").unwrap();
        assert_eq!(t, DatasetType::Proteomics);
        assert!(serde_json::from_str::<DatasetType>("\"metabolomics\"").is_err());
    }

    #[test]
    fn test_step_output_is_tagged() {
        let output = StepOutput::NoColumns {
            reason: "no numeric columns".to_string(),
        };
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["kind"], "no_columns");
    }
}
