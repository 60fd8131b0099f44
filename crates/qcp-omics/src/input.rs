//! Run metadata and the checks applied to input before any step runs.

use crate::dataset::Dataset;
use crate::error::{QcpError, Result, ShapeWarning};
use crate::steps::StepRequest;
use crate::types::DatasetType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Labels allowed when `en_header` is set.
static ENGLISH_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9 ._\-]+$").expect("Invalid regex: english label"));

/// Description of a run, as read from the metadata JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub dataset_type: DatasetType,
    /// True when features are columns and samples are rows.
    pub features_cols: bool,
    /// Require plain ASCII labels for columns and sample ids.
    #[serde(default)]
    pub en_header: bool,
    /// Whether the data still needs full quality control.
    pub is_raw: bool,
    /// Column name → `category` | `int` | `float`.
    #[serde(default)]
    pub dtypes: BTreeMap<String, String>,
    #[serde(default)]
    pub steps_to_run: Vec<StepRequest>,
}

impl RunMetadata {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| QcpError::Validation(format!("invalid metadata: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| QcpError::Validation(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Reject labels outside the plain ASCII set when `en_header` is set.
    pub fn check_labels(&self, dataset: &Dataset) -> Result<()> {
        if !self.en_header {
            return Ok(());
        }
        let columns = dataset.data().get_column_names();
        let offending: Vec<String> = columns
            .iter()
            .map(|c| c.as_str())
            .chain(dataset.sample_ids().iter().map(String::as_str))
            .filter(|label| !ENGLISH_LABEL.is_match(label))
            .map(str::to_string)
            .collect();

        if offending.is_empty() {
            Ok(())
        } else {
            Err(QcpError::Validation(format!(
                "labels contain characters outside [a-zA-Z0-9 ._-]: {}",
                offending.join(", ")
            )))
        }
    }
}

/// Compare the declared orientation with the table's shape.
///
/// `rows` and `columns` describe the table as loaded, excluding the index
/// column.
pub fn check_shape(rows: usize, columns: usize, features_cols: bool) -> std::result::Result<(), ShapeWarning> {
    let message = if features_cols && rows <= columns {
        "Features may be in rows instead of columns due to detected shape"
    } else if !features_cols && rows >= columns {
        "Features may be in columns instead of rows due to detected shape"
    } else {
        return Ok(());
    };
    Err(ShapeWarning {
        message: message.to_string(),
        rows,
        columns,
    })
}
